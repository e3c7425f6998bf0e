//! The high level entry point tying loading, analysis and memory
//! construction together

use intern_all::Tok;

use crate::analysis::analyze;
use crate::analysis::unit::AnalysisSet;
use crate::error::{ProjectErrorObj, ProjectResult, Reporter};
use crate::load::load_path::LoadPath;
use crate::load::loader::Loader;
use crate::load::parallel::ParallelLoader;
use crate::memory::build::build_cells;
use crate::memory::link::link_cells;
use crate::memory::RuntimeSet;
use crate::scope::graph::ScopeGraph;

/// Drives a set of entry points through the whole pipeline. Reusable; each
/// call loads fresh, sharing only the parse cache if the load path carries
/// one.
pub struct Compiler {
  load_path: LoadPath,
  parallel: bool,
}
impl Compiler {
  /// A compiler over the given load path, loading sequentially
  pub fn new(load_path: LoadPath) -> Self { Self { load_path, parallel: false } }
  /// Control whether loading uses the concurrent loader
  pub fn parallel(mut self, parallel: bool) -> Self {
    self.parallel = parallel;
    self
  }
  /// The load path this compiler works over
  pub fn load_path(&self) -> &LoadPath { &self.load_path }

  /// Load the entry points and their transitive imports. Returns the work
  /// set and the canonical entry keys in input order.
  pub fn load(&self, entries: &[&str]) -> ProjectResult<(AnalysisSet, Vec<Tok<String>>)> {
    if self.parallel {
      let (set, keys, _) = ParallelLoader::new(&self.load_path).load(entries)?;
      return Ok((set, keys));
    }
    let mut set = AnalysisSet::new();
    let mut loader = Loader::new(&self.load_path);
    let mut keys = Vec::new();
    for entry in entries {
      keys.push(loader.load(entry, &mut set, true)?);
    }
    Ok((set, keys))
  }

  /// Load like [Compiler::load] but substitute empty stand-ins for missing
  /// modules and keep going past parse errors. The survived errors come
  /// back alongside the set; tooling over broken code wants both.
  pub fn load_recovery(
    &self,
    entries: &[&str],
  ) -> ProjectResult<(AnalysisSet, Vec<Tok<String>>, Vec<ProjectErrorObj>)> {
    if self.parallel {
      return ParallelLoader::new(&self.load_path).recovery().load(entries);
    }
    let mut set = AnalysisSet::new();
    let mut loader = Loader::new(&self.load_path).recovery();
    let mut keys = Vec::new();
    for entry in entries {
      keys.push(loader.load(entry, &mut set, true)?);
    }
    Ok((set, keys, loader.into_recovery_errors()))
  }

  /// Run the entry points through the full pipeline: load, analyze, build
  /// and link memory cells
  pub fn compile(&self, entries: &[&str]) -> ProjectResult<RuntimeSet> {
    let (mut set, _) = self.load(entries)?;
    let mut graph = ScopeGraph::new();
    let reporter = Reporter::new();
    analyze(&mut set, &mut graph, &reporter);
    reporter.bind(())?;
    let mut rs = RuntimeSet::new(set, graph);
    build_cells(&mut rs)?;
    link_cells(&mut rs)?;
    Ok(rs)
  }
}

#[cfg(test)]
mod test {
  use intern_all::i;

  use super::*;
  use crate::load::location::Location;
  use crate::load::mem::MemLocation;
  use crate::memory::spaces;
  use crate::parse::parsed::Literal;

  #[test]
  fn compiles_against_the_embedded_modules() {
    let lp = LoadPath::new()
      .and(
        MemLocation::new()
          .add("main.loom", "import * as m from \"std/math\";\nlibrary l { tau: m.math.pi; }")
          .arc(),
      )
      .and_std();
    let rs = Compiler::new(lp).compile(&["main.loom"]).expect("compiles");
    let module = rs.module_cell(&i("main.loom")).expect("built");
    let l = rs.member(module, &i("l")).expect("entered");
    let tau = rs.member(l, &i("tau")).expect("entered");
    assert!(matches!(rs.literal(tau), Some(Literal::Num(_))));
  }

  #[test]
  fn parallel_and_sequential_compile_agree() {
    let sources = MemLocation::new()
      .add("dep.loom", "export library util { x: 5; }")
      .add("main.loom", "import util from \"dep.loom\";\nexport util as tools;");
    let seq = Compiler::new(LoadPath::new().and(sources.arc())).compile(&["main.loom"]);
    let sources = MemLocation::new()
      .add("dep.loom", "export library util { x: 5; }")
      .add("main.loom", "import util from \"dep.loom\";\nexport util as tools;");
    let par = Compiler::new(LoadPath::new().and(sources.arc()))
      .parallel(true)
      .compile(&["main.loom"]);
    let seq = seq.expect("compiles");
    let par = par.expect("compiles");
    for rs in [&seq, &par] {
      let names: Vec<_> =
        spaces::exports(rs, &i("main.loom")).into_iter().map(|(n, _)| n).collect();
      assert_eq!(names, vec![i("tools")]);
      let tools = rs.export_cell(&i("main.loom"), &i("tools")).expect("exported");
      let x = rs.member(tools, &i("x")).expect("entered");
      assert_eq!(rs.literal(x), Some(&Literal::Num(5.0.try_into().expect("not nan"))));
    }
  }

  #[test]
  fn entry_order_does_not_change_the_cell_graph() {
    let lp = LoadPath::new().and(
      MemLocation::new()
        .add("a.loom", "export library util { x: 1; }")
        .add("b.loom", "import util from \"a.loom\";\nexport util as tools;")
        .arc(),
    );
    let compiler = Compiler::new(lp);
    let forward = compiler.compile(&["a.loom", "b.loom"]).expect("compiles");
    let backward = compiler.compile(&["b.loom", "a.loom"]).expect("compiles");
    assert_eq!(forward.cell_count(), backward.cell_count());
    for unit in ["a.loom", "b.loom"] {
      assert_eq!(forward.module_cell(&i(unit)), backward.module_cell(&i(unit)));
      assert_eq!(
        spaces::exports(&forward, &i(unit)),
        spaces::exports(&backward, &i(unit)),
        "exports of {unit} differ between entry orders"
      );
    }
  }

  #[test]
  fn recovery_load_reports_but_continues() {
    let lp = LoadPath::new().and(
      MemLocation::new()
        .add("main.loom", "import * as gone from \"gone.loom\";\nlibrary l { v: 1; }")
        .arc(),
    );
    let (set, keys, errors) =
      Compiler::new(lp).load_recovery(&["main.loom"]).expect("recovers");
    assert_eq!(keys, vec![i("main.loom")]);
    assert_eq!(errors.len(), 1);
    assert!(set.units.contains_key(&i("gone.loom")));
  }

  #[test]
  fn pipeline_products_are_debug_printable() {
    let lp = LoadPath::new()
      .and(MemLocation::new().add("m.loom", "library l { v: 1; }").arc());
    let rs = Compiler::new(lp).compile(&["m.loom"]).expect("compiles");
    assert!(format!("{:?}", rs.analysis).contains("m.loom"));
    assert!(format!("{:?}", rs.graph).contains("symbols"));
    assert!(format!("{rs:?}").contains("cells"));
  }

  #[test]
  fn native_functions_respect_location_policy() {
    let lp = LoadPath::new().and(
      MemLocation::new()
        .add("m.loom", "library sys { now: native \"time.now\"; }")
        .allow_native(false)
        .arc(),
    );
    let err = Compiler::new(lp).compile(&["m.loom"]).unwrap_err();
    assert_eq!(err.description(), "Native function not allowed");
  }
}
