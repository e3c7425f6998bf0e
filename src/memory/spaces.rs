//! Resolution against a fully linked memory plan, for embedders that need
//! to find the cell behind a name

use intern_all::Tok;
use itertools::Itertools;

use super::cell::{CellId, RuntimeSet};
use crate::error::{InternalConsistency, ProjectError, ProjectResult};
use crate::location::Origin;
use crate::parse::parsed::Reference;
use crate::scope::graph::{SymbolId, SymbolKind};
use crate::scope::resolve;

/// Resolve a reference in the body of a unit down to a cell. The set must
/// be fully linked.
pub fn resolve_cell(
  rs: &RuntimeSet,
  unit: &Tok<String>,
  reference: &Reference,
) -> ProjectResult<CellId> {
  let start = (rs.graph.module_scope_of_unit(unit)).ok_or_else(|| {
    InternalConsistency {
      context: format!("unit {unit} has no module scope"),
      origin: Origin::Unit(unit.clone()),
    }
    .pack()
  })?;
  let symbol = resolve::resolve(&rs.graph, reference, start)?;
  cell_of(rs, symbol)
}

/// The cell a linked symbol lands on
pub fn cell_of(rs: &RuntimeSet, id: SymbolId) -> ProjectResult<CellId> {
  let sym = rs.graph.symbol(id);
  let slot = match &sym.kind {
    // modules expose their export space, never their body
    SymbolKind::Module { .. } =>
      return (rs.exports_cell(&sym.unit)).ok_or_else(|| {
        InternalConsistency {
          context: format!("{} has no export cell", rs.graph.describe(id)),
          origin: Origin::Source(sym.span.clone()),
        }
        .pack()
      }),
    SymbolKind::Library { .. } | SymbolKind::Var { .. } =>
      return (rs.symbol_cell(id)).ok_or_else(|| {
        InternalConsistency {
          context: format!("{} has no cell", rs.graph.describe(id)),
          origin: Origin::Source(sym.span.clone()),
        }
        .pack()
      }),
    SymbolKind::Export { .. } =>
      rs.exports_cell(&sym.unit).and_then(|c| rs.member(c, &sym.name)),
    _ => rs.module_cell(&sym.unit).and_then(|c| rs.member(c, &sym.name)),
  };
  slot.ok_or_else(|| {
    InternalConsistency {
      context: format!("the slot of {} was never filled", rs.graph.describe(id)),
      origin: Origin::Source(sym.span.clone()),
    }
    .pack()
  })
}

/// The exported names of a unit with their cells, sorted by name
pub fn exports(rs: &RuntimeSet, unit: &Tok<String>) -> Vec<(Tok<String>, CellId)> {
  let Some(cell) = rs.exports_cell(unit) else { return Vec::new() };
  (rs.cell(cell).entries.iter())
    .map(|(name, id)| (name.clone(), *id))
    .sorted_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()))
    .collect()
}

#[cfg(test)]
mod test {
  use intern_all::i;

  use super::super::build::build_cells;
  use super::super::link::link_cells;
  use super::*;
  use crate::analysis::analyze;
  use crate::analysis::unit::AnalysisSet;
  use crate::error::Reporter;
  use crate::load::load_path::LoadPath;
  use crate::load::loader::Loader;
  use crate::load::location::Location;
  use crate::load::mem::MemLocation;
  use crate::location::SourceSpan;
  use crate::parse::parsed::{Anchor, Literal};

  fn compiled(sources: &[(&str, &str)], entry: &str) -> RuntimeSet {
    let mut mem = MemLocation::new();
    for (path, src) in sources {
      mem = mem.add(path, src);
    }
    let lp = LoadPath::new().and(mem.arc());
    let mut set = AnalysisSet::new();
    Loader::new(&lp).load(entry, &mut set, true).expect("loads");
    let mut graph = crate::scope::graph::ScopeGraph::new();
    let reporter = Reporter::new();
    analyze(&mut set, &mut graph, &reporter);
    reporter.bind(()).expect("analyzes");
    let mut rs = RuntimeSet::new(set, graph);
    build_cells(&mut rs).expect("builds");
    link_cells(&mut rs).expect("links");
    rs
  }

  #[test]
  fn references_resolve_to_cells() {
    let rs = compiled(
      &[
        ("dep.loom", "export library util { x: 3; }"),
        ("main.loom", "import * as dep from \"dep.loom\";"),
      ],
      "main.loom",
    );
    let reference = Reference {
      anchor: Anchor::Local,
      parts: vec![i("dep"), i("util"), i("x")],
      span: SourceSpan::head(i("main.loom")),
    };
    let cell = resolve_cell(&rs, &i("main.loom"), &reference).expect("resolves");
    assert_eq!(rs.literal(cell), Some(&Literal::Num(3.0.try_into().expect("not nan"))));
  }

  #[test]
  fn exports_list_is_sorted() {
    let rs = compiled(
      &[("m.loom", "export library zeta { v: 1; }\nexport library alpha { v: 2; }")],
      "m.loom",
    );
    let names = exports(&rs, &i("m.loom")).into_iter().map(|(n, _)| n).collect_vec();
    assert_eq!(names, vec![i("alpha"), i("zeta")]);
  }
}
