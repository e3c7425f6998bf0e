//! Second analysis pass: connect every reference symbol to a definition.
//!
//! Imports, aliases and exports form chains that may hop through several
//! modules before landing on a var, library or module. Each symbol is
//! linked at most once; a chain that revisits a symbol it is currently
//! resolving is cyclic and rejected. Multi-segment references are walked
//! one segment at a time because an intermediate segment may itself be an
//! unlinked reference, such as an export looked up through an import.

use intern_all::Tok;
use itertools::Itertools;
use substack::Substack;

use crate::analysis::unit::{AnalysisSet, AnalysisStage};
use crate::error::{InternalConsistency, ProjectError, ProjectResult};
use crate::location::{Origin, SourceSpan};
use crate::parse::parsed::{ExprKind, Reference};
use crate::scope::graph::{ScopeGraph, ScopeId, SymbolId, SymbolKind};
use crate::scope::resolve::{UnresolvedReference, resolve};

/// Error produced when a chain of references comes back to itself
pub struct CyclicReference {
  /// The name that participates in the cycle
  pub name: String,
  /// Position of the declaration the cycle was detected at
  pub span: SourceSpan,
}
impl ProjectError for CyclicReference {
  const DESCRIPTION: &'static str = "Cyclic reference";
  fn message(&self) -> String { format!("`{}` refers to itself through a cycle", self.name) }
  fn one_position(&self) -> Origin { Origin::Source(self.span.clone()) }
}

/// Error produced when an import asks for a name its source module does
/// not export
pub struct CannotFindExport {
  /// The requested name
  pub name: Tok<String>,
  /// Canonical path of the module that was searched
  pub unit: Tok<String>,
  /// Position of the import member
  pub span: SourceSpan,
}
impl ProjectError for CannotFindExport {
  const DESCRIPTION: &'static str = "Cannot find export";
  fn message(&self) -> String { format!("module {} does not export `{}`", self.unit, self.name) }
  fn one_position(&self) -> Origin { Origin::Source(self.span.clone()) }
}

/// Link every reference symbol, then resolve the defining references of
/// vars. Symbols are visited in allocation order, which the scope builder
/// makes deterministic, so the first error is stable across runs.
pub fn link_symbols(set: &mut AnalysisSet, graph: &mut ScopeGraph) -> ProjectResult<()> {
  for id in graph.symbol_ids().collect_vec() {
    link_symbol(graph, id, Substack::Bottom)?;
  }
  for id in graph.symbol_ids().collect_vec() {
    let sym = graph.symbol(id);
    let SymbolKind::Var { value: ExprKind::Reference(source) } = &sym.kind else { continue };
    let source = source.clone();
    let target = resolve(graph, &source, sym.scope)?;
    graph.symbol_mut(id).linked = Some(target);
  }
  set.advance(AnalysisStage::Linked);
  Ok(())
}

fn link_symbol(
  graph: &mut ScopeGraph,
  id: SymbolId,
  chain: Substack<'_, SymbolId>,
) -> ProjectResult<()> {
  {
    let sym = graph.symbol(id);
    if sym.is_definition() || sym.linked.is_some() {
      return Ok(());
    }
    if chain.iter().any(|link| *link == id) {
      return Err(
        CyclicReference { name: sym.name.to_string(), span: sym.span.clone() }.pack(),
      );
    }
  }
  let chain = chain.push(id);
  let kind = graph.symbol(id).kind.clone();
  let hop = match kind {
    SymbolKind::NameImport { unit, export_name } => {
      let exports = exports_scope(graph, id, &unit)?;
      let target = (graph.lookup(exports, &export_name)).ok_or_else(|| {
        CannotFindExport {
          name: export_name.clone(),
          unit: unit.clone(),
          span: graph.symbol(id).span.clone(),
        }
        .pack()
      })?;
      link_symbol(graph, target, chain.clone())?;
      target
    },
    SymbolKind::ModuleImport { unit } => (graph.module_of_unit(&unit)).ok_or_else(|| {
      InternalConsistency {
        context: format!("imported unit {unit} has no module symbol"),
        origin: Origin::Source(graph.symbol(id).span.clone()),
      }
      .pack()
    })?,
    SymbolKind::Alias { source } | SymbolKind::Export { source } => {
      let unit = graph.symbol(id).unit.clone();
      let start = (graph.module_scope_of_unit(&unit)).ok_or_else(|| {
        InternalConsistency {
          context: format!("unit {unit} has no module scope"),
          origin: Origin::Source(graph.symbol(id).span.clone()),
        }
        .pack()
      })?;
      resolve_linking(graph, &source, start, chain.clone())?
    },
    SymbolKind::Var { .. } | SymbolKind::Module { .. } | SymbolKind::Library { .. } =>
      unreachable!("definitions returned above"),
  };
  let target = graph.symbol(hop).target;
  let sym = graph.symbol_mut(id);
  sym.linked = Some(hop);
  sym.target = target;
  Ok(())
}

fn exports_scope(
  graph: &ScopeGraph,
  id: SymbolId,
  unit: &Tok<String>,
) -> ProjectResult<ScopeId> {
  (graph.exports_of_unit(unit)).ok_or_else(|| {
    InternalConsistency {
      context: format!("imported unit {unit} has no export scope"),
      origin: Origin::Source(graph.symbol(id).span.clone()),
    }
    .pack()
  })
}

/// Resolve a reference while linking every symbol it passes through. The
/// root is resolved with the ordinary rules; each further segment is a
/// member lookup that first forces the current symbol into linked state so
/// its member table exists.
fn resolve_linking(
  graph: &mut ScopeGraph,
  reference: &Reference,
  start: ScopeId,
  chain: Substack<'_, SymbolId>,
) -> ProjectResult<SymbolId> {
  let mut cursor = resolve(graph, &reference.root(), start)?;
  link_symbol(graph, cursor, chain.clone())?;
  for name in &reference.parts[1..] {
    let next = {
      let table = (graph.member_table(cursor)).ok_or_else(|| {
        UnresolvedReference::new(reference, name.clone(), graph.describe(cursor)).pack()
      })?;
      *(table.get(name)).ok_or_else(|| {
        UnresolvedReference::new(reference, name.clone(), graph.describe(cursor)).pack()
      })?
    };
    link_symbol(graph, next, chain.clone())?;
    cursor = next;
  }
  Ok(cursor)
}

#[cfg(test)]
mod test {
  use intern_all::i;

  use super::*;
  use crate::analysis::scope_builder::build_scopes;
  use crate::error::Reporter;
  use crate::load::load_path::LoadPath;
  use crate::load::loader::Loader;
  use crate::load::location::Location;
  use crate::load::mem::MemLocation;
  use crate::scope::graph::SymbolTarget;

  fn linked(sources: &[(&str, &str)], entry: &str) -> ProjectResult<(AnalysisSet, ScopeGraph)> {
    let mut mem = MemLocation::new();
    for (path, src) in sources {
      mem = mem.add(path, src);
    }
    let lp = LoadPath::new().and(mem.arc());
    let mut set = AnalysisSet::new();
    Loader::new(&lp).load(entry, &mut set, true)?;
    let mut graph = ScopeGraph::new();
    let reporter = Reporter::new();
    build_scopes(&mut set, &mut graph, &reporter);
    reporter.bind(())?;
    link_symbols(&mut set, &mut graph)?;
    Ok((set, graph))
  }

  #[test]
  fn name_imports_link_to_the_exported_definition() {
    let (_, graph) = linked(
      &[
        ("dep.loom", "export library util { x: 1; }"),
        ("main.loom", "import util from \"dep.loom\";"),
      ],
      "main.loom",
    )
    .expect("links");
    let module_scope = graph.module_scope_of_unit(&i("main.loom")).expect("built");
    let import = graph.lookup(module_scope, &i("util")).expect("defined");
    let sym = graph.symbol(import);
    assert_eq!(sym.target, Some(SymbolTarget::Library));
    let hop = sym.linked.expect("linked");
    assert!(graph.symbol(hop).is_definition());
    assert_eq!(graph.symbol(hop).unit, i("dep.loom"));
  }

  #[test]
  fn export_chains_hop_through_modules() {
    let (_, graph) = linked(
      &[
        ("a.loom", "export library util { x: 1; }"),
        ("b.loom", "import * as a from \"a.loom\";\nexport a.util as util;"),
        ("main.loom", "import util from \"b.loom\";\nalias util.x as y;"),
      ],
      "main.loom",
    )
    .expect("links");
    let module_scope = graph.module_scope_of_unit(&i("main.loom")).expect("built");
    let alias = graph.lookup(module_scope, &i("y")).expect("defined");
    let sym = graph.symbol(alias);
    assert_eq!(sym.target, Some(SymbolTarget::Var));
    let hop = sym.linked.expect("linked");
    assert_eq!(graph.symbol(hop).unit, i("a.loom"));
    assert_eq!(graph.symbol(hop).name, i("x"));
  }

  #[test]
  fn cyclic_aliases_are_rejected() {
    let err = linked(&[("m.loom", "alias b as a;\nalias a as b;")], "m.loom").unwrap_err();
    assert_eq!(err.description(), "Cyclic reference");
  }

  #[test]
  fn missing_exports_name_the_module() {
    let err = linked(
      &[("dep.loom", "library hidden { x: 1; }"), ("main.loom", "import x from \"dep.loom\";")],
      "main.loom",
    )
    .unwrap_err();
    assert_eq!(err.message(), "module dep.loom does not export `x`");
  }

  #[test]
  fn var_references_resolve_after_linking() {
    let (_, graph) = linked(
      &[
        ("dep.loom", "export library util { x: 1; }"),
        ("main.loom", "import * as dep from \"dep.loom\";\nlibrary l { y: dep.util.x; }"),
      ],
      "main.loom",
    )
    .expect("links");
    let module_scope = graph.module_scope_of_unit(&i("main.loom")).expect("built");
    let lib = graph.lookup(module_scope, &i("l")).expect("defined");
    let lib_scope = match graph.symbol(lib).kind {
      SymbolKind::Library { scope } => scope,
      _ => panic!("library symbol expected"),
    };
    let y = graph.lookup(lib_scope, &i("y")).expect("defined");
    let target = graph.symbol(y).linked.expect("resolved");
    assert_eq!(graph.symbol(target).name, i("x"));
    assert_eq!(graph.symbol(target).unit, i("dep.loom"));
  }

  #[test]
  fn global_references_use_canonical_paths() {
    let (_, graph) = linked(
      &[
        ("dep.loom", "library util { x: 1; }"),
        ("main.loom", "import * as dep from \"dep.loom\";\nalias global::`dep.loom`.util.x as gx;"),
      ],
      "main.loom",
    )
    .expect("links");
    let module_scope = graph.module_scope_of_unit(&i("main.loom")).expect("built");
    let alias = graph.lookup(module_scope, &i("gx")).expect("defined");
    let hop = graph.symbol(alias).linked.expect("linked");
    assert_eq!(graph.symbol(hop).name, i("x"));
  }
}
