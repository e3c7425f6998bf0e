//! First analysis pass: raise the parse trees into the scope graph.
//!
//! Every unit gets a module scope, an export scope and a module symbol in
//! the global table under its canonical path. Statements become symbols in
//! those scopes. Units are processed in sorted path order so symbol ids,
//! and through them every later diagnostic, come out the same for the same
//! input regardless of how the units were loaded.

use std::sync::Arc;

use crate::analysis::unit::{AnalysisSet, AnalysisStage};
use crate::error::{ErrorPosition, ProjectError, Reporter};
use crate::location::{Origin, SourceSpan};
use crate::parse::parsed::{ExprKind, ImportMember};
use crate::scope::graph::{
  ScopeGraph, ScopeId, ScopeKind, SymbolData, SymbolId, SymbolKind, SymbolTarget,
};

/// Error produced when a name is declared twice in the same scope
pub struct AlreadyDefined {
  /// The contested name
  pub name: String,
  /// Position of the later declaration
  pub span: SourceSpan,
  /// Position of the earlier declaration
  pub previous: SourceSpan,
}
impl ProjectError for AlreadyDefined {
  const DESCRIPTION: &'static str = "Name conflict";
  fn message(&self) -> String { format!("`{}` is already defined", self.name) }
  fn positions(&self) -> impl IntoIterator<Item = ErrorPosition> {
    [
      ErrorPosition {
        origin: Origin::Source(self.span.clone()),
        message: Some("redefined here".to_string()),
      },
      ErrorPosition {
        origin: Origin::Source(self.previous.clone()),
        message: Some("first defined here".to_string()),
      },
    ]
  }
}

/// Error produced when a unit declares a native function but its location
/// does not permit them
pub struct NativeRestricted {
  /// The host-side id the var asked for
  pub id: Arc<String>,
  /// Position of the var
  pub span: SourceSpan,
  /// Display name of the offending location
  pub location: String,
}
impl ProjectError for NativeRestricted {
  const DESCRIPTION: &'static str = "Native function not allowed";
  fn message(&self) -> String {
    format!("native function `{}` cannot be declared in modules loaded from {}", self.id, self.location)
  }
  fn one_position(&self) -> Origin { Origin::Source(self.span.clone()) }
}

/// Build scopes and symbols for every unit in the set. Name conflicts and
/// policy violations are reported and the later declaration wins, so the
/// graph stays usable for tooling even over broken input.
pub fn build_scopes(set: &mut AnalysisSet, graph: &mut ScopeGraph, reporter: &Reporter) {
  for key in set.sorted_keys() {
    let unit = set.units.get(&key).expect("key from iteration");
    let module_scope = graph.add_scope(ScopeKind::Module, Some(graph.global()));
    let exports_scope = graph.add_scope(ScopeKind::Exports, Some(graph.global()));
    let module_sym = graph.add_symbol(SymbolData {
      name: key.clone(),
      unit: key.clone(),
      scope: graph.global(),
      span: unit.module.span.clone(),
      exported: true,
      kind: SymbolKind::Module { scope: module_scope, exports: exports_scope },
      target: Some(SymbolTarget::Module),
      linked: None,
    });
    graph.scope_mut(module_scope).owner = Some(module_sym);
    graph.scope_mut(exports_scope).owner = Some(module_sym);
    // canonical paths are unique, the global table cannot conflict
    graph.define(graph.global(), key.clone(), module_sym);

    for imp in &unit.module.imports {
      // recovery mode leaves broken imports unlinked; they bind nothing
      let Some(target) = imp.target.get() else { continue };
      for member in &imp.members {
        let (name, kind) = match member {
          ImportMember::Module { name, .. } =>
            (name, SymbolKind::ModuleImport { unit: target.clone() }),
          ImportMember::Name { export_name, local_name, .. } => (
            local_name,
            SymbolKind::NameImport { unit: target.clone(), export_name: export_name.clone() },
          ),
        };
        let sym = graph.add_symbol(SymbolData {
          name: name.clone(),
          unit: key.clone(),
          scope: module_scope,
          span: member.span().clone(),
          exported: false,
          kind,
          target: None,
          linked: None,
        });
        define(graph, module_scope, sym, reporter);
      }
    }

    for alias in &unit.module.aliases {
      let sym = graph.add_symbol(SymbolData {
        name: alias.name.clone(),
        unit: key.clone(),
        scope: module_scope,
        span: alias.span.clone(),
        exported: false,
        kind: SymbolKind::Alias { source: alias.source.clone() },
        target: None,
        linked: None,
      });
      define(graph, module_scope, sym, reporter);
    }

    for lib in &unit.module.libraries {
      let lib_scope = graph.add_scope(ScopeKind::Library, Some(module_scope));
      let lib_sym = graph.add_symbol(SymbolData {
        name: lib.name.clone(),
        unit: key.clone(),
        scope: module_scope,
        span: lib.span.clone(),
        exported: lib.exported,
        kind: SymbolKind::Library { scope: lib_scope },
        target: Some(SymbolTarget::Library),
        linked: None,
      });
      graph.scope_mut(lib_scope).owner = Some(lib_sym);
      define(graph, module_scope, lib_sym, reporter);
      if lib.exported {
        // an inline export is the same symbol under the same name
        define(graph, exports_scope, lib_sym, reporter);
      }
      for var in &lib.vars {
        if let ExprKind::Native(id) = &var.value.kind {
          if !unit.location.allows_native_functions() {
            reporter.report(
              NativeRestricted {
                id: id.clone(),
                span: var.span.clone(),
                location: unit.location.display_name(),
              }
              .pack(),
            );
          }
        }
        let var_sym = graph.add_symbol(SymbolData {
          name: var.name.clone(),
          unit: key.clone(),
          scope: lib_scope,
          span: var.span.clone(),
          exported: false,
          kind: SymbolKind::Var { value: var.value.kind.clone() },
          target: Some(SymbolTarget::Var),
          linked: None,
        });
        define(graph, lib_scope, var_sym, reporter);
      }
    }

    for export in &unit.module.exports {
      let sym = graph.add_symbol(SymbolData {
        name: export.name.clone(),
        unit: key.clone(),
        scope: exports_scope,
        span: export.span.clone(),
        exported: true,
        kind: SymbolKind::Export { source: export.source.clone() },
        target: None,
        linked: None,
      });
      define(graph, exports_scope, sym, reporter);
    }

    let unit = set.units.get_mut(&key).expect("key from iteration");
    unit.symbol = Some(module_sym);
  }
  set.advance(AnalysisStage::ScopeBuilt);
}

/// Enter a symbol into a scope, reporting a conflict if the name was taken
fn define(graph: &mut ScopeGraph, scope: ScopeId, sym: SymbolId, reporter: &Reporter) {
  let name = graph.symbol(sym).name.clone();
  if let Some(previous) = graph.define(scope, name.clone(), sym) {
    reporter.report(
      AlreadyDefined {
        name: name.to_string(),
        span: graph.symbol(sym).span.clone(),
        previous: graph.symbol(previous).span.clone(),
      }
      .pack(),
    );
  }
}

#[cfg(test)]
mod test {
  use intern_all::i;

  use super::*;
  use crate::load::load_path::LoadPath;
  use crate::load::loader::Loader;
  use crate::load::location::Location;
  use crate::load::mem::MemLocation;
  use crate::scope::graph::ScopeGraph;

  fn built(sources: &[(&str, &str)], entry: &str) -> (AnalysisSet, ScopeGraph, Reporter) {
    let mut mem = MemLocation::new();
    for (path, src) in sources {
      mem = mem.add(path, src);
    }
    let lp = LoadPath::new().and(mem.arc());
    let mut set = AnalysisSet::new();
    Loader::new(&lp).load(entry, &mut set, true).expect("loads");
    let mut graph = ScopeGraph::new();
    let reporter = Reporter::new();
    build_scopes(&mut set, &mut graph, &reporter);
    (set, graph, reporter)
  }

  #[test]
  fn units_register_under_their_canonical_path() {
    let (set, graph, reporter) =
      built(&[("m.loom", "library util { x: 1; }")], "m.loom");
    assert!(!reporter.failing());
    let unit = set.units.get(&i("m.loom")).expect("loaded");
    assert_eq!(unit.stage, AnalysisStage::ScopeBuilt);
    assert_eq!(graph.module_of_unit(&i("m.loom")), unit.symbol);
    let module_scope = graph.module_scope_of_unit(&i("m.loom")).expect("built");
    let lib = graph.lookup(module_scope, &i("util")).expect("defined");
    let lib_scope = match graph.symbol(lib).kind {
      SymbolKind::Library { scope } => scope,
      _ => panic!("library symbol expected"),
    };
    assert!(graph.lookup(lib_scope, &i("x")).is_some());
  }

  #[test]
  fn inline_exports_share_the_symbol() {
    let (_, graph, reporter) =
      built(&[("m.loom", "export library util { x: 1; }")], "m.loom");
    assert!(!reporter.failing());
    let module_scope = graph.module_scope_of_unit(&i("m.loom")).expect("built");
    let exports = graph.exports_of_unit(&i("m.loom")).expect("built");
    let in_body = graph.lookup(module_scope, &i("util")).expect("defined");
    assert_eq!(graph.lookup(exports, &i("util")), Some(in_body));
    assert!(graph.symbol(in_body).exported);
  }

  #[test]
  fn duplicate_names_are_reported_and_the_later_wins() {
    let (_, graph, reporter) = built(
      &[("m.loom", "library a { x: 1; }\nlibrary a { x: 2; }")],
      "m.loom",
    );
    let errors = reporter.into_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message(), "`a` is already defined");
    assert_eq!(errors[0].positions().len(), 2);
    let module_scope = graph.module_scope_of_unit(&i("m.loom")).expect("built");
    assert!(graph.lookup(module_scope, &i("a")).is_some());
  }

  #[test]
  fn natives_are_rejected_where_the_location_forbids_them() {
    let mem = MemLocation::new()
      .add("m.loom", "library sys { now: native \"time.now\"; }")
      .allow_native(false);
    let lp = LoadPath::new().and(mem.arc());
    let mut set = AnalysisSet::new();
    Loader::new(&lp).load("m.loom", &mut set, true).expect("loads");
    let mut graph = ScopeGraph::new();
    let reporter = Reporter::new();
    build_scopes(&mut set, &mut graph, &reporter);
    let err = reporter.bind(()).unwrap_err();
    assert_eq!(err.description(), "Native function not allowed");
    assert!(err.message().contains("time.now"));
  }
}
