//! Arena-backed scope and symbol graph.
//!
//! Scopes and symbols reference each other freely (a module symbol owns
//! scopes, scopes hold symbols, imports point into other modules), so both
//! live in arenas inside [ScopeGraph] and everything holds plain ids. An
//! id is only meaningful together with the graph that issued it.

use std::fmt;

use hashbrown::HashMap;
use intern_all::Tok;

use crate::location::SourceSpan;
use crate::parse::parsed::{ExprKind, Reference};

/// Handle to a [ScopeData] in a [ScopeGraph]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

/// Handle to a [SymbolData] in a [ScopeGraph]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

/// What kind of region a scope covers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
  /// The single root scope, holds a module symbol per canonical path
  Global,
  /// The body of one module
  Module,
  /// The exported names of one module
  Exports,
  /// The body of one library
  Library,
}

/// One scope: a name table plus its place in the hierarchy
pub struct ScopeData {
  /// What region this scope covers
  pub kind: ScopeKind,
  /// The scope lexically around this one, [None] only for the global scope
  pub enclosing: Option<ScopeId>,
  /// The symbol this scope is the body of, if any
  pub owner: Option<SymbolId>,
  /// Names defined directly in this scope
  pub table: HashMap<Tok<String>, SymbolId>,
}

/// What a fully linked symbol ultimately names
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolTarget {
  /// A var
  Var,
  /// A module
  Module,
  /// A library
  Library,
}

/// What a symbol is. Definitions (var, module, library) carry their
/// structure; references (imports, aliases, exports) carry what they were
/// written against and are connected to a definition by the linker.
#[derive(Clone, Debug)]
pub enum SymbolKind {
  /// A named value in a library
  Var {
    /// The defining expression
    value: ExprKind,
  },
  /// A loaded module
  Module {
    /// The module body
    scope: ScopeId,
    /// The module's exported names
    exports: ScopeId,
  },
  /// A library declaration
  Library {
    /// The library body
    scope: ScopeId,
  },
  /// `import name from "path"`
  NameImport {
    /// Canonical path of the exporting unit
    unit: Tok<String>,
    /// The name as exported there
    export_name: Tok<String>,
  },
  /// `import * as name from "path"`
  ModuleImport {
    /// Canonical path of the imported unit
    unit: Tok<String>,
  },
  /// `alias ref as name`
  Alias {
    /// What the alias points at
    source: Reference,
  },
  /// `export ref as name`
  Export {
    /// What is being exported
    source: Reference,
  },
}

/// One named entity
pub struct SymbolData {
  /// The name this symbol is known by in its owning scope
  pub name: Tok<String>,
  /// Canonical path of the unit that declared it
  pub unit: Tok<String>,
  /// The scope the symbol is defined in
  pub scope: ScopeId,
  /// Position of the declaration
  pub span: SourceSpan,
  /// Whether the symbol appears in its module's export scope
  pub exported: bool,
  /// What the symbol is
  pub kind: SymbolKind,
  /// What it ultimately names. Set at creation for definitions, by the
  /// linker for references.
  pub target: Option<SymbolTarget>,
  /// The definition (or closer reference) this reference was linked to
  pub linked: Option<SymbolId>,
}
impl SymbolData {
  /// Whether this is a definition rather than a reference
  pub fn is_definition(&self) -> bool {
    matches!(self.kind, SymbolKind::Var { .. } | SymbolKind::Module { .. } | SymbolKind::Library { .. })
  }
}

/// The arena holding every scope and symbol of a loaded module set
pub struct ScopeGraph {
  scopes: Vec<ScopeData>,
  symbols: Vec<SymbolData>,
  global: ScopeId,
}
impl ScopeGraph {
  /// A graph holding only the empty global scope
  pub fn new() -> Self {
    let global = ScopeData {
      kind: ScopeKind::Global,
      enclosing: None,
      owner: None,
      table: HashMap::new(),
    };
    Self { scopes: vec![global], symbols: Vec::new(), global: ScopeId(0) }
  }

  /// The root scope
  pub fn global(&self) -> ScopeId { self.global }

  /// Allocate a scope
  pub fn add_scope(&mut self, kind: ScopeKind, enclosing: Option<ScopeId>) -> ScopeId {
    let id = ScopeId(u32::try_from(self.scopes.len()).expect("scope arena outgrew u32"));
    self.scopes.push(ScopeData { kind, enclosing, owner: None, table: HashMap::new() });
    id
  }

  /// Allocate a symbol. The symbol is not defined in any table yet.
  pub fn add_symbol(&mut self, data: SymbolData) -> SymbolId {
    let id = SymbolId(u32::try_from(self.symbols.len()).expect("symbol arena outgrew u32"));
    self.symbols.push(data);
    id
  }

  /// Enter a symbol into a scope's table. Returns the previously defined
  /// symbol if the name was taken.
  pub fn define(&mut self, scope: ScopeId, name: Tok<String>, symbol: SymbolId) -> Option<SymbolId> {
    self.scopes[scope.0 as usize].table.insert(name, symbol)
  }

  /// Scope accessor
  pub fn scope(&self, id: ScopeId) -> &ScopeData { &self.scopes[id.0 as usize] }
  /// Mutable scope accessor
  pub fn scope_mut(&mut self, id: ScopeId) -> &mut ScopeData { &mut self.scopes[id.0 as usize] }
  /// Symbol accessor
  pub fn symbol(&self, id: SymbolId) -> &SymbolData { &self.symbols[id.0 as usize] }
  /// Mutable symbol accessor
  pub fn symbol_mut(&mut self, id: SymbolId) -> &mut SymbolData { &mut self.symbols[id.0 as usize] }
  /// Ids of all symbols in allocation order
  pub fn symbol_ids(&self) -> impl Iterator<Item = SymbolId> + '_ {
    (0..self.symbols.len()).map(|idx| SymbolId(idx as u32))
  }

  /// Look up a name directly in one scope
  pub fn lookup(&self, scope: ScopeId, name: &Tok<String>) -> Option<SymbolId> {
    self.scope(scope).table.get(name).copied()
  }

  /// The module symbol registered under a canonical unit path
  pub fn module_of_unit(&self, unit: &Tok<String>) -> Option<SymbolId> {
    self.lookup(self.global, unit)
  }

  /// The body scope of a unit's module symbol
  pub fn module_scope_of_unit(&self, unit: &Tok<String>) -> Option<ScopeId> {
    match &self.symbol(self.module_of_unit(unit)?).kind {
      SymbolKind::Module { scope, .. } => Some(*scope),
      _ => None,
    }
  }

  /// The export scope of a unit's module symbol
  pub fn exports_of_unit(&self, unit: &Tok<String>) -> Option<ScopeId> {
    match &self.symbol(self.module_of_unit(unit)?).kind {
      SymbolKind::Module { exports, .. } => Some(*exports),
      _ => None,
    }
  }

  /// The table used to resolve `symbol.member`. For definitions this is
  /// their own body; for linked references it is the public face of
  /// whatever they point at; for vars and unlinked references there is
  /// none.
  pub fn member_table(&self, id: SymbolId) -> Option<&HashMap<Tok<String>, SymbolId>> {
    let sym = self.symbol(id);
    match &sym.kind {
      SymbolKind::Var { .. } => None,
      SymbolKind::Module { scope, .. } => Some(&self.scope(*scope).table),
      SymbolKind::Library { scope } => Some(&self.scope(*scope).table),
      _ => sym.linked.and_then(|linked| self.public_table(linked)),
    }
  }

  /// The table visible to outsiders reaching a symbol through a reference.
  /// Modules expose their exports, libraries their body.
  pub fn public_table(&self, id: SymbolId) -> Option<&HashMap<Tok<String>, SymbolId>> {
    let sym = self.symbol(id);
    match &sym.kind {
      SymbolKind::Var { .. } => None,
      SymbolKind::Module { exports, .. } => Some(&self.scope(*exports).table),
      SymbolKind::Library { scope } => Some(&self.scope(*scope).table),
      _ => sym.linked.and_then(|linked| self.public_table(linked)),
    }
  }

  /// Human-readable identification of a symbol for error messages
  pub fn describe(&self, id: SymbolId) -> String {
    let sym = self.symbol(id);
    match sym.target {
      Some(SymbolTarget::Module) => format!("module `{}`", sym.unit),
      Some(SymbolTarget::Library) => format!("library `{}`", sym.name),
      Some(SymbolTarget::Var) => format!("var `{}`", sym.name),
      None => format!("`{}`", sym.name),
    }
  }
}
impl Default for ScopeGraph {
  fn default() -> Self { Self::new() }
}
impl fmt::Debug for ScopeGraph {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    (f.debug_struct("ScopeGraph"))
      .field("scopes", &self.scopes.len())
      .field("symbols", &self.symbols.len())
      .finish()
  }
}

#[cfg(test)]
mod test {
  use intern_all::i;

  use super::*;
  use crate::location::SourceSpan;
  use crate::parse::parsed::Literal;

  fn var(graph: &mut ScopeGraph, scope: ScopeId, name: &str) -> SymbolId {
    let sym = graph.add_symbol(SymbolData {
      name: i(name),
      unit: i("test.loom"),
      scope,
      span: SourceSpan::head(i("test.loom")),
      exported: false,
      kind: SymbolKind::Var { value: ExprKind::Literal(Literal::Nil) },
      target: Some(SymbolTarget::Var),
      linked: None,
    });
    graph.define(scope, i(name), sym);
    sym
  }

  #[test]
  fn definitions_shadow_and_report_previous() {
    let mut graph = ScopeGraph::new();
    let scope = graph.add_scope(ScopeKind::Library, Some(graph.global()));
    let first = var(&mut graph, scope, "x");
    assert_eq!(graph.lookup(scope, &i("x")), Some(first));
    let second = var(&mut graph, scope, "x");
    assert_eq!(graph.lookup(scope, &i("x")), Some(second));
  }

  #[test]
  fn member_tables_follow_links() {
    let mut graph = ScopeGraph::new();
    let body = graph.add_scope(ScopeKind::Library, Some(graph.global()));
    let inner = var(&mut graph, body, "inner");
    let lib = graph.add_symbol(SymbolData {
      name: i("lib"),
      unit: i("test.loom"),
      scope: graph.global(),
      span: SourceSpan::head(i("test.loom")),
      exported: true,
      kind: SymbolKind::Library { scope: body },
      target: Some(SymbolTarget::Library),
      linked: None,
    });
    let alias = graph.add_symbol(SymbolData {
      name: i("l"),
      unit: i("test.loom"),
      scope: graph.global(),
      span: SourceSpan::head(i("test.loom")),
      exported: false,
      kind: SymbolKind::Alias {
        source: crate::parse::parsed::Reference {
          anchor: crate::parse::parsed::Anchor::Local,
          parts: vec![i("lib")],
          span: SourceSpan::head(i("test.loom")),
        },
      },
      target: None,
      linked: None,
    });
    assert!(graph.member_table(alias).is_none(), "unlinked references expose nothing");
    graph.symbol_mut(alias).linked = Some(lib);
    let table = graph.member_table(alias).expect("linked alias exposes the library body");
    assert_eq!(table.get(&i("inner")), Some(&inner));
  }
}
