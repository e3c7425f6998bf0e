//! Reference resolution against the scope graph

use hashbrown::HashMap;
use intern_all::Tok;

use super::graph::{ScopeGraph, ScopeId, ScopeKind, SymbolId};
use crate::error::{ProjectError, ProjectResult};
use crate::location::{Origin, SourceSpan};
use crate::parse::parsed::{Anchor, Reference};

/// Error produced when a reference does not name anything
pub struct UnresolvedReference {
  reference: String,
  failing: Tok<String>,
  container: String,
  span: SourceSpan,
}
impl UnresolvedReference {
  /// An error naming the segment that failed and where it was looked for
  pub fn new(reference: &Reference, failing: Tok<String>, container: String) -> Self {
    Self { reference: reference.to_string(), failing, container, span: reference.span.clone() }
  }
}
impl ProjectError for UnresolvedReference {
  const DESCRIPTION: &'static str = "Unresolved reference";
  fn message(&self) -> String {
    format!("`{}` is not defined in {} (resolving `{}`)", self.failing, self.container, self.reference)
  }
  fn one_position(&self) -> Origin { Origin::Source(self.span.clone()) }
}

/// Resolve a reference starting from the given scope. The module anchor
/// failing to find an enclosing module is an error here; callers that
/// probe optimistically use [try_resolve].
pub fn resolve(
  graph: &ScopeGraph,
  reference: &Reference,
  start: ScopeId,
) -> ProjectResult<SymbolId> {
  try_resolve(graph, reference, start)?.ok_or_else(|| {
    UnresolvedReference::new(reference, reference.parts[0].clone(), "any enclosing module".into())
      .pack()
  })
}

/// Resolve a reference starting from the given scope. Yields [None] when a
/// module-anchored reference has no enclosing module scope.
pub fn try_resolve(
  graph: &ScopeGraph,
  reference: &Reference,
  start: ScopeId,
) -> ProjectResult<Option<SymbolId>> {
  match reference.anchor {
    Anchor::Local => resolve_local(graph, reference, start).map(Some),
    Anchor::Global => resolve_in_scope(graph, reference, graph.global()).map(Some),
    Anchor::Module => match nearest(graph, start, ScopeKind::Module) {
      None => Ok(None),
      Some(scope) => resolve_in_scope(graph, reference, scope).map(Some),
    },
    Anchor::Library => match nearest(graph, start, ScopeKind::Library) {
      None => Err(
        UnresolvedReference::new(
          reference,
          reference.parts[0].clone(),
          "any enclosing library".into(),
        )
        .pack(),
      ),
      Some(scope) => resolve_in_scope(graph, reference, scope).map(Some),
    },
  }
}

/// Every name visible from a scope, nearer definitions shadowing farther
/// ones. The global scope does not participate, as in resolution itself.
pub fn visible_symbols(graph: &ScopeGraph, start: ScopeId) -> HashMap<Tok<String>, SymbolId> {
  let mut chain = Vec::new();
  let mut cursor = Some(start);
  while let Some(id) = cursor {
    let scope = graph.scope(id);
    if scope.kind == ScopeKind::Global {
      break;
    }
    chain.push(id);
    cursor = scope.enclosing;
  }
  let mut out = HashMap::new();
  for id in chain.into_iter().rev() {
    for (name, sym) in &graph.scope(id).table {
      out.insert(name.clone(), *sym);
    }
  }
  out
}

/// Nearest scope of the given kind, including the start itself
fn nearest(graph: &ScopeGraph, start: ScopeId, kind: ScopeKind) -> Option<ScopeId> {
  let mut cursor = Some(start);
  while let Some(id) = cursor {
    let scope = graph.scope(id);
    if scope.kind == kind {
      return Some(id);
    }
    cursor = scope.enclosing;
  }
  None
}

fn resolve_local(
  graph: &ScopeGraph,
  reference: &Reference,
  start: ScopeId,
) -> ProjectResult<SymbolId> {
  let first = &reference.parts[0];
  let mut cursor = Some(start);
  while let Some(id) = cursor {
    let scope = graph.scope(id);
    if scope.kind == ScopeKind::Global {
      break;
    }
    if let Some(&sym) = scope.table.get(first) {
      return resolve_members(graph, reference, sym, 1);
    }
    cursor = scope.enclosing;
  }
  Err(UnresolvedReference::new(reference, first.clone(), "any enclosing scope".into()).pack())
}

fn resolve_in_scope(
  graph: &ScopeGraph,
  reference: &Reference,
  scope: ScopeId,
) -> ProjectResult<SymbolId> {
  let first = &reference.parts[0];
  match graph.lookup(scope, first) {
    Some(sym) => resolve_members(graph, reference, sym, 1),
    None => {
      let container = match graph.scope(scope).owner {
        Some(owner) => graph.describe(owner),
        None => match graph.scope(scope).kind {
          ScopeKind::Global => "the global scope".to_string(),
          _ => "this scope".to_string(),
        },
      };
      Err(UnresolvedReference::new(reference, first.clone(), container).pack())
    },
  }
}

fn resolve_members(
  graph: &ScopeGraph,
  reference: &Reference,
  mut sym: SymbolId,
  from: usize,
) -> ProjectResult<SymbolId> {
  for name in &reference.parts[from..] {
    let table = (graph.member_table(sym)).ok_or_else(|| {
      UnresolvedReference::new(reference, name.clone(), graph.describe(sym)).pack()
    })?;
    sym = *(table.get(name)).ok_or_else(|| {
      UnresolvedReference::new(reference, name.clone(), graph.describe(sym)).pack()
    })?;
  }
  Ok(sym)
}
