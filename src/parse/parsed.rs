//! Parse tree produced by the parser and consumed by the analysis phases.
//!
//! The tree is immutable after parsing except for the import link slots,
//! which the loaders fill in exactly once with the canonical path of the
//! imported unit. [ModuleNode::copy] produces a tree with fresh slots so
//! cached parse results can be shared between compile runs.

use std::fmt;
use std::sync::Arc;

use intern_all::Tok;
use itertools::Itertools;
use once_cell::sync::OnceCell;
use ordered_float::NotNan;

use crate::location::SourceSpan;

/// A self-contained value
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
  /// The absent value
  Nil,
  /// A boolean
  Bool(bool),
  /// A number. NaN is not expressible in source.
  Num(NotNan<f64>),
  /// A string
  Str(Arc<String>),
}
impl fmt::Display for Literal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Nil => write!(f, "nil"),
      Self::Bool(b) => write!(f, "{b}"),
      Self::Num(n) => write!(f, "{n}"),
      Self::Str(s) => write!(f, "{s:?}"),
    }
  }
}

/// Where a reference starts resolving from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
  /// Nearest enclosing scope that knows the first name
  Local,
  /// The global scope, first name is a canonical module path
  Global,
  /// Nearest enclosing module scope
  Module,
  /// Nearest enclosing library scope
  Library,
}

/// A dotted name with an anchor, eg. `strings.concat` or `module::util`
#[derive(Clone, Debug)]
pub struct Reference {
  /// Resolution anchor. Written anchors are explicit, `Local` is implied.
  pub anchor: Anchor,
  /// Name segments, at least one
  pub parts: Vec<Tok<String>>,
  /// Position of the first segment
  pub span: SourceSpan,
}
impl Reference {
  /// The same reference cut down to its first segment. Linkers resolve this
  /// first to force dependencies into linked state.
  pub fn root(&self) -> Reference {
    Reference { anchor: self.anchor, parts: vec![self.parts[0].clone()], span: self.span.clone() }
  }
}
impl fmt::Display for Reference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.anchor {
      Anchor::Local => (),
      Anchor::Global => write!(f, "global::")?,
      Anchor::Module => write!(f, "module::")?,
      Anchor::Library => write!(f, "library::")?,
    }
    write!(f, "{}", self.parts.iter().join("."))
  }
}

/// An expression; the right-hand side of a var
#[derive(Clone, Debug)]
pub enum ExprKind {
  /// A literal value
  Literal(Literal),
  /// A reference to another definition
  Reference(Reference),
  /// A host-provided function, identified by a host-side id
  Native(Arc<String>),
}

/// An expression with its position
#[derive(Clone, Debug)]
pub struct ExprNode {
  /// What the expression is
  pub kind: ExprKind,
  /// Where it starts
  pub span: SourceSpan,
}

/// One name pulled in by an import statement
#[derive(Clone, Debug)]
pub enum ImportMember {
  /// `import * as name from …`, binds the module itself
  Module {
    /// Local name of the module
    name: Tok<String>,
    /// Position of the binding
    span: SourceSpan,
  },
  /// `import a [as b] from …`, binds one exported name
  Name {
    /// Name as exported by the source module
    export_name: Tok<String>,
    /// Name bound locally, defaults to the export name
    local_name: Tok<String>,
    /// Position of the binding
    span: SourceSpan,
  },
}
impl ImportMember {
  /// The name the member binds in the importing module
  pub fn local_name(&self) -> &Tok<String> {
    match self {
      Self::Module { name, .. } => name,
      Self::Name { local_name, .. } => local_name,
    }
  }
  /// Position of the binding
  pub fn span(&self) -> &SourceSpan {
    match self {
      Self::Module { span, .. } | Self::Name { span, .. } => span,
    }
  }
}

/// An import statement
#[derive(Clone, Debug)]
pub struct ImportNode {
  /// Position of the statement
  pub span: SourceSpan,
  /// The import path expression. Must be a string literal; the loaders
  /// reject anything else.
  pub path: ExprNode,
  /// Names bound by this statement
  pub members: Vec<ImportMember>,
  /// Canonical path of the imported unit, set once by a loader
  pub target: OnceCell<Tok<String>>,
}

/// An alias statement, `alias ref as name`
#[derive(Clone, Debug)]
pub struct AliasNode {
  /// Position of the statement
  pub span: SourceSpan,
  /// What the alias points at
  pub source: Reference,
  /// The local name it binds
  pub name: Tok<String>,
}

/// An export statement, `export ref [as name]`
#[derive(Clone, Debug)]
pub struct ExportNode {
  /// Position of the statement
  pub span: SourceSpan,
  /// What is being exported
  pub source: Reference,
  /// The exported name, defaults to the last segment of the source
  pub name: Tok<String>,
}

/// A named value inside a library
#[derive(Clone, Debug)]
pub struct VarNode {
  /// Position of the definition
  pub span: SourceSpan,
  /// Name of the var
  pub name: Tok<String>,
  /// Defining expression
  pub value: ExprNode,
}

/// A library declaration
#[derive(Clone, Debug)]
pub struct LibraryNode {
  /// Position of the declaration
  pub span: SourceSpan,
  /// Whether the library is exported inline
  pub exported: bool,
  /// Name of the library
  pub name: Tok<String>,
  /// Definitions in declaration order
  pub vars: Vec<VarNode>,
}

/// A parsed source unit
#[derive(Clone, Debug)]
pub struct ModuleNode {
  /// Position of the first token, or the unit head if the unit is empty
  pub span: SourceSpan,
  /// Import statements
  pub imports: Vec<ImportNode>,
  /// Alias statements
  pub aliases: Vec<AliasNode>,
  /// Export statements
  pub exports: Vec<ExportNode>,
  /// Library declarations
  pub libraries: Vec<LibraryNode>,
}
impl ModuleNode {
  /// An empty module, also the shape of a recovery unit
  pub fn empty(span: SourceSpan) -> Self {
    Self {
      span,
      imports: Vec::new(),
      aliases: Vec::new(),
      exports: Vec::new(),
      libraries: Vec::new(),
    }
  }

  /// Deep copy with unset import link slots. Trees handed out by the parse
  /// cache are copied like this so each compile run links its own tree.
  pub fn copy(&self) -> Self {
    let mut new = self.clone();
    for import in &mut new.imports {
      import.target = OnceCell::new();
    }
    new
  }
}

#[cfg(test)]
mod test {
  use intern_all::i;

  use super::*;
  use crate::location::SourceSpan;

  fn span() -> SourceSpan { SourceSpan::head(i("test.loom")) }

  #[test]
  fn copy_resets_link_slots() {
    let import = ImportNode {
      span: span(),
      path: ExprNode {
        kind: ExprKind::Literal(Literal::Str(Arc::new("dep".to_string()))),
        span: span(),
      },
      members: vec![ImportMember::Module { name: i("dep"), span: span() }],
      target: OnceCell::new(),
    };
    import.target.set(i("dep.loom")).expect("fresh cell");
    let module = ModuleNode { imports: vec![import], ..ModuleNode::empty(span()) };
    let copy = module.copy();
    assert_eq!(module.imports[0].target.get(), Some(&i("dep.loom")));
    assert_eq!(copy.imports[0].target.get(), None);
  }

  #[test]
  fn reference_display() {
    let r = Reference { anchor: Anchor::Module, parts: vec![i("a"), i("b")], span: span() };
    assert_eq!(r.to_string(), "module::a.b");
    assert_eq!(r.root().to_string(), "module::a");
  }
}
