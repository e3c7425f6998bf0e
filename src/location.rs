//! Source positions attached to parse tree nodes and errors

use std::fmt;

use intern_all::Tok;

/// A point in a source unit, identified by the unit's canonical path and a
/// 1-based line/column pair
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SourceSpan {
  /// Canonical path of the unit this span points into
  pub unit: Tok<String>,
  /// 1-based line
  pub line: u32,
  /// 1-based column
  pub col: u32,
}
impl SourceSpan {
  /// Span pointing at the start of a unit
  pub fn head(unit: Tok<String>) -> Self { Self { unit, line: 1, col: 1 } }
}
impl fmt::Display for SourceSpan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.unit, self.line, self.col)
  }
}
impl fmt::Debug for SourceSpan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{self}") }
}

/// The place an error points at. Not every error occurs at a position in
/// a source file; some only concern a unit as a whole, some arise before
/// any source is found.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Origin {
  /// A concrete source position
  Source(SourceSpan),
  /// A unit as a whole, eg. a file that could not be read
  Unit(Tok<String>),
  /// No meaningful position, eg. a missing entry point
  Unknown,
}
impl Origin {
  /// Span accessor for callers that only care about in-source origins
  pub fn span(&self) -> Option<&SourceSpan> {
    match self {
      Self::Source(sp) => Some(sp),
      _ => None,
    }
  }
}
impl fmt::Display for Origin {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Source(sp) => write!(f, "{sp}"),
      Self::Unit(path) => write!(f, "{path}"),
      Self::Unknown => write!(f, "<unknown>"),
    }
  }
}
impl fmt::Debug for Origin {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{self}") }
}
impl From<SourceSpan> for Origin {
  fn from(value: SourceSpan) -> Self { Self::Source(value) }
}
impl From<&SourceSpan> for Origin {
  fn from(value: &SourceSpan) -> Self { Self::Source(value.clone()) }
}
