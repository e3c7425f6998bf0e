//! The contract between the loaders and the places source code comes from

use std::sync::Arc;

use intern_all::{Tok, i};

use crate::error::{ProjectResult, ResultSansOrigin};
use crate::location::Origin;

/// The source text of one unit, together with the identity it will be
/// known by for the rest of the pipeline
#[derive(Clone)]
pub struct ParseUnit {
  /// Canonical path, the work set key
  pub path: Tok<String>,
  /// Complete source text
  pub source: Arc<String>,
  /// The location that served this unit
  pub location: LocationObj,
  /// Whether this unit stands in for a module that could not be found
  pub recovered: bool,
}

/// A place the loaders can fetch source code from. Implementations must be
/// safe to share across the concurrent loader's tasks.
pub trait Location: Send + Sync + 'static {
  /// Canonical form of a path served by this location. Appends the default
  /// extension when missing and collapses relative segments. Idempotent.
  fn resolve(&self, path: &str) -> String;
  /// Whether a unit exists at this path and is accessible
  fn path_exists(&self, path: &str) -> bool;
  /// The source text at an already canonical path
  fn source(&self, canonical: &str) -> ResultSansOrigin<Arc<String>>;
  /// Whether units served here may declare native functions
  fn allows_native_functions(&self) -> bool { true }
  /// Whether parse results for units served here may be reused across
  /// compile runs
  fn allows_caching(&self) -> bool { true }
  /// Short name for diagnostics
  fn display_name(&self) -> String;
  /// Wrap the location in the shared handle the load path works with
  fn arc(self) -> LocationObj
  where Self: Sized {
    Arc::new(self)
  }
}

/// Shared location handle
pub type LocationObj = Arc<dyn Location>;

/// Fetch and identify the unit at `path` within `location`
pub fn parse_unit_at(location: &LocationObj, path: &str) -> ProjectResult<ParseUnit> {
  let key = i(&location.resolve(path));
  let source =
    (location.source(key.as_str())).map_err(|e| e.bundle(&Origin::Unit(key.clone())))?;
  Ok(ParseUnit { path: key, source, location: location.clone(), recovered: false })
}

/// An empty stand-in for a unit that could not be found, used by the
/// loaders in recovery mode
pub fn recovery_unit(location: &LocationObj, path: &str) -> ParseUnit {
  let key = i(&location.resolve(path));
  ParseUnit {
    path: key,
    source: Arc::new(String::new()),
    location: location.clone(),
    recovered: true,
  }
}
