//! Location holding units in memory, used by embedders and tests

use std::sync::Arc;

use hashbrown::HashMap;

use super::location::Location;
use crate::error::{ErrorSansOrigin, ResultSansOrigin};

/// Error produced when a unit is requested that was never added
#[derive(Clone)]
pub struct NoSuchUnit {
  /// The requested path
  pub path: String,
}
impl ErrorSansOrigin for NoSuchUnit {
  const DESCRIPTION: &'static str = "No unit at this path";
  fn message(&self) -> String { format!("nothing is stored at {}", self.path) }
}

/// A location backed by a map of path to source text. Paths are used
/// verbatim, there is no extension handling.
pub struct MemLocation {
  units: HashMap<String, Arc<String>>,
  native: bool,
  caching: bool,
}
impl MemLocation {
  /// An empty in-memory location
  pub fn new() -> Self { Self { units: HashMap::new(), native: true, caching: false } }
  /// Add a unit
  pub fn add(mut self, path: &str, source: &str) -> Self {
    self.units.insert(path.to_string(), Arc::new(source.to_string()));
    self
  }
  /// Control whether units served here may declare native functions
  pub fn allow_native(mut self, allow: bool) -> Self {
    self.native = allow;
    self
  }
  /// Control whether parse results may be reused across compile runs.
  /// Off by default; in-memory paths are too easy to reuse for different
  /// content.
  pub fn allow_caching(mut self, allow: bool) -> Self {
    self.caching = allow;
    self
  }
}
impl Default for MemLocation {
  fn default() -> Self { Self::new() }
}
impl Location for MemLocation {
  fn resolve(&self, path: &str) -> String { path.to_string() }
  fn path_exists(&self, path: &str) -> bool { self.units.contains_key(path) }
  fn source(&self, canonical: &str) -> ResultSansOrigin<Arc<String>> {
    (self.units.get(canonical).cloned())
      .ok_or_else(|| NoSuchUnit { path: canonical.to_string() }.pack())
  }
  fn allows_native_functions(&self) -> bool { self.native }
  fn allows_caching(&self) -> bool { self.caching }
  fn display_name(&self) -> String { format!("memory ({} units)", self.units.len()) }
}
