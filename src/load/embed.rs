//! Location serving modules embedded in the host binary

use std::sync::Arc;

use hashbrown::HashMap;
use rust_embed::RustEmbed;

use super::location::{Location, LocationObj};
use super::mem::NoSuchUnit;
use super::{DEFAULT_SUFFIX, normalize_path};
use crate::error::{ErrorSansOrigin, ResultSansOrigin};

/// A location serving the files of a [RustEmbed] asset bundle under a path
/// prefix. Always confined; only the bundled paths exist.
pub struct EmbedLocation {
  prefix: String,
  suffix: &'static str,
  units: HashMap<String, Arc<String>>,
  native: bool,
}
impl EmbedLocation {
  /// Index the bundle. Non-utf8 and differently-suffixed assets are
  /// skipped.
  pub fn new<T: RustEmbed>(prefix: &str, suffix: &'static str) -> Self {
    let mut units = HashMap::new();
    for path in T::iter() {
      if !path.ends_with(suffix) {
        continue;
      }
      let file = T::get(&path).expect("path obtained from iterator");
      if let Ok(text) = std::str::from_utf8(&file.data) {
        units.insert(format!("{prefix}/{path}"), Arc::new(text.to_string()));
      }
    }
    Self { prefix: prefix.to_string(), suffix, units, native: true }
  }
  /// Control whether units served here may declare native functions
  pub fn allow_native(mut self, allow: bool) -> Self {
    self.native = allow;
    self
  }
}
impl Location for EmbedLocation {
  fn resolve(&self, path: &str) -> String {
    let normal = normalize_path(path);
    match normal.ends_with(self.suffix) {
      true => normal,
      false => format!("{normal}{}", self.suffix),
    }
  }
  fn path_exists(&self, path: &str) -> bool { self.units.contains_key(&self.resolve(path)) }
  fn source(&self, canonical: &str) -> ResultSansOrigin<Arc<String>> {
    (self.units.get(canonical).cloned())
      .ok_or_else(|| NoSuchUnit { path: canonical.to_string() }.pack())
  }
  fn allows_native_functions(&self) -> bool { self.native }
  fn display_name(&self) -> String { format!("embedded {}", self.prefix) }
}

/// The standard modules shipped with the language
#[derive(RustEmbed)]
#[folder = "std/"]
#[include = "*.loom"]
struct StdEmbed;

/// Location serving the embedded standard modules under `std/`
pub fn std_location() -> LocationObj { EmbedLocation::new::<StdEmbed>("std", DEFAULT_SUFFIX).arc() }
