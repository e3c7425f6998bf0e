//! The ordered list of locations modules are discovered in

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hashbrown::HashMap;
use intern_all::Tok;

use super::embed::std_location;
use super::location::LocationObj;
use crate::error::ErrorSansOrigin;
use crate::parse::parsed::ModuleNode;

/// Error produced when no location on the load path serves a module
#[derive(Clone)]
pub struct ModuleNotFound {
  /// The path as resolved, not necessarily as written in the import
  pub path: String,
}
impl ErrorSansOrigin for ModuleNotFound {
  const DESCRIPTION: &'static str = "Module not found";
  fn message(&self) -> String { format!("module {} cannot be found", self.path) }
}

/// The outcome of resolving a module path against the load path: the
/// canonical path, the location that owns it, and whether it is actually
/// there. Missing modules still resolve so recovery mode and error messages
/// can name the path that was looked for.
pub struct Resolved {
  /// Canonical path within the location
  pub path: String,
  /// The location the unit lives in (or would live in)
  pub location: LocationObj,
  /// Whether the unit exists
  pub exists: bool,
}
impl Resolved {
  /// The not-found error naming this resolved path
  pub fn not_found(&self) -> ModuleNotFound { ModuleNotFound { path: self.path.clone() } }
}

/// A parse result shared between compile runs
struct CacheEntry {
  module: Arc<ModuleNode>,
  duration: Duration,
}

/// Concurrent map of canonical path to parse result. Entries are handed
/// out as deep copies with fresh link slots; the cached tree itself is
/// never linked. First writer wins, later identical parses are dropped.
pub struct ParseCache {
  entries: Mutex<HashMap<Tok<String>, CacheEntry>>,
}
impl ParseCache {
  /// An empty cache, shared from the start
  pub fn new() -> Arc<Self> { Arc::new(Self { entries: Mutex::new(HashMap::new()) }) }
  /// A fresh copy of the cached tree, if any
  pub fn get(&self, key: &Tok<String>) -> Option<(ModuleNode, Duration)> {
    let entries = self.entries.lock().expect("poisoned lock");
    entries.get(key).map(|e| (e.module.copy(), e.duration))
  }
  /// Store a parse result unless one is already present. The module must be
  /// pristine; callers pass a copy that never had its link slots set.
  pub fn put(&self, key: Tok<String>, module: ModuleNode, duration: Duration) {
    let mut entries = self.entries.lock().expect("poisoned lock");
    entries.entry(key).or_insert(CacheEntry { module: Arc::new(module), duration });
  }
  /// Number of cached units
  pub fn len(&self) -> usize { self.entries.lock().expect("poisoned lock").len() }
  /// Whether anything is cached
  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// An ordered list of locations. Paths resolve to the first location that
/// has them; order expresses priority.
pub struct LoadPath {
  locations: Vec<LocationObj>,
  cache: Option<Arc<ParseCache>>,
}
impl LoadPath {
  /// An empty load path. Useless until at least one location is added.
  pub fn new() -> Self { Self { locations: Vec::new(), cache: None } }
  /// Append a location with lower priority than everything before it
  pub fn and(mut self, location: LocationObj) -> Self {
    self.locations.push(location);
    self
  }
  /// Append the embedded standard modules
  pub fn and_std(self) -> Self { self.and(std_location()) }
  /// Share parse results through the given cache. Only units from locations
  /// with `allows_caching` participate.
  pub fn with_cache(mut self, cache: Arc<ParseCache>) -> Self {
    self.cache = Some(cache);
    self
  }
  /// The shared parse cache, if one was attached
  pub fn cache(&self) -> Option<&Arc<ParseCache>> { self.cache.as_ref() }
  /// The locations in priority order
  pub fn locations(&self) -> &[LocationObj] { &self.locations }

  /// First location that has the path
  pub fn location_for(&self, path: &str) -> Option<&LocationObj> {
    self.locations.iter().find(|loc| loc.path_exists(path))
  }
  /// Whether any location has the path
  pub fn path_exists(&self, path: &str) -> bool { self.location_for(path).is_some() }

  /// Resolve an entry point. [None] only if the load path has no locations
  /// at all.
  pub fn resolve_entry(&self, path: &str) -> Option<Resolved> {
    match self.location_for(path) {
      Some(location) =>
        Some(Resolved { path: location.resolve(path), location: location.clone(), exists: true }),
      None => (self.locations.first()).map(|location| Resolved {
        path: location.resolve(path),
        location: location.clone(),
        exists: false,
      }),
    }
  }

  /// Resolve an import path appearing in the unit `importer` served by
  /// `location`. `./` and `../` paths resolve against the importer's own
  /// path and stay within the importer's location; anything else is looked
  /// up across the whole load path.
  pub fn resolve_import(
    &self,
    importer: &str,
    location: &LocationObj,
    import_path: &str,
  ) -> Option<Resolved> {
    if import_path.starts_with("./") || import_path.starts_with("../") {
      let merged = relative_to(importer, import_path);
      let exists = location.path_exists(&merged);
      Some(Resolved { path: location.resolve(&merged), location: location.clone(), exists })
    } else {
      self.resolve_entry(import_path)
    }
  }
}
impl Default for LoadPath {
  fn default() -> Self { Self::new() }
}

/// Merge a `./` or `../` path into the directory of the importing unit
fn relative_to(base: &str, rel: &str) -> String {
  let mut segments: Vec<&str> = base.split('/').collect();
  segments.pop();
  for part in rel.split('/') {
    match part {
      "" | "." => (),
      ".." => {
        segments.pop();
      },
      part => segments.push(part),
    }
  }
  segments.join("/")
}

#[cfg(test)]
mod test {
  use intern_all::i;

  use super::super::location::Location;
  use super::super::mem::MemLocation;
  use super::*;
  use crate::parse::parse_unit;

  fn two_locations() -> LoadPath {
    LoadPath::new()
      .and(MemLocation::new().add("shared.loom", "# first").arc())
      .and(MemLocation::new().add("shared.loom", "# second").add("only.loom", "# only").arc())
  }

  #[test]
  fn first_match_wins() {
    let lp = two_locations();
    let hit = lp.resolve_entry("shared.loom").expect("found");
    assert!(hit.exists);
    assert_eq!(*hit.location.source("shared.loom").expect("exists"), "# first".to_string());
    assert!(lp.path_exists("only.loom"));
  }

  #[test]
  fn missing_entries_still_resolve() {
    let lp = two_locations();
    let miss = lp.resolve_entry("nope.loom").expect("locations exist");
    assert!(!miss.exists);
    assert_eq!(miss.not_found().message(), "module nope.loom cannot be found");
    assert!(LoadPath::new().resolve_entry("nope.loom").is_none());
  }

  #[test]
  fn relative_imports_resolve_against_the_importer() {
    let lp = LoadPath::new().and(
      MemLocation::new().add("a/b.loom", "# b").add("a/sibling.loom", "# s").arc(),
    );
    let location = lp.location_for("a/b.loom").expect("exists").clone();
    let hit = lp.resolve_import("a/b.loom", &location, "./sibling.loom").expect("resolves");
    assert!(hit.exists);
    assert_eq!(hit.path, "a/sibling.loom");
    let miss = lp.resolve_import("a/b.loom", &location, "./lost.loom").expect("resolves");
    assert!(!miss.exists);
    assert_eq!(miss.path, "a/lost.loom");
  }

  #[test]
  fn cache_hands_out_fresh_copies() {
    let cache = ParseCache::new();
    let key = i("c.loom");
    let report =
      parse_unit(key.clone(), "import * as d from \"d.loom\";", false).expect("parses");
    cache.put(key.clone(), report.module.copy(), report.duration);
    let (first, _) = cache.get(&key).expect("cached");
    first.imports[0].target.set(i("d.loom")).expect("fresh slot");
    let (second, _) = cache.get(&key).expect("cached");
    assert_eq!(second.imports[0].target.get(), None);
    assert_eq!(cache.len(), 1);
  }
}
