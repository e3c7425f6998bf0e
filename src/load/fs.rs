//! Location that serves a directory of the filesystem

use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::{env, fs};

use hashbrown::HashMap;

use super::DEFAULT_SUFFIX;
use super::location::{Location, LocationObj};
use crate::error::{ErrorSansOrigin, ResultSansOrigin};

/// Error produced when a file could not be read. The io error is kept as
/// text so the error can be shared and retried cheaply from the read cache.
#[derive(Clone)]
pub struct FileReadError {
  /// Absolute path of the file
  pub path: String,
  /// The io error as reported by the OS
  pub message: String,
}
impl ErrorSansOrigin for FileReadError {
  const DESCRIPTION: &'static str = "Failed to read source file";
  fn message(&self) -> String { format!("{}: {}", self.path, self.message) }
}

/// Error produced when a file is not valid utf8
#[derive(Clone)]
pub struct NotUtf8 {
  /// Absolute path of the file
  pub path: String,
}
impl ErrorSansOrigin for NotUtf8 {
  const DESCRIPTION: &'static str = "Source file is not valid utf8";
  fn message(&self) -> String { format!("{} is not valid utf8", self.path) }
}

/// Error produced when a path escapes a confined location's root
#[derive(Clone)]
pub struct EscapesRoot {
  /// The escaping path
  pub path: String,
  /// The root it escapes
  pub root: String,
}
impl ErrorSansOrigin for EscapesRoot {
  const DESCRIPTION: &'static str = "Path escapes the location root";
  fn message(&self) -> String { format!("{} is outside of {}", self.path, self.root) }
}

/// A location serving `.loom` files under a directory. Reads are cached,
/// successes and failures alike, so a file is read at most once per load
/// path no matter how many units import it.
pub struct FsLocation {
  root: PathBuf,
  suffix: &'static str,
  confined: bool,
  native: bool,
  caching: bool,
  read_cache: Mutex<HashMap<String, ResultSansOrigin<Arc<String>>>>,
}
impl FsLocation {
  /// Serve files under `root`. A relative root is anchored to the working
  /// directory at construction time.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    let root: PathBuf = root.into();
    let root = match root.is_absolute() {
      true => normalize(&root),
      false => match env::current_dir() {
        Ok(cwd) => normalize(&cwd.join(&root)),
        Err(_) => normalize(&root),
      },
    };
    Self {
      root,
      suffix: DEFAULT_SUFFIX,
      confined: false,
      native: true,
      caching: true,
      read_cache: Mutex::new(HashMap::new()),
    }
  }
  /// Treat paths escaping the root as absent
  pub fn confined(mut self) -> Self {
    self.confined = true;
    self
  }
  /// Control whether units served here may declare native functions
  pub fn allow_native(mut self, allow: bool) -> Self {
    self.native = allow;
    self
  }
  /// Control whether parse results may be reused across compile runs
  pub fn allow_caching(mut self, allow: bool) -> Self {
    self.caching = allow;
    self
  }
  /// Finish construction
  pub fn build(self) -> LocationObj { self.arc() }

  fn contains(&self, canonical: &str) -> bool {
    !self.confined || Path::new(canonical).starts_with(&self.root)
  }
}
impl Location for FsLocation {
  fn resolve(&self, path: &str) -> String {
    let with_suffix = match path.ends_with(self.suffix) {
      true => path.to_string(),
      false => format!("{path}{}", self.suffix),
    };
    let joined = match Path::new(&with_suffix).is_absolute() {
      true => PathBuf::from(&with_suffix),
      false => self.root.join(&with_suffix),
    };
    normalize(&joined).to_string_lossy().into_owned()
  }
  fn path_exists(&self, path: &str) -> bool {
    let canonical = self.resolve(path);
    self.contains(&canonical) && Path::new(&canonical).is_file()
  }
  fn source(&self, canonical: &str) -> ResultSansOrigin<Arc<String>> {
    if !self.contains(canonical) {
      let root = self.root.to_string_lossy().into_owned();
      return Err(EscapesRoot { path: canonical.to_string(), root }.pack());
    }
    let mut cache = self.read_cache.lock().expect("poisoned lock");
    if let Some(cached) = cache.get(canonical) {
      return cached.clone();
    }
    let result = match fs::read(canonical) {
      Err(e) =>
        Err(FileReadError { path: canonical.to_string(), message: e.to_string() }.pack()),
      Ok(bytes) => match String::from_utf8(bytes) {
        Err(_) => Err(NotUtf8 { path: canonical.to_string() }.pack()),
        Ok(text) => Ok(Arc::new(text)),
      },
    };
    cache.insert(canonical.to_string(), result.clone());
    result
  }
  fn allows_native_functions(&self) -> bool { self.native }
  fn allows_caching(&self) -> bool { self.caching }
  fn display_name(&self) -> String { format!("directory {}", self.root.to_string_lossy()) }
}

/// Collapse `.` and `..` components without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => (),
      Component::ParentDir => {
        out.pop();
      },
      component => out.push(component.as_os_str()),
    }
  }
  out
}
