//! Module discovery: locations that serve source text, the ordered load
//! path, and the sequential and concurrent loaders.

pub mod embed;
pub mod fs;
pub mod load_path;
pub mod loader;
pub mod location;
pub mod mem;
pub mod parallel;

/// Extension appended to module paths that don't carry one
pub const DEFAULT_SUFFIX: &str = ".loom";

/// Collapse `.` and `..` segments in a slash-separated path
pub fn normalize_path(path: &str) -> String {
  let absolute = path.starts_with('/');
  let mut segments: Vec<&str> = Vec::new();
  for part in path.split('/') {
    match part {
      "" | "." => (),
      ".." => {
        segments.pop();
      },
      part => segments.push(part),
    }
  }
  match absolute {
    true => format!("/{}", segments.join("/")),
    false => segments.join("/"),
  }
}

#[cfg(test)]
mod test {
  use super::normalize_path;

  #[test]
  fn normalization() {
    assert_eq!(normalize_path("a/./b/../c"), "a/c");
    assert_eq!(normalize_path("/root/x/../y.loom"), "/root/y.loom");
    assert_eq!(normalize_path("plain.loom"), "plain.loom");
  }
}
