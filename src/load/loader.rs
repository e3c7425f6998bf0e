//! Sequential recursive loader.
//!
//! Loads an entry point and everything it transitively imports into a work
//! set keyed by canonical path. Every unit is read and parsed at most once;
//! import cycles terminate because a unit registers in the work set before
//! its imports are followed.

use std::time::{Duration, Instant};

use intern_all::Tok;

use super::load_path::{LoadPath, ModuleNotFound, Resolved};
use super::location::{ParseUnit, parse_unit_at, recovery_unit};
use crate::analysis::unit::{AnalysisSet, AnalysisStage, AnalysisUnit};
use crate::error::{ErrorSansOrigin, ProjectError, ProjectErrorObj, ProjectResult};
use crate::location::{Origin, SourceSpan};
use crate::parse::parse_unit;
use crate::parse::parsed::{ExprKind, Literal};

/// Error produced when an import path is anything but a string literal
pub struct InvalidImportPath {
  /// Position of the offending expression
  pub span: SourceSpan,
}
impl ProjectError for InvalidImportPath {
  const DESCRIPTION: &'static str = "Invalid import path";
  fn message(&self) -> String { "import paths must be string literals".to_string() }
  fn one_position(&self) -> Origin { Origin::Source(self.span.clone()) }
}

/// The import statements of a tree, reduced to what the loaders need: the
/// statement position and either the path or, for non-literal paths, the
/// position of the offending expression
pub(super) fn import_specs(
  imports: &[crate::parse::parsed::ImportNode],
) -> Vec<(SourceSpan, Result<String, SourceSpan>)> {
  (imports.iter())
    .map(|imp| {
      let path = match &imp.path.kind {
        ExprKind::Literal(Literal::Str(s)) => Ok(s.to_string()),
        _ => Err(imp.path.span.clone()),
      };
      (imp.span.clone(), path)
    })
    .collect()
}

/// The sequential loader. In recovery mode, missing modules and parse
/// errors are pushed onto [Loader::recovery_errors] and loading continues
/// with empty stand-in units.
pub struct Loader<'a> {
  load_path: &'a LoadPath,
  recovery: bool,
  recovery_errors: Vec<ProjectErrorObj>,
}
impl<'a> Loader<'a> {
  /// A strict loader over the given load path
  pub fn new(load_path: &'a LoadPath) -> Self {
    Self { load_path, recovery: false, recovery_errors: Vec::new() }
  }
  /// Switch to recovery mode
  pub fn recovery(mut self) -> Self {
    self.recovery = true;
    self
  }
  /// Errors survived so far in recovery mode
  pub fn recovery_errors(&self) -> &[ProjectErrorObj] { &self.recovery_errors }
  /// Take ownership of the survived errors
  pub fn into_recovery_errors(self) -> Vec<ProjectErrorObj> { self.recovery_errors }

  /// Load an entry point and, if `collect_imports` is set, everything it
  /// transitively imports. Returns the canonical key of the entry point.
  pub fn load(
    &mut self,
    path: &str,
    work: &mut AnalysisSet,
    collect_imports: bool,
  ) -> ProjectResult<Tok<String>> {
    let resolved = (self.load_path.resolve_entry(path))
      .ok_or_else(|| ModuleNotFound { path: path.to_string() }.bundle(&Origin::Unknown))?;
    self.load_resolved(resolved, &Origin::Unknown, work, collect_imports)
  }

  fn load_resolved(
    &mut self,
    resolved: Resolved,
    origin: &Origin,
    work: &mut AnalysisSet,
    collect: bool,
  ) -> ProjectResult<Tok<String>> {
    let start = Instant::now();
    let pu = if resolved.exists {
      parse_unit_at(&resolved.location, &resolved.path)?
    } else {
      let err = resolved.not_found().bundle(origin);
      if !self.recovery {
        return Err(err);
      }
      self.recovery_errors.push(err);
      recovery_unit(&resolved.location, &resolved.path)
    };
    self.load_unit(pu, work, collect, start)
  }

  fn load_unit(
    &mut self,
    pu: ParseUnit,
    work: &mut AnalysisSet,
    collect: bool,
    start: Instant,
  ) -> ProjectResult<Tok<String>> {
    let key = pu.path.clone();
    if work.units.contains_key(&key) {
      return Ok(key);
    }
    let cache = (self.load_path.cache()).filter(|_| pu.location.allows_caching()).cloned();
    let (module, parse_duration) = match cache.as_ref().and_then(|c| c.get(&key)) {
      Some(hit) => hit,
      None => {
        let report = parse_unit(key.clone(), &pu.source, self.recovery)?;
        self.recovery_errors.extend(report.recovered);
        if let Some(cache) = &cache {
          cache.put(key.clone(), report.module.copy(), report.duration);
        }
        (report.module, report.duration)
      },
    };
    // snapshot the import statements before the tree moves into the work set
    let specs = import_specs(&module.imports);
    let location = pu.location.clone();
    work.units.insert(key.clone(), AnalysisUnit {
      path: key.clone(),
      location: pu.location,
      module,
      stage: AnalysisStage::Parsed,
      recovered: pu.recovered,
      symbol: None,
      parse_duration,
      load_duration: start.elapsed(),
      total_load_duration: Duration::ZERO,
    });
    if collect {
      for (idx, (stmt_span, path)) in specs.into_iter().enumerate() {
        let origin = Origin::Source(stmt_span);
        let import_path = match path {
          Ok(p) => p,
          Err(span) => {
            let err = InvalidImportPath { span }.pack();
            if !self.recovery {
              return Err(err);
            }
            self.recovery_errors.push(err);
            continue;
          },
        };
        let resolved = (self.load_path.resolve_import(key.as_str(), &location, &import_path))
          .ok_or_else(|| ModuleNotFound { path: import_path.clone() }.bundle(&origin))?;
        let target = self.load_resolved(resolved, &origin, work, collect)?;
        let unit = work.units.get(&key).expect("inserted above");
        (unit.module.imports[idx].target.set(target)).expect("each import is linked once");
      }
    }
    let unit = work.units.get_mut(&key).expect("inserted above");
    unit.total_load_duration = start.elapsed();
    Ok(key)
  }
}

#[cfg(test)]
mod test {
  use intern_all::i;

  use super::super::load_path::LoadPath;
  use super::super::location::Location;
  use super::super::mem::MemLocation;
  use super::*;

  fn load_all(lp: &LoadPath, entry: &str) -> ProjectResult<AnalysisSet> {
    let mut work = AnalysisSet::new();
    Loader::new(lp).load(entry, &mut work, true)?;
    Ok(work)
  }

  #[test]
  fn diamond_imports_load_each_unit_once() {
    let lp = LoadPath::new().and(
      MemLocation::new()
        .add("a.loom", "import * as b from \"b.loom\";\nimport * as c from \"c.loom\";")
        .add("b.loom", "import * as d from \"d.loom\";")
        .add("c.loom", "import * as d from \"d.loom\";")
        .add("d.loom", "export library d { v: 1; }")
        .arc(),
    );
    let work = load_all(&lp, "a.loom").expect("loads");
    assert_eq!(work.units.len(), 4);
    let b = work.units.get(&i("b.loom")).expect("loaded");
    let c = work.units.get(&i("c.loom")).expect("loaded");
    assert_eq!(b.module.imports[0].target.get(), Some(&i("d.loom")));
    assert_eq!(c.module.imports[0].target.get(), Some(&i("d.loom")));
  }

  #[test]
  fn import_cycles_terminate() {
    let lp = LoadPath::new().and(
      MemLocation::new()
        .add("a.loom", "import * as b from \"b.loom\";")
        .add("b.loom", "import * as a from \"a.loom\";")
        .arc(),
    );
    let work = load_all(&lp, "a.loom").expect("loads");
    assert_eq!(work.units.len(), 2);
  }

  #[test]
  fn relative_imports_land_next_to_the_importer() {
    let lp = LoadPath::new().and(
      MemLocation::new()
        .add("pkg/main.loom", "import * as s from \"./sibling.loom\";")
        .add("pkg/sibling.loom", "export library s { v: 2; }")
        .add("sibling.loom", "# decoy at the root")
        .arc(),
    );
    let work = load_all(&lp, "pkg/main.loom").expect("loads");
    let main = work.units.get(&i("pkg/main.loom")).expect("loaded");
    assert_eq!(main.module.imports[0].target.get(), Some(&i("pkg/sibling.loom")));
  }

  #[test]
  fn missing_relative_import_names_the_resolved_path() {
    let lp = LoadPath::new().and(
      MemLocation::new().add("pkg/main.loom", "import * as s from \"./lost.loom\";").arc(),
    );
    let err = load_all(&lp, "pkg/main.loom").unwrap_err();
    assert_eq!(err.message(), "module pkg/lost.loom cannot be found");
  }

  #[test]
  fn recovery_substitutes_empty_units() {
    let lp = LoadPath::new().and(
      MemLocation::new().add("main.loom", "import * as gone from \"gone.loom\";").arc(),
    );
    let mut work = AnalysisSet::new();
    let mut loader = Loader::new(&lp).recovery();
    loader.load("main.loom", &mut work, true).expect("recovers");
    assert_eq!(loader.recovery_errors().len(), 1);
    let stand_in = work.units.get(&i("gone.loom")).expect("synthesized");
    assert!(stand_in.recovered);
    assert!(stand_in.module.libraries.is_empty());
    let main = work.units.get(&i("main.loom")).expect("loaded");
    assert_eq!(main.module.imports[0].target.get(), Some(&i("gone.loom")));
  }

  #[test]
  fn non_literal_import_paths_are_rejected() {
    let lp = LoadPath::new()
      .and(MemLocation::new().add("main.loom", "import * as x from 42;").arc());
    let err = load_all(&lp, "main.loom").unwrap_err();
    assert_eq!(err.description(), "Invalid import path");
  }
}
