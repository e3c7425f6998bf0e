//! Two-phase concurrent loader.
//!
//! Phase one discovers the import graph: every task parses only the import
//! section of its unit, registers the raw source under its canonical key
//! and spawns a task per import. Registration is first-writer-wins, so a
//! unit reached over several paths is processed once. Phase two parses the
//! registered units in full, in parallel. A final sequential pass links
//! import statements to canonical keys.
//!
//! Errors are collected per requested path; after a failed phase the error
//! with the smallest key is returned, so a given input fails the same way
//! no matter how the tasks interleave.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;

use hashbrown::HashMap;
use intern_all::{Tok, i};
use itertools::Itertools;
use rayon::prelude::*;

use super::load_path::{LoadPath, ModuleNotFound, Resolved};
use super::loader::{InvalidImportPath, import_specs};
use super::location::{ParseUnit, parse_unit_at, recovery_unit};
use crate::analysis::unit::{AnalysisSet, AnalysisStage, AnalysisUnit};
use crate::error::{
  ErrorSansOrigin, InternalConsistency, ProjectError, ProjectErrorObj, ProjectResult,
};
use crate::location::{Origin, SourceSpan};
use crate::parse::{parse_module_head, parse_unit};

/// The concurrent counterpart of [super::loader::Loader]. Produces the
/// same work set as a sequential load of the same entry points.
pub struct ParallelLoader<'a> {
  load_path: &'a LoadPath,
  recovery: bool,
  raw: Mutex<HashMap<Tok<String>, ParseUnit>>,
  errors: Mutex<BTreeMap<String, ProjectErrorObj>>,
  recovery_errors: Mutex<Vec<ProjectErrorObj>>,
}
impl<'a> ParallelLoader<'a> {
  /// A strict concurrent loader over the given load path
  pub fn new(load_path: &'a LoadPath) -> Self {
    Self {
      load_path,
      recovery: false,
      raw: Mutex::new(HashMap::new()),
      errors: Mutex::new(BTreeMap::new()),
      recovery_errors: Mutex::new(Vec::new()),
    }
  }
  /// Switch to recovery mode
  pub fn recovery(mut self) -> Self {
    self.recovery = true;
    self
  }

  /// Load the entry points and their transitive imports. Returns the work
  /// set, the canonical entry keys in input order, and the errors survived
  /// in recovery mode (always empty when strict).
  pub fn load(
    self,
    paths: &[&str],
  ) -> ProjectResult<(AnalysisSet, Vec<Tok<String>>, Vec<ProjectErrorObj>)> {
    let mut entries = Vec::new();
    for path in paths {
      let resolved = (self.load_path.resolve_entry(path))
        .ok_or_else(|| ModuleNotFound { path: path.to_string() }.bundle(&Origin::Unknown))?;
      entries.push(resolved);
    }
    let entry_keys = entries.iter().map(|r| i(&r.path)).collect_vec();
    // phase 1: concurrent discovery over import sections
    rayon::scope(|s| {
      for resolved in entries {
        self.discover(resolved, Origin::Unknown, s);
      }
    });
    if let Some(err) = first_error(&self.errors) {
      return Err(err);
    }
    let Self { load_path, recovery, raw, errors, recovery_errors } = self;
    // phase 2: full parse of every discovered unit
    let raw_units = raw.into_inner().expect("poisoned lock");
    let units = Mutex::new(HashMap::with_capacity(raw_units.len()));
    raw_units.into_par_iter().for_each(|(key, pu)| {
      match parse_stage(load_path, recovery, pu) {
        Ok((unit, recovered)) => {
          if !recovered.is_empty() {
            recovery_errors.lock().expect("poisoned lock").extend(recovered);
          }
          units.lock().expect("poisoned lock").insert(key, unit);
        },
        Err(e) => {
          (errors.lock().expect("poisoned lock")).entry(key.to_string()).or_insert(e);
        },
      }
    });
    if let Some(err) = first_error(&errors) {
      return Err(err);
    }
    // phase 3: sequential import link
    let mut set = AnalysisSet { units: units.into_inner().expect("poisoned lock") };
    link_imports(load_path, recovery, &mut set)?;
    Ok((set, entry_keys, recovery_errors.into_inner().expect("poisoned lock")))
  }

  fn discover<'s>(&'s self, resolved: Resolved, origin: Origin, s: &rayon::Scope<'s>) {
    let key = resolved.path.clone();
    if let Err(e) = self.discover_inner(resolved, &origin, s) {
      (self.errors.lock().expect("poisoned lock")).entry(key).or_insert(e);
    }
  }

  fn discover_inner<'s>(
    &'s self,
    resolved: Resolved,
    origin: &Origin,
    s: &rayon::Scope<'s>,
  ) -> ProjectResult<()> {
    let pu = if resolved.exists {
      parse_unit_at(&resolved.location, &resolved.path)?
    } else {
      let err = resolved.not_found().bundle(origin);
      if !self.recovery {
        return Err(err);
      }
      self.recovery_errors.lock().expect("poisoned lock").push(err);
      recovery_unit(&resolved.location, &resolved.path)
    };
    let key = pu.path.clone();
    {
      // first writer wins, late arrivals of the same unit do nothing
      let mut raw = self.raw.lock().expect("poisoned lock");
      if raw.contains_key(&key) {
        return Ok(());
      }
      raw.insert(key.clone(), pu.clone());
    }
    let cached = (self.load_path.cache())
      .filter(|_| pu.location.allows_caching())
      .and_then(|c| c.get(&key));
    let specs: Vec<(SourceSpan, Result<String, SourceSpan>)> = match cached {
      Some((module, _)) => import_specs(&module.imports),
      None => {
        let head = parse_module_head(key.clone(), &pu.source, self.recovery)?;
        if !head.recovered.is_empty() {
          self.recovery_errors.lock().expect("poisoned lock").extend(head.recovered);
        }
        import_specs(&head.imports)
      },
    };
    for (stmt_span, path) in specs {
      let origin = Origin::Source(stmt_span);
      let import_path = match path {
        Ok(p) => p,
        Err(span) => {
          let err = InvalidImportPath { span }.pack();
          if !self.recovery {
            return Err(err);
          }
          self.recovery_errors.lock().expect("poisoned lock").push(err);
          continue;
        },
      };
      let child = (self.load_path.resolve_import(key.as_str(), &pu.location, &import_path))
        .ok_or_else(|| ModuleNotFound { path: import_path }.bundle(&origin))?;
      s.spawn(move |s| self.discover(child, origin, s));
    }
    Ok(())
  }
}

fn first_error(errors: &Mutex<BTreeMap<String, ProjectErrorObj>>) -> Option<ProjectErrorObj> {
  (errors.lock().expect("poisoned lock")).pop_first().map(|(_, e)| e)
}

fn parse_stage(
  load_path: &LoadPath,
  recovery: bool,
  pu: ParseUnit,
) -> ProjectResult<(AnalysisUnit, Vec<ProjectErrorObj>)> {
  let start = Instant::now();
  let cache = load_path.cache().filter(|_| pu.location.allows_caching());
  let (module, parse_duration, recovered) = match cache.and_then(|c| c.get(&pu.path)) {
    Some((module, duration)) => (module, duration, Vec::new()),
    None => {
      let report = parse_unit(pu.path.clone(), &pu.source, recovery)?;
      if let Some(cache) = cache {
        cache.put(pu.path.clone(), report.module.copy(), report.duration);
      }
      (report.module, report.duration, report.recovered)
    },
  };
  let load_duration = start.elapsed();
  let unit = AnalysisUnit {
    path: pu.path.clone(),
    location: pu.location,
    module,
    stage: AnalysisStage::Parsed,
    recovered: pu.recovered,
    symbol: None,
    parse_duration,
    load_duration,
    total_load_duration: load_duration,
  };
  Ok((unit, recovered))
}

fn link_imports(
  load_path: &LoadPath,
  recovery: bool,
  set: &mut AnalysisSet,
) -> ProjectResult<()> {
  let keys = set.units.keys().cloned().collect_vec();
  for key in keys {
    let unit = set.units.get(&key).expect("key from iteration");
    let location = unit.location.clone();
    let specs = import_specs(&unit.module.imports);
    for (idx, (stmt_span, path)) in specs.into_iter().enumerate() {
      let origin = Origin::Source(stmt_span);
      let import_path = match path {
        Ok(p) => p,
        // recorded during discovery; strict mode never reaches this phase
        Err(_) if recovery => continue,
        Err(span) => return Err(InvalidImportPath { span }.pack()),
      };
      let resolved = (load_path.resolve_import(key.as_str(), &location, &import_path))
        .ok_or_else(|| ModuleNotFound { path: import_path.clone() }.bundle(&origin))?;
      let target = i(&resolved.path);
      if !set.units.contains_key(&target) {
        return Err(InternalConsistency {
          context: format!("unit {target} was imported but never discovered"),
          origin,
        }
        .pack());
      }
      let unit = set.units.get(&key).expect("key from iteration");
      (unit.module.imports[idx].target.set(target)).expect("each import is linked once");
    }
  }
  Ok(())
}

#[cfg(test)]
mod test {
  use intern_all::i;

  use super::super::load_path::LoadPath;
  use super::super::loader::Loader;
  use super::super::location::Location;
  use super::super::mem::MemLocation;
  use super::*;

  fn wide_graph(count: usize) -> LoadPath {
    let mut mem = MemLocation::new();
    for idx in 0..count {
      let mut src = String::new();
      for dep in [idx + 1, idx + 2] {
        if dep < count {
          src.push_str(&format!("import * as m{dep} from \"m{dep}.loom\";\n"));
        }
      }
      src.push_str(&format!("export library lib{idx} {{ v: {idx}; }}\n"));
      mem = mem.add(&format!("m{idx}.loom"), &src);
    }
    LoadPath::new().and(mem.arc())
  }

  #[test]
  fn matches_sequential_loading() {
    let lp = wide_graph(25);
    let mut seq = AnalysisSet::new();
    Loader::new(&lp).load("m0.loom", &mut seq, true).expect("loads");
    let (par, entries, recovered) = ParallelLoader::new(&lp).load(&["m0.loom"]).expect("loads");
    assert!(recovered.is_empty());
    assert_eq!(entries, vec![i("m0.loom")]);
    assert_eq!(par.units.len(), seq.units.len());
    for (key, seq_unit) in &seq.units {
      let par_unit = par.units.get(key).expect("same unit set");
      let seq_targets =
        (seq_unit.module.imports.iter()).map(|imp| imp.target.get().cloned()).collect_vec();
      let par_targets =
        (par_unit.module.imports.iter()).map(|imp| imp.target.get().cloned()).collect_vec();
      assert_eq!(seq_targets, par_targets, "import links of {key} differ");
    }
  }

  #[test]
  fn failures_are_deterministic() {
    let lp = LoadPath::new().and(
      MemLocation::new()
        .add(
          "main.loom",
          "import * as z from \"zzz.loom\";\nimport * as a from \"aaa.loom\";",
        )
        .arc(),
    );
    for _ in 0..3 {
      let err = ParallelLoader::new(&lp).load(&["main.loom"]).unwrap_err();
      assert_eq!(err.message(), "module aaa.loom cannot be found");
    }
  }

  #[test]
  fn recovery_substitutes_missing_units() {
    let lp = LoadPath::new().and(
      MemLocation::new()
        .add("main.loom", "import * as gone from \"gone.loom\";\nlibrary m { v: 1; }")
        .arc(),
    );
    let (set, _, recovered) =
      ParallelLoader::new(&lp).recovery().load(&["main.loom"]).expect("recovers");
    assert_eq!(recovered.len(), 1);
    let stand_in = set.units.get(&i("gone.loom")).expect("synthesized");
    assert!(stand_in.recovered);
    let main = set.units.get(&i("main.loom")).expect("loaded");
    assert_eq!(main.module.imports[0].target.get(), Some(&i("gone.loom")));
  }
}
