//! The work set the compilation pipeline operates on

use std::fmt;
use std::time::Duration;

use hashbrown::HashMap;
use intern_all::Tok;

use crate::load::location::LocationObj;
use crate::parse::parsed::ModuleNode;
use crate::scope::graph::SymbolId;

/// How far along the pipeline a unit has travelled. Stages are strictly
/// ordered; a set is only consistent if all units share a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AnalysisStage {
  /// Parsed and imports linked to canonical paths
  Parsed,
  /// Scopes and symbols entered into the graph
  ScopeBuilt,
  /// Every reference symbol connected to a definition
  Linked,
  /// Memory cells allocated
  SpacesBuilt,
  /// Memory cells cross-linked, ready for evaluation
  Compiled,
}

/// One loaded unit and everything the pipeline has derived from it so far
pub struct AnalysisUnit {
  /// Canonical path, also the unit's key in the set
  pub path: Tok<String>,
  /// The location the unit was loaded from
  pub location: LocationObj,
  /// The parse tree
  pub module: ModuleNode,
  /// Progress through the pipeline
  pub stage: AnalysisStage,
  /// Whether this unit is a recovery stand-in or survived parse errors
  pub recovered: bool,
  /// The unit's module symbol, set when scopes are built
  pub symbol: Option<SymbolId>,
  /// Time spent parsing this unit (zero on a cache hit)
  pub parse_duration: Duration,
  /// Time spent loading and parsing this unit alone
  pub load_duration: Duration,
  /// Time spent loading this unit and its transitive imports
  pub total_load_duration: Duration,
}

/// The set of loaded units keyed by canonical path
pub struct AnalysisSet {
  /// The units, keyed by [AnalysisUnit::path]
  pub units: HashMap<Tok<String>, AnalysisUnit>,
}
impl AnalysisSet {
  /// An empty work set
  pub fn new() -> Self { Self { units: HashMap::new() } }

  /// Unit accessor
  pub fn unit(&self, path: &Tok<String>) -> Option<&AnalysisUnit> { self.units.get(path) }

  /// Canonical paths in sorted order, for deterministic iteration
  pub fn sorted_keys(&self) -> Vec<Tok<String>> {
    let mut keys: Vec<Tok<String>> = self.units.keys().cloned().collect();
    keys.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
    keys
  }

  /// Advance every unit to a stage. The pipeline calls this after finishing
  /// a pass over the whole set.
  pub fn advance(&mut self, stage: AnalysisStage) {
    for unit in self.units.values_mut() {
      debug_assert!(unit.stage <= stage, "pipeline stages only move forward");
      unit.stage = stage;
    }
  }
}
impl Default for AnalysisSet {
  fn default() -> Self { Self::new() }
}
impl fmt::Debug for AnalysisSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AnalysisSet").field("units", &self.sorted_keys()).finish()
  }
}
