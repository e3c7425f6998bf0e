//! Static analysis over a loaded work set: scope construction and symbol
//! linking

pub mod link;
pub mod scope_builder;
pub mod unit;

use crate::error::Reporter;
use crate::scope::graph::ScopeGraph;
use unit::AnalysisSet;

/// Run both analysis passes over the set. Scope construction reports every
/// conflict it finds; linking only runs over a conflict-free graph and
/// stops at the first error, later link failures are usually knock-on
/// effects of the first.
pub fn analyze(set: &mut AnalysisSet, graph: &mut ScopeGraph, reporter: &Reporter) {
  scope_builder::build_scopes(set, graph, reporter);
  if reporter.failing() {
    return;
  }
  if let Err(e) = link::link_symbols(set, graph) {
    reporter.report(e);
  }
}
