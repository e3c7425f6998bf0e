//! Cell linking pass: point every slot at the cell it names.
//!
//! A slot is the memory-side footprint of a reference symbol: an entry in
//! its module cell for imports and aliases, an entry in the export cell
//! for export statements, the value of its cell for vars defined by a
//! reference. Slots are filled dependency-first over a worklist stack; a
//! slot already filled is never touched again, so the pass is idempotent
//! and insensitive to the order slots are visited in. The stack doubles as
//! a cycle detector, though reference cycles are normally caught while
//! symbols are linked.

use itertools::Itertools;
use substack::Substack;

use super::cell::{CellId, CellValue, RuntimeSet};
use crate::analysis::link::CyclicReference;
use crate::analysis::unit::AnalysisStage;
use crate::error::{InternalConsistency, ProjectError, ProjectResult};
use crate::location::Origin;
use crate::parse::parsed::ExprKind;
use crate::scope::graph::{SymbolId, SymbolKind};

/// The outcome of looking for the cell behind a symbol
enum Progress {
  /// The cell is known
  Done(CellId),
  /// The symbol's own slot must be filled first
  Blocked(SymbolId),
}

/// Fill every slot in the set and advance it to its final stage
pub fn link_cells(rs: &mut RuntimeSet) -> ProjectResult<()> {
  let slots = (rs.graph.symbol_ids())
    .filter(|&id| has_slot(rs, id))
    .collect_vec();
  for slot in slots {
    fill(rs, slot, Substack::Bottom)?;
  }
  rs.analysis.advance(AnalysisStage::Compiled);
  Ok(())
}

/// Whether a symbol occupies a slot the linker must fill
fn has_slot(rs: &RuntimeSet, id: SymbolId) -> bool {
  match &rs.graph.symbol(id).kind {
    SymbolKind::NameImport { .. } | SymbolKind::ModuleImport { .. } => true,
    SymbolKind::Alias { .. } | SymbolKind::Export { .. } => true,
    SymbolKind::Var { value } => matches!(value, ExprKind::Reference(_)),
    SymbolKind::Module { .. } | SymbolKind::Library { .. } => false,
  }
}

fn fill(rs: &mut RuntimeSet, id: SymbolId, stack: Substack<'_, SymbolId>) -> ProjectResult<()> {
  if slot_filled(rs, id)? {
    return Ok(());
  }
  if stack.iter().any(|frame| *frame == id) {
    let sym = rs.graph.symbol(id);
    return Err(CyclicReference { name: sym.name.to_string(), span: sym.span.clone() }.pack());
  }
  let stack = stack.push(id);
  let hop = (rs.graph.symbol(id).linked).ok_or_else(|| consistency(rs, id, "is not linked"))?;
  let cell = match locate(rs, hop)? {
    Progress::Done(cell) => cell,
    Progress::Blocked(dep) => {
      fill(rs, dep, stack.clone())?;
      match locate(rs, hop)? {
        Progress::Done(cell) => cell,
        Progress::Blocked(_) =>
          return Err(consistency(rs, id, "has a dependency that never produced a cell")),
      }
    },
  };
  write_slot(rs, id, cell)?;
  Ok(())
}

/// The cell behind a symbol: the export cell for modules, the bound cell
/// for other definitions, the slot content for references
fn locate(rs: &RuntimeSet, id: SymbolId) -> ProjectResult<Progress> {
  let sym = rs.graph.symbol(id);
  // a module is only ever reached through references from other units,
  // which must see its export space, never its body
  if let SymbolKind::Module { .. } = sym.kind {
    return match rs.exports_cell(&sym.unit) {
      Some(cell) => Ok(Progress::Done(cell)),
      None => Err(consistency(rs, id, "has no export cell")),
    };
  }
  if sym.is_definition() {
    return match rs.symbol_cell(id) {
      Some(cell) => Ok(Progress::Done(cell)),
      None => Err(consistency(rs, id, "is linked to but has no cell")),
    };
  }
  Ok(match slot(rs, id)? {
    Some(cell) => Progress::Done(cell),
    None => Progress::Blocked(id),
  })
}

/// Read a reference symbol's slot
fn slot(rs: &RuntimeSet, id: SymbolId) -> ProjectResult<Option<CellId>> {
  let sym = rs.graph.symbol(id);
  match &sym.kind {
    SymbolKind::NameImport { .. } | SymbolKind::ModuleImport { .. } | SymbolKind::Alias { .. } => {
      let module = (rs.module_cell(&sym.unit))
        .ok_or_else(|| consistency(rs, id, "belongs to a unit with no module cell"))?;
      Ok(rs.member(module, &sym.name))
    },
    SymbolKind::Export { .. } => {
      let exports = (rs.exports_cell(&sym.unit))
        .ok_or_else(|| consistency(rs, id, "belongs to a unit with no export cell"))?;
      Ok(rs.member(exports, &sym.name))
    },
    _ => Err(consistency(rs, id, "is a definition and has no slot")),
  }
}

fn slot_filled(rs: &RuntimeSet, id: SymbolId) -> ProjectResult<bool> {
  let sym = rs.graph.symbol(id);
  match &sym.kind {
    SymbolKind::Var { .. } => {
      let cell = (rs.symbol_cell(id))
        .ok_or_else(|| consistency(rs, id, "is a var without a cell"))?;
      Ok(rs.cell(cell).value.is_some())
    },
    _ => Ok(slot(rs, id)?.is_some()),
  }
}

fn write_slot(rs: &mut RuntimeSet, id: SymbolId, cell: CellId) -> ProjectResult<()> {
  let sym = rs.graph.symbol(id);
  let name = sym.name.clone();
  let unit = sym.unit.clone();
  match &sym.kind {
    SymbolKind::NameImport { .. } | SymbolKind::ModuleImport { .. } | SymbolKind::Alias { .. } => {
      let module = (rs.module_cell(&unit))
        .ok_or_else(|| consistency(rs, id, "belongs to a unit with no module cell"))?;
      rs.cell_mut(module).entries.insert(name, cell);
    },
    SymbolKind::Export { .. } => {
      let exports = (rs.exports_cell(&unit))
        .ok_or_else(|| consistency(rs, id, "belongs to a unit with no export cell"))?;
      rs.cell_mut(exports).entries.insert(name, cell);
    },
    SymbolKind::Var { .. } => {
      let own = (rs.symbol_cell(id))
        .ok_or_else(|| consistency(rs, id, "is a var without a cell"))?;
      rs.cell_mut(own).value = Some(CellValue::Cell(cell));
    },
    _ => return Err(consistency(rs, id, "is a definition and has no slot")),
  }
  Ok(())
}

fn consistency(
  rs: &RuntimeSet,
  id: SymbolId,
  what: &str,
) -> crate::error::ProjectErrorObj {
  let sym = rs.graph.symbol(id);
  InternalConsistency {
    context: format!("{} {what}", rs.graph.describe(id)),
    origin: Origin::Source(sym.span.clone()),
  }
  .pack()
}

#[cfg(test)]
mod test {
  use intern_all::i;

  use super::super::build::build_cells;
  use super::*;
  use crate::analysis::analyze;
  use crate::analysis::unit::AnalysisSet;
  use crate::error::Reporter;
  use crate::load::load_path::LoadPath;
  use crate::load::loader::Loader;
  use crate::load::location::Location;
  use crate::load::mem::MemLocation;
  use crate::parse::parsed::Literal;
  use crate::scope::graph::ScopeGraph;

  fn compiled(sources: &[(&str, &str)], entry: &str) -> RuntimeSet {
    let mut mem = MemLocation::new();
    for (path, src) in sources {
      mem = mem.add(path, src);
    }
    let lp = LoadPath::new().and(mem.arc());
    let mut set = AnalysisSet::new();
    Loader::new(&lp).load(entry, &mut set, true).expect("loads");
    let mut graph = ScopeGraph::new();
    let reporter = Reporter::new();
    analyze(&mut set, &mut graph, &reporter);
    reporter.bind(()).expect("analyzes");
    let mut rs = RuntimeSet::new(set, graph);
    build_cells(&mut rs).expect("builds");
    link_cells(&mut rs).expect("links");
    rs
  }

  #[test]
  fn imports_share_the_definition_cell() {
    let rs = compiled(
      &[
        ("dep.loom", "export library util { x: 1; }"),
        ("a.loom", "import util from \"dep.loom\";"),
        ("b.loom", "import util as u from \"dep.loom\";"),
        ("main.loom", "import * as a from \"a.loom\";\nimport * as b from \"b.loom\";"),
      ],
      "main.loom",
    );
    let dep_util = rs.export_cell(&i("dep.loom"), &i("util")).expect("exported");
    let a_module = rs.module_cell(&i("a.loom")).expect("built");
    let b_module = rs.module_cell(&i("b.loom")).expect("built");
    assert_eq!(rs.member(a_module, &i("util")), Some(dep_util));
    assert_eq!(rs.member(b_module, &i("u")), Some(dep_util));
  }

  #[test]
  fn module_imports_expose_only_the_export_space() {
    let rs = compiled(
      &[
        ("dep.loom", "export library util { x: 1; }\nlibrary hidden { y: 2; }"),
        ("main.loom", "import * as dep from \"dep.loom\";"),
      ],
      "main.loom",
    );
    let main_module = rs.module_cell(&i("main.loom")).expect("built");
    let dep_slot = rs.member(main_module, &i("dep")).expect("filled");
    assert_eq!(Some(dep_slot), rs.exports_cell(&i("dep.loom")));
    assert_ne!(Some(dep_slot), rs.module_cell(&i("dep.loom")));
    assert!(rs.member(dep_slot, &i("util")).is_some());
    assert!(rs.member(dep_slot, &i("hidden")).is_none(), "private names stay private");
  }

  #[test]
  fn export_statements_fill_the_export_cell() {
    let rs = compiled(
      &[
        ("a.loom", "export library util { x: 1; }"),
        ("b.loom", "import * as a from \"a.loom\";\nexport a.util as tools;"),
        ("main.loom", "import tools from \"b.loom\";"),
      ],
      "main.loom",
    );
    let original = rs.export_cell(&i("a.loom"), &i("util")).expect("exported");
    assert_eq!(rs.export_cell(&i("b.loom"), &i("tools")), Some(original));
    let main_module = rs.module_cell(&i("main.loom")).expect("built");
    assert_eq!(rs.member(main_module, &i("tools")), Some(original));
  }

  #[test]
  fn mutual_exports_link_without_cycling() {
    let rs = compiled(
      &[
        (
          "a.loom",
          "import forth from \"b.loom\";\nexport library back { x: 1; }\nexport forth as relayed;",
        ),
        ("b.loom", "import back from \"a.loom\";\nexport library forth { y: 2; }\nexport back as echoed;"),
      ],
      "a.loom",
    );
    let forth = rs.export_cell(&i("b.loom"), &i("forth")).expect("exported");
    let back = rs.export_cell(&i("a.loom"), &i("back")).expect("exported");
    assert_eq!(rs.export_cell(&i("a.loom"), &i("relayed")), Some(forth));
    assert_eq!(rs.export_cell(&i("b.loom"), &i("echoed")), Some(back));
  }

  #[test]
  fn reference_vars_point_at_their_target_cell() {
    let rs = compiled(
      &[
        ("dep.loom", "export library util { x: 7; }"),
        ("main.loom", "import * as dep from \"dep.loom\";\nlibrary l { y: dep.util.x; }"),
      ],
      "main.loom",
    );
    let main_module = rs.module_cell(&i("main.loom")).expect("built");
    let l = rs.member(main_module, &i("l")).expect("entered");
    let y = rs.member(l, &i("y")).expect("entered");
    let x = rs.export_cell(&i("dep.loom"), &i("util")).and_then(|u| rs.member(u, &i("x")));
    assert!(matches!(rs.cell(y).value, Some(CellValue::Cell(c)) if Some(c) == x));
    assert_eq!(rs.literal(y), Some(&Literal::Num(7.0.try_into().expect("not nan"))));
  }

  #[test]
  fn linking_twice_changes_nothing() {
    let mut rs = compiled(
      &[
        ("dep.loom", "export library util { x: 1; }"),
        ("main.loom", "import util from \"dep.loom\";\nalias util as u;"),
      ],
      "main.loom",
    );
    let main_module = rs.module_cell(&i("main.loom")).expect("built");
    let before = rs.member(main_module, &i("u")).expect("filled");
    let count = rs.cell_count();
    link_cells(&mut rs).expect("idempotent");
    assert_eq!(rs.member(main_module, &i("u")), Some(before));
    assert_eq!(rs.cell_count(), count);
  }
}
