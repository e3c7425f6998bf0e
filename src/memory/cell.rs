//! Memory cells and the runtime set that owns them.
//!
//! Every definition gets exactly one cell; names that merely re-expose a
//! definition (imports, aliases, exports) become entries pointing at the
//! definition's cell, so a value reached over several routes is reached in
//! one place. Cells are arena-allocated in the [RuntimeSet] and referenced
//! by id, like scopes and symbols in the scope graph.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use intern_all::Tok;

use crate::analysis::unit::AnalysisSet;
use crate::parse::parsed::Literal;
use crate::scope::graph::{ScopeGraph, SymbolId};

/// Handle to a [Cell] in a [RuntimeSet]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellId(u32);

/// What kind of container or value a cell is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellKind {
  /// The body of a module, one per unit
  Module,
  /// The exported names of a module, one per unit
  Exports,
  /// The body of a library
  Library,
  /// A single value
  Var,
}

/// What a var cell holds
#[derive(Clone, Debug)]
pub enum CellValue {
  /// A value known at compile time
  Literal(Literal),
  /// A host-provided function under its host-side id
  Native(Arc<String>),
  /// The value of another cell, set by the cell linker for vars defined by
  /// a reference
  Cell(CellId),
}

/// One memory cell
pub struct Cell {
  /// What the cell is
  pub kind: CellKind,
  /// The symbol the cell was made for
  pub symbol: SymbolId,
  /// Named sub-cells of container cells
  pub entries: HashMap<Tok<String>, CellId>,
  /// The value of a var cell. [None] for containers, and for reference vars
  /// until the cell linker runs.
  pub value: Option<CellValue>,
}

/// The memory plan of a compiled module set: the analysis results plus one
/// cell per definition, cross-linked so every name lands on its cell
pub struct RuntimeSet {
  /// The loaded and analyzed units
  pub analysis: AnalysisSet,
  /// The scope graph the cells were derived from
  pub graph: ScopeGraph,
  cells: Vec<Cell>,
  unit_space: HashMap<Tok<String>, CellId>,
  export_space: HashMap<Tok<String>, CellId>,
  by_symbol: HashMap<SymbolId, CellId>,
}
impl RuntimeSet {
  /// Wrap analysis results, with no cells yet
  pub fn new(analysis: AnalysisSet, graph: ScopeGraph) -> Self {
    Self {
      analysis,
      graph,
      cells: Vec::new(),
      unit_space: HashMap::new(),
      export_space: HashMap::new(),
      by_symbol: HashMap::new(),
    }
  }

  /// Cell accessor
  pub fn cell(&self, id: CellId) -> &Cell { &self.cells[id.0 as usize] }
  /// Mutable cell accessor
  pub(super) fn cell_mut(&mut self, id: CellId) -> &mut Cell { &mut self.cells[id.0 as usize] }
  /// Allocate a cell
  pub(super) fn alloc(&mut self, cell: Cell) -> CellId {
    let id = CellId(u32::try_from(self.cells.len()).expect("cell arena outgrew u32"));
    self.cells.push(cell);
    id
  }
  /// Number of cells
  pub fn cell_count(&self) -> usize { self.cells.len() }

  /// Register the module and export cells of a unit
  pub(super) fn insert_unit(&mut self, unit: Tok<String>, module: CellId, exports: CellId) {
    self.unit_space.insert(unit.clone(), module);
    self.export_space.insert(unit, exports);
  }
  /// Remember which cell a definition lives in
  pub(super) fn bind_symbol(&mut self, symbol: SymbolId, cell: CellId) {
    self.by_symbol.insert(symbol, cell);
  }

  /// The body cell of a unit
  pub fn module_cell(&self, unit: &Tok<String>) -> Option<CellId> {
    self.unit_space.get(unit).copied()
  }
  /// The export cell of a unit
  pub fn exports_cell(&self, unit: &Tok<String>) -> Option<CellId> {
    self.export_space.get(unit).copied()
  }
  /// The cell behind one export of a unit
  pub fn export_cell(&self, unit: &Tok<String>, name: &Tok<String>) -> Option<CellId> {
    self.member(self.exports_cell(unit)?, name)
  }
  /// A named entry of a container cell
  pub fn member(&self, cell: CellId, name: &Tok<String>) -> Option<CellId> {
    self.cell(cell).entries.get(name).copied()
  }
  /// The cell a definition symbol lives in
  pub fn symbol_cell(&self, symbol: SymbolId) -> Option<CellId> {
    self.by_symbol.get(&symbol).copied()
  }

  /// The literal behind a cell, following value indirections. [None] for
  /// containers, natives, unlinked cells and value cycles.
  pub fn literal(&self, id: CellId) -> Option<&Literal> {
    let mut seen = vec![id];
    let mut cursor = id;
    loop {
      match self.cell(cursor).value.as_ref()? {
        CellValue::Literal(lit) => return Some(lit),
        CellValue::Native(_) => return None,
        CellValue::Cell(next) => {
          if seen.contains(next) {
            return None;
          }
          seen.push(*next);
          cursor = *next;
        },
      }
    }
  }
}
impl fmt::Debug for RuntimeSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    (f.debug_struct("RuntimeSet"))
      .field("units", &self.analysis.sorted_keys())
      .field("cells", &self.cells.len())
      .finish()
  }
}
