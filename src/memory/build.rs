//! Cell construction pass: one cell per definition.
//!
//! Definitions are walked in declaration order of each unit, units in
//! sorted path order, so cell ids are stable for a given input. Reference
//! symbols get no cell of their own; the cell linker points their slots at
//! the cells built here.

use hashbrown::HashMap;

use super::cell::{Cell, CellKind, CellValue, RuntimeSet};
use crate::analysis::unit::AnalysisStage;
use crate::error::{InternalConsistency, ProjectError, ProjectResult};
use crate::location::Origin;
use crate::parse::parsed::ExprKind;
use crate::scope::graph::SymbolKind;

/// Allocate the module, export, library and var cells of every unit
pub fn build_cells(rs: &mut RuntimeSet) -> ProjectResult<()> {
  for key in rs.analysis.sorted_keys() {
    let unit = rs.analysis.units.get(&key).expect("key from iteration");
    let module_sym = unit.symbol.ok_or_else(|| {
      InternalConsistency {
        context: format!("unit {key} reached memory construction without a module symbol"),
        origin: Origin::Unit(key.clone()),
      }
      .pack()
    })?;
    // declaration order is lost in the scope tables, so containers are
    // walked through the parse tree
    let libraries = unit.module.libraries.clone();
    let module_scope = rs.graph.module_scope_of_unit(&key).ok_or_else(|| {
      InternalConsistency {
        context: format!("unit {key} has no module scope"),
        origin: Origin::Unit(key.clone()),
      }
      .pack()
    })?;

    let module_cell = rs.alloc(Cell {
      kind: CellKind::Module,
      symbol: module_sym,
      entries: HashMap::new(),
      value: None,
    });
    let exports_cell = rs.alloc(Cell {
      kind: CellKind::Exports,
      symbol: module_sym,
      entries: HashMap::new(),
      value: None,
    });
    rs.insert_unit(key.clone(), module_cell, exports_cell);
    rs.bind_symbol(module_sym, module_cell);

    for lib in libraries {
      let Some(lib_sym) = rs.graph.lookup(module_scope, &lib.name) else { continue };
      let lib_scope = match rs.graph.symbol(lib_sym).kind {
        SymbolKind::Library { scope } => scope,
        _ => continue,
      };
      let lib_cell = rs.alloc(Cell {
        kind: CellKind::Library,
        symbol: lib_sym,
        entries: HashMap::new(),
        value: None,
      });
      rs.bind_symbol(lib_sym, lib_cell);
      rs.cell_mut(module_cell).entries.insert(lib.name.clone(), lib_cell);
      if lib.exported {
        // the inline export exposes the same cell
        rs.cell_mut(exports_cell).entries.insert(lib.name.clone(), lib_cell);
      }
      for var in &lib.vars {
        let Some(var_sym) = rs.graph.lookup(lib_scope, &var.name) else { continue };
        let SymbolKind::Var { value } = &rs.graph.symbol(var_sym).kind else { continue };
        let value = match value {
          ExprKind::Literal(lit) => Some(CellValue::Literal(lit.clone())),
          ExprKind::Native(id) => Some(CellValue::Native(id.clone())),
          // filled by the cell linker
          ExprKind::Reference(_) => None,
        };
        let var_cell = rs.alloc(Cell {
          kind: CellKind::Var,
          symbol: var_sym,
          entries: HashMap::new(),
          value,
        });
        rs.bind_symbol(var_sym, var_cell);
        rs.cell_mut(lib_cell).entries.insert(var.name.clone(), var_cell);
      }
    }
  }
  rs.analysis.advance(AnalysisStage::SpacesBuilt);
  Ok(())
}
