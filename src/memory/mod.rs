//! The memory plan of a compiled module set: cells for every definition,
//! cross-linked so each name lands on the cell it ultimately means

pub mod build;
pub mod cell;
pub mod link;
pub mod spaces;

pub use cell::{Cell, CellId, CellKind, CellValue, RuntimeSet};
