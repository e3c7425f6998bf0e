#![warn(missing_docs)]
//! Loom is a small declarative expression language to be embedded in Rust
//! applications. This crate covers the front half of the language: module
//! discovery over load paths, parsing, scope and symbol analysis, and the
//! memory plan linking every name to the cell it means.

pub mod analysis;
pub mod error;
pub mod facade;
pub mod load;
pub mod location;
pub mod memory;
pub mod parse;
pub mod scope;
