//! Embedder-facing surface of the crate

pub mod compiler;

pub use compiler::Compiler;
