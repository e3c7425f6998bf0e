//! Scopes and symbols: the name structure of a loaded module set

pub mod graph;
pub mod resolve;
