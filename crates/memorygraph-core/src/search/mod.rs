//! Lexical search: fuzzy pattern generation and tolerance modes.

pub mod fuzzy;

pub use fuzzy::{patterns, stem, Tolerance};
