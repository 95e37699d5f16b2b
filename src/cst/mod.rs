//! # CST Module
//!
//! The engine's own concrete syntax tree, built once from a `tree-sitter`
//! parse of a C translation unit and then mutated in place by the
//! lowering pass (`crate::lower`).

pub mod build;
pub mod node;

pub use build::build;
pub use node::{Cst, Node, NodeId, NodeKind};
