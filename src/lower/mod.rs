//! The lowering pass (spec.md §4.2) and the pieces it's built from.

pub mod context;
pub mod duplicate;
pub mod markers;
pub mod pass;
pub mod prelude;
pub mod symbols;

pub use pass::Lowering;
