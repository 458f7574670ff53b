//! Filesystem layout, primitives and traversal.

pub mod layout;
pub mod ops;
pub mod trash;
pub mod walker;
