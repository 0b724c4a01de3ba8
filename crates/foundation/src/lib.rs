//! Domain-free helpers shared by the portal crates: id generation, nested
//! JSON search and attribute sorting.

pub mod ids;
pub mod nested;
pub mod sort;

pub use ids::*;
pub use nested::*;
pub use sort::*;
