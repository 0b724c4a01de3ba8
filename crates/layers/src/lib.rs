pub mod collection;
pub mod config;
pub mod layer;
pub mod layer2d;
pub mod layer3d;
pub mod merge;
pub mod symbology;
pub mod tree_builder;

pub use collection::*;
pub use config::*;
pub use layer::*;
pub use tree_builder::{BuildRequest, TreeBuilder};
