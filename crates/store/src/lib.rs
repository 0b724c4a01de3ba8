//! Layer configuration store of the portal.
//!
//! [`State`] holds the portal configuration and the partitioned layer tree.
//! Derived views live in `getters`, the assignments into state in
//! `mutations`, and the multi-step operations on [`AppStore`] in `actions`.

pub mod actions;
pub mod config;
pub mod error;
pub mod getters;
pub mod mutations;
pub mod state;


pub use actions::*;
pub use config::*;
pub use error::StoreError;
pub use getters::{DuplicateId, LayerUrlParam};
pub use mutations::LayerContainer;
pub use state::*;
