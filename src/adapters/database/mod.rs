//! Target store abstraction layer
//!
//! This module provides the trait seam between the load pipeline and its
//! destination, the factory that builds the production store, and an
//! in-memory implementation for tests.

pub mod factory;
pub mod memory;
pub mod traits;

pub use factory::create_target_store;
pub use memory::{MemoryStore, StoredRow};
pub use traits::TargetStore;
