//! Load orchestration and row queuing
//!
//! This module provides the download-direction pipeline for Capmirror,
//! including:
//! - Surrogate-id assignment and row queuing
//! - Load coordination and orchestration
//! - Summary and reporting

pub mod coordinator;
pub mod queue;
pub mod summary;

pub use coordinator::LoadCoordinator;
pub use queue::BulkLoadQueue;
pub use summary::LoadSummary;
