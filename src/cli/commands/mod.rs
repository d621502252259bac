//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod discover;
pub mod init;
pub mod load;
pub mod status;
pub mod upload;
pub mod validate;
