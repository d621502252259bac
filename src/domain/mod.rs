//! Domain models and types for capmirror.
//!
//! This module contains the core domain models, types, and business rules.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`SubjectId`], [`ProjectName`])
//! - **The project metadata model** ([`ProjectMetadata`] and its tree)
//! - **Typed row records** ([`RootRow`], [`EventRow`], [`InstrumentRow`],
//!   [`LookupRow`], batched as [`RowBatch`])
//! - **Error types** ([`MirrorError`], [`FieldCoercionError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! capmirror uses the newtype pattern for identifiers to prevent mixing
//! different string kinds:
//!
//! ```rust
//! use capmirror::domain::{ProjectName, SubjectId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let subject = SubjectId::new("S1")?;
//! let project = ProjectName::new("cardiology_registry")?;
//!
//! // This won't compile - type safety prevents mixing IDs
//! // let wrong: SubjectId = project;  // Compile error!
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, MirrorError>`]:
//!
//! ```rust
//! use capmirror::domain::{MirrorError, Result};
//!
//! fn example() -> Result<()> {
//!     let config = capmirror::config::MirrorConfig::from_file("capmirror.toml")?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod metadata;
pub mod result;
pub mod rows;

// Re-export commonly used types for convenience
pub use errors::{FieldCoercionError, MetadataEntity, MirrorError};
pub use ids::{ProjectName, SubjectId};
pub use metadata::{
    ArmMetadata, EventInstrumentMetadata, EventMetadata, FieldMetadata, FieldType,
    InstrumentMetadata, ProjectMetadata,
};
pub use result::Result;
pub use rows::{
    CellValue, EventBatch, EventRow, InstrumentRow, InstrumentTableBatch, LookupRow,
    LookupTableBatch, RootBatch, RootRow, RowBatch, RowOwner,
};
