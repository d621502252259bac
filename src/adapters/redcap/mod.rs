//! REDCap adapter implementation
//!
//! This module provides the integration with the REDCap API: the HTTP
//! client, typed response models, and the record filter used to restrict
//! exports.

pub mod client;
pub mod models;

pub use client::RedcapClient;
pub use models::{
    ArmInfo, EventInfo, ExportFieldName, FieldDefinition, FormEventMapping, ImportAck,
    InstrumentInfo, ProjectInfo, RecordFilter, RepeatingFormEvent,
};
