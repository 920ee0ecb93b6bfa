//! File Registry with Owner and Administrator Authorization
//!
//! Maps opaque file ids to a content locator and a permission descriptor.
//! The creating identity owns the record; only the owner may update or
//! delete it, and the administrator captured at initialisation may delete
//! any record. Locators are never dereferenced here.

pub mod access;
pub mod errors;
pub mod events;
pub mod registry;

pub use access::{evaluate, AccessGrant, PublicMatch};
pub use errors::*;
pub use events::{AuditAction, AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use registry::{FileRegistry, RegistryOptions};

pub use filereg_storage::{MemoryRecordStore, RecordStore, SledRecordStore, StoreError};
pub use filereg_types::*;
