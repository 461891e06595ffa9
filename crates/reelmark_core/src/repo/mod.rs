//! Sidecar persistence layer.
//!
//! # Responsibility
//! - Derive sidecar paths and isolate filesystem details from services.
//! - Provide keyed locking so same-document writes never interleave.
//!
//! # Invariants
//! - Repository reads go through the model's validating deserializer.
//! - Write failures are returned, never swallowed.

pub mod document_repo;
pub mod lock;
pub mod sidecar;
