//! Annotation domain model.
//!
//! # Responsibility
//! - Define intervals, per-granularity collections and the document aggregate.
//! - Keep every mutation a pure in-memory transformation; no I/O here.
//!
//! # Invariants
//! - Intervals are identified by `created_at`, never by position.
//! - Acts, sections and shots are independent collections; the hierarchy
//!   exists only through cascade rules on creation.

pub mod collection;
pub mod document;
pub mod interval;
