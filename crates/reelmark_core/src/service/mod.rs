//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into front-end change requests.
//! - Parse untyped request payloads at the core boundary.

pub mod annotation_service;
pub mod request;
