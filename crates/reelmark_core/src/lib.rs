//! Core domain logic for Reelmark timeline annotations.
//! This crate owns the interval model, cascade rules and sidecar persistence.

pub mod clock;
pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, SystemClock, Timestamp};
pub use config::{ConfigError, SidecarConfig};
pub use logging::{init_logging, logging_status, LogLevel, LoggingError};
pub use model::collection::IntervalCollection;
pub use model::document::{AnnotationDocument, DocumentShapeError};
pub use model::interval::{Granularity, Interval, IntervalPatch, PatchField};
pub use repo::document_repo::{
    DocumentLoad, DocumentRepository, FsDocumentRepository, RepoError, RepoResult,
};
pub use repo::lock::DocumentLocks;
pub use repo::sidecar::sidecar_path_for;
pub use service::annotation_service::{AnnotationService, AnnotationServiceError, ServiceResult};
pub use service::request::{
    AddIntervalRequest, DeleteIntervalRequest, MediaRequest, PatchDocumentRequest,
    UpdateIntervalRequest,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
