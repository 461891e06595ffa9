//! Annotation mutation use-case service.
//!
//! # Responsibility
//! - Expose one operation per front-end change request.
//! - Run each operation as load -> pure transform -> stamp -> persist.
//!
//! # Invariants
//! - Every sequence for one sidecar path runs under that path's lock.
//! - Create/patch operations fall back to an empty document when the read
//!   fails; update/delete report `DocumentNotFound` instead.
//! - Unknown `createdAt` keys are no-ops, not failures: the stored document is
//!   returned as read, without a new `updatedAt` stamp, and written only when
//!   the read had to assign interval keys.
//! - Interval keys assigned while reading are persisted before they are
//!   returned, so a key handed out once keeps matching.
//! - Write failures are returned to the caller.

use crate::clock::{Clock, Timestamp};
use crate::model::document::AnnotationDocument;
use crate::model::interval::{Granularity, IntervalPatch};
use crate::repo::document_repo::{DocumentLoad, DocumentRepository, RepoError};
use crate::repo::lock::DocumentLocks;
use log::{error, info, warn};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

pub type ServiceResult<T> = Result<T, AnnotationServiceError>;

/// Service error for annotation use-cases.
#[derive(Debug)]
pub enum AnnotationServiceError {
    /// Request arguments are unusable.
    InvalidRequest(String),
    /// Update/delete target document is missing or unreadable.
    DocumentNotFound(PathBuf),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for AnnotationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest(details) => write!(f, "invalid request: {details}"),
            Self::DocumentNotFound(path) => {
                write!(f, "annotation document not found: `{}`", path.display())
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AnnotationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AnnotationServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::InvalidMediaPath(path) => {
                Self::InvalidRequest(format!("invalid media path: `{path}`"))
            }
            other => Self::Repo(other),
        }
    }
}

impl AnnotationServiceError {
    /// Stable error code for front-end envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::DocumentNotFound(_) => "document_not_found",
            Self::Repo(_) => "write_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingPolicy {
    StartEmpty,
    RequireExisting,
}

/// Annotation service over a sidecar repository.
///
/// Callers that touch the same files within one process must share one
/// instance; the lock registry lives here.
pub struct AnnotationService<R: DocumentRepository> {
    repo: R,
    clock: Arc<dyn Clock>,
    locks: DocumentLocks,
}

impl<R: DocumentRepository> AnnotationService<R> {
    pub fn new(repo: R, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            locks: DocumentLocks::new(),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Derives the sidecar path without touching disk.
    pub fn sidecar_path(&self, media_path: &Path) -> ServiceResult<PathBuf> {
        Ok(self.repo.sidecar_path(media_path)?)
    }

    /// Ensures a sidecar document exists and returns its path.
    pub fn init(&self, media_path: &Path) -> ServiceResult<PathBuf> {
        let sidecar = self.repo.sidecar_path(media_path)?;
        self.locks.with_lock(&sidecar, || self.repo.init(&sidecar))?;
        Ok(sidecar)
    }

    /// Reads the current document. Missing or unreadable files yield `None`.
    ///
    /// Intervals keyed from the clock during the read are persisted right
    /// away, so the returned keys still match on the next update/delete. If
    /// that write fails the document is still returned; later mutations then
    /// surface the write failure themselves.
    pub fn read(&self, media_path: &Path) -> ServiceResult<Option<AnnotationDocument>> {
        let sidecar = self.repo.sidecar_path(media_path)?;
        Ok(self.locks.with_lock(&sidecar, || match self.repo.read(&sidecar) {
            DocumentLoad::Repaired(document) => {
                if let Err(err) = self.repo.write(&sidecar, &document) {
                    warn!(
                        "event=annotation_read module=service status=error op=persist_keys error_code={} error={}",
                        err.code(),
                        err
                    );
                }
                Some(document)
            }
            load => load.into_document(),
        }))
    }

    /// Starts a new interval at `at_time`, closing open intervals per cascade.
    pub fn add_interval(
        &self,
        media_path: &Path,
        granularity: Granularity,
        at_time: f64,
    ) -> ServiceResult<AnnotationDocument> {
        if !at_time.is_finite() {
            return Err(AnnotationServiceError::InvalidRequest(
                "time must be a finite number".to_string(),
            ));
        }
        self.mutate(
            media_path,
            "annotation_add",
            granularity.label(),
            MissingPolicy::StartEmpty,
            |document, now| {
                document.add_interval(granularity, at_time, now);
                Ok(true)
            },
        )
    }

    pub fn add_act(&self, media_path: &Path, at_time: f64) -> ServiceResult<AnnotationDocument> {
        self.add_interval(media_path, Granularity::Act, at_time)
    }

    pub fn add_section(
        &self,
        media_path: &Path,
        at_time: f64,
    ) -> ServiceResult<AnnotationDocument> {
        self.add_interval(media_path, Granularity::Section, at_time)
    }

    pub fn add_shot(&self, media_path: &Path, at_time: f64) -> ServiceResult<AnnotationDocument> {
        self.add_interval(media_path, Granularity::Shot, at_time)
    }

    /// Applies a tri-state patch to the interval keyed by `created_at`.
    pub fn update_interval(
        &self,
        media_path: &Path,
        granularity: Granularity,
        created_at: Timestamp,
        patch: &IntervalPatch,
    ) -> ServiceResult<AnnotationDocument> {
        self.mutate(
            media_path,
            "annotation_update",
            granularity.label(),
            MissingPolicy::RequireExisting,
            |document, _| Ok(document.update_interval(granularity, created_at, patch)),
        )
    }

    pub fn update_act(
        &self,
        media_path: &Path,
        created_at: Timestamp,
        patch: &IntervalPatch,
    ) -> ServiceResult<AnnotationDocument> {
        self.update_interval(media_path, Granularity::Act, created_at, patch)
    }

    pub fn update_section(
        &self,
        media_path: &Path,
        created_at: Timestamp,
        patch: &IntervalPatch,
    ) -> ServiceResult<AnnotationDocument> {
        self.update_interval(media_path, Granularity::Section, created_at, patch)
    }

    pub fn update_shot(
        &self,
        media_path: &Path,
        created_at: Timestamp,
        patch: &IntervalPatch,
    ) -> ServiceResult<AnnotationDocument> {
        self.update_interval(media_path, Granularity::Shot, created_at, patch)
    }

    /// Removes the interval keyed by `created_at`.
    pub fn delete_interval(
        &self,
        media_path: &Path,
        granularity: Granularity,
        created_at: Timestamp,
    ) -> ServiceResult<AnnotationDocument> {
        self.mutate(
            media_path,
            "annotation_delete",
            granularity.label(),
            MissingPolicy::RequireExisting,
            |document, _| Ok(document.delete_interval(granularity, created_at)),
        )
    }

    pub fn delete_act(
        &self,
        media_path: &Path,
        created_at: Timestamp,
    ) -> ServiceResult<AnnotationDocument> {
        self.delete_interval(media_path, Granularity::Act, created_at)
    }

    pub fn delete_section(
        &self,
        media_path: &Path,
        created_at: Timestamp,
    ) -> ServiceResult<AnnotationDocument> {
        self.delete_interval(media_path, Granularity::Section, created_at)
    }

    pub fn delete_shot(
        &self,
        media_path: &Path,
        created_at: Timestamp,
    ) -> ServiceResult<AnnotationDocument> {
        self.delete_interval(media_path, Granularity::Shot, created_at)
    }

    /// Shallow-merges `fields` into the document root.
    ///
    /// Intended for fields without a dedicated operation, such as `notes`.
    pub fn patch_document(
        &self,
        media_path: &Path,
        fields: &Map<String, Value>,
    ) -> ServiceResult<AnnotationDocument> {
        let clock = Arc::clone(&self.clock);
        self.mutate(
            media_path,
            "annotation_patch",
            "document",
            MissingPolicy::StartEmpty,
            |document, _| {
                *document = document
                    .merge_patch(fields, clock.as_ref())
                    .map_err(|err| AnnotationServiceError::InvalidRequest(err.to_string()))?;
                Ok(true)
            },
        )
    }

    /// Runs one locked read-transform-write sequence.
    ///
    /// `apply` returns whether its target matched. Unmatched runs skip the
    /// stamp and the write.
    fn mutate(
        &self,
        media_path: &Path,
        event: &'static str,
        target: &'static str,
        policy: MissingPolicy,
        apply: impl FnOnce(&mut AnnotationDocument, Timestamp) -> ServiceResult<bool>,
    ) -> ServiceResult<AnnotationDocument> {
        let started_at = Instant::now();
        let sidecar = self.repo.sidecar_path(media_path)?;

        let outcome = self.locks.with_lock(&sidecar, || {
            let mut repaired = false;
            let mut document = match (self.repo.read(&sidecar), policy) {
                (DocumentLoad::Found(document), _) => document,
                (DocumentLoad::Repaired(document), _) => {
                    repaired = true;
                    document
                }
                (_, MissingPolicy::StartEmpty) => AnnotationDocument::new(self.clock.now_millis()),
                (_, MissingPolicy::RequireExisting) => {
                    return Err(AnnotationServiceError::DocumentNotFound(sidecar.clone()));
                }
            };

            let matched = apply(&mut document, self.clock.now_millis())?;
            if matched {
                document.touch(self.clock.now_millis());
            }
            // Clock-assigned keys are persisted even when nothing matched.
            if matched || repaired {
                self.repo.write(&sidecar, &document)?;
            }
            Ok((document, matched))
        });

        match outcome {
            Ok((document, matched)) => {
                let status = if matched { "ok" } else { "noop" };
                info!(
                    "event={event} module=service status={status} target={target} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(document)
            }
            Err(err) => {
                error!(
                    "event={event} module=service status=error target={target} duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                Err(err)
            }
        }
    }
}
