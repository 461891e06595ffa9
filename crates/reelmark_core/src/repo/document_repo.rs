//! Sidecar document repository contracts and filesystem implementation.
//!
//! # Responsibility
//! - Create, read and overwrite one JSON sidecar document per media file.
//! - Route every persisted read through `AnnotationDocument::from_value_counting_keys`.
//!
//! # Invariants
//! - `init` never overwrites an existing document.
//! - `read` never fails: missing and unreadable files are explicit outcomes.
//! - `write` replaces the whole file atomically (temp file + rename).
//!
//! # See also
//! - `crate::repo::sidecar` for path derivation rules.

use crate::clock::Clock;
use crate::config::SidecarConfig;
use crate::model::document::AnnotationDocument;
use crate::repo::sidecar::sidecar_path_for;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for sidecar path derivation and file writes.
#[derive(Debug)]
pub enum RepoError {
    /// Media path cannot be mapped to a sidecar document.
    InvalidMediaPath(String),
    /// Filesystem failure on the given path.
    Io { path: PathBuf, source: io::Error },
    /// Document could not be encoded.
    Serialize(serde_json::Error),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMediaPath(path) => write!(f, "invalid media path: `{path}`"),
            Self::Io { path, source } => write!(f, "io error at `{}`: {source}", path.display()),
            Self::Serialize(err) => write!(f, "document serialization failed: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidMediaPath(_) => None,
            Self::Io { source, .. } => Some(source),
            Self::Serialize(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

impl RepoError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Stable error code used in log events and front-end envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidMediaPath(_) => "invalid_media_path",
            Self::Io { .. } => "io_failed",
            Self::Serialize(_) => "serialize_failed",
        }
    }
}

/// Result of reading one sidecar document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentLoad {
    /// Document parsed and validated.
    Found(AnnotationDocument),
    /// Document parsed, but some intervals had no usable stored `createdAt`
    /// and were keyed from the clock. Persist it before handing keys out.
    Repaired(AnnotationDocument),
    /// No document exists at the sidecar path.
    Missing,
    /// File exists but cannot be read or parsed.
    Unreadable(String),
}

impl DocumentLoad {
    /// Collapses to the document, treating missing/unreadable as absent.
    pub fn into_document(self) -> Option<AnnotationDocument> {
        match self {
            Self::Found(document) | Self::Repaired(document) => Some(document),
            Self::Missing | Self::Unreadable(_) => None,
        }
    }
}

/// Repository interface for sidecar documents.
///
/// All methods except `sidecar_path` take the already-derived sidecar path.
pub trait DocumentRepository {
    /// Derives the sidecar path for a media file.
    fn sidecar_path(&self, media_path: &Path) -> RepoResult<PathBuf>;
    /// Writes an empty document when none exists. Returns `true` if created.
    fn init(&self, sidecar: &Path) -> RepoResult<bool>;
    /// Reads and validates the document.
    fn read(&self, sidecar: &Path) -> DocumentLoad;
    /// Replaces the whole document.
    fn write(&self, sidecar: &Path, document: &AnnotationDocument) -> RepoResult<()>;
}

/// Filesystem-backed sidecar repository.
pub struct FsDocumentRepository {
    config: SidecarConfig,
    clock: Arc<dyn Clock>,
}

impl FsDocumentRepository {
    pub fn new(config: SidecarConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &SidecarConfig {
        &self.config
    }

    fn encode(&self, document: &AnnotationDocument) -> RepoResult<Vec<u8>> {
        let bytes = if self.config.pretty {
            serde_json::to_vec_pretty(document)?
        } else {
            serde_json::to_vec(document)?
        };
        Ok(bytes)
    }

    /// Writes `bytes` to a temp file next to `sidecar`, then moves it in place.
    fn write_atomic(&self, sidecar: &Path, bytes: &[u8], clobber: bool) -> RepoResult<bool> {
        let dir = ensure_parent_dir(sidecar)?;
        let mut staged = NamedTempFile::new_in(&dir).map_err(|err| RepoError::io(&dir, err))?;
        staged
            .write_all(bytes)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|err| RepoError::io(staged.path(), err))?;

        let persisted = if clobber {
            staged.persist(sidecar)
        } else {
            staged.persist_noclobber(sidecar)
        };
        match persisted {
            Ok(_) => Ok(true),
            Err(err) if !clobber && err.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(RepoError::io(sidecar, err.error)),
        }
    }
}

impl DocumentRepository for FsDocumentRepository {
    fn sidecar_path(&self, media_path: &Path) -> RepoResult<PathBuf> {
        sidecar_path_for(media_path, &self.config)
    }

    fn init(&self, sidecar: &Path) -> RepoResult<bool> {
        if sidecar.exists() {
            info!("event=sidecar_init module=repo status=ok created=false");
            return Ok(false);
        }

        let document = AnnotationDocument::new(self.clock.now_millis());
        let bytes = self.encode(&document)?;
        match self.write_atomic(sidecar, &bytes, false) {
            Ok(created) => {
                info!("event=sidecar_init module=repo status=ok created={created}");
                Ok(created)
            }
            Err(err) => {
                error!(
                    "event=sidecar_init module=repo status=error error_code={} error={}",
                    err.code(),
                    err
                );
                Err(err)
            }
        }
    }

    fn read(&self, sidecar: &Path) -> DocumentLoad {
        let raw = match std::fs::read(sidecar) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return DocumentLoad::Missing,
            Err(err) => {
                warn!("event=sidecar_read module=repo status=error error_code=io_failed error={err}");
                return DocumentLoad::Unreadable(err.to_string());
            }
        };

        let parsed = serde_json::from_slice::<serde_json::Value>(&raw)
            .map_err(|err| err.to_string())
            .and_then(|value| {
                AnnotationDocument::from_value_counting_keys(&value, self.clock.as_ref())
                    .map_err(|err| err.to_string())
            });
        match parsed {
            Ok((document, 0)) => DocumentLoad::Found(document),
            Ok((document, assigned)) => {
                info!("event=sidecar_read module=repo status=repaired assigned_keys={assigned}");
                DocumentLoad::Repaired(document)
            }
            Err(reason) => {
                warn!(
                    "event=sidecar_read module=repo status=error error_code=invalid_document bytes={}",
                    raw.len()
                );
                DocumentLoad::Unreadable(reason)
            }
        }
    }

    fn write(&self, sidecar: &Path, document: &AnnotationDocument) -> RepoResult<()> {
        let started_at = Instant::now();
        let bytes = self.encode(document)?;
        match self.write_atomic(sidecar, &bytes, true) {
            Ok(_) => {
                info!(
                    "event=sidecar_write module=repo status=ok bytes={} duration_ms={}",
                    bytes.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=sidecar_write module=repo status=error duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                Err(err)
            }
        }
    }
}

/// Creates the sidecar's directory if needed and returns it.
fn ensure_parent_dir(sidecar: &Path) -> RepoResult<PathBuf> {
    let dir = match sidecar.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|err| RepoError::io(&dir, err))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::{DocumentLoad, DocumentRepository, FsDocumentRepository};
    use crate::clock::SystemClock;
    use crate::config::SidecarConfig;
    use std::sync::Arc;

    fn repo() -> FsDocumentRepository {
        FsDocumentRepository::new(SidecarConfig::default(), Arc::new(SystemClock::new()))
    }

    #[test]
    fn read_distinguishes_missing_from_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("clip.json");
        assert_eq!(repo().read(&sidecar), DocumentLoad::Missing);

        std::fs::write(&sidecar, "{ not json").unwrap();
        assert!(matches!(repo().read(&sidecar), DocumentLoad::Unreadable(_)));

        std::fs::write(&sidecar, "[]").unwrap();
        assert!(matches!(repo().read(&sidecar), DocumentLoad::Unreadable(_)));
    }

    #[test]
    fn write_leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("clip.json");
        let repo = repo();
        repo.init(&sidecar).unwrap();
        let document = repo.read(&sidecar).into_document().unwrap();
        repo.write(&sidecar, &document).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("clip.json")]);
    }

    #[test]
    fn pretty_output_uses_two_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("clip.json");
        repo().init(&sidecar).unwrap();

        let text = std::fs::read_to_string(&sidecar).unwrap();
        assert!(text.starts_with("{\n  \"createdAt\""), "{text}");
    }

    #[test]
    fn clock_keyed_intervals_read_as_repaired_until_written() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("clip.json");
        std::fs::write(&sidecar, r#"{"createdAt":1,"notes":[],"acts":[{"time":3}]}"#).unwrap();
        let repo = repo();

        let DocumentLoad::Repaired(document) = repo.read(&sidecar) else {
            panic!("document without stored keys should read as repaired");
        };
        repo.write(&sidecar, &document).unwrap();
        assert_eq!(repo.read(&sidecar), DocumentLoad::Found(document));
    }
}
