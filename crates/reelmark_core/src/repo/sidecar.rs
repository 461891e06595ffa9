//! Sidecar path derivation.
//!
//! # Responsibility
//! - Map a media file path to its predictable annotation document path.
//!
//! # Invariants
//! - The sidecar lives in the media file's directory.
//! - Base name = media file stem with `< > : " / \ | ? *` replaced.
//! - The derived path never equals the media path itself.

use crate::config::SidecarConfig;
use crate::repo::document_repo::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use std::path::{Path, PathBuf};

pub(crate) static UNSAFE_FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("valid unsafe filename regex"));

/// Derives the sidecar document path for `media_path`.
///
/// # Errors
/// - `InvalidMediaPath` when the path is blank, has no file name, or would
///   map onto itself (a media file already carrying the sidecar extension).
pub fn sidecar_path_for(media_path: &Path, config: &SidecarConfig) -> RepoResult<PathBuf> {
    let stem = media_path
        .file_stem()
        .ok_or_else(|| RepoError::InvalidMediaPath(media_path.display().to_string()))?;
    let stem = stem.to_string_lossy();

    let mut placeholder = [0_u8; 4];
    let safe_stem = UNSAFE_FILENAME_RE.replace_all(
        &stem,
        NoExpand(config.placeholder.encode_utf8(&mut placeholder)),
    );
    let file_name = format!("{safe_stem}.{}", config.extension);

    let sidecar = match media_path.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    };

    if sidecar == media_path {
        return Err(RepoError::InvalidMediaPath(format!(
            "{} is already a sidecar document",
            media_path.display()
        )));
    }
    Ok(sidecar)
}
