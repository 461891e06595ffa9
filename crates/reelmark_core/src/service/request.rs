//! Untyped front-end payload parsing.
//!
//! # Responsibility
//! - Turn JSON payloads into typed service requests.
//! - Map malformed input to `None`; parsing never fails loudly.
//!
//! # Invariants
//! - The media path key is `videoPath`; `mediaPath` is accepted as an alias.
//! - Media paths must be non-blank strings.
//! - Update payload fields keep their unset/null/value distinction.

use crate::clock::Timestamp;
use crate::model::interval::{json_seconds, json_timestamp, IntervalPatch};
use serde_json::{Map, Value};
use std::path::PathBuf;

const MEDIA_PATH_KEYS: [&str; 2] = ["videoPath", "mediaPath"];

/// Request carrying only a media path (`init`, `read`).
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRequest {
    pub media_path: PathBuf,
}

/// Request to start a new interval.
#[derive(Debug, Clone, PartialEq)]
pub struct AddIntervalRequest {
    pub media_path: PathBuf,
    pub time: f64,
}

/// Request to patch one interval.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateIntervalRequest {
    pub media_path: PathBuf,
    pub created_at: Timestamp,
    pub patch: IntervalPatch,
}

/// Request to delete one interval.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteIntervalRequest {
    pub media_path: PathBuf,
    pub created_at: Timestamp,
}

/// Request to shallow-merge fields into the document root.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchDocumentRequest {
    pub media_path: PathBuf,
    pub fields: Map<String, Value>,
}

impl MediaRequest {
    /// Accepts `{ "videoPath": "..." }` or a bare path string.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let media_path = match payload {
            Value::String(raw) => non_blank_path(raw)?,
            other => media_path(other.as_object()?)?,
        };
        Some(Self { media_path })
    }
}

impl AddIntervalRequest {
    /// Accepts `{ "videoPath": "...", "time": <number> }`.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let fields = payload.as_object()?;
        Some(Self {
            media_path: media_path(fields)?,
            time: fields.get("time").and_then(json_seconds)?,
        })
    }
}

impl UpdateIntervalRequest {
    /// Accepts `{ "videoPath", "createdAt", "start"?, "end"?, "title"?, "note"? }`.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let fields = payload.as_object()?;
        Some(Self {
            media_path: media_path(fields)?,
            created_at: fields.get("createdAt").and_then(json_timestamp)?,
            patch: IntervalPatch::from_json_fields(fields),
        })
    }
}

impl DeleteIntervalRequest {
    /// Accepts `{ "videoPath": "...", "createdAt": <integer> }`.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let fields = payload.as_object()?;
        Some(Self {
            media_path: media_path(fields)?,
            created_at: fields.get("createdAt").and_then(json_timestamp)?,
        })
    }
}

impl PatchDocumentRequest {
    /// Accepts `{ "videoPath": "...", "patch": { ... } }`.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let fields = payload.as_object()?;
        Some(Self {
            media_path: media_path(fields)?,
            fields: fields.get("patch")?.as_object()?.clone(),
        })
    }
}

fn media_path(fields: &Map<String, Value>) -> Option<PathBuf> {
    MEDIA_PATH_KEYS
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_str))
        .and_then(non_blank_path)
}

fn non_blank_path(raw: &str) -> Option<PathBuf> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(PathBuf::from(raw))
    }
}
