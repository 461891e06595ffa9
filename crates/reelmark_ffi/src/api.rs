//! FFI use-case API for front-end analysis calls.
//!
//! # Responsibility
//! - Expose one sync function per annotation request via FRB.
//! - Accept untyped JSON payloads and answer with JSON documents.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Read-style calls answer malformed payloads with `None`; mutating calls
//!   and `analysis_init` answer with an `invalid_request` envelope.
//! - Save failures are reported through `AnalysisResponse`, never dropped.
//! - One process-wide service instance serializes same-document writes.

use log::warn;
use reelmark_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    AddIntervalRequest, AnnotationDocument, AnnotationService, AnnotationServiceError, Clock,
    DeleteIntervalRequest, FsDocumentRepository, Granularity, MediaRequest, PatchDocumentRequest,
    ServiceResult, SidecarConfig, SystemClock, UpdateIntervalRequest,
};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

type FsAnnotationService = AnnotationService<FsDocumentRepository>;

static ANALYSIS_SERVICE: OnceLock<Result<FsAnnotationService, String>> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Exposes core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Result envelope for mutating analysis calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResponse {
    /// Whether the change was applied (or was a documented no-op).
    pub ok: bool,
    /// Updated document as JSON text.
    pub document: Option<String>,
    /// `invalid_request`, `document_not_found`, `write_failed` or `invalid_config`.
    pub error_code: Option<String>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
}

impl AnalysisResponse {
    fn success(document: &AnnotationDocument) -> Self {
        Self {
            ok: true,
            document: Some(document.to_value().to_string()),
            error_code: None,
            message: "Saved.".to_string(),
        }
    }

    fn failure(code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            document: None,
            error_code: Some(code.to_string()),
            message: message.into(),
        }
    }

    fn invalid_request(operation: &str) -> Self {
        Self::failure(
            "invalid_request",
            format!("{operation}: missing or malformed request fields"),
        )
    }
}

/// Previews the sidecar path for `{ "videoPath" }` without touching disk.
#[flutter_rust_bridge::frb(sync)]
pub fn analysis_sidecar_path(payload_json: String) -> Option<String> {
    let request = media_request(&payload_json)?;
    let service = analysis_service().ok()?;
    service
        .sidecar_path(&request.media_path)
        .ok()
        .map(|path| path.to_string_lossy().into_owned())
}

/// Result envelope for `analysis_init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisInitResponse {
    pub ok: bool,
    /// Sidecar path of the ensured document.
    pub sidecar_path: Option<String>,
    /// `invalid_request`, `write_failed` or `invalid_config`.
    pub error_code: Option<String>,
    pub message: String,
}

impl AnalysisInitResponse {
    fn failure(code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            sidecar_path: None,
            error_code: Some(code.to_string()),
            message: message.into(),
        }
    }
}

/// Ensures the sidecar document exists and returns its path.
///
/// # FFI contract
/// - Never overwrites an existing document.
/// - Malformed payloads yield `invalid_request`; failing to create the
///   directory or file yields `write_failed`.
#[flutter_rust_bridge::frb(sync)]
pub fn analysis_init(payload_json: String) -> AnalysisInitResponse {
    const OPERATION: &str = "analysis_init";
    let Some(request) = media_request(&payload_json) else {
        return AnalysisInitResponse::failure(
            "invalid_request",
            format!("{OPERATION}: missing or malformed request fields"),
        );
    };
    let service = match analysis_service() {
        Ok(service) => service,
        Err(message) => {
            return AnalysisInitResponse::failure(
                "invalid_config",
                format!("{OPERATION} failed: {message}"),
            );
        }
    };
    match service.init(&request.media_path) {
        Ok(path) => AnalysisInitResponse {
            ok: true,
            sidecar_path: Some(path.to_string_lossy().into_owned()),
            error_code: None,
            message: "Ready.".to_string(),
        },
        Err(err) => {
            warn!(
                "event=ffi_call module=ffi status=error op={OPERATION} error_code={}",
                err.code()
            );
            AnalysisInitResponse::failure(err.code(), format!("{OPERATION} failed: {err}"))
        }
    }
}

/// Reads the sidecar document as JSON text. Missing or unreadable yields `None`.
#[flutter_rust_bridge::frb(sync)]
pub fn analysis_read(payload_json: String) -> Option<String> {
    let request = media_request(&payload_json)?;
    let service = analysis_service().ok()?;
    service
        .read(&request.media_path)
        .ok()
        .flatten()
        .map(|document| document.to_value().to_string())
}

/// Starts a new act at `{ "videoPath", "time" }`.
#[flutter_rust_bridge::frb(sync)]
pub fn analysis_add_act(payload_json: String) -> AnalysisResponse {
    add_interval("analysis_add_act", Granularity::Act, &payload_json)
}

/// Starts a new section at `{ "videoPath", "time" }`.
#[flutter_rust_bridge::frb(sync)]
pub fn analysis_add_section(payload_json: String) -> AnalysisResponse {
    add_interval("analysis_add_section", Granularity::Section, &payload_json)
}

/// Starts a new shot at `{ "videoPath", "time" }`.
#[flutter_rust_bridge::frb(sync)]
pub fn analysis_add_shot(payload_json: String) -> AnalysisResponse {
    add_interval("analysis_add_shot", Granularity::Shot, &payload_json)
}

/// Patches one act: `{ "videoPath", "createdAt", "start"?, "end"?, "title"?, "note"? }`.
///
/// `null` clears a field (`end: null` reopens the act); missing fields stay.
#[flutter_rust_bridge::frb(sync)]
pub fn analysis_update_act(payload_json: String) -> AnalysisResponse {
    update_interval("analysis_update_act", Granularity::Act, &payload_json)
}

/// Patches one section. Same payload shape as `analysis_update_act`.
#[flutter_rust_bridge::frb(sync)]
pub fn analysis_update_section(payload_json: String) -> AnalysisResponse {
    update_interval("analysis_update_section", Granularity::Section, &payload_json)
}

/// Patches one shot. Same payload shape as `analysis_update_act`.
#[flutter_rust_bridge::frb(sync)]
pub fn analysis_update_shot(payload_json: String) -> AnalysisResponse {
    update_interval("analysis_update_shot", Granularity::Shot, &payload_json)
}

/// Deletes one act: `{ "videoPath", "createdAt" }`. Unknown keys are a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn analysis_delete_act(payload_json: String) -> AnalysisResponse {
    delete_interval("analysis_delete_act", Granularity::Act, &payload_json)
}

#[flutter_rust_bridge::frb(sync)]
pub fn analysis_delete_section(payload_json: String) -> AnalysisResponse {
    delete_interval("analysis_delete_section", Granularity::Section, &payload_json)
}

#[flutter_rust_bridge::frb(sync)]
pub fn analysis_delete_shot(payload_json: String) -> AnalysisResponse {
    delete_interval("analysis_delete_shot", Granularity::Shot, &payload_json)
}

/// Shallow-merges `{ "videoPath", "patch": { ... } }` into the document root.
#[flutter_rust_bridge::frb(sync)]
pub fn analysis_patch(payload_json: String) -> AnalysisResponse {
    const OPERATION: &str = "analysis_patch";
    let Some(request) = parse_payload(&payload_json)
        .and_then(|payload| PatchDocumentRequest::from_payload(&payload))
    else {
        return AnalysisResponse::invalid_request(OPERATION);
    };
    respond(OPERATION, |service| {
        service.patch_document(&request.media_path, &request.fields)
    })
}

fn add_interval(operation: &str, granularity: Granularity, payload_json: &str) -> AnalysisResponse {
    let Some(request) =
        parse_payload(payload_json).and_then(|payload| AddIntervalRequest::from_payload(&payload))
    else {
        return AnalysisResponse::invalid_request(operation);
    };
    respond(operation, |service| {
        service.add_interval(&request.media_path, granularity, request.time)
    })
}

fn update_interval(
    operation: &str,
    granularity: Granularity,
    payload_json: &str,
) -> AnalysisResponse {
    let Some(request) = parse_payload(payload_json)
        .and_then(|payload| UpdateIntervalRequest::from_payload(&payload))
    else {
        return AnalysisResponse::invalid_request(operation);
    };
    respond(operation, |service| {
        service.update_interval(
            &request.media_path,
            granularity,
            request.created_at,
            &request.patch,
        )
    })
}

fn delete_interval(
    operation: &str,
    granularity: Granularity,
    payload_json: &str,
) -> AnalysisResponse {
    let Some(request) = parse_payload(payload_json)
        .and_then(|payload| DeleteIntervalRequest::from_payload(&payload))
    else {
        return AnalysisResponse::invalid_request(operation);
    };
    respond(operation, |service| {
        service.delete_interval(&request.media_path, granularity, request.created_at)
    })
}

fn respond(
    operation: &str,
    f: impl FnOnce(&FsAnnotationService) -> ServiceResult<AnnotationDocument>,
) -> AnalysisResponse {
    let service = match analysis_service() {
        Ok(service) => service,
        Err(message) => {
            return AnalysisResponse::failure(
                "invalid_config",
                format!("{operation} failed: {message}"),
            );
        }
    };
    match f(service) {
        Ok(document) => AnalysisResponse::success(&document),
        Err(err) => failure_from(operation, &err),
    }
}

fn failure_from(operation: &str, err: &AnnotationServiceError) -> AnalysisResponse {
    AnalysisResponse::failure(err.code(), format!("{operation} failed: {err}"))
}

fn parse_payload(raw: &str) -> Option<Value> {
    serde_json::from_str(raw).ok()
}

fn media_request(raw: &str) -> Option<MediaRequest> {
    parse_payload(raw).and_then(|payload| MediaRequest::from_payload(&payload))
}

fn analysis_service() -> Result<&'static FsAnnotationService, String> {
    ANALYSIS_SERVICE
        .get_or_init(|| {
            let config = SidecarConfig::from_env().map_err(|err| err.to_string())?;
            let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
            let repo = FsDocumentRepository::new(config, Arc::clone(&clock));
            Ok(AnnotationService::new(repo, clock))
        })
        .as_ref()
        .map_err(String::clone)
}
