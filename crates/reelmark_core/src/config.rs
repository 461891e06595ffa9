//! Sidecar storage configuration.
//!
//! # Responsibility
//! - Hold the knobs that shape sidecar path derivation and serialization.
//! - Load overrides from the process environment with validation.
//!
//! # Invariants
//! - `extension` is non-empty and contains no dot or path separator.
//! - `placeholder` is never itself an unsafe filename character.

use crate::repo::sidecar::UNSAFE_FILENAME_RE;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Environment variable overriding the sidecar extension.
pub const ENV_SIDECAR_EXTENSION: &str = "REELMARK_SIDECAR_EXTENSION";
/// Environment variable overriding the unsafe-character placeholder.
pub const ENV_SIDECAR_PLACEHOLDER: &str = "REELMARK_SIDECAR_PLACEHOLDER";

const DEFAULT_EXTENSION: &str = "json";
const DEFAULT_PLACEHOLDER: char = '_';

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidExtension(String),
    InvalidPlaceholder(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidExtension(value) => write!(
                f,
                "invalid sidecar extension `{value}`; expected a bare extension like `json`"
            ),
            Self::InvalidPlaceholder(value) => write!(
                f,
                "invalid sidecar placeholder `{value}`; expected one filename-safe character"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Sidecar document settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarConfig {
    /// Extension replacing the media file's own extension.
    pub extension: String,
    /// Replacement for unsafe characters in the base name.
    pub placeholder: char,
    /// Pretty-print documents with two-space indentation.
    pub pretty: bool,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            placeholder: DEFAULT_PLACEHOLDER,
            pretty: true,
        }
    }
}

impl SidecarConfig {
    /// Builds a validated config.
    ///
    /// # Errors
    /// - `InvalidExtension` when `extension` is empty or has `.`/separators.
    /// - `InvalidPlaceholder` when `placeholder` is an unsafe character.
    pub fn new(extension: &str, placeholder: char, pretty: bool) -> Result<Self, ConfigError> {
        Ok(Self {
            extension: validate_extension(extension)?,
            placeholder: validate_placeholder(placeholder)?,
            pretty,
        })
    }

    /// Loads the default config with environment overrides applied.
    ///
    /// Blank variables are treated as unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = non_blank(lookup(ENV_SIDECAR_EXTENSION)) {
            config.extension = validate_extension(&raw)?;
        }
        if let Some(raw) = non_blank(lookup(ENV_SIDECAR_PLACEHOLDER)) {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(single), None) => config.placeholder = validate_placeholder(single)?,
                _ => return Err(ConfigError::InvalidPlaceholder(raw)),
            }
        }
        Ok(config)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

fn validate_extension(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let valid = !trimmed.is_empty()
        && !trimmed.contains('.')
        && !UNSAFE_FILENAME_RE.is_match(trimmed);
    if valid {
        Ok(trimmed.to_string())
    } else {
        Err(ConfigError::InvalidExtension(raw.to_string()))
    }
}

fn validate_placeholder(placeholder: char) -> Result<char, ConfigError> {
    let mut buf = [0_u8; 4];
    if UNSAFE_FILENAME_RE.is_match(placeholder.encode_utf8(&mut buf)) || placeholder.is_control() {
        Err(ConfigError::InvalidPlaceholder(placeholder.to_string()))
    } else {
        Ok(placeholder)
    }
}
