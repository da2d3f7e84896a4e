//! Error types for Vidnotes.

use crate::stage::Stage;
use std::time::Duration;
use thiserror::Error;

/// Library-level error type for Vidnotes operations.
#[derive(Error, Debug)]
pub enum VidnotesError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Credential missing: {0}")]
    CredentialMissing(String),

    #[error("Audio extraction failed: {0}")]
    Extraction(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Notes generation failed: {0}")]
    Generation(String),

    #[error("{stage} stage timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("Cancelled before completion")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl VidnotesError {
    /// Whether this error aborts the whole run rather than a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VidnotesError::InvalidInput(_)
                | VidnotesError::CredentialMissing(_)
                | VidnotesError::Config(_)
                | VidnotesError::ToolNotFound(_)
        )
    }
}

/// Result type alias for Vidnotes operations.
pub type Result<T> = std::result::Result<T, VidnotesError>;
