//! Error handling for WaveStudio
//!
//! Every failure is reported as a structured `StudioError`; nothing is retried
//! automatically. The host decides whether to prompt the user again.

use thiserror::Error;

/// Result type alias for WaveStudio operations
pub type Result<T> = std::result::Result<T, StudioError>;

/// Main error type for WaveStudio operations
#[derive(Error, Debug)]
pub enum StudioError {
    // Input Errors
    #[error("Invalid input type: '{mime_type}' is not an audio type")]
    InvalidInputType { mime_type: String },

    #[error("File too large: {size} bytes (maximum {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Failed to decode audio: {reason}")]
    DecodeError {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Buffer Errors
    #[error("Invalid sample buffer: {reason}")]
    InvalidBuffer { reason: String },

    #[error("No audio loaded")]
    NoBufferLoaded,

    // Parameter Errors
    #[error("Invalid parameter '{param}': got {value}, expected {expected}")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StudioError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            StudioError::InvalidInputType { .. } => "INVALID_INPUT_TYPE",
            StudioError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            StudioError::DecodeError { .. } => "DECODE_ERROR",
            StudioError::InvalidBuffer { .. } => "INVALID_BUFFER",
            StudioError::NoBufferLoaded => "NO_BUFFER_LOADED",
            StudioError::InvalidParameter { .. } => "INVALID_PARAMETER",
            StudioError::Io(_) => "IO_ERROR",
            StudioError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the user can recover by supplying different input
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StudioError::InvalidInputType { .. }
                | StudioError::FileTooLarge { .. }
                | StudioError::DecodeError { .. }
                | StudioError::NoBufferLoaded
                | StudioError::InvalidParameter { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            StudioError::InvalidInputType { .. } => vec![
                "Please upload an audio file (MP3, WAV, etc.)",
                "Check that the file extension matches its contents",
            ],
            StudioError::FileTooLarge { .. } => vec![
                "Maximum file size is 10MB",
                "Trim the clip in another editor before uploading",
            ],
            StudioError::DecodeError { .. } => vec![
                "Check if the file plays in another application",
                "The file may be corrupted - try re-exporting from source",
                "Try converting the file to WAV format first",
            ],
            StudioError::NoBufferLoaded => vec!["Load an audio file before editing"],
            _ => vec![],
        }
    }
}
