//! Error types for background replacement operations

use crate::types::PipelineStage;
use thiserror::Error;

/// Result type alias for background replacement operations
pub type Result<T> = std::result::Result<T, BgReplaceError>;

/// Error types for upload handling, provider calls and the two-stage pipeline
#[derive(Error, Debug)]
pub enum BgReplaceError {
    /// The request carried no file
    #[error("No file uploaded")]
    MissingUpload,

    /// The uploaded file exceeds the configured ceiling
    #[error("File size {size} bytes exceeds maximum allowed size of {limit} bytes")]
    UploadTooLarge { size: usize, limit: usize },

    /// The upload was present but unusable (empty, undecodable payload, ...)
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// An external provider answered with a non-success response
    #[error("{provider} request failed: {message}")]
    Provider { provider: String, message: String },

    /// Transport-level failure talking to an external provider
    #[error("Network error: {0}")]
    Network(String),

    /// One of the pipeline stages failed
    #[error("{} failed: {cause}", .stage.failure_label())]
    Stage { stage: PipelineStage, cause: String },

    /// Orchestrator-level failure wrapping the stage that aborted the pipeline
    #[error("Processing failed: {message}")]
    Processing { stage: PipelineStage, message: String },

    /// No worker slot became free within the admission timeout
    #[error("Server busy: {0}")]
    Busy(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A progress channel was asked for a transition its state machine forbids
    #[error("Invalid progress transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Input/output errors (bind failures, static directory access, ...)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgReplaceError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new invalid upload error
    pub fn invalid_upload<S: Into<String>>(msg: S) -> Self {
        Self::InvalidUpload(msg.into())
    }

    /// Create a new provider error
    pub fn provider<P: Into<String>, S: Into<String>>(provider: P, msg: S) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a network error with operation context
    pub fn network_error(context: &str, error: impl std::fmt::Display) -> Self {
        Self::Network(format!("{}: {}", context, error))
    }

    /// Create a provider error from a non-success HTTP status and response body
    pub fn provider_status(provider: &str, status: u16, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("Request failed with status code {}", status)
        } else {
            format!("Request failed with status code {}: {}", status, body)
        };
        Self::provider(provider, message)
    }

    /// Wrap any error raised inside a stage with the stage it came from
    pub fn stage(stage: PipelineStage, cause: &BgReplaceError) -> Self {
        Self::Stage {
            stage,
            cause: cause.to_string(),
        }
    }

    /// Normalize a stage failure into the orchestrator's uniform failure
    pub fn processing(stage: PipelineStage, cause: &BgReplaceError) -> Self {
        Self::Processing {
            stage,
            message: cause.to_string(),
        }
    }

    /// Stage that failed, for stage and processing errors
    #[must_use]
    pub fn failed_stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Stage { stage, .. } | Self::Processing { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether this error was caused by the client's upload rather than the pipeline
    #[must_use]
    pub fn is_upload_error(&self) -> bool {
        matches!(
            self,
            Self::MissingUpload | Self::UploadTooLarge { .. } | Self::InvalidUpload(_)
        )
    }
}
