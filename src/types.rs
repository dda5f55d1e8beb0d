//! Core data types shared by the stages, the orchestrator and the server

use crate::error::{BgReplaceError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Prompt used by the production pipeline when the client supplies none
pub const DEFAULT_PROMPT: &str = "professional studio background with soft lighting";

/// Prompt used by the simulation endpoint when the client supplies none
pub const DEFAULT_TEST_PROMPT: &str = "beach sunset background";

/// Fallback MIME type when neither the client nor a provider declares one
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// The two transformation steps of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Foreground extraction
    BackgroundRemoval,
    /// New background synthesis
    BackgroundGeneration,
}

impl PipelineStage {
    /// Label used as the prefix of stage failure messages
    #[must_use]
    pub fn failure_label(&self) -> &'static str {
        match self {
            PipelineStage::BackgroundRemoval => "Background removal",
            PipelineStage::BackgroundGeneration => "AI background generation",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BackgroundRemoval => write!(f, "background_removal"),
            Self::BackgroundGeneration => write!(f, "background_generation"),
        }
    }
}

/// Raw image bytes plus the metadata that travelled with them
///
/// Assets are immutable: a stage that transforms an asset returns a new one.
/// Cloning is cheap because the payload is reference counted.
#[derive(Clone, PartialEq, Eq)]
pub struct Asset {
    bytes: Bytes,
    mime_type: String,
    original_name: String,
}

impl Asset {
    /// Create an asset, rejecting empty payloads
    ///
    /// # Errors
    /// - `InvalidUpload` when `bytes` is empty
    pub fn new(
        bytes: impl Into<Bytes>,
        mime_type: impl Into<String>,
        original_name: impl Into<String>,
    ) -> Result<Self> {
        let bytes = bytes.into();
        let original_name = original_name.into();
        if bytes.is_empty() {
            return Err(BgReplaceError::invalid_upload(format!(
                "'{}' contains no data",
                original_name
            )));
        }

        let mime_type = mime_type.into();
        let mime_type = if mime_type.trim().is_empty() {
            DEFAULT_MIME_TYPE.to_string()
        } else {
            mime_type
        };

        Ok(Self {
            bytes,
            mime_type,
            original_name,
        })
    }

    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    #[must_use]
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

impl std::fmt::Debug for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Asset")
            .field("mime_type", &self.mime_type)
            .field("original_name", &self.original_name)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// One pipeline invocation; created at request entry and dropped after the response
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    pub id: Uuid,
    pub source: Asset,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

impl ProcessingRequest {
    /// Create a request, substituting [`DEFAULT_PROMPT`] for a missing or empty prompt
    #[must_use]
    pub fn new(source: Asset, prompt: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            prompt: resolve_prompt(prompt, DEFAULT_PROMPT),
            created_at: Utc::now(),
        }
    }
}

/// Use `prompt` verbatim unless it is missing or empty, otherwise `default`
#[must_use]
pub fn resolve_prompt(prompt: Option<&str>, default: &str) -> String {
    prompt
        .filter(|p| !p.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Reference to a generated background: a hosted URL or an inline data URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessedReference {
    /// Image hosted by a provider or a placeholder service
    Url(String),
    /// Image embedded as `data:<mime>;base64,<payload>`
    DataUri(String),
}

impl ProcessedReference {
    /// Wrap an inline base64 payload into a data URI
    #[must_use]
    pub fn from_base64(mime_type: &str, payload: &str) -> Self {
        Self::DataUri(format!("data:{};base64,{}", mime_type, payload))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Url(s) | Self::DataUri(s) => s,
        }
    }

    #[must_use]
    pub fn is_data_uri(&self) -> bool {
        matches!(self, Self::DataUri(_))
    }
}

impl std::fmt::Display for ProcessedReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProcessedReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Outcome of a successful pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingResult {
    pub foreground_description: String,
    pub processed_reference: ProcessedReference,
    pub prompt: String,
    pub elapsed_millis: u64,
}

impl ProcessingResult {
    /// Elapsed time rendered the way clients expect it (`"1234ms"`)
    #[must_use]
    pub fn processing_time(&self) -> String {
        format_millis(self.elapsed_millis)
    }
}

/// Outcome of the simulated pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedResult {
    pub original: String,
    pub processed: String,
    pub prompt: String,
    pub elapsed_millis: u64,
    pub steps: Vec<String>,
}

impl SimulatedResult {
    #[must_use]
    pub fn processing_time(&self) -> String {
        format_millis(self.elapsed_millis)
    }
}

/// Whole milliseconds, rounded up, never below 1
#[must_use]
pub fn elapsed_millis(elapsed: std::time::Duration) -> u64 {
    let micros = elapsed.as_micros();
    let millis = micros.div_ceil(1000);
    u64::try_from(millis).unwrap_or(u64::MAX).max(1)
}

fn format_millis(millis: u64) -> String {
    format!("{}ms", millis)
}
