//! Provider backends for the two pipeline stages
//!
//! Every backend exposes the same capability-check-then-invoke contract:
//! a stage walks its ordered list, asks each backend whether it is
//! available, and invokes the first one that is. Adding a provider means
//! adding a backend to the list, not touching orchestration.
//!
//! - remove.bg (background removal, needs a credential)
//! - `OpenAI` images (primary generation, needs a credential)
//! - Stability AI (secondary generation, needs a credential)
//! - Simulated removal and generation (always available)

pub mod openai;
pub mod remove_bg;
pub mod simulated;
pub mod stability;

// Scripted backends for stage and processor tests
#[cfg(test)]
pub mod test_utils;

pub use self::openai::OpenAiGenerationBackend;
pub use self::remove_bg::RemoveBgBackend;
pub use self::simulated::{PassThroughRemovalBackend, PlaceholderGenerationBackend};
pub use self::stability::StabilityGenerationBackend;

use crate::error::{BgReplaceError, Result};
use crate::types::{Asset, ProcessedReference};
use async_trait::async_trait;

/// A provider able to strip the background from an asset
#[async_trait]
pub trait RemovalBackend: Send + Sync {
    /// Provider name used in logs and error messages
    fn name(&self) -> &'static str;

    /// Whether the backend may be selected (credential present, ...)
    fn is_available(&self) -> bool;

    /// Produce a new foreground-only asset
    ///
    /// # Errors
    /// - Transport failures or non-success provider responses
    async fn remove(&self, asset: &Asset) -> Result<Asset>;
}

/// A provider able to synthesize a background for a prompt
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Provider name used in logs and error messages
    fn name(&self) -> &'static str;

    /// Whether the backend may be selected (credential present, ...)
    fn is_available(&self) -> bool;

    /// Generate a background and return a URL or data URI referencing it
    ///
    /// `foreground` is the output of the removal stage; current providers
    /// only use the prompt.
    ///
    /// # Errors
    /// - Transport failures, non-success or malformed provider responses
    async fn generate(&self, foreground: &Asset, prompt: &str) -> Result<ProcessedReference>;
}

/// Send a provider request and turn failures into typed errors
///
/// Non-2xx responses become `Provider` errors carrying the status and body;
/// transport failures and deadline expiry become `Network` errors.
pub(crate) async fn send_checked(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            BgReplaceError::network_error(&format!("{} request timed out", provider), e)
        } else {
            BgReplaceError::network_error(&format!("{} request failed", provider), e)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BgReplaceError::provider_status(provider, status.as_u16(), &body));
    }

    Ok(response)
}

/// Join a base URL and a path without doubling slashes
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
