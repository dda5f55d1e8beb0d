//! `OpenAI` images backend (primary background generation provider)

use super::{endpoint, send_checked, GenerationBackend};
use crate::config::Credential;
use crate::error::{BgReplaceError, Result};
use crate::types::{Asset, ProcessedReference};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

const PROVIDER: &str = "openai";
const MODEL: &str = "dall-e-3";
const IMAGE_SIZE: &str = "1024x1024";
const QUALITY: &str = "standard";

/// Appended to every prompt to steer towards photographic backgrounds
pub const PROMPT_SUFFIX: &str =
    "professional photography, realistic lighting and shadows, high quality background";

#[derive(Debug, Serialize)]
struct ImageGenerationBody<'a> {
    model: &'a str,
    prompt: String,
    size: &'a str,
    quality: &'a str,
    n: u8,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageGenerationData>,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationData {
    #[serde(default)]
    url: Option<String>,
}

/// Backend calling `POST {base}/images/generations`
pub struct OpenAiGenerationBackend {
    client: Client,
    base_url: String,
    credential: Credential,
}

impl OpenAiGenerationBackend {
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            credential,
        }
    }

    /// Prompt actually sent to the provider
    #[must_use]
    pub fn enhance_prompt(prompt: &str) -> String {
        format!("{}, {}", prompt, PROMPT_SUFFIX)
    }
}

#[async_trait]
impl GenerationBackend for OpenAiGenerationBackend {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn is_available(&self) -> bool {
        self.credential.is_usable()
    }

    #[instrument(skip(self, _foreground))]
    async fn generate(&self, _foreground: &Asset, prompt: &str) -> Result<ProcessedReference> {
        let api_key = self
            .credential
            .secret()
            .ok_or_else(|| BgReplaceError::internal("openai selected without a usable credential"))?;

        let body = ImageGenerationBody {
            model: MODEL,
            prompt: Self::enhance_prompt(prompt),
            size: IMAGE_SIZE,
            quality: QUALITY,
            n: 1,
        };
        let url = endpoint(&self.base_url, "images/generations");
        debug!(url = %url, model = MODEL, "Requesting background generation");

        let request = self.client.post(url).bearer_auth(api_key).json(&body);
        let response = send_checked(PROVIDER, request).await?;

        let parsed: ImageGenerationResponse = response
            .json()
            .await
            .map_err(|e| BgReplaceError::provider(PROVIDER, format!("malformed response: {}", e)))?;

        let url = parsed
            .data
            .into_iter()
            .next()
            .and_then(|item| item.url)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| BgReplaceError::provider(PROVIDER, "response contained no image url"))?;

        info!("DALL-E 3 background generated");
        Ok(ProcessedReference::Url(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_enhancement() {
        let enhanced = OpenAiGenerationBackend::enhance_prompt("beach sunset");
        assert!(enhanced.starts_with("beach sunset, "));
        assert!(enhanced.ends_with(PROMPT_SUFFIX));
    }

    #[test]
    fn test_availability_follows_credential() {
        let backend = OpenAiGenerationBackend::new(Client::new(), "http://localhost", Credential::Absent);
        assert!(!backend.is_available());

        let backend = OpenAiGenerationBackend::new(
            Client::new(),
            "http://localhost",
            Credential::Usable("sk-test".to_string()),
        );
        assert!(backend.is_available());
        assert_eq!(backend.name(), "openai");
    }

    #[test]
    fn test_request_body_shape() {
        let body = ImageGenerationBody {
            model: MODEL,
            prompt: "x".to_string(),
            size: IMAGE_SIZE,
            quality: QUALITY,
            n: 1,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "dall-e-3");
        assert_eq!(json["size"], "1024x1024");
        assert_eq!(json["quality"], "standard");
        assert_eq!(json["n"], 1);
    }
}
