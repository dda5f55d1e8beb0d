//! Stability AI backend (secondary background generation provider)

use super::{endpoint, send_checked, GenerationBackend};
use crate::config::Credential;
use crate::error::{BgReplaceError, Result};
use crate::types::{Asset, ProcessedReference};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

const PROVIDER: &str = "stability";
const ENGINE_PATH: &str = "generation/stable-diffusion-xl-1024-v1-0/text-to-image";
const CFG_SCALE: u32 = 7;
const RESOLUTION: u32 = 1024;
const STEPS: u32 = 30;
const OUTPUT_MIME: &str = "image/png";

#[derive(Debug, Serialize)]
struct TextPrompt<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct TextToImageBody<'a> {
    text_prompts: Vec<TextPrompt<'a>>,
    cfg_scale: u32,
    height: u32,
    width: u32,
    steps: u32,
    samples: u32,
}

impl<'a> TextToImageBody<'a> {
    fn new(prompt: &'a str) -> Self {
        Self {
            text_prompts: vec![TextPrompt { text: prompt }],
            cfg_scale: CFG_SCALE,
            height: RESOLUTION,
            width: RESOLUTION,
            steps: STEPS,
            samples: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TextToImageResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    #[serde(default)]
    base64: Option<String>,
}

/// Backend calling the SDXL text-to-image endpoint
pub struct StabilityGenerationBackend {
    client: Client,
    base_url: String,
    credential: Credential,
}

impl StabilityGenerationBackend {
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            credential,
        }
    }
}

#[async_trait]
impl GenerationBackend for StabilityGenerationBackend {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn is_available(&self) -> bool {
        self.credential.is_usable()
    }

    #[instrument(skip(self, _foreground))]
    async fn generate(&self, _foreground: &Asset, prompt: &str) -> Result<ProcessedReference> {
        let api_key = self.credential.secret().ok_or_else(|| {
            BgReplaceError::internal("stability selected without a usable credential")
        })?;

        let url = endpoint(&self.base_url, ENGINE_PATH);
        debug!(url = %url, steps = STEPS, "Requesting SDXL generation");

        let request = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&TextToImageBody::new(prompt));
        let response = send_checked(PROVIDER, request).await?;

        let parsed: TextToImageResponse = response
            .json()
            .await
            .map_err(|e| BgReplaceError::provider(PROVIDER, format!("malformed response: {}", e)))?;

        let payload = parsed
            .artifacts
            .into_iter()
            .next()
            .and_then(|artifact| artifact.base64)
            .filter(|b64| !b64.is_empty())
            .ok_or_else(|| BgReplaceError::provider(PROVIDER, "response contained no artifacts"))?;

        info!(payload_len = payload.len(), "Stability AI background generated");
        Ok(ProcessedReference::from_base64(OUTPUT_MIME, &payload))
    }
}
