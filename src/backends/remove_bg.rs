//! remove.bg background removal backend

use super::{endpoint, send_checked, RemovalBackend};
use crate::config::Credential;
use crate::error::{BgReplaceError, Result};
use crate::types::Asset;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info, instrument};

const PROVIDER: &str = "remove.bg";

/// MIME type remove.bg answers with when it omits a content type
const DEFAULT_OUTPUT_MIME: &str = "image/png";

/// Backend calling the remove.bg `removebg` endpoint
pub struct RemoveBgBackend {
    client: Client,
    base_url: String,
    credential: Credential,
}

impl RemoveBgBackend {
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            credential,
        }
    }

    fn build_form(asset: &Asset) -> Result<Form> {
        let part = Part::bytes(asset.bytes().to_vec())
            .file_name(asset.original_name().to_string())
            .mime_str(asset.mime_type())
            .map_err(|e| {
                BgReplaceError::invalid_upload(format!(
                    "unsupported MIME type '{}': {}",
                    asset.mime_type(),
                    e
                ))
            })?;

        Ok(Form::new()
            .part("image_file", part)
            // Best-effort automatic output resolution
            .text("size", "auto"))
    }
}

#[async_trait]
impl RemovalBackend for RemoveBgBackend {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn is_available(&self) -> bool {
        self.credential.is_usable()
    }

    #[instrument(skip(self, asset), fields(file = %asset.original_name(), size = asset.size_bytes()))]
    async fn remove(&self, asset: &Asset) -> Result<Asset> {
        let api_key = self
            .credential
            .secret()
            .ok_or_else(|| BgReplaceError::internal("remove.bg selected without a usable credential"))?;

        let url = endpoint(&self.base_url, "removebg");
        debug!(url = %url, "Sending image to remove.bg");

        let request = self
            .client
            .post(url)
            .header("X-Api-Key", api_key)
            .multipart(Self::build_form(asset)?);
        let response = send_checked(PROVIDER, request).await?;

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_OUTPUT_MIME)
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BgReplaceError::network_error("Failed to read remove.bg response", e))?;

        if bytes.is_empty() {
            return Err(BgReplaceError::provider(PROVIDER, "response contained no image data"));
        }

        info!(output_size = bytes.len(), "Background removed successfully");
        Asset::new(bytes, mime_type, asset.original_name())
    }
}
