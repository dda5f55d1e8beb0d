//! Simulation backends used when no provider credential is configured
//!
//! Both backends are always available and never fail, so they sit last in
//! their stage's provider list.

use super::{GenerationBackend, RemovalBackend};
use crate::error::Result;
use crate::types::{Asset, ProcessedReference};
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::seq::SliceRandom;
use tracing::info;

/// Background colors a placeholder may be rendered with
pub const PLACEHOLDER_COLORS: [&str; 5] = ["4A90E2", "50E3C2", "B8E986", "F5A623", "D0021B"];

/// Placeholder image service used for simulated output
pub const PLACEHOLDER_BASE_URL: &str = "https://via.placeholder.com/1024x1024";

/// Characters left unescaped when embedding prompt text in a URL component
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Escape text for use as a single URL component
#[must_use]
pub fn encode_uri_component(text: &str) -> String {
    utf8_percent_encode(text, URI_COMPONENT).to_string()
}

/// Placeholder URL with the given color and prompt text
#[must_use]
pub fn placeholder_url(color: &str, prompt: &str) -> String {
    format!(
        "{}/{}/FFFFFF?text={}",
        PLACEHOLDER_BASE_URL,
        color,
        encode_uri_component(prompt)
    )
}

/// Removal "backend" that hands back an unmodified copy of its input
#[derive(Debug, Default)]
pub struct PassThroughRemovalBackend;

#[async_trait]
impl RemovalBackend for PassThroughRemovalBackend {
    fn name(&self) -> &'static str {
        "simulated-removal"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn remove(&self, asset: &Asset) -> Result<Asset> {
        info!(file = %asset.original_name(), "Simulating background removal");
        Ok(asset.clone())
    }
}

/// Generation "backend" producing a colored placeholder that echoes the prompt
#[derive(Debug, Default)]
pub struct PlaceholderGenerationBackend;

impl PlaceholderGenerationBackend {
    fn pick_color() -> &'static str {
        PLACEHOLDER_COLORS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("4A90E2")
    }
}

#[async_trait]
impl GenerationBackend for PlaceholderGenerationBackend {
    fn name(&self) -> &'static str {
        "simulated-generation"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn generate(&self, _foreground: &Asset, prompt: &str) -> Result<ProcessedReference> {
        info!(prompt = %prompt, "Simulating AI background generation");
        Ok(ProcessedReference::Url(placeholder_url(Self::pick_color(), prompt)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> Asset {
        Asset::new(vec![0xFFu8, 0xD8, 0xFF, 0xE0], "image/jpeg", "photo.jpg").unwrap()
    }

    #[test]
    fn test_encode_uri_component() {
        assert_eq!(encode_uri_component("beach sunset"), "beach%20sunset");
        assert_eq!(encode_uri_component("a&b=c/d?"), "a%26b%3Dc%2Fd%3F");
        assert_eq!(encode_uri_component("it's (fine)!~*._-"), "it's%20(fine)!~*._-");
        assert_eq!(encode_uri_component("café"), "caf%C3%A9");
    }

    #[tokio::test]
    async fn test_pass_through_returns_identical_asset() {
        let input = asset();
        let output = PassThroughRemovalBackend.remove(&input).await.unwrap();
        assert_eq!(output, input);
        assert_eq!(output.bytes().as_ref(), input.bytes().as_ref());
    }

    #[tokio::test]
    async fn test_placeholder_uses_known_color_and_prompt() {
        for _ in 0..20 {
            let reference = PlaceholderGenerationBackend
                .generate(&asset(), "beach sunset")
                .await
                .unwrap();
            let url = reference.as_str();
            assert!(url.starts_with(PLACEHOLDER_BASE_URL));
            assert!(url.ends_with("?text=beach%20sunset"));
            assert!(PLACEHOLDER_COLORS
                .iter()
                .any(|color| url.contains(&format!("/{}/FFFFFF", color))));
        }
    }
}
