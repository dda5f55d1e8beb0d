//! Background generation stage

use crate::backends::{GenerationBackend, PlaceholderGenerationBackend};
use crate::error::{BgReplaceError, Result};
use crate::types::{Asset, PipelineStage, ProcessedReference};
use tracing::{debug, instrument, warn};

/// Turns a prompt (and the extracted foreground) into a background reference
pub struct BackgroundGenerationStage {
    backends: Vec<Box<dyn GenerationBackend>>,
}

impl BackgroundGenerationStage {
    /// Create a stage from an ordered backend list
    ///
    /// # Errors
    /// - `InvalidConfig` when the list is empty
    pub fn new(backends: Vec<Box<dyn GenerationBackend>>) -> Result<Self> {
        if backends.is_empty() {
            return Err(BgReplaceError::invalid_config(
                "background generation stage needs at least one backend",
            ));
        }
        Ok(Self { backends })
    }

    /// Stage that only ever produces placeholders
    #[must_use]
    pub fn simulated() -> Self {
        Self {
            backends: vec![Box::new(PlaceholderGenerationBackend)],
        }
    }

    /// Backend that would serve the next call, if any
    #[must_use]
    pub fn selected_backend(&self) -> Option<&dyn GenerationBackend> {
        self.backends
            .iter()
            .find(|backend| backend.is_available())
            .map(|backend| &**backend)
    }

    /// Names of the configured backends in selection order
    #[must_use]
    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Generate a background for `prompt`
    ///
    /// # Errors
    /// - `Stage` when the selected provider fails or no backend is available
    #[instrument(skip(self, foreground))]
    pub async fn generate(&self, foreground: &Asset, prompt: &str) -> Result<ProcessedReference> {
        let backend = self.selected_backend().ok_or_else(|| {
            BgReplaceError::stage(
                PipelineStage::BackgroundGeneration,
                &BgReplaceError::internal("no generation backend available"),
            )
        })?;
        debug!(provider = backend.name(), "Selected generation provider");

        backend.generate(foreground, prompt).await.map_err(|e| {
            warn!(provider = backend.name(), error = %e, "Background generation provider failed");
            BgReplaceError::stage(PipelineStage::BackgroundGeneration, &e)
        })
    }
}
