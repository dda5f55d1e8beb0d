//! Background removal stage

use crate::backends::{PassThroughRemovalBackend, RemovalBackend};
use crate::error::{BgReplaceError, Result};
use crate::types::{Asset, PipelineStage};
use tracing::{debug, instrument, warn};

/// Turns a source asset into a foreground-only asset
pub struct BackgroundRemovalStage {
    backends: Vec<Box<dyn RemovalBackend>>,
}

impl BackgroundRemovalStage {
    /// Create a stage from an ordered backend list
    ///
    /// # Errors
    /// - `InvalidConfig` when the list is empty
    pub fn new(backends: Vec<Box<dyn RemovalBackend>>) -> Result<Self> {
        if backends.is_empty() {
            return Err(BgReplaceError::invalid_config(
                "background removal stage needs at least one backend",
            ));
        }
        Ok(Self { backends })
    }

    /// Stage that only ever simulates
    #[must_use]
    pub fn simulated() -> Self {
        Self {
            backends: vec![Box::new(PassThroughRemovalBackend)],
        }
    }

    /// Backend that would serve the next call, if any
    #[must_use]
    pub fn selected_backend(&self) -> Option<&dyn RemovalBackend> {
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

    /// Remove the background from `asset`
    ///
    /// # Errors
    /// - `Stage` when the selected provider fails or no backend is available
    #[instrument(skip(self, asset), fields(file = %asset.original_name()))]
    pub async fn remove(&self, asset: &Asset) -> Result<Asset> {
        let backend = self.selected_backend().ok_or_else(|| {
            BgReplaceError::stage(
                PipelineStage::BackgroundRemoval,
                &BgReplaceError::internal("no removal backend available"),
            )
        })?;
        debug!(provider = backend.name(), "Selected removal provider");

        backend.remove(asset).await.map_err(|e| {
            warn!(provider = backend.name(), error = %e, "Background removal provider failed");
            BgReplaceError::stage(PipelineStage::BackgroundRemoval, &e)
        })
    }
}
