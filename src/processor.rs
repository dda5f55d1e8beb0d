//! Unified background replacement processor
//!
//! This module provides the `BackgroundReplacementProcessor` that drives the
//! two pipeline stages for one request. The HTTP handlers and the WebSocket
//! channel both go through it so every frontend sees the same behavior.

use crate::{
    backends::{
        GenerationBackend, OpenAiGenerationBackend, PassThroughRemovalBackend,
        PlaceholderGenerationBackend, RemovalBackend, RemoveBgBackend, StabilityGenerationBackend,
    },
    config::ServiceConfig,
    error::{BgReplaceError, Result},
    services::{
        CompletionSummary, NoOpProgressReporter, ProcessingStage, ProgressReporter,
        ProgressUpdate,
    },
    stages::{BackgroundGenerationStage, BackgroundRemovalStage},
    tracing_config::{events, spans},
    types::{elapsed_millis, Asset, PipelineStage, ProcessingRequest, ProcessingResult},
};
use reqwest::Client;
use std::time::Instant;
use tracing::{info, Instrument};

/// Factory trait for creating the ordered provider lists of each stage
pub trait BackendFactory: Send + Sync {
    /// Removal backends in selection order
    ///
    /// # Errors
    /// - Backend construction failures
    fn create_removal_backends(
        &self,
        config: &ServiceConfig,
        client: &Client,
    ) -> Result<Vec<Box<dyn RemovalBackend>>>;

    /// Generation backends in selection order
    ///
    /// # Errors
    /// - Backend construction failures
    fn create_generation_backends(
        &self,
        config: &ServiceConfig,
        client: &Client,
    ) -> Result<Vec<Box<dyn GenerationBackend>>>;
}

/// Default backend factory: real providers first, simulation last
///
/// Removal: remove.bg, pass-through.
/// Generation: `OpenAI`, Stability AI, placeholder.
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_removal_backends(
        &self,
        config: &ServiceConfig,
        client: &Client,
    ) -> Result<Vec<Box<dyn RemovalBackend>>> {
        Ok(vec![
            Box::new(RemoveBgBackend::new(
                client.clone(),
                config.endpoints.remove_bg.clone(),
                config.credentials.remove_bg.clone(),
            )),
            Box::new(PassThroughRemovalBackend),
        ])
    }

    fn create_generation_backends(
        &self,
        config: &ServiceConfig,
        client: &Client,
    ) -> Result<Vec<Box<dyn GenerationBackend>>> {
        Ok(vec![
            Box::new(OpenAiGenerationBackend::new(
                client.clone(),
                config.endpoints.openai.clone(),
                config.credentials.openai.clone(),
            )),
            Box::new(StabilityGenerationBackend::new(
                client.clone(),
                config.endpoints.stability.clone(),
                config.credentials.stability.clone(),
            )),
            Box::new(PlaceholderGenerationBackend),
        ])
    }
}

/// Build the HTTP client shared by every provider of a processor
///
/// # Errors
/// - TLS backend initialization failures
pub fn build_http_client(config: &ServiceConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.provider_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| BgReplaceError::network_error("Failed to build HTTP client", e))
}

/// Runs background removal then background generation for one request
pub struct BackgroundReplacementProcessor {
    removal: BackgroundRemovalStage,
    generation: BackgroundGenerationStage,
}

impl BackgroundReplacementProcessor {
    /// Create a processor with the default provider lists
    ///
    /// # Errors
    /// - Invalid configuration
    /// - HTTP client construction failures
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Self::with_factory(config, &DefaultBackendFactory)
    }

    /// Create a processor with provider lists from `factory`
    ///
    /// # Errors
    /// - Invalid configuration
    /// - HTTP client construction or backend creation failures
    pub fn with_factory(config: &ServiceConfig, factory: &dyn BackendFactory) -> Result<Self> {
        config.validate()?;
        let client = build_http_client(config)?;

        let removal = BackgroundRemovalStage::new(factory.create_removal_backends(config, &client)?)?;
        let generation =
            BackgroundGenerationStage::new(factory.create_generation_backends(config, &client)?)?;

        info!(
            removal = ?removal.backend_names(),
            generation = ?generation.backend_names(),
            "Background replacement processor ready"
        );

        Ok(Self::from_stages(removal, generation))
    }

    /// Assemble a processor from explicitly built stages
    #[must_use]
    pub fn from_stages(removal: BackgroundRemovalStage, generation: BackgroundGenerationStage) -> Self {
        Self {
            removal,
            generation,
        }
    }

    #[must_use]
    pub fn removal_stage(&self) -> &BackgroundRemovalStage {
        &self.removal
    }

    #[must_use]
    pub fn generation_stage(&self) -> &BackgroundGenerationStage {
        &self.generation
    }

    /// Replace the background of `asset` without progress reporting
    ///
    /// # Errors
    /// - `Processing` wrapping the stage failure that aborted the run
    pub async fn process(&self, asset: Asset, prompt: Option<&str>) -> Result<ProcessingResult> {
        let request = ProcessingRequest::new(asset, prompt);
        self.process_request(&request, &NoOpProgressReporter).await
    }

    /// Run both stages for `request`, reporting phase starts to `progress`
    ///
    /// At most one removal call and one generation call are made. The first
    /// stage failure aborts the run and is reported once.
    ///
    /// # Errors
    /// - `Processing` wrapping the stage failure that aborted the run
    pub async fn process_request(
        &self,
        request: &ProcessingRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<ProcessingResult> {
        let span = spans::request(&request.id, &request.source);
        self.run(request, progress).instrument(span).await
    }

    async fn run(
        &self,
        request: &ProcessingRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<ProcessingResult> {
        let start = Instant::now();
        info!(prompt = %request.prompt, "Processing image");

        progress.report_progress(ProgressUpdate::new(ProcessingStage::BackgroundRemoval, start));
        let foreground = self
            .removal
            .remove(&request.source)
            .await
            .map_err(|e| Self::fail(PipelineStage::BackgroundRemoval, &e, progress))?;

        progress.report_progress(ProgressUpdate::new(ProcessingStage::BackgroundGeneration, start));
        let reference = self
            .generation
            .generate(&foreground, &request.prompt)
            .await
            .map_err(|e| Self::fail(PipelineStage::BackgroundGeneration, &e, progress))?;

        let result = ProcessingResult {
            foreground_description: format!(
                "Original image processed ({} bytes)",
                request.source.size_bytes()
            ),
            processed_reference: reference,
            prompt: request.prompt.clone(),
            elapsed_millis: elapsed_millis(start.elapsed()),
        };

        events::performance_metric("background_replacement", result.elapsed_millis);
        progress.report_completion(&CompletionSummary::from(&result));
        Ok(result)
    }

    fn fail(
        stage: PipelineStage,
        cause: &BgReplaceError,
        progress: &dyn ProgressReporter,
    ) -> BgReplaceError {
        let error = BgReplaceError::processing(stage, cause);
        events::error_with_context(&error, stage.failure_label());
        progress.report_error(ProcessingStage::from(stage), &error.to_string());
        error
    }
}
