#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # IMG.LY Background Replacement Library
//!
//! Replaces the background of a photo: the original background is removed,
//! a new one is generated from a text prompt, and progress is streamed to
//! the client while both stages run.
//!
//! ## Features
//!
//! - **Two-stage pipeline**: background removal followed by background generation
//! - **Ordered providers**: remove.bg for removal; `OpenAI` then Stability AI for
//!   generation; a simulation always sits last in each list
//! - **Credential-driven selection**: a missing or placeholder key selects the
//!   simulation instead of failing
//! - **Live progress**: per-upload `started -> background_removed -> completed`
//!   events over WebSocket, driven by real stage completion
//! - **HTTP API**: axum server with upload, simulated upload and status endpoints
//! - **CLI Integration**: server binary with env-var configuration (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgly_bgreplace::{Asset, BackgroundReplacementProcessor, ServiceConfig};
//!
//! # async fn example(photo: Vec<u8>) -> anyhow::Result<()> {
//! let config = ServiceConfig::builder().build()?;
//! let processor = BackgroundReplacementProcessor::new(&config)?;
//!
//! let asset = Asset::new(photo, "image/jpeg", "photo.jpg")?;
//! let result = processor.process(asset, Some("beach sunset")).await?;
//! println!("{} in {}", result.processed_reference, result.processing_time());
//! # Ok(())
//! # }
//! ```
//!
//! ## Running the server
//!
//! ```rust,no_run
//! use imgly_bgreplace::{server, ServiceConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::builder().port(8080).build()?;
//! server::serve(config, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): server binary, argument parsing and subscriber setup
//! - `tracing-json`: JSON log output
//! - `tracing-files`: log file output

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod processor;
pub mod server;
pub mod services;
pub mod simulation;
pub mod stages;
pub mod tracing_config;
pub mod types;

// Public API exports
pub use backends::{
    GenerationBackend, OpenAiGenerationBackend, PassThroughRemovalBackend,
    PlaceholderGenerationBackend, RemovalBackend, RemoveBgBackend, StabilityGenerationBackend,
};
pub use config::{
    Credential, ProviderCredentials, ProviderEndpoints, ServiceConfig, ServiceConfigBuilder,
    SimulationTimings,
};
pub use error::{BgReplaceError, Result};
pub use processor::{BackendFactory, BackgroundReplacementProcessor, DefaultBackendFactory};
pub use server::{router, AppState};
pub use services::{
    ChannelState, CompletionSummary, NoOpProgressReporter, ProcessingStage, ProgressChannel,
    ProgressEvent, ProgressReporter, ProgressUpdate, TracingProgressReporter,
};
pub use simulation::SimulatedProcessor;
pub use stages::{BackgroundGenerationStage, BackgroundRemovalStage};
pub use types::{
    Asset, PipelineStage, ProcessedReference, ProcessingRequest, ProcessingResult, SimulatedResult,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat, TracingOutput};
