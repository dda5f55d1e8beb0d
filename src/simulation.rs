//! Simulated pipeline for the test endpoint and image-less camera uploads
//!
//! Waits the configured removal and generation delays, reports progress at
//! the same points the real pipeline does, and never calls a provider.

use crate::config::SimulationTimings;
use crate::services::{CompletionSummary, ProcessingStage, ProgressReporter, ProgressUpdate};
use crate::tracing_config::spans;
use crate::types::{elapsed_millis, Asset, SimulatedResult};
use std::time::Instant;
use tracing::{info, Instrument};

/// Generic image returned by every simulated run
pub const SIMULATED_PROCESSED_URL: &str =
    "https://via.placeholder.com/1024x1024/4A90E2/FFFFFF?text=AI+Generated+Background";

/// Step names listed in every simulated result, in execution order
pub const SIMULATED_STEPS: [&str; 3] = [
    "Background removal - SIMULATED",
    "AI background generation - SIMULATED",
    "Light matching - SIMULATED",
];

/// Description used when a simulated run has no uploaded image
const CAMERA_CAPTURE: &str = "camera capture";

/// Fixed-delay stand-in for [`crate::BackgroundReplacementProcessor`]
#[derive(Debug, Clone, Default)]
pub struct SimulatedProcessor {
    timings: SimulationTimings,
}

impl SimulatedProcessor {
    #[must_use]
    pub fn new(timings: SimulationTimings) -> Self {
        Self { timings }
    }

    #[must_use]
    pub fn timings(&self) -> SimulationTimings {
        self.timings
    }

    /// Run the simulation; it always succeeds
    pub async fn process(
        &self,
        source: Option<&Asset>,
        prompt: &str,
        progress: &dyn ProgressReporter,
    ) -> SimulatedResult {
        self.run(source, prompt, progress)
            .instrument(spans::simulation(prompt))
            .await
    }

    async fn run(
        &self,
        source: Option<&Asset>,
        prompt: &str,
        progress: &dyn ProgressReporter,
    ) -> SimulatedResult {
        let start = Instant::now();

        progress.report_progress(ProgressUpdate::new(ProcessingStage::BackgroundRemoval, start));
        tokio::time::sleep(self.timings.removal_delay).await;

        progress.report_progress(ProgressUpdate::new(ProcessingStage::BackgroundGeneration, start));
        tokio::time::sleep(self.timings.generation_delay).await;

        let original = match source {
            Some(asset) => format!("TEST: {} ({} bytes)", asset.original_name(), asset.size_bytes()),
            None => format!("TEST: {}", CAMERA_CAPTURE),
        };

        let result = SimulatedResult {
            original,
            processed: SIMULATED_PROCESSED_URL.to_string(),
            prompt: prompt.to_string(),
            elapsed_millis: elapsed_millis(start.elapsed()),
            steps: SIMULATED_STEPS.iter().map(|s| (*s).to_string()).collect(),
        };

        info!(elapsed_ms = result.elapsed_millis, "Simulated processing finished");
        progress.report_completion(&CompletionSummary::from(&result));
        result
    }
}
