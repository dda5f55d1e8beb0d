//! Progress reporting service
//!
//! This module separates progress reporting concerns from the pipeline,
//! allowing the HTTP handlers, the WebSocket channel and tests to observe
//! a run without the orchestrator knowing who is listening.

use crate::types::{PipelineStage, ProcessingResult, SimulatedResult};
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info};

/// Phases a pipeline run moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Background removal is running
    BackgroundRemoval,
    /// Background generation is running (removal has finished)
    BackgroundGeneration,
}

impl ProcessingStage {
    /// Get a human-readable description of this stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::BackgroundRemoval => "Starting background removal...",
            ProcessingStage::BackgroundGeneration => "Generating new background...",
        }
    }

    /// Get the typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::BackgroundRemoval => 10,
            ProcessingStage::BackgroundGeneration => 50,
        }
    }
}

impl From<PipelineStage> for ProcessingStage {
    fn from(stage: PipelineStage) -> Self {
        match stage {
            PipelineStage::BackgroundRemoval => ProcessingStage::BackgroundRemoval,
            PipelineStage::BackgroundGeneration => ProcessingStage::BackgroundGeneration,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    /// Create a new progress update
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX),
            stage,
        }
    }
}

/// What a finished run hands to progress listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionSummary {
    pub original: String,
    pub processed: String,
    pub prompt: String,
}

impl From<&ProcessingResult> for CompletionSummary {
    fn from(result: &ProcessingResult) -> Self {
        Self {
            original: result.foreground_description.clone(),
            processed: result.processed_reference.to_string(),
            prompt: result.prompt.clone(),
        }
    }
}

impl From<&SimulatedResult> for CompletionSummary {
    fn from(result: &SimulatedResult) -> Self {
        Self {
            original: result.original.clone(),
            processed: result.processed.clone(),
            prompt: result.prompt.clone(),
        }
    }
}

/// Trait for reporting progress during a background replacement run
pub trait ProgressReporter: Send + Sync {
    /// Report that a phase has begun
    fn report_progress(&self, update: ProgressUpdate);

    /// Report a successful run
    fn report_completion(&self, summary: &CompletionSummary);

    /// Report the failure that aborted a run
    ///
    /// # Arguments
    /// * `stage` - Stage where error occurred
    /// * `error` - Error description
    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _summary: &CompletionSummary) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Progress reporter that turns every update into a tracing event
pub struct TracingProgressReporter;

impl ProgressReporter for TracingProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        info!(
            progress = update.progress,
            elapsed_ms = update.elapsed_ms,
            "{}",
            update.description
        );
    }

    fn report_completion(&self, summary: &CompletionSummary) {
        info!(prompt = %summary.prompt, processed = %summary.processed, "Background replacement completed");
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        error!(stage = ?stage, error = %error, "Background replacement failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProcessedReference;

    #[test]
    fn test_stage_progress_is_monotonic() {
        assert!(
            ProcessingStage::BackgroundRemoval.progress_percentage()
                < ProcessingStage::BackgroundGeneration.progress_percentage()
        );
    }

    #[test]
    fn test_update_carries_stage_description() {
        let update = ProgressUpdate::new(ProcessingStage::BackgroundGeneration, Instant::now());
        assert_eq!(update.description, "Generating new background...");
        assert_eq!(update.progress, 50);
    }

    #[test]
    fn test_completion_summary_from_result() {
        let result = ProcessingResult {
            foreground_description: "Original image processed (42 bytes)".to_string(),
            processed_reference: ProcessedReference::Url("https://img.test/bg.png".to_string()),
            prompt: "forest".to_string(),
            elapsed_millis: 12,
        };
        let summary = CompletionSummary::from(&result);
        assert_eq!(summary.processed, "https://img.test/bg.png");
        assert_eq!(summary.prompt, "forest");
    }

    #[test]
    fn test_every_stage_has_description_and_progress() {
        for stage in [ProcessingStage::BackgroundRemoval, ProcessingStage::BackgroundGeneration] {
            let update = ProgressUpdate::new(stage, Instant::now());
            assert!(!update.description.is_empty());
            assert!(update.progress > 0 && update.progress < 100);
            TracingProgressReporter.report_progress(update);
        }
        TracingProgressReporter.report_error(ProcessingStage::BackgroundGeneration, "quota exhausted");
    }
}
