//! Per-connection progress channel
//!
//! A [`ProgressChannel`] follows one upload through
//! `idle -> started -> background_removed -> completed`, with `failed`
//! reachable from any non-idle state. Each accepted transition emits exactly
//! one [`ProgressEvent`] into the connection's sink. Forbidden transitions are
//! logged and dropped, so a terminal state is never left or re-entered.

use super::progress::{CompletionSummary, ProcessingStage, ProgressReporter, ProgressUpdate};
use crate::error::{BgReplaceError, Result};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// Lifecycle notification sent to the client that started an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { message: String },
    BackgroundRemoved { message: String },
    Completed { result: CompletionSummary },
    Failed { message: String },
}

impl ProgressEvent {
    /// Wire event name for this notification
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Started { .. } | Self::BackgroundRemoved { .. } => "processing-status",
            Self::Completed { .. } => "processing-complete",
            Self::Failed { .. } => "processing-error",
        }
    }

    /// State the channel is in after emitting this event
    #[must_use]
    pub fn state(&self) -> ChannelState {
        match self {
            Self::Started { .. } => ChannelState::Started,
            Self::BackgroundRemoved { .. } => ChannelState::BackgroundRemoved,
            Self::Completed { .. } => ChannelState::Completed,
            Self::Failed { .. } => ChannelState::Failed,
        }
    }
}

/// States of one upload cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Started,
    BackgroundRemoved,
    Completed,
    Failed,
}

impl ChannelState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is an edge of the lifecycle
    #[must_use]
    pub fn can_transition_to(self, next: ChannelState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Started)
                | (Self::Started, Self::BackgroundRemoved)
                | (Self::BackgroundRemoved, Self::Completed)
                | (Self::Started | Self::BackgroundRemoved, Self::Failed)
        )
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Started => "started",
            Self::BackgroundRemoved => "background_removed",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Emits the ordered events of a single upload cycle
///
/// Create one channel per upload-start signal; several channels may share
/// the same sink when a connection submits more than one upload.
pub struct ProgressChannel {
    state: Mutex<ChannelState>,
    sink: UnboundedSender<ProgressEvent>,
}

impl ProgressChannel {
    #[must_use]
    pub fn new(sink: UnboundedSender<ProgressEvent>) -> Self {
        Self {
            state: Mutex::new(ChannelState::Idle),
            sink,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ChannelState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move `idle -> started`, emitting the started notification
    ///
    /// # Errors
    /// - `InvalidTransition` when the cycle has already begun
    pub fn start(&self) -> Result<()> {
        self.emit(ProgressEvent::Started {
            message: ProcessingStage::BackgroundRemoval.description().to_string(),
        })
    }

    /// Apply the transition implied by `event` and forward it to the sink
    ///
    /// A closed sink is not an error: the client went away and the event
    /// is dropped.
    ///
    /// # Errors
    /// - `InvalidTransition` when the lifecycle forbids the move
    pub fn emit(&self, event: ProgressEvent) -> Result<()> {
        let next = event.state();
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.can_transition_to(next) {
                return Err(BgReplaceError::InvalidTransition {
                    from: state.to_string(),
                    to: next.to_string(),
                });
            }
            *state = next;
        }

        let name = event.event_name();
        if self.sink.send(event).is_err() {
            debug!(event = name, state = %next, "Connection closed, dropping progress event");
        }
        Ok(())
    }

    fn emit_or_log(&self, event: ProgressEvent) {
        if let Err(e) = self.emit(event) {
            warn!(error = %e, "Ignoring progress event");
        }
    }
}

impl ProgressReporter for ProgressChannel {
    fn report_progress(&self, update: ProgressUpdate) {
        match update.stage {
            ProcessingStage::BackgroundRemoval => {
                // Channels normally announce themselves on receipt of the upload
                if self.state() == ChannelState::Idle {
                    self.emit_or_log(ProgressEvent::Started {
                        message: update.description,
                    });
                }
            },
            ProcessingStage::BackgroundGeneration => {
                self.emit_or_log(ProgressEvent::BackgroundRemoved {
                    message: update.description,
                });
            },
        }
    }

    fn report_completion(&self, summary: &CompletionSummary) {
        self.emit_or_log(ProgressEvent::Completed {
            result: summary.clone(),
        });
    }

    fn report_error(&self, _stage: ProcessingStage, error: &str) {
        self.emit_or_log(ProgressEvent::Failed {
            message: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::sync::mpsc;

    fn summary() -> CompletionSummary {
        CompletionSummary {
            original: "Original image processed (3 bytes)".to_string(),
            processed: "https://img.test/out.png".to_string(),
            prompt: "forest".to_string(),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_full_lifecycle_emits_each_event_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = ProgressChannel::new(tx);

        channel.start().unwrap();
        channel.report_progress(ProgressUpdate::new(ProcessingStage::BackgroundRemoval, Instant::now()));
        channel.report_progress(ProgressUpdate::new(ProcessingStage::BackgroundGeneration, Instant::now()));
        channel.report_completion(&summary());

        let names: Vec<_> = drain(&mut rx)
            .iter()
            .map(|e| (e.event_name(), e.state()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("processing-status", ChannelState::Started),
                ("processing-status", ChannelState::BackgroundRemoved),
                ("processing-complete", ChannelState::Completed),
            ]
        );
        assert_eq!(channel.state(), ChannelState::Completed);
    }

    #[test]
    fn test_terminal_state_is_never_left() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = ProgressChannel::new(tx);

        channel.start().unwrap();
        channel.report_error(ProcessingStage::BackgroundRemoval, "Processing failed: boom");
        channel.report_completion(&summary());
        assert!(channel.start().is_err());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            ProgressEvent::Failed {
                message: "Processing failed: boom".to_string()
            }
        );
        assert_eq!(channel.state(), ChannelState::Failed);
    }

    #[test]
    fn test_completion_requires_background_removed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = ProgressChannel::new(tx);

        channel.start().unwrap();
        channel.report_completion(&summary());

        assert_eq!(channel.state(), ChannelState::Started);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_idle_cannot_fail() {
        assert!(!ChannelState::Idle.can_transition_to(ChannelState::Failed));
        assert!(ChannelState::BackgroundRemoved.can_transition_to(ChannelState::Failed));
        assert!(ChannelState::Completed.is_terminal());
    }

    #[test]
    fn test_closed_sink_drops_events_silently() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let channel = ProgressChannel::new(tx);
        assert!(channel.start().is_ok());
        assert_eq!(channel.state(), ChannelState::Started);
    }

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(ProgressEvent::Completed { result: summary() }).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["result"]["prompt"], "forest");

        let json = serde_json::to_value(ProgressEvent::BackgroundRemoved {
            message: "Generating new background...".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "background_removed");
        assert_eq!(json["message"], "Generating new background...");
    }
}
