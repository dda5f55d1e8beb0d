//! Services layer
//!
//! Progress reporting lives here so the pipeline stays independent of the
//! frontend (HTTP response, WebSocket channel, log output) observing it.

pub mod channel;
pub mod progress;

pub use channel::{ChannelState, ProgressChannel, ProgressEvent};
pub use progress::{
    CompletionSummary, NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressUpdate,
    TracingProgressReporter,
};
