//! The two pipeline stages and their provider-selection policy
//!
//! A stage owns an ordered list of backends. On each call it selects the
//! first backend reporting itself available and invokes only that one: a
//! failing provider is reported as a stage error and never cascades to the
//! next entry. Only unavailability (checked before the call) moves
//! selection down the list.

pub mod generation;
pub mod removal;

pub use generation::BackgroundGenerationStage;
pub use removal::BackgroundRemovalStage;
