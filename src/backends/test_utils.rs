//! Test utilities and mock backends for stage and processor tests
//!
//! The mocks record every call in a shared history so tests can assert
//! which providers were selected and in what order, without any network.

use super::{GenerationBackend, RemovalBackend};
use crate::error::{BgReplaceError, Result};
use crate::types::{Asset, ProcessedReference};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Shared call log; clones observe the same history
pub type CallHistory = Arc<Mutex<Vec<String>>>;

/// Create an empty shared call history
#[must_use]
pub fn call_history() -> CallHistory {
    Arc::new(Mutex::new(Vec::new()))
}

/// Snapshot of the calls recorded so far
#[must_use]
pub fn recorded_calls(history: &CallHistory) -> Vec<String> {
    history.lock().unwrap().clone()
}

/// Mock removal backend
#[derive(Debug, Clone)]
pub struct MockRemovalBackend {
    name: &'static str,
    available: bool,
    should_fail: bool,
    output: Option<Vec<u8>>,
    history: CallHistory,
}

impl MockRemovalBackend {
    /// Available backend that returns `output` as the new asset's bytes
    #[must_use]
    pub fn new(name: &'static str, output: &[u8], history: CallHistory) -> Self {
        Self {
            name,
            available: true,
            should_fail: false,
            output: Some(output.to_vec()),
            history,
        }
    }

    /// Backend whose credential is missing
    #[must_use]
    pub fn new_unavailable(name: &'static str, history: CallHistory) -> Self {
        Self {
            name,
            available: false,
            should_fail: false,
            output: None,
            history,
        }
    }

    /// Available backend that fails like a rejected provider call
    #[must_use]
    pub fn new_failing(name: &'static str, history: CallHistory) -> Self {
        Self {
            name,
            available: true,
            should_fail: true,
            output: None,
            history,
        }
    }
}

#[async_trait]
impl RemovalBackend for MockRemovalBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn remove(&self, asset: &Asset) -> Result<Asset> {
        self.history
            .lock()
            .unwrap()
            .push(format!("remove:{}", self.name));

        if self.should_fail {
            return Err(BgReplaceError::provider_status(self.name, 402, "insufficient credits"));
        }

        match &self.output {
            Some(bytes) => Asset::new(bytes.clone(), "image/png", asset.original_name()),
            None => Ok(asset.clone()),
        }
    }
}

/// Mock generation backend
#[derive(Debug, Clone)]
pub struct MockGenerationBackend {
    name: &'static str,
    available: bool,
    should_fail: bool,
    history: CallHistory,
}

impl MockGenerationBackend {
    /// Available backend answering `https://mock.test/<name>/<prompt>`
    #[must_use]
    pub fn new(name: &'static str, history: CallHistory) -> Self {
        Self {
            name,
            available: true,
            should_fail: false,
            history,
        }
    }

    #[must_use]
    pub fn new_unavailable(name: &'static str, history: CallHistory) -> Self {
        Self {
            name,
            available: false,
            should_fail: false,
            history,
        }
    }

    #[must_use]
    pub fn new_failing(name: &'static str, history: CallHistory) -> Self {
        Self {
            name,
            available: true,
            should_fail: true,
            history,
        }
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn generate(&self, _foreground: &Asset, prompt: &str) -> Result<ProcessedReference> {
        self.history
            .lock()
            .unwrap()
            .push(format!("generate:{}", self.name));

        if self.should_fail {
            return Err(BgReplaceError::provider_status(self.name, 500, "model overloaded"));
        }

        Ok(ProcessedReference::Url(format!(
            "https://mock.test/{}/{}",
            self.name, prompt
        )))
    }
}

/// Small JPEG-looking asset for tests
#[must_use]
pub fn sample_asset() -> Asset {
    Asset::new(vec![0xFFu8, 0xD8, 0xFF, 0xE0, 0x00, 0x10], "image/jpeg", "photo.jpg").unwrap()
}
