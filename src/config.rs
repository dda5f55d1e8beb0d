//! Configuration types for the background replacement service

use crate::error::{BgReplaceError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Placeholder shipped in sample `.env` files for the remove.bg key
pub const REMOVE_BG_PLACEHOLDER: &str = "your_remove_bg_api_key_here";
/// Placeholder shipped in sample `.env` files for the `OpenAI` key
pub const OPENAI_PLACEHOLDER: &str = "your_openai_api_key_here";
/// Placeholder shipped in sample `.env` files for the Stability AI key
pub const STABILITY_PLACEHOLDER: &str = "your_stability_ai_key_here";

/// Default upload ceiling (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// A provider secret, resolved once at configuration load
///
/// Only `Usable` credentials enable a provider; an absent or placeholder
/// secret silently downgrades the stage to its simulation.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credential {
    /// Present and not a known placeholder
    Usable(String),
    /// Missing, blank, or still set to the sample placeholder
    #[default]
    Absent,
}

impl Credential {
    /// Normalize a raw configuration value against the provider's placeholder
    #[must_use]
    pub fn from_env_value(value: Option<&str>, placeholder: &str) -> Self {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() && v != placeholder => Self::Usable(v.to_string()),
            _ => Self::Absent,
        }
    }

    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Usable(_))
    }

    /// The secret, when usable
    #[must_use]
    pub fn secret(&self) -> Option<&str> {
        match self {
            Self::Usable(s) => Some(s),
            Self::Absent => None,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usable(_) => write!(f, "Usable(<redacted>)"),
            Self::Absent => write!(f, "Absent"),
        }
    }
}

/// Credentials for every provider the stages know about
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderCredentials {
    /// remove.bg (background removal)
    pub remove_bg: Credential,
    /// `OpenAI` images API (primary generation)
    pub openai: Credential,
    /// Stability AI (secondary generation)
    pub stability: Credential,
}

impl ProviderCredentials {
    /// Build from raw values, applying each provider's placeholder check
    #[must_use]
    pub fn from_raw(remove_bg: Option<&str>, openai: Option<&str>, stability: Option<&str>) -> Self {
        Self {
            remove_bg: Credential::from_env_value(remove_bg, REMOVE_BG_PLACEHOLDER),
            openai: Credential::from_env_value(openai, OPENAI_PLACEHOLDER),
            stability: Credential::from_env_value(stability, STABILITY_PLACEHOLDER),
        }
    }

    /// Whether any generation provider can be used
    #[must_use]
    pub fn has_generation_provider(&self) -> bool {
        self.openai.is_usable() || self.stability.is_usable()
    }
}

/// Base URLs for the external providers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub remove_bg: String,
    pub openai: String,
    pub stability: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            remove_bg: "https://api.remove.bg/v1.0".to_string(),
            openai: "https://api.openai.com/v1".to_string(),
            stability: "https://api.stability.ai/v1".to_string(),
        }
    }
}

/// Fixed delays used by the simulated pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationTimings {
    /// Time attributed to background removal
    pub removal_delay: Duration,
    /// Time attributed to background generation
    pub generation_delay: Duration,
}

impl Default for SimulationTimings {
    fn default() -> Self {
        Self {
            removal_delay: Duration::from_millis(2000),
            generation_delay: Duration::from_millis(3000),
        }
    }
}

impl SimulationTimings {
    /// Combined delay of both simulated stages
    #[must_use]
    pub fn total(&self) -> Duration {
        self.removal_delay + self.generation_delay
    }
}

/// Configuration for the background replacement service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Provider secrets
    pub credentials: ProviderCredentials,

    /// Provider base URLs
    pub endpoints: ProviderEndpoints,

    /// Interface to bind
    pub host: String,

    /// Listening port
    pub port: u16,

    /// Deployment label reported by `/api/status`
    pub environment: String,

    /// Upload ceiling in bytes
    pub max_upload_bytes: usize,

    /// Deadline applied to every provider call
    pub provider_timeout: Duration,

    /// Maximum number of pipelines running at once
    pub max_concurrent_jobs: usize,

    /// How long an upload may wait for a free worker slot
    pub queue_timeout: Duration,

    /// Simulated pipeline delays
    pub simulation: SimulationTimings,

    /// Directory served for requests no route matches (None = disabled)
    pub static_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            credentials: ProviderCredentials::default(),
            endpoints: ProviderEndpoints::default(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "development".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            provider_timeout: Duration::from_secs(60),
            max_concurrent_jobs: 8,
            queue_timeout: Duration::from_secs(30),
            simulation: SimulationTimings::default(),
            static_dir: None,
        }
    }
}

impl ServiceConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use imgly_bgreplace::ServiceConfig;
    ///
    /// let config = ServiceConfig::builder()
    ///     .port(8080)
    ///     .environment("production")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.bind_address(), "0.0.0.0:8080");
    /// ```
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Zero upload ceiling, worker count or provider timeout
    /// - Empty provider endpoint
    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(BgReplaceError::invalid_config(
                "max upload size must be greater than 0 bytes",
            ));
        }

        if self.max_concurrent_jobs == 0 {
            return Err(BgReplaceError::invalid_config(
                "max concurrent jobs must be at least 1",
            ));
        }

        if self.provider_timeout.is_zero() {
            return Err(BgReplaceError::invalid_config(
                "provider timeout must be greater than 0",
            ));
        }

        for (name, url) in [
            ("remove.bg", &self.endpoints.remove_bg),
            ("openai", &self.endpoints.openai),
            ("stability", &self.endpoints.stability),
        ] {
            if url.trim().is_empty() {
                return Err(BgReplaceError::invalid_config(format!(
                    "{} endpoint must not be empty",
                    name
                )));
            }
        }

        Ok(())
    }

    /// `host:port` string suitable for binding a listener
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for `ServiceConfig`
#[derive(Debug, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    #[must_use]
    pub fn credentials(mut self, credentials: ProviderCredentials) -> Self {
        self.config.credentials = credentials;
        self
    }

    #[must_use]
    pub fn endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    #[must_use]
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn environment<S: Into<String>>(mut self, environment: S) -> Self {
        self.config.environment = environment.into();
        self
    }

    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    #[must_use]
    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.config.provider_timeout = timeout;
        self
    }

    /// Set the worker pool size (at least 1)
    #[must_use]
    pub fn max_concurrent_jobs(mut self, jobs: usize) -> Self {
        self.config.max_concurrent_jobs = jobs.max(1);
        self
    }

    #[must_use]
    pub fn queue_timeout(mut self, timeout: Duration) -> Self {
        self.config.queue_timeout = timeout;
        self
    }

    #[must_use]
    pub fn simulation(mut self, timings: SimulationTimings) -> Self {
        self.config.simulation = timings;
        self
    }

    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.static_dir = dir;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Any rule checked by [`ServiceConfig::validate`]
    pub fn build(self) -> Result<ServiceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
