//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::{ProviderCredentials, ServiceConfig, SimulationTimings};
use anyhow::{Context, Result};
use std::time::Duration;

const BYTES_PER_MB: usize = 1024 * 1024;
const DEFAULT_ENVIRONMENT: &str = "development";
/// Legacy variable still set by existing deployments
const LEGACY_ENVIRONMENT_VAR: &str = "NODE_ENV";

/// First non-empty label among the explicit value and the legacy variable
fn resolve_environment(explicit: Option<&str>, legacy: Option<String>) -> String {
    explicit
        .filter(|label| !label.trim().is_empty())
        .map(str::to_string)
        .or_else(|| legacy.filter(|label| !label.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}

/// Convert CLI arguments to a validated `ServiceConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build `ServiceConfig` from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<ServiceConfig> {
        let credentials = ProviderCredentials::from_raw(
            cli.remove_bg_api_key.as_deref(),
            cli.openai_api_key.as_deref(),
            cli.stability_api_key.as_deref(),
        );

        let static_dir = if cli.no_static {
            None
        } else {
            Some(cli.static_dir.clone())
        };

        ServiceConfig::builder()
            .credentials(credentials)
            .host(cli.host.clone())
            .port(cli.port)
            .environment(resolve_environment(
                cli.environment.as_deref(),
                std::env::var(LEGACY_ENVIRONMENT_VAR).ok(),
            ))
            .max_upload_bytes(cli.max_upload_mb.saturating_mul(BYTES_PER_MB))
            .provider_timeout(Duration::from_secs(cli.provider_timeout_secs))
            .max_concurrent_jobs(cli.max_concurrent_jobs)
            .queue_timeout(Duration::from_secs(cli.queue_timeout_secs))
            .simulation(SimulationTimings {
                removal_delay: Duration::from_millis(cli.simulated_removal_ms),
                generation_delay: Duration::from_millis(cli.simulated_generation_ms),
            })
            .static_dir(static_dir)
            .build()
            .context("Failed to build service configuration")
    }
}
