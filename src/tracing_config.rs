//! Tracing configuration module for structured logging and observability
//!
//! This module provides centralized configuration for tracing subscribers,
//! where the binary configures subscribers while the library only emits
//! trace events. The span and event helpers are always available; subscriber
//! setup needs the `cli` feature.

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[cfg(all(feature = "cli", feature = "tracing-files"))]
static FILE_WRITER_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors and emojis (default for CLI)
    Console,
    /// Compact console output for CI environments
    Compact,
    /// JSON structured logging for production environments
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Configuration for tracing output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracingOutput {
    /// Output to stdout/stderr (default)
    Console,
    /// Output to a file
    #[cfg(feature = "tracing-files")]
    File(std::path::PathBuf),
    /// Output to both console and file
    #[cfg(feature = "tracing-files")]
    Both(std::path::PathBuf),
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    /// Output format
    pub format: TracingFormat,
    /// Output destination
    pub output: TracingOutput,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Session ID for correlation
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            output: TracingOutput::Console,
            env_filter: None,
            session_id: None,
        }
    }
}

impl TracingConfig {
    /// Create a new tracing configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-3+)
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set output format
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Set output destination
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Set custom environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Set session ID for request correlation
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",  // Default: informational messages and above
            1 => "debug", // -v: internal state and computations
            2 => "trace", // -vv: extremely detailed traces
            _ => "trace", // -vvv+: extremely detailed traces (same as -vv)
        }
    }

    /// Initialize tracing subscriber based on configuration
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        // Determine the filter to use
        let filter = if let Some(env_filter) = &self.env_filter {
            EnvFilter::try_new(env_filter)?
        } else {
            EnvFilter::try_new(self.verbosity_to_filter())?
        };

        // Create base subscriber
        let registry = Registry::default().with(filter);

        match (&self.format, &self.output) {
            // Console output with pretty formatting
            (TracingFormat::Console, TracingOutput::Console) => {
                let fmt_layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_level(true)
                    .compact();

                registry.with(fmt_layer).init();
            },

            // Compact console output
            (TracingFormat::Compact, TracingOutput::Console) => {
                let fmt_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact();

                registry.with(fmt_layer).init();
            },

            #[cfg(feature = "tracing-json")]
            // JSON output for structured logging
            (TracingFormat::Json, TracingOutput::Console) => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true);

                registry.with(fmt_layer).init();
            },

            #[cfg(feature = "tracing-files")]
            // File output, optionally mirrored to the console
            (format, TracingOutput::File(path) | TracingOutput::Both(path)) => {
                use tracing_appender::{non_blocking, rolling};
                use tracing_subscriber::Layer;

                let file_appender = rolling::daily(
                    path.parent().unwrap_or_else(|| std::path::Path::new(".")),
                    path.file_stem()
                        .unwrap_or_else(|| std::ffi::OsStr::new("bgreplace")),
                );
                let (file_writer, guard) = non_blocking(file_appender);
                // The writer stops flushing once its guard is dropped
                let _ = FILE_WRITER_GUARD.set(guard);

                let file_layer = match format {
                    #[cfg(feature = "tracing-json")]
                    TracingFormat::Json => fmt::layer()
                        .json()
                        .with_writer(file_writer)
                        .with_current_span(true)
                        .with_span_list(true)
                        .boxed(),
                    _ => fmt::layer()
                        .with_ansi(false)
                        .with_writer(file_writer)
                        .compact()
                        .boxed(),
                };

                let console_layer = matches!(self.output, TracingOutput::Both(_)).then(|| {
                    match format {
                        #[cfg(feature = "tracing-json")]
                        TracingFormat::Json => fmt::layer()
                            .json()
                            .with_current_span(true)
                            .with_span_list(true)
                            .boxed(),
                        TracingFormat::Compact => {
                            fmt::layer().with_ansi(false).with_target(false).compact().boxed()
                        },
                        TracingFormat::Console => {
                            fmt::layer().with_ansi(true).with_target(false).compact().boxed()
                        },
                    }
                });

                registry.with(file_layer).with(console_layer).init();
            },
        }

        // Set session ID as a global field if provided
        if let Some(session_id) = &self.session_id {
            tracing::info!(
                session_id = %session_id,
                "Background replacement session started"
            );
        }

        Ok(())
    }
}

/// Convenience function to initialize tracing with CLI-friendly defaults
#[cfg(feature = "cli")]
pub fn init_cli_tracing(
    verbosity: u8,
    json: bool,
    log_file: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let session_id = uuid::Uuid::new_v4().to_string();

    #[cfg(feature = "tracing-json")]
    let format = if json {
        TracingFormat::Json
    } else {
        TracingFormat::Console
    };
    #[cfg(not(feature = "tracing-json"))]
    let format = {
        if json {
            eprintln!("JSON logs need the `tracing-json` feature, using console output");
        }
        TracingFormat::Console
    };

    #[cfg(feature = "tracing-files")]
    let output = match log_file {
        Some(path) => TracingOutput::Both(path.to_path_buf()),
        None => TracingOutput::Console,
    };
    #[cfg(not(feature = "tracing-files"))]
    let output = {
        if log_file.is_some() {
            eprintln!("Log files need the `tracing-files` feature, logging to the console only");
        }
        TracingOutput::Console
    };

    let config = TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(format)
        .with_output(output)
        .with_session_id(session_id);

    // RUST_LOG wins over the verbosity flag when set
    let config = match std::env::var("RUST_LOG") {
        Ok(filter) if !filter.trim().is_empty() => config.with_env_filter(filter),
        _ => config,
    };

    config.init()
}

/// Span creation helpers for common operations
pub mod spans {
    use crate::types::Asset;
    use tracing::{Level, Span};
    use uuid::Uuid;

    /// Create a session span for the whole server process
    pub fn session(session_id: &str, environment: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "session",
            session_id = %session_id,
            environment = %environment
        )
    }

    /// Create a span for one pipeline run
    pub fn request(request_id: &Uuid, source: &Asset) -> Span {
        tracing::span!(
            Level::INFO,
            "request",
            request_id = %request_id,
            file = %source.original_name(),
            size_bytes = %source.size_bytes()
        )
    }

    /// Create a span for the simulated pipeline
    pub fn simulation(prompt: &str) -> Span {
        tracing::span!(Level::INFO, "simulation", prompt = %prompt)
    }

    /// Create a span for a WebSocket connection
    pub fn websocket_connection(connection_id: &Uuid) -> Span {
        tracing::span!(
            Level::INFO,
            "websocket",
            connection_id = %connection_id
        )
    }
}

/// Event helpers for common logging patterns
pub mod events {
    use tracing::{debug, error, warn};

    /// Log an error with context
    pub fn error_with_context(error: &dyn std::error::Error, context: &str) {
        error!(
            error = %error,
            context = %context,
            "Operation failed"
        );
    }

    /// Log a warning with recommendation
    pub fn warning_with_recommendation(message: &str, recommendation: &str) {
        warn!(
            message = %message,
            recommendation = %recommendation,
            "Warning"
        );
    }

    /// Log performance metrics
    pub fn performance_metric(operation: &str, duration_ms: u64) {
        debug!(
            operation = %operation,
            duration_ms = %duration_ms,
            "Performance metric"
        );
    }
}
