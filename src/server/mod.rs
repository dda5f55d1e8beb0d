//! HTTP and WebSocket frontend
//!
//! Routes:
//! - `GET /` service banner
//! - `GET /api/status` provider configuration flags
//! - `POST /api/upload` real pipeline
//! - `POST /api/test-upload` simulated pipeline
//! - `GET /ws` live progress channel
//!
//! Everything else falls through to the static directory when one is
//! configured.

pub mod error;
pub mod handlers;
pub mod ws;

pub use error::ApiError;

use crate::config::{ProviderCredentials, ServiceConfig};
use crate::error::{BgReplaceError, Result};
use crate::processor::BackgroundReplacementProcessor;
use crate::simulation::SimulatedProcessor;
use crate::tracing_config::{events, spans};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Instrument, Level};
use uuid::Uuid;

/// Room for multipart boundaries and the prompt field on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Per-category `services` flags reported by `/api/status`
///
/// These only say the service plumbing exists; they do not check credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceFlags {
    pub remove_bg: &'static str,
    pub ai_generation: &'static str,
}

impl Default for ServiceFlags {
    fn default() -> Self {
        Self {
            remove_bg: "configured",
            ai_generation: "configured",
        }
    }
}

/// Per-category provider mode reported under `providers` by `/api/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderModes {
    pub remove_bg: &'static str,
    pub ai_generation: &'static str,
}

impl ProviderModes {
    /// `live` when a usable credential exists for the category, else `simulation`
    #[must_use]
    pub fn from_credentials(credentials: &ProviderCredentials) -> Self {
        let mode = |usable: bool| if usable { "live" } else { "simulation" };
        Self {
            remove_bg: mode(credentials.remove_bg.is_usable()),
            ai_generation: mode(credentials.has_generation_provider()),
        }
    }
}

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub processor: Arc<BackgroundReplacementProcessor>,
    pub simulator: SimulatedProcessor,
    pub services: ServiceFlags,
    pub providers: ProviderModes,
    admission: Arc<Semaphore>,
}

impl AppState {
    /// Build state with the default provider lists
    ///
    /// # Errors
    /// - Invalid configuration or HTTP client construction failures
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let processor = BackgroundReplacementProcessor::new(&config)?;
        Ok(Self::with_processor(config, processor))
    }

    /// Build state around an already constructed processor
    #[must_use]
    pub fn with_processor(config: ServiceConfig, processor: BackgroundReplacementProcessor) -> Self {
        Self {
            simulator: SimulatedProcessor::new(config.simulation),
            services: ServiceFlags::default(),
            providers: ProviderModes::from_credentials(&config.credentials),
            admission: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            processor: Arc::new(processor),
            config: Arc::new(config),
        }
    }

    /// Wait for a worker slot, up to the configured queue timeout
    ///
    /// # Errors
    /// - `Busy` when no slot frees up in time
    pub async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit> {
        let timeout = self.config.queue_timeout;
        match tokio::time::timeout(timeout, Arc::clone(&self.admission).acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(BgReplaceError::internal("worker pool closed")),
            Err(_) => Err(BgReplaceError::Busy(format!(
                "no worker available within {}ms",
                timeout.as_millis()
            ))),
        }
    }

    /// Worker slots currently free
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.admission.available_permits()
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    let mut router = Router::new()
        .route("/", get(handlers::banner))
        .route("/api/status", get(handlers::status))
        .route("/api/upload", post(handlers::upload))
        .route("/api/test-upload", post(handlers::test_upload))
        .route("/ws", get(ws::ws_handler))
        .layer(DefaultBodyLimit::max(body_limit));

    if let Some(dir) = state.config.static_dir.as_ref().filter(|dir| dir.is_dir()) {
        info!(dir = %dir.display(), "Serving static files");
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Bind, serve until `shutdown` resolves, then drain connections
///
/// # Errors
/// - Invalid configuration
/// - Bind or accept failures
pub async fn serve<F>(config: ServiceConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let session_id = Uuid::new_v4().to_string();
    let span = spans::session(&session_id, &config.environment);
    run_server(config, shutdown).instrument(span).await
}

async fn run_server<F>(config: ServiceConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_addr = config.bind_address();
    let port = config.port;
    let environment = config.environment.clone();
    let state = AppState::new(config)?;
    info!(
        remove_bg = state.providers.remove_bg,
        ai_generation = state.providers.ai_generation,
        "Provider configuration"
    );
    if !state.config.credentials.remove_bg.is_usable() {
        events::warning_with_recommendation(
            "remove.bg key not configured, background removal is simulated",
            "set REMOVE_BG_API_KEY",
        );
    }
    if !state.config.credentials.has_generation_provider() {
        events::warning_with_recommendation(
            "no generation key configured, backgrounds are placeholders",
            "set OPENAI_API_KEY or STABILITY_AI_API_KEY",
        );
    }

    let listener = TcpListener::bind(&bind_addr).await?;
    info!(
        environment = %environment,
        "Background replacement API listening on http://{}, available at http://localhost:{}",
        bind_addr,
        port
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credential, OPENAI_PLACEHOLDER};
    use std::time::Duration;

    #[test]
    fn test_service_flags_are_static() {
        let state = AppState::new(ServiceConfig::default()).unwrap();
        assert_eq!(state.services.remove_bg, "configured");
        assert_eq!(state.services.ai_generation, "configured");
    }

    #[test]
    fn test_provider_modes() {
        let modes = ProviderModes::from_credentials(&ProviderCredentials::default());
        assert_eq!(modes.remove_bg, "simulation");
        assert_eq!(modes.ai_generation, "simulation");

        let credentials = ProviderCredentials {
            remove_bg: Credential::Usable("rb-key".into()),
            openai: Credential::from_env_value(Some(OPENAI_PLACEHOLDER), OPENAI_PLACEHOLDER),
            stability: Credential::Usable("sk-stab".into()),
        };
        let modes = ProviderModes::from_credentials(&credentials);
        assert_eq!(modes.remove_bg, "live");
        assert_eq!(modes.ai_generation, "live");
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_times_out_when_pool_is_full() {
        let config = ServiceConfig::builder()
            .max_concurrent_jobs(1)
            .queue_timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let state = AppState::new(config).unwrap();

        let held = state.acquire_slot().await.unwrap();
        assert_eq!(state.available_slots(), 0);

        let err = state.acquire_slot().await.unwrap_err();
        assert!(matches!(err, BgReplaceError::Busy(_)));

        drop(held);
        assert!(state.acquire_slot().await.is_ok());
    }
}
