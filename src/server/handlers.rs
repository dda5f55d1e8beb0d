//! HTTP route handlers

use super::{error::ApiError, AppState};
use crate::error::{BgReplaceError, Result};
use crate::services::{NoOpProgressReporter, TracingProgressReporter};
use crate::types::{resolve_prompt, Asset, ProcessingRequest, DEFAULT_PROMPT, DEFAULT_TEST_PROMPT};
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

/// Multipart field carrying the image
pub const PHOTO_FIELD: &str = "photo";
/// Multipart field carrying the prompt
pub const PROMPT_FIELD: &str = "prompt";

const TEST_NOTE: &str = "This is a simulation. Enable real processing in production.";

/// ISO-8601 UTC timestamp with millisecond precision
pub(crate) fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: &'static str,
    pub original: String,
    pub processed: String,
    pub prompt: String,
    pub processing_time: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestUploadResponse {
    pub success: bool,
    pub message: &'static str,
    pub original: String,
    pub processed: String,
    pub prompt: String,
    pub processing_time: String,
    pub steps: Vec<String>,
    pub note: &'static str,
    pub timestamp: String,
}

/// Fields collected from an upload form
#[derive(Debug, Default)]
struct UploadForm {
    photo: Option<Asset>,
    prompt: Option<String>,
}

impl UploadForm {
    fn into_parts(self) -> Result<(Asset, Option<String>)> {
        let photo = self.photo.ok_or(BgReplaceError::MissingUpload)?;
        Ok((photo, self.prompt))
    }
}

fn multipart_error(error: &MultipartError, limit: usize) -> BgReplaceError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        BgReplaceError::UploadTooLarge { size: limit + 1, limit }
    } else {
        BgReplaceError::invalid_upload(format!("Failed to parse multipart data: {}", error))
    }
}

/// Read the `photo` and `prompt` fields, enforcing the upload ceiling
async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e, limit))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            // Only a file part counts as the upload; a plain text `photo` value is ignored
            PHOTO_FIELD if field.file_name().is_some() => {
                let file_name = field.file_name().unwrap_or(PHOTO_FIELD).to_string();
                let mime_type = field.content_type().unwrap_or("").to_string();
                let bytes = field.bytes().await.map_err(|e| multipart_error(&e, limit))?;

                if bytes.len() > limit {
                    return Err(BgReplaceError::UploadTooLarge {
                        size: bytes.len(),
                        limit,
                    });
                }
                form.photo = Some(Asset::new(bytes, mime_type, file_name)?);
            },
            PROMPT_FIELD => {
                let text = field.text().await.map_err(|e| multipart_error(&e, limit))?;
                form.prompt = Some(text);
            },
            _ => {},
        }
    }

    Ok(form)
}

/// `GET /`
pub async fn banner() -> Json<Value> {
    Json(json!({
        "message": "🎉 Background Replacement API is Live!",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /api/upload",
            "test": "POST /api/test-upload",
            "status": "GET /api/status",
            "websocket": "GET /ws"
        }
    }))
}

/// `GET /api/status`
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "operational",
        "timestamp": iso_timestamp(),
        "environment": state.config.environment,
        "services": state.services,
        "providers": state.providers,
    }))
}

/// `POST /api/upload`
#[instrument(skip_all)]
pub async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> std::result::Result<Json<UploadResponse>, ApiError> {
    let (photo, prompt) = read_upload(multipart, state.config.max_upload_bytes)
        .await?
        .into_parts()?;
    let request = ProcessingRequest::new(photo, prompt.as_deref());
    info!(
        file = %request.source.original_name(),
        prompt = %request.prompt,
        "Processing upload"
    );

    let _permit = state.acquire_slot().await?;
    let result = state
        .processor
        .process_request(&request, &TracingProgressReporter)
        .await?;

    Ok(Json(UploadResponse {
        success: true,
        message: "Image processed successfully",
        processing_time: result.processing_time(),
        original: result.foreground_description,
        processed: result.processed_reference.to_string(),
        prompt: result.prompt,
        timestamp: iso_timestamp(),
    }))
}

/// `POST /api/test-upload`
#[instrument(skip_all)]
pub async fn test_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> std::result::Result<Json<TestUploadResponse>, ApiError> {
    let (photo, prompt) = read_upload(multipart, state.config.max_upload_bytes)
        .await?
        .into_parts()?;
    let prompt = resolve_prompt(prompt.as_deref(), DEFAULT_TEST_PROMPT);
    info!(file = %photo.original_name(), prompt = %prompt, "Simulating upload");

    let _permit = state.acquire_slot().await?;
    let result = state
        .simulator
        .process(Some(&photo), &prompt, &NoOpProgressReporter)
        .await;

    Ok(Json(TestUploadResponse {
        success: true,
        message: "TEST MODE - Image processing simulated",
        processing_time: result.processing_time(),
        original: result.original,
        processed: result.processed,
        prompt: result.prompt,
        steps: result.steps,
        note: TEST_NOTE,
        timestamp: iso_timestamp(),
    }))
}

/// Prompt applied by camera uploads that carry none
pub(crate) fn camera_prompt(prompt: Option<&str>) -> String {
    resolve_prompt(prompt, DEFAULT_PROMPT)
}
