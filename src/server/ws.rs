//! WebSocket progress channel
//!
//! Frames are JSON text messages shaped `{ "event": <name>, "data": <payload> }`.
//! The only client event is `camera-upload`; every upload gets its own
//! [`ProgressChannel`] and runs on its own task, so a connection may have
//! several uploads in flight.

use super::{handlers::camera_prompt, AppState};
use crate::error::{BgReplaceError, Result};
use crate::services::{ProcessingStage, ProgressChannel, ProgressEvent, ProgressReporter};
use crate::tracing_config::spans;
use crate::types::{Asset, ProcessingRequest};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Client event that starts an upload cycle
pub const CAMERA_UPLOAD_EVENT: &str = "camera-upload";

const CAMERA_FILENAME: &str = "camera-upload";
const DEFAULT_CAMERA_MIME: &str = "image/jpeg";

/// Frame received from a client
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Payload of a `camera-upload` event; unknown fields are ignored
#[derive(Debug, Default, Deserialize)]
pub struct CameraUpload {
    #[serde(default)]
    pub prompt: Option<String>,
    /// Base64 payload or `data:` URI
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Frame sent to a client
#[derive(Debug, Serialize)]
pub struct ServerFrame<'a> {
    pub event: &'static str,
    pub data: &'a ProgressEvent,
}

impl<'a> From<&'a ProgressEvent> for ServerFrame<'a> {
    fn from(event: &'a ProgressEvent) -> Self {
        Self {
            event: event.event_name(),
            data: event,
        }
    }
}

/// `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let frame_limit = ws_frame_limit(state.config.max_upload_bytes);
    ws.max_message_size(frame_limit)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Largest frame able to carry a maximum-size image as base64
fn ws_frame_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes.saturating_mul(4) / 3 + 64 * 1024
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    let span = spans::websocket_connection(&connection_id);

    async move {
        info!("Client connected");
        let (mut sender, mut receiver) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();

        let writer = tokio::spawn(
            async move {
                while let Some(event) = rx.recv().await {
                    let frame = match serde_json::to_string(&ServerFrame::from(&event)) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode progress event");
                            continue;
                        },
                    };
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
            }
            .in_current_span(),
        );

        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Text(text)) => handle_frame(text.as_str(), &state, &tx),
                Ok(Message::Close(_)) => break,
                Ok(_) => {},
                Err(e) => {
                    debug!(error = %e, "WebSocket receive failed");
                    break;
                },
            }
        }

        // In-flight uploads keep running; their events go nowhere
        writer.abort();
        info!("Client disconnected");
    }
    .instrument(span)
    .await;
}

/// Dispatch one client frame; malformed or unknown frames are ignored
pub(crate) fn handle_frame(text: &str, state: &AppState, sink: &UnboundedSender<ProgressEvent>) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed frame");
            return;
        },
    };

    if frame.event != CAMERA_UPLOAD_EVENT {
        debug!(event = %frame.event, "Ignoring unknown event");
        return;
    }

    let upload = if frame.data.is_null() {
        CameraUpload::default()
    } else {
        match serde_json::from_value::<CameraUpload>(frame.data) {
            Ok(upload) => upload,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed camera-upload payload");
                return;
            },
        }
    };

    spawn_camera_upload(upload, state.clone(), sink.clone());
}

/// Start a fresh progress cycle for `upload` and run it on its own task
pub(crate) fn spawn_camera_upload(
    upload: CameraUpload,
    state: AppState,
    sink: UnboundedSender<ProgressEvent>,
) -> tokio::task::JoinHandle<()> {
    let channel = ProgressChannel::new(sink);
    if let Err(e) = channel.start() {
        warn!(error = %e, "Could not start progress cycle");
    }

    let prompt = camera_prompt(upload.prompt.as_deref());
    info!(prompt = %prompt, has_image = upload.image.is_some(), "Camera upload received");

    tokio::spawn(
        async move {
            let _permit = match state.acquire_slot().await {
                Ok(permit) => permit,
                Err(e) => {
                    channel.report_error(ProcessingStage::BackgroundRemoval, &e.to_string());
                    return;
                },
            };

            match upload.image.as_deref() {
                Some(encoded) => {
                    let filename = upload.filename.as_deref().unwrap_or(CAMERA_FILENAME);
                    match decode_image(encoded, filename, state.config.max_upload_bytes) {
                        Ok(asset) => {
                            let request = ProcessingRequest::new(asset, Some(&prompt));
                            // Failures were already reported through the channel
                            let _ = state.processor.process_request(&request, &channel).await;
                        },
                        Err(e) => {
                            channel.report_error(ProcessingStage::BackgroundRemoval, &e.to_string());
                        },
                    }
                },
                None => {
                    state.simulator.process(None, &prompt, &channel).await;
                },
            }
        }
        .in_current_span(),
    )
}

/// Decode a base64 payload or `data:<mime>;base64,<payload>` URI into an asset
///
/// # Errors
/// - `InvalidUpload` for undecodable or empty payloads
/// - `UploadTooLarge` when the decoded image exceeds `limit`
pub fn decode_image(encoded: &str, filename: &str, limit: usize) -> Result<Asset> {
    let (mime_type, payload) = match encoded.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| BgReplaceError::invalid_upload("data URI has no payload"))?;
            let mime_type = header
                .strip_suffix(";base64")
                .ok_or_else(|| BgReplaceError::invalid_upload("data URI is not base64 encoded"))?;
            (mime_type, payload)
        },
        None => (DEFAULT_CAMERA_MIME, encoded),
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| BgReplaceError::invalid_upload(format!("image is not valid base64: {}", e)))?;

    if bytes.len() > limit {
        return Err(BgReplaceError::UploadTooLarge {
            size: bytes.len(),
            limit,
        });
    }

    Asset::new(bytes, mime_type, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_uri() {
        let asset = decode_image("data:image/png;base64,AQID", "cam.png", 1024).unwrap();
        assert_eq!(asset.bytes().as_ref(), &[1u8, 2, 3]);
        assert_eq!(asset.mime_type(), "image/png");
        assert_eq!(asset.original_name(), "cam.png");
    }

    #[test]
    fn test_decode_raw_base64_defaults_to_jpeg() {
        let asset = decode_image("/9j/4A==", CAMERA_FILENAME, 1024).unwrap();
        assert_eq!(asset.mime_type(), "image/jpeg");
        assert_eq!(asset.size_bytes(), 4);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(
            decode_image("not base64!", "x", 1024),
            Err(BgReplaceError::InvalidUpload(_))
        ));
        assert!(matches!(
            decode_image("data:image/png,AQID", "x", 1024),
            Err(BgReplaceError::InvalidUpload(_))
        ));
        assert!(matches!(
            decode_image("", "x", 1024),
            Err(BgReplaceError::InvalidUpload(_))
        ));
        assert!(matches!(
            decode_image("AQIDBA==", "x", 3),
            Err(BgReplaceError::UploadTooLarge { size: 4, limit: 3 })
        ));
    }

    #[test]
    fn test_server_frame_envelope() {
        let event = ProgressEvent::Started {
            message: "Starting background removal...".to_string(),
        };
        let json = serde_json::to_value(ServerFrame::from(&event)).unwrap();
        assert_eq!(json["event"], "processing-status");
        assert_eq!(json["data"]["status"], "started");
        assert_eq!(json["data"]["message"], "Starting background removal...");
    }

    #[test]
    fn test_client_frame_ignores_extra_fields() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{"event":"camera-upload","data":{"prompt":"forest","deviceId":"cam-1"}}"#,
        )
        .unwrap();
        let upload: CameraUpload = serde_json::from_value(frame.data).unwrap();
        assert_eq!(upload.prompt.as_deref(), Some("forest"));
        assert!(upload.image.is_none());
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn state() -> AppState {
        AppState::new(crate::config::ServiceConfig::default()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_upload_without_image_streams_full_cycle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let upload = CameraUpload {
            prompt: Some("city skyline".to_string()),
            ..CameraUpload::default()
        };

        spawn_camera_upload(upload, state(), tx).await.unwrap();
        let events = drain(&mut rx);

        let statuses: Vec<_> = events.iter().map(ProgressEvent::state).collect();
        assert_eq!(
            statuses,
            vec![
                crate::services::ChannelState::Started,
                crate::services::ChannelState::BackgroundRemoved,
                crate::services::ChannelState::Completed,
            ]
        );
        match &events[2] {
            ProgressEvent::Completed { result } => assert_eq!(result.prompt, "city skyline"),
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_upload_echoes_prompt_verbatim() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let upload = CameraUpload {
            prompt: Some("  city skyline ".to_string()),
            ..CameraUpload::default()
        };

        spawn_camera_upload(upload, state(), tx).await.unwrap();

        match drain(&mut rx).pop() {
            Some(ProgressEvent::Completed { result }) => assert_eq!(result.prompt, "  city skyline "),
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_camera_upload_with_image_runs_pipeline() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let upload = CameraUpload {
            prompt: None,
            image: Some("data:image/png;base64,AQID".to_string()),
            filename: Some("cam.png".to_string()),
        };

        spawn_camera_upload(upload, state(), tx).await.unwrap();
        let events = drain(&mut rx);

        assert_eq!(events.len(), 3);
        match &events[2] {
            ProgressEvent::Completed { result } => {
                assert_eq!(result.original, "Original image processed (3 bytes)");
                assert_eq!(result.prompt, crate::types::DEFAULT_PROMPT);
            },
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undecodable_image_fails_after_start() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let upload = CameraUpload {
            image: Some("%%%".to_string()),
            ..CameraUpload::default()
        };

        spawn_camera_upload(upload, state(), tx).await.unwrap();
        let events = drain(&mut rx);

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ProgressEvent::Started { .. }));
        assert_eq!(events[1].event_name(), "processing-error");
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_frames_are_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let state = state();

        handle_frame("not json", &state, &tx);
        handle_frame(r#"{"event":"ping","data":{}}"#, &state, &tx);
        handle_frame(r#"{"event":"camera-upload","data":{"prompt":42}}"#, &state, &tx);

        tokio::task::yield_now().await;
        assert!(drain(&mut rx).is_empty());
    }
}
