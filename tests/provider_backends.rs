//! Provider wire-format tests against local mock servers

use httpmock::Method::POST;
use httpmock::MockServer;
use imgly_bgreplace::backends::openai::PROMPT_SUFFIX;
use imgly_bgreplace::{
    Asset, BackgroundReplacementProcessor, BgReplaceError, Credential, GenerationBackend,
    OpenAiGenerationBackend, PipelineStage, ProviderCredentials, ProviderEndpoints,
    RemovalBackend, RemoveBgBackend, ServiceConfig, StabilityGenerationBackend,
};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

fn photo() -> Asset {
    Asset::new(b"jpeg-bytes".to_vec(), "image/jpeg", "photo.jpg").unwrap()
}

fn key(value: &str) -> Credential {
    Credential::Usable(value.to_string())
}

#[tokio::test]
async fn remove_bg_sends_multipart_with_api_key() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1.0/removebg")
                .header("x-api-key", "rb-test")
                .body_includes("name=\"image_file\"")
                .body_includes("filename=\"photo.jpg\"")
                .body_includes("jpeg-bytes")
                .body_includes("name=\"size\"")
                .body_includes("auto");
            then.status(200)
                .header("content-type", "image/png")
                .body("cutout-png");
        })
        .await;

    let backend = RemoveBgBackend::new(Client::new(), server.url("/v1.0"), key("rb-test"));
    assert!(backend.is_available());

    let foreground = backend.remove(&photo()).await.unwrap();
    mock.assert_async().await;

    assert_eq!(foreground.bytes().as_ref(), b"cutout-png");
    assert_eq!(foreground.mime_type(), "image/png");
    assert_eq!(foreground.original_name(), "photo.jpg");
}

#[tokio::test]
async fn remove_bg_error_status_is_a_provider_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/removebg");
            then.status(402).body("{\"errors\":[{\"title\":\"Insufficient credits\"}]}");
        })
        .await;

    let backend = RemoveBgBackend::new(Client::new(), server.base_url(), key("rb-test"));
    let err = backend.remove(&photo()).await.unwrap_err();

    match err {
        BgReplaceError::Provider { provider, message } => {
            assert_eq!(provider, "remove.bg");
            assert!(message.starts_with("Request failed with status code 402"));
            assert!(message.contains("Insufficient credits"));
        },
        other => panic!("expected provider error, got {:?}", other),
    }
}

#[tokio::test]
async fn openai_request_shape_and_url_result() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/images/generations")
                .header("authorization", "Bearer sk-test")
                .json_body(json!({
                    "model": "dall-e-3",
                    "prompt": format!("forest clearing, {}", PROMPT_SUFFIX),
                    "size": "1024x1024",
                    "quality": "standard",
                    "n": 1
                }));
            then.status(200)
                .header("content-type", "application/json")
                .body(json!({ "data": [{ "url": "https://images.test/bg.png" }] }).to_string());
        })
        .await;

    let backend = OpenAiGenerationBackend::new(Client::new(), server.url("/v1"), key("sk-test"));
    let reference = backend.generate(&photo(), "forest clearing").await.unwrap();
    mock.assert_async().await;

    assert!(!reference.is_data_uri());
    assert_eq!(reference.as_str(), "https://images.test/bg.png");
}

#[tokio::test]
async fn openai_empty_data_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/images/generations");
            then.status(200)
                .header("content-type", "application/json")
                .body(json!({ "data": [] }).to_string());
        })
        .await;

    let backend = OpenAiGenerationBackend::new(Client::new(), server.base_url(), key("sk-test"));
    let err = backend.generate(&photo(), "forest").await.unwrap_err();
    assert!(matches!(err, BgReplaceError::Provider { .. }));
}

#[tokio::test]
async fn stability_wraps_base64_artifact_in_data_uri() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image")
                .header("authorization", "Bearer stab-test")
                .json_body(json!({
                    "text_prompts": [{ "text": "forest" }],
                    "cfg_scale": 7,
                    "height": 1024,
                    "width": 1024,
                    "steps": 30,
                    "samples": 1
                }));
            then.status(200)
                .header("content-type", "application/json")
                .body(json!({ "artifacts": [{ "base64": "iVBORw0KGgo=" }] }).to_string());
        })
        .await;

    let backend = StabilityGenerationBackend::new(Client::new(), server.url("/v1"), key("stab-test"));
    let reference = backend.generate(&photo(), "forest").await.unwrap();
    mock.assert_async().await;

    assert!(reference.is_data_uri());
    assert_eq!(reference.as_str(), "data:image/png;base64,iVBORw0KGgo=");
}

fn config_for(server: &MockServer, credentials: ProviderCredentials) -> ServiceConfig {
    ServiceConfig::builder()
        .credentials(credentials)
        .endpoints(ProviderEndpoints {
            remove_bg: server.url("/v1.0"),
            openai: server.url("/openai/v1"),
            stability: server.url("/stability/v1"),
        })
        .provider_timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn failed_primary_does_not_fall_back_to_secondary() {
    let server = MockServer::start_async().await;
    let removal = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1.0/removebg");
            then.status(200).header("content-type", "image/png").body("cutout");
        })
        .await;
    let openai = server
        .mock_async(|when, then| {
            when.method(POST).path("/openai/v1/images/generations");
            then.status(500).body("upstream exploded");
        })
        .await;
    let stability = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/stability/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image");
            then.status(200)
                .header("content-type", "application/json")
                .body(json!({ "artifacts": [{ "base64": "AAAA" }] }).to_string());
        })
        .await;

    let credentials = ProviderCredentials::from_raw(Some("rb"), Some("sk"), Some("stab"));
    let processor = BackgroundReplacementProcessor::new(&config_for(&server, credentials)).unwrap();

    let err = processor.process(photo(), Some("forest")).await.unwrap_err();

    removal.assert_async().await;
    openai.assert_async().await;
    assert_eq!(stability.hits_async().await, 0);
    assert_eq!(err.failed_stage(), Some(PipelineStage::BackgroundGeneration));
    assert!(err
        .to_string()
        .starts_with("Processing failed: AI background generation failed: openai request failed"));
}

#[tokio::test]
async fn secondary_used_when_primary_key_is_placeholder() {
    let server = MockServer::start_async().await;
    let stability = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/stability/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image");
            then.status(200)
                .header("content-type", "application/json")
                .body(json!({ "artifacts": [{ "base64": "AAAA" }] }).to_string());
        })
        .await;

    // No remove.bg key: removal is simulated and never reaches the server
    let credentials = ProviderCredentials::from_raw(
        None,
        Some(imgly_bgreplace::config::OPENAI_PLACEHOLDER),
        Some("stab"),
    );
    let processor = BackgroundReplacementProcessor::new(&config_for(&server, credentials)).unwrap();

    let result = processor.process(photo(), Some("forest")).await.unwrap();

    stability.assert_async().await;
    assert_eq!(result.processed_reference.as_str(), "data:image/png;base64,AAAA");
    assert_eq!(result.foreground_description, "Original image processed (10 bytes)");
}
