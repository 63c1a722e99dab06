use solarscope_ai::{
    AnalysisOrchestrator, OpenAICompatibleVisionProvider, ProviderError, VisionProvider,
    ROOFTOP_INSTRUCTION,
};
use solarscope_core::{AnalysisSource, ImageFormat, InferenceConfig, RooftopAnalysis, RooftopImage};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Minimal HTTP endpoint answering `responses.len()` requests in order.
/// The join handle yields the raw requests it received.
async fn stub_server(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            requests.push(read_request(&mut stream).await);

            let reason = if status == 200 { "OK" } else { "Error" };
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
        requests
    });

    (format!("http://{}/api/v1", addr), handle)
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8_lossy(&buf).into_owned()
}

fn envelope(content: &str) -> String {
    serde_json::json!({
        "id": "gen-123",
        "model": "opengvlab/internvl3-14b:free",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 1200, "completion_tokens": 40, "total_tokens": 1240}
    })
    .to_string()
}

fn config(base_url: String) -> InferenceConfig {
    InferenceConfig {
        base_url,
        api_key: Some("sk-or-test".to_string()),
        timeout_secs: 5,
        ..Default::default()
    }
}

fn image() -> RooftopImage {
    RooftopImage::new(b"\x89PNG\r\n\x1a\nroof".to_vec(), ImageFormat::Png)
}

#[tokio::test]
async fn test_successful_analysis_round_trip() {
    let content = r#"{"area_m2": 180, "orientation_deg": 170, "shading_percent": 20, "obstructions": ["chimney", "vent"]}"#;
    let (base_url, server) = stub_server(vec![(200, envelope(content))]).await;

    let provider = OpenAICompatibleVisionProvider::new(config(base_url)).unwrap();
    let response = provider
        .analyze_image(ROOFTOP_INSTRUCTION, &image())
        .await
        .unwrap();
    assert_eq!(response.content, content);
    assert_eq!(response.total_tokens, Some(1240));
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));

    let requests = server.await.unwrap();
    let request = &requests[0];
    assert!(request.starts_with("POST /api/v1/chat/completions"));
    assert!(request.to_lowercase().contains("authorization: bearer sk-or-test"));
    assert!(request.contains("data:image/png;base64,"));
    assert!(request.contains("area_m2, orientation_deg, shading_percent, obstructions"));
}

#[tokio::test]
async fn test_orchestrator_uses_model_answer() {
    let content = "```json\n{\"solar_analysis\": {\"total_area\": {\"suitable_rooftops_area\": 96}, \"orientation\": 185}}\n```";
    let (base_url, server) = stub_server(vec![(200, envelope(content))]).await;

    let orchestrator = AnalysisOrchestrator::from_config(&config(base_url)).unwrap();
    let outcome = orchestrator.analyze_with_source(Some(&image())).await;

    assert_eq!(outcome.source, AnalysisSource::Model);
    assert_eq!(
        outcome.analysis,
        RooftopAnalysis {
            area_m2: 96.0,
            orientation_deg: 185.0,
            shading_percent: 10.0,
            obstructions: Vec::new(),
        }
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_non_success_status_falls_back_to_placeholder() {
    let (base_url, server) = stub_server(vec![(
        401,
        r#"{"error": {"message": "No auth credentials found", "code": 401}}"#.to_string(),
    )])
    .await;

    let provider = OpenAICompatibleVisionProvider::new(config(base_url)).unwrap();
    let orchestrator = AnalysisOrchestrator::new(Arc::new(provider));

    let record = orchestrator.analyze(Some(&image())).await;
    assert_eq!(record, RooftopAnalysis::placeholder());
    server.await.unwrap();
}

#[tokio::test]
async fn test_status_error_carries_body() {
    let (base_url, server) = stub_server(vec![(503, "upstream overloaded".to_string())]).await;

    let provider = OpenAICompatibleVisionProvider::new(config(base_url)).unwrap();
    let err = provider
        .analyze_image(ROOFTOP_INSTRUCTION, &image())
        .await
        .unwrap_err();

    match err {
        ProviderError::Status { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body, "upstream overloaded");
        }
        other => panic!("unexpected error: {}", other),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_connection_refused_falls_back_to_placeholder() {
    // Reserve a port, then close it so nothing is listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let orchestrator =
        AnalysisOrchestrator::from_config(&config(format!("http://{}/api/v1", addr))).unwrap();
    let outcome = orchestrator.analyze_with_source(Some(&image())).await;

    assert_eq!(outcome.analysis, RooftopAnalysis::placeholder());
    assert!(outcome.used_placeholder());
}

#[tokio::test]
async fn test_missing_content_is_invalid_envelope() {
    let body = r#"{"id": "gen-9", "choices": []}"#.to_string();
    let (base_url, server) = stub_server(vec![(200, body)]).await;

    let provider = OpenAICompatibleVisionProvider::new(config(base_url)).unwrap();
    let err = provider
        .analyze_image(ROOFTOP_INSTRUCTION, &image())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidEnvelope(_)));
    server.await.unwrap();
}

#[tokio::test]
async fn test_retries_after_server_error() {
    let content = r#"{"area_m2": 42, "orientation_deg": 90, "shading_percent": 0, "obstructions": []}"#;
    let (base_url, server) =
        stub_server(vec![(502, "bad gateway".to_string()), (200, envelope(content))]).await;

    let provider = OpenAICompatibleVisionProvider::new(InferenceConfig {
        max_retries: 1,
        ..config(base_url)
    })
    .unwrap()
    .with_retry_delay(Duration::from_millis(10));
    let orchestrator = AnalysisOrchestrator::new(Arc::new(provider));

    let record = orchestrator.analyze(Some(&image())).await;
    assert_eq!(record.area_m2, 42.0);
    assert_eq!(server.await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_timeout_falls_back_to_placeholder() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        // Hold the connection open without answering.
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    });

    let provider = OpenAICompatibleVisionProvider::new(InferenceConfig {
        timeout_secs: 1,
        ..config(format!("http://{}/api/v1", addr))
    })
    .unwrap();

    let err = provider
        .analyze_image(ROOFTOP_INSTRUCTION, &image())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Timeout(1)), "got {}", err);

    let orchestrator = AnalysisOrchestrator::new(Arc::new(
        OpenAICompatibleVisionProvider::new(InferenceConfig {
            timeout_secs: 1,
            ..config(format!("http://{}/api/v1", addr))
        })
        .unwrap(),
    ));
    assert_eq!(
        orchestrator.analyze(Some(&image())).await,
        RooftopAnalysis::placeholder()
    );
    server.abort();
}
