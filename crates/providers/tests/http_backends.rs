//! Remote backends against a local one-shot HTTP stub.

use pitwall_config::Credentials;
use pitwall_core::{GenerationRequest, Provider, ProviderError};
use pitwall_providers::{
    CompletionDialect, CompletionProvider, ModelRouter, OpenAiCompatProvider,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve exactly one request. Resolves to the raw request (headers + body).
async fn stub(status: &'static str, body: &'static str, delay: Duration) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];

        // Read headers, then exactly Content-Length bytes of body.
        let header_end = loop {
            let n = socket.read(&mut buf).await.unwrap();
            raw.extend_from_slice(&buf[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            if n == 0 {
                break raw.len();
            }
        };
        let headers = String::from_utf8_lossy(&raw[..header_end]).to_lowercase();
        let content_length = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while raw.len() < header_end + content_length {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
        }

        tokio::time::sleep(delay).await;

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&raw).into_owned()
    });

    (base, handle)
}

fn request(prompt: &str) -> GenerationRequest {
    let mut req = GenerationRequest::new("test-model", prompt);
    req.stop = vec!["Player:".into(), "Human:".into(), "Dax:".into(), "\n\n".into()];
    req
}

#[tokio::test]
async fn chat_backend_round_trip() {
    let (base, server) = stub(
        "200 OK",
        r#"{"model":"test-model","choices":[{"message":{"role":"assistant","content":"Choose your chassis, Sam!"}}],"usage":{"prompt_tokens":12,"completion_tokens":5,"total_tokens":17}}"#,
        Duration::ZERO,
    )
    .await;

    let provider = OpenAiCompatProvider::new(
        "groq",
        format!("{base}/v1"),
        Credentials::Bearer("gsk-test".into()),
        Duration::from_secs(5),
    );
    let completion = provider.complete(request("Player: hi\nDax:")).await.unwrap();
    assert_eq!(completion.text, "Choose your chassis, Sam!");
    assert_eq!(completion.usage.unwrap().total_tokens, 17);

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /v1/chat/completions"));
    assert!(raw.to_lowercase().contains("authorization: bearer gsk-test"));
    assert!(raw.contains(r#""role":"user""#));
    assert!(raw.contains(r#""stop":["Player:","Human:","Dax:","\n\n"]"#));
}

#[tokio::test]
async fn chat_backend_basic_auth() {
    let (base, server) = stub(
        "200 OK",
        r#"{"choices":[{"message":{"content":"ok then"}}]}"#,
        Duration::ZERO,
    )
    .await;

    let provider = OpenAiCompatProvider::new(
        "gateway",
        base,
        Credentials::Basic {
            username: "pit".into(),
            password: Some("crew".into()),
        },
        Duration::from_secs(5),
    );
    provider.complete(request("p")).await.unwrap();

    let raw = server.await.unwrap().to_lowercase();
    // base64("pit:crew")
    assert!(raw.contains("authorization: basic cgl0omnyzxc="));
}

#[tokio::test]
async fn ollama_backend_round_trip() {
    let (base, server) = stub(
        "200 OK",
        r#"{"model":"mistral","response":" Great pick! ","done":true}"#,
        Duration::ZERO,
    )
    .await;

    let provider = CompletionProvider::new(
        "ollama",
        base,
        CompletionDialect::Ollama,
        Credentials::None,
        Duration::from_secs(5),
    );
    let completion = provider.complete(request("Player: hi\nDax:")).await.unwrap();
    assert_eq!(completion.text, "Great pick!");

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /api/generate"));
    assert!(raw.contains(r#""stream":false"#));
    assert!(raw.contains(r#""num_predict":80"#));
    assert!(!raw.to_lowercase().contains("authorization:"));
}

#[tokio::test]
async fn hf_backend_round_trip() {
    let (base, server) = stub(
        "200 OK",
        r#"[{"generated_text":"Front wing next!"}]"#,
        Duration::ZERO,
    )
    .await;

    let provider = CompletionProvider::new(
        "huggingface",
        format!("{base}/models"),
        CompletionDialect::HfInference,
        Credentials::Bearer("hf_x".into()),
        Duration::from_secs(5),
    );
    let completion = provider.complete(request("p")).await.unwrap();
    assert_eq!(completion.text, "Front wing next!");

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /models/test-model"));
    assert!(raw.contains(r#""return_full_text":false"#));
}

#[tokio::test]
async fn server_error_maps_to_api_error() {
    let (base, _server) = stub(
        "500 Internal Server Error",
        r#"{"error":"boom"}"#,
        Duration::ZERO,
    )
    .await;

    let provider =
        OpenAiCompatProvider::new("vllm", base, Credentials::None, Duration::from_secs(5));
    match provider.complete(request("p")).await {
        Err(ProviderError::ApiError { status_code, .. }) => assert_eq!(status_code, 500),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_and_auth_failures() {
    let (base, _server) = stub("429 Too Many Requests", "{}", Duration::ZERO).await;
    let provider =
        OpenAiCompatProvider::new("groq", base, Credentials::None, Duration::from_secs(5));
    assert!(matches!(
        provider.complete(request("p")).await,
        Err(ProviderError::RateLimited { .. })
    ));

    let (base, _server) = stub("401 Unauthorized", "{}", Duration::ZERO).await;
    let provider =
        OpenAiCompatProvider::new("groq", base, Credentials::None, Duration::from_secs(5));
    assert!(matches!(
        provider.complete(request("p")).await,
        Err(ProviderError::AuthenticationFailed(_))
    ));
}

#[tokio::test]
async fn unparseable_body_is_invalid_response() {
    let (base, _server) = stub("200 OK", "not json at all", Duration::ZERO).await;
    let provider =
        OpenAiCompatProvider::new("groq", base, Credentials::None, Duration::from_secs(5));
    let err = provider.complete(request("p")).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse(_)));
    assert!(err.is_transport());
}

#[tokio::test]
async fn connection_refused_is_network_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let provider = OpenAiCompatProvider::new(
        "groq",
        format!("http://{addr}"),
        Credentials::None,
        Duration::from_secs(5),
    );
    let err = provider.complete(request("p")).await.unwrap_err();
    assert!(matches!(err, ProviderError::Network(_)));
}

#[tokio::test]
async fn slow_backend_times_out_through_router() {
    let (base, _server) = stub(
        "200 OK",
        r#"{"choices":[{"message":{"content":"too late"}}]}"#,
        Duration::from_secs(3),
    )
    .await;

    let provider = OpenAiCompatProvider::new(
        "groq",
        base,
        Credentials::None,
        Duration::from_millis(300),
    );
    let router = ModelRouter::new(Arc::new(provider), "test-model", "Dax", Duration::from_millis(500));
    let err = router.invoke("p", 80, 0.4).await.unwrap_err();
    assert!(matches!(err, ProviderError::Timeout(_)));
}

#[tokio::test]
async fn router_truncates_echoed_turns_from_backend() {
    let (base, _server) = stub(
        "200 OK",
        r#"{"response":"Pick the V10, Sam!\nPlayer: ok\nDax: great","done":true}"#,
        Duration::ZERO,
    )
    .await;

    let provider = CompletionProvider::new(
        "ollama",
        base,
        CompletionDialect::Ollama,
        Credentials::None,
        Duration::from_secs(5),
    );
    let router = ModelRouter::new(Arc::new(provider), "mistral", "Dax", Duration::from_secs(5));
    let generation = router.invoke("p", 80, 0.4).await.unwrap();
    assert_eq!(generation.text, "Pick the V10, Sam!");
}
