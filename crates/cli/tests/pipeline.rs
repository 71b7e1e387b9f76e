//! End-to-end: configuration -> backend -> engine, against a stub model server.

use pitwall_config::{AppConfig, BackendKind, ProviderConfig, ProviderKind};
use pitwall_core::{BuildState, Part, PlayerId, Turn};
use pitwall_engine::{DialogueEngine, DialogueRequest, ReplyOutcome, WorkflowState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve one Ollama-style reply and hand back the raw request.
async fn ollama_stub(reply: &str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let body = serde_json::json!({
        "model": "mistral",
        "response": reply,
        "done": true,
        "prompt_eval_count": 120,
        "eval_count": 14,
    })
    .to_string();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    });

    (format!("http://{addr}"), handle)
}

fn remote_config(base_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.llm.backend = BackendKind::Remote;
    config.llm.provider = "garage".into();
    config.llm.model = "mistral".into();
    config.providers.insert(
        "garage".into(),
        ProviderConfig {
            kind: Some(ProviderKind::Ollama),
            api_url: Some(base_url.to_string()),
            ..Default::default()
        },
    );
    config
}

#[tokio::test]
async fn configured_remote_backend_answers_in_character() {
    let (url, server) = ollama_stub("Dax: \"The 2006 V8 will sing for you, Sam!\"\nPlayer: cool").await;
    let config = remote_config(&url);

    let router = pitwall_providers::build_from_config(&config).unwrap();
    assert_eq!(router.model(), "mistral");
    let engine = DialogueEngine::from_config(&config, router);

    let result = engine
        .respond(DialogueRequest {
            player_dialogue: "Which engine is best?".into(),
            sentiment_label: "neutral".into(),
            player_id: PlayerId(42),
            context: vec![Turn::new("hi", "Dax: Welcome to the garage!")],
            player_name: "Sam".into(),
            build: Some(BuildState::new().with(Part::StandardMonocoque)),
        })
        .await
        .unwrap();

    assert_eq!(result.outcome, ReplyOutcome::Generated);
    assert_eq!(result.response, "The 2006 V8 will sing for you, Sam!");
    assert_eq!(result.workflow_state, WorkflowState::Engine);
    assert!(result.mentions_canonical_part);
    assert!(result.response_time_sec.is_some());

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /api/generate"));
    assert!(raw.contains("WORKFLOW STATE: ENGINE"));
    assert!(raw.contains("Player: hi\\nNPC: Welcome to the garage!"));
}

#[tokio::test]
async fn unreachable_backend_still_guides_the_player() {
    let config = remote_config("http://127.0.0.1:9");
    let router = pitwall_providers::build_from_config(&config).unwrap();
    let engine = DialogueEngine::from_config(&config, router);

    let result = engine
        .respond(DialogueRequest {
            player_dialogue: "hello".into(),
            sentiment_label: "positive".into(),
            player_id: PlayerId(1),
            context: Vec::new(),
            player_name: String::new(),
            build: None,
        })
        .await
        .unwrap();

    assert_eq!(result.outcome, ReplyOutcome::Fallback);
    assert!(result.response.starts_with("Let's start building your F1 car, driver!"));
    assert!(result.response_time_sec.is_none());
    assert!(result.reply_sentiment.is_none());
}
