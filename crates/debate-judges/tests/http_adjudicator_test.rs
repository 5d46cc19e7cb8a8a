//! HttpAdjudicator against a one-shot local HTTP server standing in for
//! an OpenAI-compatible endpoint.

use std::time::Duration;

use debate_engine::judging::{Participant, TranscriptRound};
use debate_engine::{
    AdjudicationRequest, Adjudicator, AdjudicatorError, DebateId, Decision, Judge, Position,
    UserId,
};
use debate_judges::{HttpAdjudicator, JudgeConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve exactly one request with `status` and `body`, returning the raw
/// request text.
async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(split) = text.find("\r\n\r\n") {
                let length = text[..split]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if raw.len() >= split + 4 + length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        String::from_utf8_lossy(&raw).to_string()
    });

    (url, handle)
}

fn config(url: String) -> JudgeConfig {
    JudgeConfig {
        url,
        api_key: Some("test-key".into()),
        model: "judge-test".into(),
        temperature: 0.0,
        max_tokens: 256,
        request_timeout: Duration::from_secs(5),
    }
}

fn request() -> AdjudicationRequest {
    AdjudicationRequest {
        debate_id: DebateId::from("d-42"),
        pass: 0,
        topic: "Cities should ban cars downtown".into(),
        category: "urban".into(),
        challenger: Participant {
            user_id: UserId::from("alice"),
            position: Position::For,
        },
        opponent: Participant {
            user_id: UserId::from("bob"),
            position: Position::Against,
        },
        rounds: vec![TranscriptRound {
            round: 1,
            challenger: Some("Pedestrian zones raise retail revenue.".into()),
            opponent: None,
        }],
    }
}

fn judge() -> Judge {
    Judge::new("skeptic", "The Skeptic", "You care about evidence.")
}

fn completion(content: &str) -> String {
    serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
    .to_string()
}

#[tokio::test]
async fn test_scores_from_completion() {
    let reply = r#"{"challenger_score": 8, "opponent_score": 2, "winner": "challenger", "rationale": "Opponent was silent."}"#;
    let (url, server) = serve_once("200 OK", completion(reply)).await;

    let adjudicator = HttpAdjudicator::new(config(url)).unwrap();
    let ruling = adjudicator.score(&judge(), &request()).await.unwrap();
    assert_eq!(ruling.decision, Decision::Challenger);
    assert_eq!(ruling.challenger_score, 8.0);

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /v1/chat/completions"));
    assert!(raw.to_lowercase().contains("authorization: bearer test-key"));
    assert!(raw.contains("\"model\":\"judge-test\""));
    assert!(raw.contains("(no statement)"));
}

#[tokio::test]
async fn test_http_error_is_request_failure() {
    let (url, server) = serve_once("503 Service Unavailable", "{\"error\":\"overloaded\"}".into()).await;

    let adjudicator = HttpAdjudicator::new(config(url)).unwrap();
    let err = adjudicator.score(&judge(), &request()).await.unwrap_err();
    assert!(matches!(err, AdjudicatorError::Request(ref m) if m.contains("503")));
    server.await.unwrap();
}

#[tokio::test]
async fn test_prose_reply_is_malformed() {
    let (url, server) = serve_once("200 OK", completion("The challenger clearly won.")).await;

    let adjudicator = HttpAdjudicator::new(config(url)).unwrap();
    let err = adjudicator.score(&judge(), &request()).await.unwrap_err();
    assert!(matches!(err, AdjudicatorError::Malformed(_)));
    server.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_endpoint_is_request_failure() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1", listener.local_addr().unwrap());
    drop(listener);

    let adjudicator = HttpAdjudicator::new(config(url)).unwrap();
    let err = adjudicator.score(&judge(), &request()).await.unwrap_err();
    assert!(matches!(err, AdjudicatorError::Request(_)));
}
