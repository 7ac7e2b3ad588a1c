// Integration tests for the Beacon API
// Run with: cargo test --test integration_test -- --ignored
// Requires a running server, e.g.: RELAY_STORE=memory cargo run -p beacon-api

use futures::StreamExt;
use serde_json::json;
use std::time::Duration;

const API_BASE_URL: &str = "http://localhost:9000";

/// Read SSE `data:` payloads off a response until `complete` or timeout
async fn collect_sse_events(response: reqwest::Response) -> Vec<serde_json::Value> {
    let mut events = Vec::new();
    let mut buffer = String::new();
    let mut body = response.bytes_stream();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let chunk = tokio::select! {
            chunk = body.next() => chunk,
            _ = tokio::time::sleep_until(deadline) => break,
        };
        let Some(Ok(chunk)) = chunk else { break };
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buffer.find("\n\n") {
            let frame = buffer[..pos].to_string();
            buffer.drain(..pos + 2);
            for line in frame.lines() {
                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                let Ok(event) = serde_json::from_str::<serde_json::Value>(data) else {
                    continue;
                };
                let terminal = event["type"] == "complete";
                events.push(event);
                if terminal {
                    return events;
                }
            }
        }
    }
    events
}

#[tokio::test]
#[ignore]
async fn test_health_endpoint() {
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", API_BASE_URL))
        .send()
        .await
        .expect("Failed to call health endpoint");

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    println!("Health check: {:?}", body);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
#[ignore]
async fn test_blast_streams_progress_to_subscriber() {
    let client = reqwest::Client::new();
    let session_id = format!("itest-{}", uuid::Uuid::new_v4());

    // Step 1: subscribe first so the blast has a receiver
    println!("Subscribing to {}", session_id);
    let stream_response = client
        .get(format!(
            "{}/v1/streams/{}/sse",
            API_BASE_URL, session_id
        ))
        .send()
        .await
        .expect("Failed to subscribe");
    assert_eq!(stream_response.status(), 200);
    assert_eq!(
        stream_response.headers()["cache-control"],
        "no-cache",
        "stream must not be cached"
    );

    let collector = tokio::spawn(collect_sse_events(stream_response));

    // Step 2: start a 3-message blast on the same session
    println!("Starting blast...");
    let response = client
        .post(format!("{}/v1/blasts", API_BASE_URL))
        .json(&json!({
            "session_id": session_id,
            "messages": [
                { "to": "+16125550100", "body": "first" },
                { "to": "+16125550101", "body": "second" },
                { "to": "+16125550102", "body": "third" }
            ]
        }))
        .send()
        .await
        .expect("Failed to start blast");
    assert_eq!(response.status(), 202);

    // Step 3: the stream sees connected, one event per message, complete
    let events = collector.await.expect("collector panicked");
    println!("Streamed {} events", events.len());
    assert_eq!(events.first().unwrap()["type"], "connected");
    assert_eq!(events.last().unwrap()["type"], "complete");
    let deliveries = events
        .iter()
        .filter(|e| e["type"] == "delivery" || e["type"] == "error")
        .count();
    assert_eq!(deliveries, 3);

    // Step 4: once complete, the session is gone from the monitor
    let overview: serde_json::Value = client
        .get(format!("{}/v1/streams", API_BASE_URL))
        .send()
        .await
        .expect("Failed to fetch overview")
        .json()
        .await
        .expect("Failed to parse overview");
    let still_there = overview["sessions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s["session_id"] == session_id.as_str());
    assert!(!still_there, "completed session should be torn down");
}

#[tokio::test]
#[ignore]
async fn test_sweep_endpoint_is_idempotent() {
    let client = reqwest::Client::new();

    let first: serde_json::Value = client
        .post(format!("{}/v1/maintenance/sweep", API_BASE_URL))
        .send()
        .await
        .expect("Failed to trigger sweep")
        .json()
        .await
        .expect("Failed to parse report");
    println!("First sweep: {:?}", first);

    let second: serde_json::Value = client
        .post(format!("{}/v1/maintenance/sweep", API_BASE_URL))
        .send()
        .await
        .expect("Failed to trigger sweep")
        .json()
        .await
        .expect("Failed to parse report");
    println!("Second sweep: {:?}", second);

    // with no intervening activity the second pass removes nothing
    assert_eq!(second["orphaned_inboxes"], 0);
    assert_eq!(second["expired_sessions"], 0);
    assert_eq!(second["aged_sessions"], 0);
}

#[tokio::test]
#[ignore]
async fn test_openapi_spec() {
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api-doc/openapi.json", API_BASE_URL))
        .send()
        .await
        .expect("Failed to get OpenAPI spec");

    assert_eq!(response.status(), 200);
    let spec: serde_json::Value = response.json().await.expect("Failed to parse spec");
    println!("OpenAPI spec title: {}", spec["info"]["title"]);
    assert_eq!(spec["info"]["title"], "Beacon API");
}
