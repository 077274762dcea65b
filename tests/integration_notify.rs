//! Integration tests for Telegram notification sending.
//!
//! Uses wiremock to simulate the Telegram Bot API.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use topicwatch::config::SecretString;
use topicwatch::notify::{AlertPayload, NotificationQueue, NotificationWorker, TelegramNotifier};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEND_PATH: &str = "/bot123456:TEST-TOKEN/sendMessage";

fn make_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to create client")
}

fn make_worker(queue: &NotificationQueue, server: &MockServer) -> NotificationWorker {
    let notifier = TelegramNotifier::new(
        "telegram".to_string(),
        server.uri(),
        SecretString::new("123456:TEST-TOKEN".to_string()),
        "42".to_string(),
        make_client(),
    );
    NotificationWorker::new(queue, Arc::new(notifier))
}

async fn run_worker_for(mut worker: NotificationWorker, duration: Duration) {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let handle = tokio::spawn(async move {
        worker.run(cancel_clone).await;
    });

    tokio::time::sleep(duration).await;
    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn alert_is_sent_to_owner() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(
            serde_json::json!({"chat_id": "42", "text": "Door is open"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let queue = NotificationQueue::new(10);
    let worker = make_worker(&queue, &mock_server);
    queue
        .send(AlertPayload::alert("door", "Door is open".to_string()))
        .unwrap();

    run_worker_for(worker, Duration::from_millis(200)).await;
    mock_server.verify().await;
}

#[tokio::test]
async fn status_reply_goes_to_requesting_chat() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(serde_json::json!({"chat_id": "-1001"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let queue = NotificationQueue::new(10);
    let worker = make_worker(&queue, &mock_server);
    queue
        .send(AlertPayload::status(
            "Speed 42 km/h".to_string(),
            Some("-1001".to_string()),
        ))
        .unwrap();

    run_worker_for(worker, Duration::from_millis(200)).await;
    mock_server.verify().await;
}

#[tokio::test]
async fn retry_on_server_error_then_success() {
    let mock_server = MockServer::start().await;

    let request_count = Arc::new(AtomicU32::new(0));
    let request_count_clone = request_count.clone();

    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(move |_req: &wiremock::Request| {
            if request_count_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(500)
            } else {
                ResponseTemplate::new(200)
            }
        })
        .expect(2)
        .mount(&mock_server)
        .await;

    let queue = NotificationQueue::new(10);
    let worker = make_worker(&queue, &mock_server);
    queue
        .send(AlertPayload::alert("battery", "Low battery".to_string()))
        .unwrap();

    // 500ms base backoff plus processing time.
    run_worker_for(worker, Duration::from_millis(1500)).await;
    mock_server.verify().await;
}

#[tokio::test]
async fn failed_delivery_does_not_block_next_alert() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(serde_json::json!({"text": "rejected"})))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(serde_json::json!({"text": "accepted"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let queue = NotificationQueue::new(10);
    let worker = make_worker(&queue, &mock_server);
    queue
        .send(AlertPayload::alert("a", "rejected".to_string()))
        .unwrap();
    queue
        .send(AlertPayload::alert("b", "accepted".to_string()))
        .unwrap();

    run_worker_for(worker, Duration::from_millis(300)).await;
    mock_server.verify().await;
}
