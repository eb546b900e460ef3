//! Polling client tests against a mocked status endpoint.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use roundhouse::models::job::JobStatus;
use roundhouse::services::poller::StatusPoller;

fn snapshot_body(job_id: Uuid, status: &str, image_url: Option<&str>) -> serde_json::Value {
    let terminal = status == "completed" || status == "failed";
    serde_json::json!({
        "job_id": job_id,
        "status": status,
        "style": "technical",
        "class": "Class 390",
        "operator": "Avanti West Coast",
        "image_url": image_url,
        "error": if status == "failed" { Some("render backend exploded") } else { None },
        "created_at": "2026-01-15T10:30:00Z",
        "completed_at": if terminal { Some("2026-01-15T10:31:00Z") } else { None },
    })
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

#[tokio::test]
async fn resolves_url_after_two_processing_polls() {
    let server = MockServer::start().await;
    let job_id = Uuid::new_v4();
    let status_path = format!("/api/v1/blueprints/{job_id}");

    Mock::given(method("GET"))
        .and(path(status_path.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body(
            job_id,
            "processing",
            None,
        )))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(status_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body(
            job_id,
            "completed",
            Some("https://x/y.png"),
        )))
        .mount(&server)
        .await;

    let poller = StatusPoller::new(server.uri(), Duration::from_millis(40), Duration::from_secs(5));

    let updates = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&updates);
    let handle = poller.poll(job_id, move |snapshot| {
        seen.lock().unwrap().push(snapshot.status);
    });

    assert_eq!(handle.outcome().await, Some("https://x/y.png".to_string()));

    let updates = updates.lock().unwrap();
    assert!(updates.len() >= 2, "expected at least two updates, got {updates:?}");
    assert_eq!(updates.last(), Some(&JobStatus::Completed));
}

#[tokio::test]
async fn failed_job_resolves_none_with_final_update() {
    let server = MockServer::start().await;
    let job_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/blueprints/{job_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body(job_id, "failed", None)))
        .mount(&server)
        .await;

    let poller = StatusPoller::new(server.uri(), Duration::from_millis(40), Duration::from_secs(5));

    let updates = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&updates);
    let handle = poller.poll(job_id, move |snapshot| {
        seen.lock().unwrap().push((snapshot.status, snapshot.error.clone()));
    });

    // Failure is an ordinary outcome: no URL, but the update carries the cause.
    assert_eq!(handle.outcome().await, None);
    let updates = updates.lock().unwrap();
    let (status, error) = updates.last().unwrap();
    assert_eq!(*status, JobStatus::Failed);
    assert_eq!(error.as_deref(), Some("render backend exploded"));
}

#[tokio::test]
async fn deadline_resolves_none_and_stops_requesting() {
    let server = MockServer::start().await;
    let job_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/blueprints/{job_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body(
            job_id,
            "processing",
            None,
        )))
        .mount(&server)
        .await;

    let poller = StatusPoller::new(
        server.uri(),
        Duration::from_millis(30),
        Duration::from_millis(200),
    );

    let handle = poller.poll(job_id, |_| {});
    assert_eq!(handle.outcome().await, None);

    let after_deadline = request_count(&server).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(request_count(&server).await, after_deadline);
}

#[tokio::test]
async fn cancel_allows_at_most_one_further_request() {
    let server = MockServer::start().await;
    let job_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/blueprints/{job_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body(
            job_id,
            "processing",
            None,
        )))
        .mount(&server)
        .await;

    let poller = StatusPoller::new(server.uri(), Duration::from_millis(50), Duration::from_secs(10));
    let handle = poller.poll(job_id, |_| {});

    tokio::time::sleep(Duration::from_millis(120)).await;
    handle.cancel();
    let at_cancel = request_count(&server).await;

    assert_eq!(handle.outcome().await, None);
    tokio::time::sleep(Duration::from_millis(250)).await;

    let after = request_count(&server).await;
    assert!(
        after <= at_cancel + 1,
        "observed {} requests after cancellation at {}",
        after - at_cancel,
        at_cancel
    );
}

#[tokio::test]
async fn not_found_is_absorbed_until_job_appears() {
    let server = MockServer::start().await;
    let job_id = Uuid::new_v4();
    let status_path = format!("/api/v1/blueprints/{job_id}");

    // The store may lag job creation; 404s are retried, not fatal.
    Mock::given(method("GET"))
        .and(path(status_path.clone()))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(status_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body(
            job_id,
            "completed",
            Some("https://x/y.png"),
        )))
        .mount(&server)
        .await;

    let poller = StatusPoller::new(server.uri(), Duration::from_millis(30), Duration::from_secs(5));
    let handle = poller.poll(job_id, |_| {});

    assert_eq!(handle.outcome().await, Some("https://x/y.png".to_string()));
}
