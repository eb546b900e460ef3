//! Store adapter and task store tests against the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use roundhouse::models::job::{BlueprintJob, BlueprintStyle, JobStatus};
use roundhouse::models::spot::SpotSubject;
use roundhouse::store::{tasks::TaskStore, KvStore, StoreStatus};

fn subject() -> SpotSubject {
    SpotSubject::new("Class 390", "Avanti West Coast")
}

#[tokio::test]
async fn connect_without_url_uses_memory_fallback() {
    let store = KvStore::connect(None).await;
    assert_eq!(store.status(), StoreStatus::InMemoryFallback);
}

#[tokio::test]
async fn connect_with_unreachable_redis_falls_back() {
    // Nothing listens on port 1; connect must absorb the failure.
    let store = KvStore::connect(Some("redis://127.0.0.1:1")).await;
    assert_eq!(store.status(), StoreStatus::InMemoryFallback);
}

#[tokio::test]
async fn set_get_delete_round_trip() {
    let store = KvStore::in_memory();

    assert_eq!(store.get("missing").await, None);

    store.set("k1", "hello", None).await;
    assert_eq!(store.get("k1").await, Some("hello".to_string()));

    store.delete("k1").await;
    assert_eq!(store.get("k1").await, None);
}

#[tokio::test]
async fn memory_backend_expires_keys_by_ttl() {
    let store = KvStore::in_memory();

    store
        .set("ephemeral", "v", Some(Duration::from_millis(40)))
        .await;
    assert_eq!(store.get("ephemeral").await, Some("v".to_string()));

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(store.get("ephemeral").await, None);
}

#[tokio::test]
async fn keys_returns_only_matching_prefix() {
    let store = KvStore::in_memory();
    store.set("roundhouse:job:a", "1", None).await;
    store.set("roundhouse:job:b", "2", None).await;
    store.set("other:c", "3", None).await;

    let mut keys = store.keys("roundhouse:job:").await;
    keys.sort();
    assert_eq!(keys, vec!["roundhouse:job:a", "roundhouse:job:b"]);
}

#[tokio::test]
async fn created_at_round_trips_to_identical_instant() {
    let tasks = TaskStore::new(Arc::new(KvStore::in_memory()));

    let mut job = BlueprintJob::new(subject(), BlueprintStyle::Technical);
    job.created_at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).unwrap();
    tasks.set_job(&job).await;

    let loaded = tasks.get_job(job.id).await.expect("job not found");
    assert_eq!(loaded.created_at, job.created_at);

    // Sub-second precision must survive as well.
    let mut precise = BlueprintJob::new(subject(), BlueprintStyle::Vintage);
    precise.created_at = DateTime::parse_from_rfc3339("2026-01-15T10:30:00.123456789Z")
        .unwrap()
        .with_timezone(&Utc);
    tasks.set_job(&precise).await;

    let loaded = tasks.get_job(precise.id).await.expect("job not found");
    assert_eq!(loaded.created_at, precise.created_at);
}

#[tokio::test]
async fn transition_applies_and_persists() {
    let tasks = TaskStore::new(Arc::new(KvStore::in_memory()));
    let job = BlueprintJob::new(subject(), BlueprintStyle::Technical);
    tasks.set_job(&job).await;

    let updated = tasks
        .transition(job.id, |j| j.begin_processing())
        .await
        .expect("job not found");
    assert_eq!(updated.status, JobStatus::Processing);

    let loaded = tasks.get_job(job.id).await.unwrap();
    assert_eq!(loaded.status, JobStatus::Processing);
}

#[tokio::test]
async fn transition_does_not_touch_terminal_jobs() {
    let tasks = TaskStore::new(Arc::new(KvStore::in_memory()));
    let mut job = BlueprintJob::new(subject(), BlueprintStyle::Technical);
    job.begin_processing();
    job.complete("https://img/390.png".to_string());
    tasks.set_job(&job).await;

    let after = tasks
        .transition(job.id, |j| j.fail("late failure".to_string()))
        .await
        .expect("job not found");

    assert_eq!(after.status, JobStatus::Completed);
    assert_eq!(after.image_url.as_deref(), Some("https://img/390.png"));
    assert_eq!(after.error, None);
}

#[tokio::test]
async fn transition_returns_none_for_unknown_id() {
    let tasks = TaskStore::new(Arc::new(KvStore::in_memory()));
    let result = tasks
        .transition(uuid::Uuid::new_v4(), |j| j.begin_processing())
        .await;
    assert!(result.is_none());
}

#[tokio::test]
async fn corrupt_job_record_reads_as_missing() {
    let kv = Arc::new(KvStore::in_memory());
    let tasks = TaskStore::new(Arc::clone(&kv));

    let id = uuid::Uuid::new_v4();
    kv.set(&format!("roundhouse:job:{id}"), "not json {{{", None)
        .await;

    assert!(tasks.get_job(id).await.is_none());
}

#[tokio::test]
async fn sweep_deletes_jobs_older_than_max_age() {
    let tasks = TaskStore::new(Arc::new(KvStore::in_memory()));

    let mut old = BlueprintJob::new(subject(), BlueprintStyle::Technical);
    old.created_at = Utc::now() - chrono::Duration::hours(2);
    tasks.set_job(&old).await;

    let fresh = BlueprintJob::new(subject(), BlueprintStyle::Technical);
    tasks.set_job(&fresh).await;

    let removed = tasks.sweep_expired(Duration::from_secs(60 * 60)).await;

    assert_eq!(removed, 1);
    assert!(tasks.get_job(old.id).await.is_none());
    assert!(tasks.get_job(fresh.id).await.is_some());
}

#[tokio::test]
async fn sweep_ignores_status_when_computing_age() {
    let tasks = TaskStore::new(Arc::new(KvStore::in_memory()));

    // A long-completed job is still swept once old enough.
    let mut done = BlueprintJob::new(subject(), BlueprintStyle::Cinematic);
    done.created_at = Utc::now() - chrono::Duration::hours(3);
    done.begin_processing();
    done.complete("https://img/390.png".to_string());
    tasks.set_job(&done).await;

    let removed = tasks.sweep_expired(Duration::from_secs(60 * 60)).await;

    assert_eq!(removed, 1);
    assert!(tasks.get_job(done.id).await.is_none());
}
