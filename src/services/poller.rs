//! Remote polling client for the blueprint status endpoint.
//!
//! Polls at a fixed interval until the job reaches a terminal state, the
//! deadline passes, or the poll is cancelled. Cancellation is a flag checked
//! before each request: a request already in flight may still complete and
//! fire one final update, but no further request follows it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::api::JobSnapshot;

pub struct StatusPoller {
    http: reqwest::Client,
    base_url: String,
    interval: Duration,
    deadline: Duration,
}

/// Handle to an in-progress poll.
pub struct PollHandle {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<Option<String>>,
}

impl PollHandle {
    /// Stop scheduling new requests. One request already in flight may still
    /// complete and fire a final update.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Await the poll outcome: the image URL when the job completed, `None`
    /// when the job failed, the deadline passed, or the poll was cancelled.
    pub async fn outcome(self) -> Option<String> {
        self.task.await.unwrap_or(None)
    }
}

impl StatusPoller {
    pub fn new(base_url: impl Into<String>, interval: Duration, deadline: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            interval,
            deadline,
        }
    }

    /// Poller using the configured poll interval and deadline.
    pub fn from_config(base_url: impl Into<String>, config: &AppConfig) -> Self {
        Self::new(
            base_url,
            Duration::from_millis(config.poll_interval_ms),
            Duration::from_millis(config.poll_deadline_ms),
        )
    }

    /// Poll the status endpoint for `job_id`, invoking `on_update` with each
    /// snapshot received. Not-found responses and transport errors are
    /// absorbed and retried until the job turns terminal, the deadline
    /// passes, or [`PollHandle::cancel`] is called.
    pub fn poll<F>(&self, job_id: Uuid, mut on_update: F) -> PollHandle
    where
        F: FnMut(&JobSnapshot) + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let http = self.http.clone();
        let url = format!("{}/api/v1/blueprints/{}", self.base_url, job_id);
        let interval = self.interval;
        let deadline = self.deadline;

        let task = tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            loop {
                if flag.load(Ordering::Relaxed) {
                    tracing::debug!(job_id = %job_id, "poll cancelled");
                    return None;
                }
                if started.elapsed() > deadline {
                    tracing::debug!(job_id = %job_id, "poll deadline passed");
                    return None;
                }

                match http.get(&url).send().await {
                    Ok(response) if response.status().is_success() => {
                        match response.json::<JobSnapshot>().await {
                            Ok(snapshot) => {
                                on_update(&snapshot);
                                if snapshot.status.is_terminal() {
                                    return snapshot.image_url;
                                }
                            }
                            Err(e) => {
                                tracing::debug!(job_id = %job_id, error = %e, "malformed status response");
                            }
                        }
                    }
                    Ok(response) => {
                        tracing::debug!(job_id = %job_id, status = %response.status(), "status request rejected");
                    }
                    Err(e) => {
                        tracing::debug!(job_id = %job_id, error = %e, "status request failed");
                    }
                }

                tokio::time::sleep(interval).await;
            }
        });

        PollHandle { cancelled, task }
    }
}
