//! Typed job persistence over the key-value adapter.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::job::BlueprintJob;
use crate::store::KvStore;

const JOB_KEY_PREFIX: &str = "roundhouse:job:";

fn job_key(id: Uuid) -> String {
    format!("{JOB_KEY_PREFIX}{id}")
}

/// Job records stored as JSON under `roundhouse:job:<id>`.
///
/// All mutation after creation goes through [`TaskStore::transition`], which
/// holds the store's write mutex across the read-modify-write, so a sweep
/// and a status update on the same job cannot interleave.
pub struct TaskStore {
    kv: Arc<KvStore>,
    write_lock: Mutex<()>,
}

impl TaskStore {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn set_job(&self, job: &BlueprintJob) {
        match serde_json::to_string(job) {
            Ok(payload) => self.kv.set(&job_key(job.id), &payload, None).await,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "failed to serialize job record");
            }
        }
    }

    pub async fn get_job(&self, id: Uuid) -> Option<BlueprintJob> {
        let raw = self.kv.get(&job_key(id)).await?;
        match serde_json::from_str(&raw) {
            Ok(job) => Some(job),
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "corrupt job record, treating as missing");
                None
            }
        }
    }

    pub async fn delete_job(&self, id: Uuid) {
        self.kv.delete(&job_key(id)).await;
    }

    /// Serialized read-modify-write on one job. Skips jobs that are missing
    /// or already terminal (terminal states are absorbing), returning the
    /// record as stored after the call.
    pub async fn transition<F>(&self, id: Uuid, apply: F) -> Option<BlueprintJob>
    where
        F: FnOnce(&mut BlueprintJob),
    {
        let _guard = self.write_lock.lock().await;
        let mut job = self.get_job(id).await?;
        if job.status.is_terminal() {
            return Some(job);
        }
        apply(&mut job);
        self.set_job(&job).await;
        Some(job)
    }

    /// Delete every job older than `max_age`, regardless of status. Operates
    /// on a key snapshot taken at sweep start; jobs created after that are
    /// untouched. Returns the number of records removed.
    pub async fn sweep_expired(&self, max_age: Duration) -> usize {
        let keys = self.kv.keys(JOB_KEY_PREFIX).await;
        let now = Utc::now();
        let mut removed = 0;

        for key in keys {
            let _guard = self.write_lock.lock().await;
            let Some(raw) = self.kv.get(&key).await else {
                continue;
            };
            match serde_json::from_str::<BlueprintJob>(&raw) {
                Ok(job) => {
                    let age = now.signed_duration_since(job.created_at);
                    if age.num_milliseconds() as i128 > max_age.as_millis() as i128 {
                        self.kv.delete(&key).await;
                        removed += 1;
                        tracing::debug!(job_id = %job.id, status = %job.status, "swept expired job");
                    }
                }
                Err(e) => {
                    // Unreadable records can never be served; reclaim them.
                    tracing::warn!(key = %key, error = %e, "sweeping corrupt job record");
                    self.kv.delete(&key).await;
                    removed += 1;
                }
            }
        }

        removed
    }
}
