//! Blueprint job orchestrator.
//!
//! `start_job` persists a queued job and returns its id before the
//! generation work begins, so a caller can always query the id it was just
//! handed. The generation itself runs as a detached task that writes its
//! outcome back through the task store; nothing awaits it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::models::job::{BlueprintJob, BlueprintStyle};
use crate::models::spot::{SpotEnrichment, SpotSubject};
use crate::services::cache::SpotCache;
use crate::services::providers::BlueprintProvider;
use crate::store::tasks::TaskStore;

#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    #[error("no blueprint generation provider is configured")]
    NoProvider,
}

pub struct BlueprintService {
    tasks: Arc<TaskStore>,
    cache: Arc<SpotCache>,
    provider: Option<Arc<dyn BlueprintProvider>>,
}

impl BlueprintService {
    pub fn new(
        tasks: Arc<TaskStore>,
        cache: Arc<SpotCache>,
        provider: Option<Arc<dyn BlueprintProvider>>,
    ) -> Self {
        Self {
            tasks,
            cache,
            provider,
        }
    }

    /// Start a blueprint generation job. The job is persisted in `queued`
    /// before the id is returned; generation runs in the background and the
    /// provider is called exactly once, with no retry on failure.
    pub async fn start_job(
        &self,
        subject: SpotSubject,
        enrichment: Option<SpotEnrichment>,
        style: Option<&str>,
    ) -> Result<Uuid, BlueprintError> {
        let provider = self.provider.clone().ok_or(BlueprintError::NoProvider)?;
        let style = BlueprintStyle::parse_or_default(style);

        let job = BlueprintJob::new(subject.clone(), style);
        let job_id = job.id;
        self.tasks.set_job(&job).await;
        metrics::counter!("blueprint_jobs_total").increment(1);

        tracing::info!(
            job_id = %job_id,
            class = %subject.class,
            operator = %subject.operator,
            style = %style,
            provider = provider.name(),
            "blueprint job created"
        );

        let tasks = Arc::clone(&self.tasks);
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            run_generation(tasks, cache, provider, job_id, subject, enrichment, style).await;
        });

        Ok(job_id)
    }

    /// Pure read; `None` for unknown or expired ids.
    pub async fn get_status(&self, job_id: Uuid) -> Option<BlueprintJob> {
        self.tasks.get_job(job_id).await
    }

    /// Delete jobs older than `max_age`. Invoked on a timer owned by the
    /// process, independent of request traffic.
    pub async fn sweep(&self, max_age: Duration) -> usize {
        let removed = self.tasks.sweep_expired(max_age).await;
        if removed > 0 {
            metrics::counter!("blueprint_jobs_swept_total").increment(removed as u64);
        }
        removed
    }
}

async fn run_generation(
    tasks: Arc<TaskStore>,
    cache: Arc<SpotCache>,
    provider: Arc<dyn BlueprintProvider>,
    job_id: Uuid,
    subject: SpotSubject,
    enrichment: Option<SpotEnrichment>,
    style: BlueprintStyle,
) {
    tasks.transition(job_id, |job| job.begin_processing()).await;

    let start = Instant::now();
    match provider.render(&subject, style).await {
        Ok(url) => {
            metrics::histogram!("blueprint_generation_seconds")
                .record(start.elapsed().as_secs_f64());

            // Record the blueprint before the job turns terminal, so a
            // caller that observes `completed` finds the cache populated.
            if let Some(enrichment) = enrichment {
                if !cache.contains(&subject).await {
                    cache.write(&subject, enrichment).await;
                }
            }
            cache.write_blueprint(&subject, &url, style).await;

            tasks.transition(job_id, |job| job.complete(url)).await;
            metrics::counter!("blueprint_jobs_completed").increment(1);

            tracing::info!(
                job_id = %job_id,
                style = %style,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "blueprint generation completed"
            );
        }
        Err(e) => {
            tasks
                .transition(job_id, |job| job.fail(e.to_string()))
                .await;
            metrics::counter!("blueprint_jobs_failed").increment(1);

            tracing::error!(job_id = %job_id, error = %e, "blueprint generation failed");
        }
    }
}
