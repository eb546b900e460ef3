use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::{BlueprintJob, BlueprintStyle, JobStatus};

/// Request to start a blueprint generation job.
///
/// `style` is normalized with a default, never rejected; only the subject
/// identity is validated.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBlueprintRequest {
    #[garde(length(min = 1, max = 200))]
    pub class: String,

    #[garde(length(min = 1, max = 200))]
    pub operator: String,

    #[garde(skip)]
    pub style: Option<String>,

    #[garde(skip)]
    pub specs: Option<serde_json::Value>,

    #[garde(skip)]
    pub facts: Option<serde_json::Value>,

    #[garde(skip)]
    pub rarity: Option<serde_json::Value>,
}

/// Response after a blueprint job has been accepted.
#[derive(Debug, Serialize, Deserialize)]
pub struct BlueprintAccepted {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Snapshot of a job returned by the status endpoint and consumed by the
/// polling client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub style: BlueprintStyle,
    pub class: String,
    pub operator: String,
    pub image_url: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<BlueprintJob> for JobSnapshot {
    fn from(job: BlueprintJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            style: job.style,
            class: job.subject.class,
            operator: job.subject.operator,
            image_url: job.image_url,
            error: job.error,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}
