use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::spot::SpotSubject;

/// Status of a blueprint generation job.
///
/// Transitions are strictly `queued → processing → {completed | failed}`;
/// a terminal state is never left.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Rendering style for a generated blueprint illustration.
///
/// Unknown or missing style strings are never rejected; callers go through
/// [`BlueprintStyle::parse_or_default`], which falls back to `technical`.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, EnumString, Display, PartialEq, Eq,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BlueprintStyle {
    #[default]
    Technical,
    Vintage,
    Schematic,
    Cinematic,
}

impl BlueprintStyle {
    /// Parse a style string, defaulting to `technical` for unknown or
    /// missing values. Case-insensitive; never fails.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().to_ascii_lowercase().parse().ok())
            .unwrap_or_default()
    }
}

/// A blueprint generation job.
///
/// In a terminal state exactly one of `image_url` (completed) and `error`
/// (failed) is set; neither is set before that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintJob {
    pub id: Uuid,
    pub subject: SpotSubject,
    pub style: BlueprintStyle,
    pub status: JobStatus,
    pub image_url: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BlueprintJob {
    pub fn new(subject: SpotSubject, style: BlueprintStyle) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject,
            style,
            status: JobStatus::Queued,
            image_url: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn begin_processing(&mut self) {
        self.status = JobStatus::Processing;
    }

    pub fn complete(&mut self, image_url: String) {
        self.status = JobStatus::Completed;
        self.image_url = Some(image_url);
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
    }
}
