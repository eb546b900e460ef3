use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::api::{BlueprintAccepted, CreateBlueprintRequest, JobSnapshot};
use crate::models::job::JobStatus;
use crate::models::spot::{SpotEnrichment, SpotSubject};
use crate::services::blueprints::BlueprintError;

/// POST /api/v1/blueprints — start a blueprint generation job.
///
/// Invalid styles are normalized to the default, never rejected; only the
/// subject identity is validated. No configured provider maps to 503.
pub async fn submit_blueprint(
    State(state): State<AppState>,
    Json(request): Json<CreateBlueprintRequest>,
) -> Result<(StatusCode, Json<BlueprintAccepted>), StatusCode> {
    request.validate().map_err(|_| StatusCode::BAD_REQUEST)?;

    let subject = SpotSubject::new(request.class, request.operator);
    let enrichment = if request.specs.is_some() || request.facts.is_some() || request.rarity.is_some()
    {
        Some(SpotEnrichment {
            specs: request.specs.unwrap_or_default(),
            facts: request.facts.unwrap_or_default(),
            rarity: request.rarity.unwrap_or_default(),
        })
    } else {
        None
    };

    match state
        .blueprints
        .start_job(subject, enrichment, request.style.as_deref())
        .await
    {
        Ok(job_id) => Ok((
            StatusCode::ACCEPTED,
            Json(BlueprintAccepted {
                job_id,
                status: JobStatus::Queued,
            }),
        )),
        Err(BlueprintError::NoProvider) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

/// GET /api/v1/blueprints/{job_id} — check blueprint job status.
pub async fn get_blueprint_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobSnapshot>, StatusCode> {
    match state.blueprints.get_status(job_id).await {
        Some(job) => Ok(Json(JobSnapshot::from(job))),
        None => Err(StatusCode::NOT_FOUND),
    }
}
