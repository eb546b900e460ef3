use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::store::StoreStatus;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub store: ComponentHealth,
    pub cache: CacheHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
}

#[derive(Serialize)]
pub struct CacheHealth {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// GET /health — component status.
///
/// Running on the in-memory store fallback is degraded but still 200: the
/// process serves requests, it just loses job records on restart.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store_status = state.store.status();
    let cache_stats = state.cache.stats().await;

    let status = match store_status {
        StoreStatus::Connected => "ok",
        StoreStatus::InMemoryFallback => "degraded",
    };

    let response = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            store: ComponentHealth {
                status: store_status.as_str().to_string(),
            },
            cache: CacheHealth {
                entries: cache_stats.total_entries,
                hits: cache_stats.total_hits,
                misses: cache_stats.total_misses,
            },
        },
    };

    (StatusCode::OK, Json(response))
}
