use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use roundhouse::app_state::AppState;
use roundhouse::config::AppConfig;
use roundhouse::routes;
use roundhouse::services::{blueprints::BlueprintService, cache::SpotCache, providers};
use roundhouse::store::{tasks::TaskStore, KvStore};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing roundhouse server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("blueprint_jobs_total", "Total blueprint jobs submitted");
    metrics::describe_counter!("blueprint_jobs_completed", "Total blueprint jobs completed");
    metrics::describe_counter!("blueprint_jobs_failed", "Total blueprint jobs that failed");
    metrics::describe_counter!(
        "blueprint_jobs_swept_total",
        "Total expired blueprint jobs removed by the sweep"
    );
    metrics::describe_histogram!(
        "blueprint_generation_seconds",
        "Time spent in the generation provider per job"
    );
    metrics::describe_counter!("spot_cache_hits_total", "Spot cache lookups that found an entry");
    metrics::describe_counter!("spot_cache_misses_total", "Spot cache lookups that found nothing");

    // Connect the job store (Redis if reachable, in-memory otherwise)
    let store = Arc::new(KvStore::connect(config.redis_url.as_deref()).await);
    tracing::info!(store = store.status().as_str(), "job store ready");

    // Open the persisted spot cache
    let cache = Arc::new(SpotCache::with_file(&config.cache_path));

    // Select the generation provider
    let provider = providers::from_config(&config);
    match &provider {
        Some(p) => tracing::info!(provider = p.name(), "blueprint provider configured"),
        None => tracing::warn!("no blueprint provider configured; blueprint requests will be rejected"),
    }

    let tasks = Arc::new(TaskStore::new(Arc::clone(&store)));
    let blueprints = BlueprintService::new(tasks, Arc::clone(&cache), provider);

    // Create shared application state
    let state = AppState::new(store, cache, blueprints);

    // Recurring sweep of expired jobs, independent of request traffic
    let sweeper = Arc::clone(&state.blueprints);
    let max_age = Duration::from_millis(config.job_max_age_ms);
    let mut ticker = tokio::time::interval(Duration::from_millis(config.sweep_interval_ms));
    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            let removed = sweeper.sweep(max_age).await;
            if removed > 0 {
                tracing::info!(removed, "swept expired blueprint jobs");
            }
        }
    });

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/blueprints", post(routes::blueprints::submit_blueprint))
        .route(
            "/api/v1/blueprints/{job_id}",
            get(routes::blueprints::get_blueprint_status),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    tracing::info!("Starting roundhouse on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
