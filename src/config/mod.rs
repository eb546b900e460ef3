use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Redis connection string for the job store. Unset or unreachable
    /// falls back to the in-memory store.
    pub redis_url: Option<String>,

    /// Path of the persisted spot cache file.
    #[serde(default = "default_cache_path")]
    pub cache_path: String,

    /// OpenAI API key (single-call image API).
    pub openai_api_key: Option<String>,

    /// Replicate API token (submit-then-poll prediction API).
    pub replicate_api_token: Option<String>,

    /// Jobs older than this are deleted by the sweep, whatever their status.
    #[serde(default = "default_job_max_age_ms")]
    pub job_max_age_ms: u64,

    /// Interval between sweep runs.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Interval between status requests made by the polling client.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Hard deadline after which a poll resolves with no result.
    #[serde(default = "default_poll_deadline_ms")]
    pub poll_deadline_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_cache_path() -> String {
    "data/spot_cache.json".to_string()
}

fn default_job_max_age_ms() -> u64 {
    24 * 60 * 60 * 1000 // 24 hours
}

fn default_sweep_interval_ms() -> u64 {
    10 * 60 * 1000 // 10 minutes
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_poll_deadline_ms() -> u64 {
    120_000
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
