//! Image generation providers.
//!
//! Two interchangeable clients behind [`BlueprintProvider`]: OpenAI's image
//! endpoint (single call) and Replicate's prediction API (submit, then poll
//! until the prediction settles). Which one is used is decided once at
//! startup by [`from_config`]; the orchestrator fails fast when neither is
//! configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::models::job::BlueprintStyle;
use crate::models::spot::SpotSubject;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned error: {0}")]
    Api(String),

    #[error("generation did not finish after {0} status checks")]
    Timeout(u32),
}

/// A configured image generation backend. Exactly one render call is made
/// per job; the provider either returns an image URL or an error.
#[async_trait]
pub trait BlueprintProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn render(
        &self,
        subject: &SpotSubject,
        style: BlueprintStyle,
    ) -> Result<String, ProviderError>;
}

/// Pick the first configured provider, OpenAI preferred.
pub fn from_config(config: &AppConfig) -> Option<Arc<dyn BlueprintProvider>> {
    if let Some(key) = &config.openai_api_key {
        return Some(Arc::new(OpenAiImageClient::new(key.clone())));
    }
    if let Some(token) = &config.replicate_api_token {
        return Some(Arc::new(ReplicateClient::new(token.clone())));
    }
    None
}

fn style_directive(style: BlueprintStyle) -> &'static str {
    match style {
        BlueprintStyle::Technical => {
            "a precise engineering blueprint, white line work on a deep blue background, \
             orthographic side elevation with dimension callouts"
        }
        BlueprintStyle::Vintage => {
            "a weathered mid-century railway poster illustration, muted inks and visible \
             paper grain"
        }
        BlueprintStyle::Schematic => {
            "a clean black-and-white schematic diagram, thin uniform line weight, \
             labelled components"
        }
        BlueprintStyle::Cinematic => {
            "a dramatic cinematic render at golden hour, low angle, shallow depth of field"
        }
    }
}

fn build_prompt(subject: &SpotSubject, style: BlueprintStyle) -> String {
    format!(
        "A {} railway unit in the livery of {}, rendered as {}.",
        subject.class,
        subject.operator,
        style_directive(style)
    )
}

// ============================================================================
// OpenAI (single-call image API)
// ============================================================================

const OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";

pub struct OpenAiImageClient {
    http: Client,
    api_key: String,
}

#[derive(Deserialize)]
struct OpenAiImageResponse {
    data: Vec<OpenAiImage>,
}

#[derive(Deserialize)]
struct OpenAiImage {
    url: Option<String>,
}

impl OpenAiImageClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl BlueprintProvider for OpenAiImageClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn render(
        &self,
        subject: &SpotSubject,
        style: BlueprintStyle,
    ) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "model": "dall-e-3",
            "prompt": build_prompt(subject, style),
            "n": 1,
            "size": "1024x1024",
        });

        let response = self
            .http
            .post(OPENAI_IMAGES_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!(
                "openai returned {status}: {detail}"
            )));
        }

        let parsed: OpenAiImageResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .and_then(|image| image.url)
            .ok_or_else(|| ProviderError::Api("openai response contained no image URL".into()))
    }
}

// ============================================================================
// Replicate (submit prediction, poll until settled)
// ============================================================================

const REPLICATE_PREDICTIONS_URL: &str = "https://api.replicate.com/v1/predictions";
const REPLICATE_SDXL_VERSION: &str =
    "39ed52f2a78e934b3ba6e2a89f5b1c712de7dfea535525255b1aa35c5565e08b";
const REPLICATE_POLL_INTERVAL: Duration = Duration::from_secs(2);
const REPLICATE_MAX_POLLS: u32 = 150;

pub struct ReplicateClient {
    http: Client,
    api_token: String,
}

#[derive(Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl ReplicateClient {
    pub fn new(api_token: String) -> Self {
        Self {
            http: Client::new(),
            api_token,
        }
    }

    async fn fetch_prediction(&self, id: &str) -> Result<Prediction, ProviderError> {
        let response = self
            .http
            .get(format!("{REPLICATE_PREDICTIONS_URL}/{id}"))
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!(
                "replicate returned {status}: {detail}"
            )));
        }
        Ok(response.json().await?)
    }
}

/// Replicate output is a bare string for some models and an array of URLs
/// for others; accept both.
fn output_url(output: Option<serde_json::Value>) -> Option<String> {
    match output {
        Some(serde_json::Value::String(url)) => Some(url),
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .find_map(|item| item.as_str().map(String::from)),
        _ => None,
    }
}

#[async_trait]
impl BlueprintProvider for ReplicateClient {
    fn name(&self) -> &'static str {
        "replicate"
    }

    async fn render(
        &self,
        subject: &SpotSubject,
        style: BlueprintStyle,
    ) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "version": REPLICATE_SDXL_VERSION,
            "input": { "prompt": build_prompt(subject, style) },
        });

        let response = self
            .http
            .post(REPLICATE_PREDICTIONS_URL)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!(
                "replicate returned {status}: {detail}"
            )));
        }

        let created: Prediction = response.json().await?;
        let prediction_id = created.id;

        for _ in 0..REPLICATE_MAX_POLLS {
            tokio::time::sleep(REPLICATE_POLL_INTERVAL).await;
            let prediction = self.fetch_prediction(&prediction_id).await?;
            match prediction.status.as_str() {
                "succeeded" => {
                    return output_url(prediction.output).ok_or_else(|| {
                        ProviderError::Api("replicate prediction had no output URL".into())
                    });
                }
                "failed" | "canceled" => {
                    return Err(ProviderError::Api(
                        prediction
                            .error
                            .unwrap_or_else(|| "prediction failed without detail".into()),
                    ));
                }
                _ => {}
            }
        }

        Err(ProviderError::Timeout(REPLICATE_MAX_POLLS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_url_accepts_string_and_array() {
        assert_eq!(
            output_url(Some(serde_json::json!("https://x/a.png"))),
            Some("https://x/a.png".to_string())
        );
        assert_eq!(
            output_url(Some(serde_json::json!(["https://x/b.png", "https://x/c.png"]))),
            Some("https://x/b.png".to_string())
        );
        assert_eq!(output_url(Some(serde_json::json!({}))), None);
        assert_eq!(output_url(None), None);
    }

    #[test]
    fn prompt_mentions_subject_and_style() {
        let subject = SpotSubject::new("Class 390", "Avanti West Coast");
        let prompt = build_prompt(&subject, BlueprintStyle::Vintage);
        assert!(prompt.contains("Class 390"));
        assert!(prompt.contains("Avanti West Coast"));
        assert!(prompt.contains("poster"));
    }
}
