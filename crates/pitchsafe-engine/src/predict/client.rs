// HTTP client for the prediction service (`/predict`, `/health`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{PredictionError, PredictionRequest, PredictionService, RawPrediction};
use crate::config::PredictionConfig;

/// `{ success, data | error }` envelope returned by `/predict`.
#[derive(Debug, Deserialize)]
struct PredictEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Vec<RawPrediction>>,
    #[serde(default)]
    error: Option<String>,
}

/// reqwest-backed [`PredictionService`].
pub struct HttpPredictionService {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpPredictionService {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PredictionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PredictionError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &PredictionConfig) -> Result<Self, PredictionError> {
        Self::new(&config.service_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /health`; true only for `{"status": "healthy"}`.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        let response = match self.http.get(&url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(status = %r.status(), "health check returned non-success status");
                return false;
            }
            Err(e) => {
                debug!("health check failed: {e}");
                return false;
            }
        };
        match response.json::<Value>().await {
            Ok(body) => body.get("status").and_then(Value::as_str) == Some("healthy"),
            Err(_) => false,
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> PredictionError {
        if e.is_timeout() {
            PredictionError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            PredictionError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl PredictionService for HttpPredictionService {
    async fn predict(
        &self,
        request: &PredictionRequest,
    ) -> Result<Vec<RawPrediction>, PredictionError> {
        let url = format!("{}/predict", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(PredictionError::Status {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        let envelope: PredictEnvelope =
            serde_json::from_str(&body).map_err(|e| PredictionError::Decode(e.to_string()))?;
        if !envelope.success {
            return Err(PredictionError::Service(
                envelope
                    .error
                    .unwrap_or_else(|| "prediction service returned failure".to_string()),
            ));
        }
        envelope
            .data
            .ok_or_else(|| PredictionError::Decode("response has no data field".to_string()))
    }
}

/// Pull `error` out of a JSON error body, or fall back to the raw text.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty response body".to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        })
}
