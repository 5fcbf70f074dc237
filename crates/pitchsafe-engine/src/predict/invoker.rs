// Ordered fallback over candidate table locations.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{CandidateFailure, PredictionError, PredictionRequest, PredictionService, RawPrediction};
use crate::config::PredictionConfig;

/// Runs the prediction service against each candidate location in turn
/// until one succeeds.
#[derive(Clone)]
pub struct PredictionInvoker {
    service: Arc<dyn PredictionService>,
    top_k_ratio: f64,
    start_date: String,
    attempt_timeout: Duration,
}

impl PredictionInvoker {
    pub fn new(
        service: Arc<dyn PredictionService>,
        top_k_ratio: f64,
        start_date: impl Into<String>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            service,
            top_k_ratio,
            start_date: start_date.into(),
            attempt_timeout,
        }
    }

    pub fn from_config(service: Arc<dyn PredictionService>, config: &PredictionConfig) -> Self {
        Self::new(
            service,
            config.top_k_ratio,
            config.start_date.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Try every candidate in order and return the first successful result.
    ///
    /// Each attempt is bounded by the attempt timeout. When every candidate
    /// fails the error lists them all along with the last failure.
    pub async fn run(&self, candidates: &[String]) -> Result<Vec<RawPrediction>, PredictionError> {
        if candidates.is_empty() {
            return Err(PredictionError::NoCandidates);
        }

        let mut attempts = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let request = PredictionRequest {
                table_location: candidate.clone(),
                top_k_ratio: self.top_k_ratio,
                start_date: self.start_date.clone(),
            };
            debug!(candidate = %candidate, "requesting predictions");

            let outcome =
                match tokio::time::timeout(self.attempt_timeout, self.service.predict(&request)).await {
                    Ok(result) => result,
                    Err(_) => Err(PredictionError::Timeout {
                        secs: self.attempt_timeout.as_secs(),
                    }),
                };

            match outcome {
                Ok(predictions) => {
                    info!(
                        candidate = %candidate,
                        count = predictions.len(),
                        "prediction succeeded"
                    );
                    return Ok(predictions);
                }
                Err(e) => {
                    warn!(candidate = %candidate, "prediction attempt failed: {e}");
                    attempts.push(CandidateFailure {
                        candidate: candidate.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(PredictionError::Exhausted { attempts })
    }
}
