// External injury-risk prediction service: wire types, errors, and the
// service seam.

pub mod candidates;
pub mod client;
pub mod invoker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of `POST /predict`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRequest {
    /// Table location as the service sees it.
    #[serde(rename = "csv_path")]
    pub table_location: String,
    pub top_k_ratio: f64,
    pub start_date: String,
}

/// Risk bucket assigned by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    #[serde(other)]
    Unknown,
}

/// One scored outing as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPrediction {
    pub player_name: String,
    pub injury_risk_prob: f64,
    pub risk_level: RiskLevel,
    pub game_date: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// One failed attempt against one candidate table location.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFailure {
    pub candidate: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("prediction service unreachable: {0}")]
    Transport(String),

    #[error("prediction service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("prediction service reported failure: {0}")]
    Service(String),

    #[error("prediction service did not answer within {secs}s")]
    Timeout { secs: u64 },

    #[error("could not decode prediction response: {0}")]
    Decode(String),

    #[error("no candidate table locations to try")]
    NoCandidates,

    #[error(
        "prediction failed for every table location (tried: {}): {}",
        candidate_list(.attempts),
        last_message(.attempts)
    )]
    Exhausted { attempts: Vec<CandidateFailure> },
}

fn candidate_list(attempts: &[CandidateFailure]) -> String {
    attempts
        .iter()
        .map(|a| a.candidate.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn last_message(attempts: &[CandidateFailure]) -> &str {
    attempts.last().map(|a| a.message.as_str()).unwrap_or("no attempts made")
}

// ---------------------------------------------------------------------------
// Service seam
// ---------------------------------------------------------------------------

/// Anything that can score the feature table at a given location.
#[async_trait]
pub trait PredictionService: Send + Sync {
    async fn predict(
        &self,
        request: &PredictionRequest,
    ) -> Result<Vec<RawPrediction>, PredictionError>;
}
