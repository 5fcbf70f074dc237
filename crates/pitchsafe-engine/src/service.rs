// Outing submission workflow: save the outing, then refresh risk data.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::{AppendedRow, RiskEngine};
use crate::outing::OutingRecord;
use crate::risk::PlayerRiskMap;

/// Persistence for the canonical outing record.
#[async_trait]
pub trait OutingStore: Send + Sync {
    /// Save `outing` and return it as stored, server-assigned ids included.
    async fn save(&self, outing: OutingRecord) -> anyhow::Result<OutingRecord>;
}

/// Process-local [`OutingStore`] that assigns sequential record ids.
#[derive(Debug)]
pub struct MemoryOutingStore {
    next_id: AtomicI64,
    saved: Mutex<Vec<OutingRecord>>,
}

impl MemoryOutingStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn saved(&self) -> Vec<OutingRecord> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MemoryOutingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutingStore for MemoryOutingStore {
    async fn save(&self, mut outing: OutingRecord) -> anyhow::Result<OutingRecord> {
        if outing.record_id.is_none() {
            outing.record_id = Some(self.next_id.fetch_add(1, Ordering::Relaxed));
        }
        self.saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(outing.clone());
        Ok(outing)
    }
}

/// What the caller gets back from [`OutingService::submit`].
///
/// `row` and `risk` are best effort; when either is missing `warnings`
/// says why.
#[derive(Debug, Clone, Serialize)]
pub struct OutingReport {
    pub outing: OutingRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<AppendedRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<PlayerRiskMap>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub struct OutingService {
    store: Arc<dyn OutingStore>,
    engine: Arc<RiskEngine>,
}

impl OutingService {
    pub fn new(store: Arc<dyn OutingStore>, engine: Arc<RiskEngine>) -> Self {
        Self { store, engine }
    }

    /// Save the outing, then write its feature row and refresh risk data.
    ///
    /// Only a failed save is an error. Once the outing is stored, problems
    /// writing the row or reaching the prediction service are logged and
    /// reported in the returned [`OutingReport`].
    pub async fn submit(&self, outing: OutingRecord) -> anyhow::Result<OutingReport> {
        let saved = self
            .store
            .save(outing)
            .await
            .context("failed to save outing")?;
        info!(record_id = ?saved.record_id, "outing saved");

        let mut report = OutingReport {
            outing: saved,
            row: None,
            risk: None,
            warnings: Vec::new(),
        };

        match self.engine.record_outing(&report.outing).await {
            Ok(outcome) => {
                report.row = Some(outcome.row);
                match outcome.prediction {
                    Ok(risk) => report.risk = Some(risk),
                    Err(e) => report.warnings.push(format!("risk data unavailable: {e}")),
                }
            }
            Err(e) => {
                warn!(record_id = ?report.outing.record_id, "feature row not written: {e}");
                report.warnings.push(format!("feature row not written: {e}"));
            }
        }

        Ok(report)
    }
}
