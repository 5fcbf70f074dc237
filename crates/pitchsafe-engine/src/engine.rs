// Feature-row synthesis and prediction trigger for one recorded outing.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Config, PredictionConfig};
use crate::outing::OutingRecord;
use crate::player::PlayerIdentity;
use crate::predict::candidates::{build_candidates, explicit_candidates};
use crate::predict::invoker::PredictionInvoker;
use crate::predict::{PredictionError, PredictionService};
use crate::risk::PlayerRiskMap;
use crate::roster::PlayerDirectory;
use crate::synth::Synthesizer;
use crate::table::locate::find_last_row;
use crate::table::record::serialize_fields;
use crate::table::store::FileTableStore;
use crate::table::{RowPlacement, TableError};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("outing has no player name and player id {player_id:?} is not in the roster")]
    MissingPlayer { player_id: Option<i64> },

    #[error("invalid outing: {0}")]
    InvalidOuting(String),

    #[error("feature table write task failed: {0}")]
    WriteTask(#[from] tokio::task::JoinError),
}

/// The row written for an outing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppendedRow {
    pub player: PlayerIdentity,
    pub placement: RowPlacement,
    pub line: String,
}

/// Committed row plus the outcome of the prediction that followed it.
///
/// The row is on disk whatever `prediction` holds.
#[derive(Debug)]
pub struct AppendOutcome {
    pub row: AppendedRow,
    pub prediction: Result<PlayerRiskMap, PredictionError>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct RiskEngine {
    store: Arc<FileTableStore>,
    synthesizer: Synthesizer,
    invoker: PredictionInvoker,
    prediction: PredictionConfig,
    directory: Option<Arc<dyn PlayerDirectory>>,
}

impl RiskEngine {
    pub fn new(
        store: Arc<FileTableStore>,
        synthesizer: Synthesizer,
        service: Arc<dyn PredictionService>,
        prediction: PredictionConfig,
    ) -> Self {
        let invoker = PredictionInvoker::from_config(service, &prediction);
        Self {
            store,
            synthesizer,
            invoker,
            prediction,
            directory: None,
        }
    }

    /// Engine over the table named in `config`.
    pub fn from_config(config: &Config, service: Arc<dyn PredictionService>) -> Self {
        Self::new(
            Arc::new(FileTableStore::new(&config.table.path)),
            Synthesizer::from_config(&config.table),
            service,
            config.prediction.clone(),
        )
    }

    /// Use `directory` to name outings that arrive with only a player id.
    pub fn with_directory(mut self, directory: Arc<dyn PlayerDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Build the feature row for `outing` and write it into the table.
    ///
    /// The row goes directly after the player's most recent row, or at the
    /// end of the table when the player has none. The table is read and
    /// rewritten under the store's writer lock on the blocking pool, so a
    /// writer waiting on the lock never stalls the runtime.
    pub async fn append_outing(&self, outing: &OutingRecord) -> Result<AppendedRow, EngineError> {
        outing.validate().map_err(EngineError::InvalidOuting)?;
        let player = self.resolve_player(outing).await?;

        let store = Arc::clone(&self.store);
        let synthesizer = self.synthesizer.clone();
        let outing = outing.clone();
        let row = tokio::task::spawn_blocking(move || {
            store.update(|table| {
                let last = find_last_row(table, &player);
                let fields = synthesizer.synthesize(table.schema(), &outing, &player, last.as_ref());
                let line = serialize_fields(&fields)?;
                let placement = table.place_row(line.clone(), last.map(|l| l.line_index));
                Ok(AppendedRow {
                    player: player.clone(),
                    placement,
                    line,
                })
            })
        })
        .await??;

        info!(
            player = %row.player,
            line = row.placement.line_index(),
            "feature row written"
        );
        Ok(row)
    }

    /// Score the table through the prediction service, trying every
    /// candidate location for it.
    pub async fn trigger_prediction(&self) -> Result<PlayerRiskMap, PredictionError> {
        let candidates = build_candidates(&self.prediction, self.store.path());
        let predictions = self.invoker.run(&candidates).await?;
        Ok(PlayerRiskMap::normalize(predictions))
    }

    /// Append the outing's row, then trigger prediction.
    ///
    /// Only the append can fail this call; a prediction failure is carried
    /// in the outcome and leaves the written row in place.
    pub async fn record_outing(&self, outing: &OutingRecord) -> Result<AppendOutcome, EngineError> {
        let row = self.append_outing(outing).await?;
        let prediction = self.trigger_prediction().await;
        if let Err(e) = &prediction {
            warn!(player = %row.player, "row written but prediction failed: {e}");
        }
        Ok(AppendOutcome { row, prediction })
    }

    /// Read-only risk query. With `location` the service is pointed at that
    /// table (and its container remapping); otherwise at this engine's table.
    pub async fn query_risk(&self, location: Option<&str>) -> Result<PlayerRiskMap, PredictionError> {
        match location.map(str::trim).filter(|l| !l.is_empty()) {
            Some(location) => {
                let candidates = explicit_candidates(&self.prediction, location);
                let predictions = self.invoker.run(&candidates).await?;
                Ok(PlayerRiskMap::normalize(predictions))
            }
            None => self.trigger_prediction().await,
        }
    }

    async fn resolve_player(&self, outing: &OutingRecord) -> Result<PlayerIdentity, EngineError> {
        if let Some(name) = outing.player_name.as_deref() {
            let identity = PlayerIdentity::canonicalize(name);
            if !identity.is_empty() {
                return Ok(identity);
            }
        }
        let missing = EngineError::MissingPlayer {
            player_id: outing.player_id,
        };
        let (Some(id), Some(directory)) = (outing.player_id, &self.directory) else {
            return Err(missing);
        };
        match directory.player_name(id).await {
            Some(name) => {
                let identity = PlayerIdentity::canonicalize(&name);
                if identity.is_empty() {
                    Err(missing)
                } else {
                    Ok(identity)
                }
            }
            None => Err(missing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnNames;
    use crate::predict::{PredictionRequest, RawPrediction, RiskLevel};
    use crate::roster::RosterDirectory;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::time::Duration;

    struct Fixed(Vec<RawPrediction>);

    #[async_trait]
    impl PredictionService for Fixed {
        async fn predict(
            &self,
            _request: &PredictionRequest,
        ) -> Result<Vec<RawPrediction>, PredictionError> {
            Ok(self.0.clone())
        }
    }

    fn scratch_table(name: &str, text: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pitchsafe-engine-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("table.csv");
        std::fs::write(&path, text).unwrap();
        path
    }

    fn prediction_config() -> PredictionConfig {
        PredictionConfig {
            service_url: "http://unused".into(),
            service_table_path: None,
            timeout_secs: 5,
            top_k_ratio: 0.1,
            start_date: "2024-04-01".into(),
            path_marker: "backend".into(),
            container_root: "/app".into(),
            fallback_dirs: vec!["final_dataset".into()],
        }
    }

    fn engine(path: PathBuf, predictions: Vec<RawPrediction>) -> RiskEngine {
        RiskEngine::new(
            Arc::new(FileTableStore::new(path)),
            Synthesizer::new(ColumnNames::default(), "%Y-%m-%d"),
            Arc::new(Fixed(predictions)),
            prediction_config(),
        )
    }

    #[tokio::test]
    async fn name_taken_from_roster_when_absent() {
        let path = scratch_table("roster", "player_name,result\n");
        let engine = engine(path.clone(), Vec::new())
            .with_directory(Arc::new(RosterDirectory::from_entries([(45, "Gerrit Cole")])));
        let outing = OutingRecord {
            player_id: Some(45),
            ..Default::default()
        };
        let row = engine.append_outing(&outing).await.unwrap();
        assert_eq!(row.player.as_str(), "Cole, Gerrit");
        assert_eq!(row.line, "\"Cole, Gerrit\",0");
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "player_name,result\n\"Cole, Gerrit\",0\n"
        );
    }

    #[tokio::test]
    async fn unknown_player_is_rejected_before_writing() {
        let path = scratch_table("unknown", "player_name,result\n");
        let engine = engine(path.clone(), Vec::new());
        let outing = OutingRecord {
            player_id: Some(99),
            player_name: Some("  ".into()),
            ..Default::default()
        };
        let err = engine.append_outing(&outing).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingPlayer { player_id: Some(99) }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "player_name,result\n");
    }

    #[tokio::test]
    async fn invalid_metrics_are_rejected() {
        let path = scratch_table("invalid", "player_name,result\n");
        let outing = OutingRecord {
            player_name: Some("Gerrit Cole".into()),
            spin_rate: Some(-5.0),
            ..Default::default()
        };
        let err = engine(path, Vec::new()).append_outing(&outing).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidOuting(_)));
    }

    #[tokio::test]
    async fn missing_table_is_fatal() {
        let engine = engine(PathBuf::from("/nonexistent/pitchsafe/table.csv"), Vec::new());
        let outing = OutingRecord {
            player_name: Some("Gerrit Cole".into()),
            ..Default::default()
        };
        let err = engine.record_outing(&outing).await.unwrap_err();
        assert!(matches!(err, EngineError::Table(TableError::Missing { .. })));
    }

    #[tokio::test]
    async fn record_returns_normalized_risk() {
        let path = scratch_table("record", "player_name,result\n");
        let engine = engine(
            path,
            vec![
                RawPrediction {
                    player_name: "Cole, Gerrit".into(),
                    injury_risk_prob: 0.2,
                    risk_level: RiskLevel::Low,
                    game_date: "2024-01-01".into(),
                },
                RawPrediction {
                    player_name: "Cole, Gerrit".into(),
                    injury_risk_prob: 0.6,
                    risk_level: RiskLevel::Medium,
                    game_date: "2024-02-01".into(),
                },
            ],
        );
        let outing = OutingRecord {
            player_name: Some("Gerrit Cole".into()),
            ..Default::default()
        };
        let outcome = engine.record_outing(&outing).await.unwrap();
        let risk = outcome.prediction.unwrap();
        assert_eq!(risk.len(), 1);
        assert_eq!(risk.get(&outcome.row.player).unwrap().game_date, "2024-02-01");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn waiting_for_the_table_lock_leaves_the_runtime_free() {
        let path = scratch_table("lock_wait", "player_name,result\n");

        // Another writer holds the table for a while.
        let (held_tx, held_rx) = std::sync::mpsc::channel();
        let holder = {
            let path = path.clone();
            std::thread::spawn(move || {
                FileTableStore::new(path)
                    .update(|_| {
                        held_tx.send(()).unwrap();
                        std::thread::sleep(Duration::from_millis(300));
                        Ok(())
                    })
                    .unwrap();
            })
        };
        held_rx.recv().unwrap();

        let engine = engine(path.clone(), Vec::new());
        let outing = OutingRecord {
            player_name: Some("Gerrit Cole".into()),
            ..Default::default()
        };
        let append = engine.append_outing(&outing);
        tokio::pin!(append);
        let mut ticks = 0;
        let row = loop {
            tokio::select! {
                r = &mut append => break r.unwrap(),
                _ = tokio::time::sleep(Duration::from_millis(20)) => ticks += 1,
            }
        };
        holder.join().unwrap();

        assert!(ticks > 0, "runtime was blocked while waiting for the table");
        assert_eq!(row.line, "\"Cole, Gerrit\",0");
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "player_name,result\n\"Cole, Gerrit\",0\n"
        );
    }
}
