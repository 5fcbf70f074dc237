// Player id -> display name lookup for outings submitted without a name.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

/// Source of player names keyed by numeric id.
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    async fn player_name(&self, player_id: i64) -> Option<String>;
}

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("failed to read roster {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in roster {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("roster {path} has no `{column}` column")]
    MissingColumn { path: String, column: &'static str },
}

const REQUIRED_COLUMNS: [&str; 2] = ["player_id", "player_name"];

#[derive(Debug, Deserialize)]
struct RawRosterRow {
    player_id: i64,
    player_name: String,
}

/// In-memory directory loaded from a `player_id,player_name` CSV.
#[derive(Debug, Clone, Default)]
pub struct RosterDirectory {
    names: HashMap<i64, String>,
}

impl RosterDirectory {
    pub fn load(path: &Path) -> Result<Self, RosterError> {
        let file = std::fs::File::open(path).map_err(|e| RosterError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_reader(file, &path.display().to_string())
    }

    /// Parse roster CSV read from `rdr`; `source` names it in errors.
    fn from_reader<R: Read>(rdr: R, source: &str) -> Result<Self, RosterError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
        let headers = reader.headers().map_err(|e| RosterError::Csv {
            path: source.to_string(),
            source: e,
        })?;
        if let Some(column) = REQUIRED_COLUMNS
            .into_iter()
            .find(|c| !headers.iter().any(|h| h == *c))
        {
            return Err(RosterError::MissingColumn {
                path: source.to_string(),
                column,
            });
        }

        let mut names = HashMap::new();
        for result in reader.deserialize::<RawRosterRow>() {
            match result {
                Ok(row) if row.player_name.is_empty() => {
                    warn!("skipping roster entry {}: empty name", row.player_id);
                }
                Ok(row) => {
                    if names.insert(row.player_id, row.player_name).is_some() {
                        warn!("duplicate roster entry for player {}; keeping the later one", row.player_id);
                    }
                }
                Err(e) => warn!("skipping malformed roster row: {}", e),
            }
        }
        Ok(Self { names })
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (i64, S)>,
        S: Into<String>,
    {
        Self {
            names: entries.into_iter().map(|(id, n)| (id, n.into())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[async_trait]
impl PlayerDirectory for RosterDirectory {
    async fn player_name(&self, player_id: i64) -> Option<String> {
        self.names.get(&player_id).cloned()
    }
}
