// Configuration loading and parsing (config/pitchsafe.toml).

use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Environment variable overriding `prediction.service_url`.
pub const ENV_SERVICE_URL: &str = "PITCHSAFE_ML_URL";
/// Environment variable overriding `prediction.service_table_path`.
pub const ENV_SERVICE_TABLE_PATH: &str = "PITCHSAFE_ML_TABLE_PATH";

const CONFIG_FILE: &str = "pitchsafe.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to seed config from defaults at {path}: {source}")]
    SeedError {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub table: TableConfig,
    pub prediction: PredictionConfig,
    #[serde(default)]
    pub roster: RosterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    /// Feature table location on this machine.
    pub path: String,
    /// chrono format used when writing outing dates into new rows.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default)]
    pub columns: ColumnNames,
}

/// Header names of the passthrough columns. Each list holds accepted
/// aliases; a column matching any alias gets that passthrough rule.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ColumnNames {
    pub player: Vec<String>,
    pub date: Vec<String>,
    pub result: Vec<String>,
    pub total_pitches: Vec<String>,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            player: vec!["player_name".into(), "name".into()],
            date: vec!["game_date".into(), "date".into()],
            result: vec!["result".into()],
            total_pitches: vec!["total_pitches".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    pub service_url: String,
    /// Table location as the prediction service sees it. Tried first.
    #[serde(default)]
    pub service_table_path: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_top_k_ratio")]
    pub top_k_ratio: f64,
    #[serde(default = "default_start_date")]
    pub start_date: String,
    /// Path segment at which local paths are remapped under `container_root`.
    #[serde(default = "default_path_marker")]
    pub path_marker: String,
    #[serde(default = "default_container_root")]
    pub container_root: String,
    /// Directories under `container_root` tried with the table's file name.
    #[serde(default = "default_fallback_dirs")]
    pub fallback_dirs: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterConfig {
    /// Optional `player_id,player_name` CSV used to name outings that
    /// arrive without a player name.
    #[serde(default)]
    pub path: Option<String>,
}

fn default_date_format() -> String {
    "%Y-%m-%d".into()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_top_k_ratio() -> f64 {
    0.10
}

fn default_start_date() -> String {
    "2024-04-01".into()
}

fn default_path_marker() -> String {
    "backend".into()
}

fn default_container_root() -> String {
    "/app".into()
}

fn default_fallback_dirs() -> Vec<String> {
    vec![
        "final_dataset".into(),
        "backend/ml_injury/final_dataset".into(),
    ]
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/pitchsafe.toml` relative to `base_dir`, then
/// apply environment overrides.
///
/// Does not copy defaults; prefer [`load_config`] for that.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let mut config = parse_config(&text, &path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Parse config text without touching the environment or validating.
pub fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Seed `config/pitchsafe.toml` from `defaults/pitchsafe.toml` when no
/// config file exists yet. Returns the seeded path, or `None` if a config
/// file was already there. An existing file is never touched, and a
/// defaults file that does not parse is not copied.
pub fn seed_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join(CONFIG_FILE);
    if target.is_file() {
        return Ok(None);
    }

    let defaults = base_dir.join("defaults").join(CONFIG_FILE);
    let text = std::fs::read_to_string(&defaults).map_err(|e| seed_error(&defaults, e))?;
    parse_config(&text, &defaults)?;

    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(|e| seed_error(dir, e))?;
    }
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(dest) => dest,
        // Another process seeded it first.
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => return Err(seed_error(&target, e)),
    };
    dest.write_all(text.as_bytes()).map_err(|e| seed_error(&target, e))?;

    info!(path = %target.display(), "config seeded from defaults");
    Ok(Some(target))
}

fn seed_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::SeedError {
        path: path.to_path_buf(),
        source,
    }
}

/// Load config relative to the current working directory, seeding it from
/// `defaults/` on first run.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    seed_config_file(&cwd)?;
    load_config_from(&cwd)
}

/// Apply overrides looked up through `lookup` (the process environment in
/// production). Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_SERVICE_URL).filter(|v| !v.trim().is_empty()) {
        config.prediction.service_url = url;
    }
    if let Some(path) = lookup(ENV_SERVICE_TABLE_PATH).filter(|v| !v.trim().is_empty()) {
        config.prediction.service_table_path = Some(path);
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.table.path.trim().is_empty() {
        return Err(invalid("table.path", "must not be empty".into()));
    }
    let bad_format = chrono::format::StrftimeItems::new(&config.table.date_format)
        .any(|item| matches!(item, chrono::format::Item::Error));
    if bad_format || config.table.date_format.is_empty() {
        return Err(invalid(
            "table.date_format",
            format!("not a valid date format: {:?}", config.table.date_format),
        ));
    }

    let columns = &config.table.columns;
    let column_fields: &[(&str, &Vec<String>)] = &[
        ("table.columns.player", &columns.player),
        ("table.columns.date", &columns.date),
        ("table.columns.result", &columns.result),
        ("table.columns.total_pitches", &columns.total_pitches),
    ];
    for (name, aliases) in column_fields {
        if aliases.iter().all(|a| a.trim().is_empty()) {
            return Err(invalid(name, "must list at least one column name".into()));
        }
    }

    let p = &config.prediction;
    if p.service_url.trim().is_empty() {
        return Err(invalid("prediction.service_url", "must not be empty".into()));
    }
    if p.timeout_secs == 0 {
        return Err(invalid("prediction.timeout_secs", "must be > 0".into()));
    }
    if !(p.top_k_ratio > 0.0 && p.top_k_ratio <= 1.0) {
        return Err(invalid(
            "prediction.top_k_ratio",
            format!("must be in (0.0, 1.0], got {}", p.top_k_ratio),
        ));
    }
    if chrono::NaiveDate::parse_from_str(&p.start_date, "%Y-%m-%d").is_err() {
        return Err(invalid(
            "prediction.start_date",
            format!("must be a YYYY-MM-DD date, got {:?}", p.start_date),
        ));
    }

    Ok(())
}

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
