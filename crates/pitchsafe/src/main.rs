// pitchsafe command-line entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Build the prediction client and the engine
// 4. Run the requested command and print its result as JSON

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pitchsafe_engine::config;
use pitchsafe_engine::engine::RiskEngine;
use pitchsafe_engine::outing::OutingRecord;
use pitchsafe_engine::predict::client::HttpPredictionService;
use pitchsafe_engine::roster::RosterDirectory;
use pitchsafe_engine::service::{MemoryOutingStore, OutingService};

use anyhow::{bail, Context};
use tracing::{error, info};

const USAGE: &str = "usage:
  pitchsafe record <outing.json>     write the outing's feature row, then refresh risk
  pitchsafe risk [table-location]    query current risk without writing anything
  pitchsafe health                   check the prediction service";

#[derive(Debug, PartialEq)]
enum Command {
    Record { outing: PathBuf },
    Risk { location: Option<String> },
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let command = match parse_command(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: table={}, prediction service={}",
        config.table.path, config.prediction.service_url
    );

    let client = Arc::new(
        HttpPredictionService::from_config(&config.prediction)
            .context("failed to build prediction client")?,
    );

    let mut engine = RiskEngine::from_config(&config, client.clone());
    if let Some(roster_path) = &config.roster.path {
        match RosterDirectory::load(Path::new(roster_path)) {
            Ok(roster) => {
                info!("Loaded {} roster entries from {}", roster.len(), roster_path);
                engine = engine.with_directory(Arc::new(roster));
            }
            Err(e) => error!("roster unavailable, outings must carry a player name: {e}"),
        }
    }
    let engine = Arc::new(engine);

    match command {
        Command::Record { outing } => {
            let text = std::fs::read_to_string(&outing)
                .with_context(|| format!("failed to read {}", outing.display()))?;
            let record: OutingRecord = serde_json::from_str(&text)
                .with_context(|| format!("invalid outing in {}", outing.display()))?;

            // Outings given on the command line were already saved upstream.
            let service = OutingService::new(Arc::new(MemoryOutingStore::new()), engine);
            let report = service.submit(record).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Risk { location } => {
            let risk = engine
                .query_risk(location.as_deref())
                .await
                .context("risk query failed")?;
            info!("Risk query returned {} players", risk.len());
            println!("{}", serde_json::to_string_pretty(&risk)?);
        }
        Command::Health => {
            let healthy = client.health_check().await;
            println!(
                "{}",
                serde_json::json!({ "service_url": client.base_url(), "healthy": healthy })
            );
            if !healthy {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn parse_command(args: &[String]) -> anyhow::Result<Command> {
    let Some((name, rest)) = args.split_first() else {
        bail!("missing command");
    };
    match (name.as_str(), rest) {
        ("record", [path]) if !path.trim().is_empty() => Ok(Command::Record {
            outing: PathBuf::from(path.trim()),
        }),
        ("record", _) => bail!("record takes exactly one outing file"),
        ("risk", []) => Ok(Command::Risk { location: None }),
        ("risk", [location]) => Ok(Command::Risk {
            location: Some(location.clone()).filter(|l| !l.trim().is_empty()),
        }),
        ("risk", _) => bail!("risk takes at most one table location"),
        ("health", []) => Ok(Command::Health),
        ("health", _) => bail!("health takes no arguments"),
        (other, _) => bail!("unknown command '{other}'"),
    }
}

/// Filter directives for the log file, overridable with `PITCHSAFE_LOG`.
const ENV_LOG: &str = "PITCHSAFE_LOG";
/// Directory for `pitchsafe.log`, overridable with `PITCHSAFE_LOG_DIR`.
const ENV_LOG_DIR: &str = "PITCHSAFE_LOG_DIR";
const DEFAULT_DIRECTIVES: &str = "pitchsafe=info,pitchsafe_engine=info,warn";

fn log_directives(lookup: impl Fn(&str) -> Option<String>) -> String {
    lookup(ENV_LOG)
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVES.to_string())
}

fn log_file_path(lookup: impl Fn(&str) -> Option<String>, cwd: &Path) -> PathBuf {
    let dir = lookup(ENV_LOG_DIR)
        .filter(|d| !d.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| cwd.join("logs"));
    dir.join("pitchsafe.log")
}

/// Log to a file so stdout stays pure JSON for the caller.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let lookup = |key: &str| std::env::var(key).ok();
    let path = log_file_path(lookup, &std::env::current_dir()?);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let directives = log_directives(lookup);
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid {ENV_LOG} directives '{directives}'"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
