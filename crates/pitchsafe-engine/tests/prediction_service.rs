// Integration tests against a mock prediction service.
//
// Covers the HTTP client, the ordered candidate fallback, the read-only risk
// query, and containment of prediction failures in the outing workflow.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pitchsafe_engine::config::{Config, PredictionConfig, RosterConfig, TableConfig};
use pitchsafe_engine::engine::RiskEngine;
use pitchsafe_engine::outing::OutingRecord;
use pitchsafe_engine::player::PlayerIdentity;
use pitchsafe_engine::predict::client::HttpPredictionService;
use pitchsafe_engine::predict::{PredictionError, PredictionRequest, PredictionService, RiskLevel};
use pitchsafe_engine::service::{MemoryOutingStore, OutingService};

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ===========================================================================
// Test helpers
// ===========================================================================

const FIXTURES: &str = "tests/fixtures";
const PRIMARY: &str = "/data/feature_table.csv";
const FALLBACK: &str = "/app/final_dataset/feature_table.csv";

fn scratch_table(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "pitchsafe-predict-{name}-{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("feature_table.csv");
    std::fs::copy(Path::new(FIXTURES).join("feature_table.csv"), &path).unwrap();
    path
}

fn config(service_url: &str, table: &Path, timeout_secs: u64) -> Config {
    Config {
        table: TableConfig {
            path: table.display().to_string(),
            date_format: "%Y-%m-%d".into(),
            columns: Default::default(),
        },
        prediction: PredictionConfig {
            service_url: service_url.into(),
            service_table_path: Some(PRIMARY.into()),
            timeout_secs,
            top_k_ratio: 0.1,
            start_date: "2024-04-01".into(),
            path_marker: "backend".into(),
            container_root: "/app".into(),
            fallback_dirs: vec!["final_dataset".into()],
        },
        roster: RosterConfig::default(),
    }
}

fn engine_for(config: &Config) -> RiskEngine {
    let client = HttpPredictionService::from_config(&config.prediction).unwrap();
    RiskEngine::from_config(config, Arc::new(client))
}

fn cole_outing() -> OutingRecord {
    let text = std::fs::read_to_string(Path::new(FIXTURES).join("outing_cole.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

fn scored(rows: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": rows }))
}

fn not_found(location: &str) -> ResponseTemplate {
    ResponseTemplate::new(500).set_body_json(json!({
        "success": false,
        "error": format!("CSV file not found: {location}")
    }))
}

async fn mount_for(server: &MockServer, location: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(body_partial_json(json!({ "csv_path": location })))
        .respond_with(response)
        .mount(server)
        .await;
}

// ===========================================================================
// HTTP client
// ===========================================================================

#[tokio::test]
async fn client_posts_request_and_decodes_predictions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(body_partial_json(json!({
            "csv_path": FALLBACK,
            "top_k_ratio": 0.1,
            "start_date": "2024-04-01"
        })))
        .respond_with(scored(json!([{
            "player_name": "Cole, Gerrit",
            "game_date": "Sat, 13 Apr 2024 00:00:00 GMT",
            "injury_risk_prob": 0.82,
            "risk_level": "high",
            "result": 0
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpPredictionService::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let predictions = client
        .predict(&PredictionRequest {
            table_location: FALLBACK.into(),
            top_k_ratio: 0.1,
            start_date: "2024-04-01".into(),
        })
        .await
        .unwrap();
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].risk_level, RiskLevel::High);
}

#[tokio::test]
async fn client_reports_service_side_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": false, "error": "model not loaded" })),
        )
        .mount(&server)
        .await;

    let client = HttpPredictionService::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let err = client
        .predict(&PredictionRequest {
            table_location: FALLBACK.into(),
            top_k_ratio: 0.1,
            start_date: "2024-04-01".into(),
        })
        .await
        .unwrap_err();
    match err {
        PredictionError::Service(message) => assert_eq!(message, "model not loaded"),
        other => panic!("expected Service error, got {other:?}"),
    }
}

#[tokio::test]
async fn client_maps_status_and_body() {
    let server = MockServer::start().await;
    mount_for(&server, FALLBACK, not_found(FALLBACK)).await;

    let client = HttpPredictionService::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let err = client
        .predict(&PredictionRequest {
            table_location: FALLBACK.into(),
            top_k_ratio: 0.1,
            start_date: "2024-04-01".into(),
        })
        .await
        .unwrap_err();
    match err {
        PredictionError::Status { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("CSV file not found"));
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(scored(json!([])).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = HttpPredictionService::new(&server.uri(), Duration::from_secs(1)).unwrap();
    let err = client
        .predict(&PredictionRequest {
            table_location: FALLBACK.into(),
            top_k_ratio: 0.1,
            start_date: "2024-04-01".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PredictionError::Timeout { secs: 1 }), "got {err:?}");
}

#[tokio::test]
async fn health_check_reflects_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "healthy" })))
        .mount(&server)
        .await;
    let client = HttpPredictionService::new(&server.uri(), Duration::from_secs(5)).unwrap();
    assert!(client.health_check().await);

    let degraded = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "loading" })))
        .mount(&degraded)
        .await;
    let client = HttpPredictionService::new(&degraded.uri(), Duration::from_secs(5)).unwrap();
    assert!(!client.health_check().await);
}

// ===========================================================================
// Candidate fallback through the engine
// ===========================================================================

#[tokio::test]
async fn falls_back_to_next_candidate() {
    let server = MockServer::start().await;
    mount_for(&server, PRIMARY, not_found(PRIMARY)).await;
    mount_for(
        &server,
        FALLBACK,
        scored(json!([
            {
                "player_name": "Cole, Gerrit",
                "game_date": "Sun, 07 Apr 2024 00:00:00 GMT",
                "injury_risk_prob": 0.31,
                "risk_level": "low"
            },
            {
                "player_name": "Cole, Gerrit",
                "game_date": "Sat, 13 Apr 2024 00:00:00 GMT",
                "injury_risk_prob": 0.58,
                "risk_level": "medium"
            },
            {
                "player_name": "Rodón, Carlos",
                "game_date": "Mon, 08 Apr 2024 00:00:00 GMT",
                "injury_risk_prob": 0.12,
                "risk_level": "low"
            }
        ])),
    )
    .await;

    let table = scratch_table("fallback");
    let engine = engine_for(&config(&server.uri(), &table, 5));
    let outcome = engine.record_outing(&cole_outing()).await.unwrap();

    let risk = outcome.prediction.unwrap();
    assert_eq!(risk.len(), 2);
    let cole = risk.get(&PlayerIdentity::canonicalize("Gerrit Cole")).unwrap();
    assert_eq!(cole.risk_level, RiskLevel::Medium);
    assert_eq!(cole.game_date, "Sat, 13 Apr 2024 00:00:00 GMT");
}

#[tokio::test]
async fn exhausted_candidates_leave_row_committed() {
    let server = MockServer::start().await;
    mount_for(&server, PRIMARY, not_found(PRIMARY)).await;
    mount_for(&server, FALLBACK, not_found(FALLBACK)).await;

    let table = scratch_table("exhausted");
    let engine = engine_for(&config(&server.uri(), &table, 5));
    let outcome = engine.record_outing(&cole_outing()).await.unwrap();

    let err = outcome.prediction.unwrap_err();
    let message = err.to_string();
    assert!(message.contains(PRIMARY), "{message}");
    assert!(message.contains(FALLBACK), "{message}");
    match err {
        PredictionError::Exhausted { attempts } => assert_eq!(attempts.len(), 2),
        other => panic!("expected Exhausted, got {other:?}"),
    }

    let text = std::fs::read_to_string(&table).unwrap();
    assert!(text.lines().any(|l| l == outcome.row.line));
}

#[tokio::test]
async fn risk_query_uses_explicit_location() {
    let server = MockServer::start().await;
    mount_for(
        &server,
        "/app/backend/tables/yankees.csv",
        scored(json!([{
            "player_name": "Schmidt, Clarke",
            "game_date": "2024-04-11",
            "injury_risk_prob": 0.4,
            "risk_level": "medium"
        }])),
    )
    .await;

    let table = scratch_table("explicit");
    let engine = engine_for(&config(&server.uri(), &table, 5));
    let risk = engine
        .query_risk(Some("/home/coach/pitchsafe/backend/tables/yankees.csv"))
        .await
        .unwrap();
    assert!(risk
        .get(&PlayerIdentity::canonicalize("Clarke Schmidt"))
        .is_some());

    // Nothing was written.
    let fixture = std::fs::read_to_string(Path::new(FIXTURES).join("feature_table.csv")).unwrap();
    assert_eq!(std::fs::read_to_string(&table).unwrap(), fixture);
}

// ===========================================================================
// Containment in the outing workflow
// ===========================================================================

#[tokio::test]
async fn submit_succeeds_without_risk_when_service_is_down() {
    let server = MockServer::start().await;
    let table = scratch_table("contained");
    let engine = Arc::new(engine_for(&config(&server.uri(), &table, 5)));
    let store = Arc::new(MemoryOutingStore::new());
    let service = OutingService::new(store.clone(), engine);

    let report = service.submit(cole_outing()).await.unwrap();
    assert_eq!(report.outing.record_id, Some(311));
    assert!(report.row.is_some());
    assert!(report.risk.is_none());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("risk data unavailable"));
    assert_eq!(store.saved().len(), 1);

    let json = serde_json::to_value(&report).unwrap();
    assert!(json.get("risk").is_none());
    assert_eq!(json["row"]["placement"]["kind"], "inserted");
}

#[tokio::test]
async fn submit_succeeds_when_table_is_missing() {
    let server = MockServer::start().await;
    let missing = std::env::temp_dir().join("pitchsafe-predict-missing/nowhere.csv");
    let engine = Arc::new(engine_for(&config(&server.uri(), &missing, 5)));
    let service = OutingService::new(Arc::new(MemoryOutingStore::new()), engine);

    let report = service.submit(cole_outing()).await.unwrap();
    assert!(report.row.is_none());
    assert!(report.risk.is_none());
    assert!(report.warnings[0].contains("feature table not found"));
}
