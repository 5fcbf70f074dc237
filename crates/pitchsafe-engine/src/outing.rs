// A single recorded pitching outing, as saved by the roster application.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// One outing for one pitcher. Every metric is optional; whatever is missing
/// is filled from the player's history when the feature row is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutingRecord {
    /// Server-assigned identifier from the event store.
    #[serde(default)]
    pub record_id: Option<i64>,
    /// Numeric player id, used to look up a name when `player_name` is absent.
    #[serde(default)]
    pub player_id: Option<i64>,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default, deserialize_with = "de_outing_date")]
    pub game_date: Option<NaiveDate>,
    #[serde(default)]
    pub pitch_type: Option<String>,
    #[serde(default)]
    pub release_speed: Option<f64>,
    #[serde(default)]
    pub spin_rate: Option<f64>,
    #[serde(default)]
    pub release_pos_x: Option<f64>,
    #[serde(default)]
    pub release_pos_y: Option<f64>,
    #[serde(default)]
    pub release_pos_z: Option<f64>,
    #[serde(default, deserialize_with = "de_scalar_text")]
    pub result: Option<String>,
    #[serde(default)]
    pub total_pitches: Option<u32>,
}

/// Release-metric selector shared by the fill rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Speed,
    Spin,
}

/// Release-position axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl OutingRecord {
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Speed => self.release_speed,
            Metric::Spin => self.spin_rate,
        }
    }

    pub fn position(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::X => self.release_pos_x,
            Axis::Y => self.release_pos_y,
            Axis::Z => self.release_pos_z,
        }
    }

    /// Pitch type code, trimmed; `None` when absent or blank.
    pub fn pitch_code(&self) -> Option<&str> {
        self.pitch_type
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Check the supplied values. Numbers must be finite; speed and spin
    /// must be positive when given.
    pub fn validate(&self) -> Result<(), String> {
        let numbers = [
            ("release_speed", self.release_speed),
            ("spin_rate", self.spin_rate),
            ("release_pos_x", self.release_pos_x),
            ("release_pos_y", self.release_pos_y),
            ("release_pos_z", self.release_pos_z),
        ];
        for (name, value) in numbers {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(format!("{name} must be a finite number"));
                }
            }
        }
        for (name, value) in [("release_speed", self.release_speed), ("spin_rate", self.spin_rate)] {
            if value.is_some_and(|v| v <= 0.0) {
                return Err(format!("{name} must be greater than 0"));
            }
        }
        Ok(())
    }
}

/// Parse a calendar date in any of the shapes the roster app and the model
/// service produce:
///
/// - `2024-03-01`
/// - `2024-03-01T00:00:00`, `2024-03-01T00:00:00.000Z`, `2024-03-01 00:00:00`
/// - `Fri, 01 Mar 2024 00:00:00 GMT`
/// - `3/1/2024`
pub fn parse_outing_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    NaiveDate::parse_from_str(s, "%m/%d/%Y").ok()
}

fn de_outing_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_outing_date(s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized game_date {s:?}"))),
    }
}

/// Result codes arrive as either JSON numbers or strings.
fn de_scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        None => None,
        Some(Scalar::Int(n)) => Some(n.to_string()),
        Some(Scalar::Float(f)) => Some(f.to_string()),
        Some(Scalar::Text(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
    })
}
