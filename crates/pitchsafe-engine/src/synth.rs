// Feature-row synthesis: one value per header column for a new outing.
//
// Columns are classified once into a `ColumnRule` by walking an ordered list
// of matchers (first match wins), then each rule resolves its value from the
// outing, falling back to the player's last row.

use std::fmt::Write as _;

use crate::config::{ColumnNames, TableConfig};
use crate::outing::{Axis, Metric, OutingRecord};
use crate::player::PlayerIdentity;
use crate::table::locate::LastRow;

// ---------------------------------------------------------------------------
// Column classification
// ---------------------------------------------------------------------------

/// How a single column of a new row is filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRule {
    Player,
    Date,
    Result,
    TotalPitches,
    /// `release_speed_mean_all` / `release_spin_rate_mean_all`.
    GlobalMetric(Metric),
    /// `release_pos_{x,y,z}_mean_all`.
    GlobalPosition(Axis),
    /// `pct_<CODE>`: 1 when this outing's pitch type is CODE.
    PitchShare { code: String },
    /// `<CODE>_release_speed_mean` / `<CODE>_release_spin_rate_mean`. The
    /// outing's value applies to every pitch type.
    PitchTypeMetric { code: String, metric: Metric },
    /// `<CODE>_release_pos_{x,y,z}_mean`. The outing's value applies only
    /// to its own pitch type.
    PitchTypePosition { code: String, axis: Axis },
    /// Anything else is carried over from the last row.
    Copy,
}

type Matcher = fn(&str, &ColumnNames) -> Option<ColumnRule>;

/// Most specific first.
const MATCHERS: &[Matcher] = &[
    match_passthrough,
    match_global_metric,
    match_global_position,
    match_pitch_share,
    match_pitch_type_metric,
    match_pitch_type_position,
];

const AXES: [(Axis, &str); 3] = [(Axis::X, "x"), (Axis::Y, "y"), (Axis::Z, "z")];

impl ColumnRule {
    pub fn classify(column: &str, names: &ColumnNames) -> ColumnRule {
        MATCHERS
            .iter()
            .find_map(|m| m(column, names))
            .unwrap_or(ColumnRule::Copy)
    }
}

fn match_passthrough(column: &str, names: &ColumnNames) -> Option<ColumnRule> {
    let is = |aliases: &[String]| aliases.iter().any(|a| a == column);
    if is(&names.player) {
        Some(ColumnRule::Player)
    } else if is(&names.date) {
        Some(ColumnRule::Date)
    } else if is(&names.result) {
        Some(ColumnRule::Result)
    } else if is(&names.total_pitches) {
        Some(ColumnRule::TotalPitches)
    } else {
        None
    }
}

fn match_global_metric(column: &str, _: &ColumnNames) -> Option<ColumnRule> {
    match column {
        "release_speed_mean_all" => Some(ColumnRule::GlobalMetric(Metric::Speed)),
        "release_spin_rate_mean_all" => Some(ColumnRule::GlobalMetric(Metric::Spin)),
        _ => None,
    }
}

fn match_global_position(column: &str, _: &ColumnNames) -> Option<ColumnRule> {
    AXES.iter()
        .find(|(_, a)| column == format!("release_pos_{a}_mean_all"))
        .map(|(axis, _)| ColumnRule::GlobalPosition(*axis))
}

fn match_pitch_share(column: &str, _: &ColumnNames) -> Option<ColumnRule> {
    column
        .strip_prefix("pct_")
        .filter(|code| !code.is_empty())
        .map(|code| ColumnRule::PitchShare {
            code: code.to_string(),
        })
}

fn match_pitch_type_metric(column: &str, _: &ColumnNames) -> Option<ColumnRule> {
    [
        ("_release_speed_mean", Metric::Speed),
        ("_release_spin_rate_mean", Metric::Spin),
    ]
    .into_iter()
    .find_map(|(suffix, metric)| {
        type_code(column, suffix).map(|code| ColumnRule::PitchTypeMetric { code, metric })
    })
}

fn match_pitch_type_position(column: &str, _: &ColumnNames) -> Option<ColumnRule> {
    AXES.iter().find_map(|(axis, a)| {
        type_code(column, &format!("_release_pos_{a}_mean"))
            .map(|code| ColumnRule::PitchTypePosition { code, axis: *axis })
    })
}

fn type_code(column: &str, suffix: &str) -> Option<String> {
    column
        .strip_suffix(suffix)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Synthesizer
// ---------------------------------------------------------------------------

/// Builds complete feature rows for new outings.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    columns: ColumnNames,
    date_format: String,
}

impl Synthesizer {
    pub fn new(columns: ColumnNames, date_format: impl Into<String>) -> Self {
        Self {
            columns,
            date_format: date_format.into(),
        }
    }

    pub fn from_config(table: &TableConfig) -> Self {
        Self::new(table.columns.clone(), table.date_format.clone())
    }

    /// Classify every schema column.
    pub fn plan(&self, schema: &[String]) -> Vec<ColumnRule> {
        schema
            .iter()
            .map(|col| ColumnRule::classify(col, &self.columns))
            .collect()
    }

    /// Build the new row: exactly one value per schema column, in order.
    pub fn synthesize(
        &self,
        schema: &[String],
        outing: &OutingRecord,
        player: &PlayerIdentity,
        last: Option<&LastRow>,
    ) -> Vec<String> {
        self.plan(schema)
            .iter()
            .enumerate()
            .map(|(idx, rule)| {
                let previous = last.and_then(|row| row.field(idx));
                self.resolve(rule, outing, player, previous)
            })
            .collect()
    }

    fn resolve(
        &self,
        rule: &ColumnRule,
        outing: &OutingRecord,
        player: &PlayerIdentity,
        previous: Option<&str>,
    ) -> String {
        let carry = || previous.unwrap_or("").to_string();
        let carry_or_zero = || {
            previous
                .filter(|v| !v.is_empty())
                .unwrap_or("0")
                .to_string()
        };

        match rule {
            ColumnRule::Player => player.to_string(),
            ColumnRule::Date => match outing.game_date {
                Some(date) => self.format_date(date),
                None => carry(),
            },
            ColumnRule::Result => outing.result.clone().unwrap_or_else(carry_or_zero),
            ColumnRule::TotalPitches => outing
                .total_pitches
                .map(|n| n.to_string())
                .unwrap_or_else(carry_or_zero),
            ColumnRule::GlobalMetric(metric) | ColumnRule::PitchTypeMetric { metric, .. } => {
                outing.metric(*metric).map(format_number).unwrap_or_else(carry)
            }
            ColumnRule::GlobalPosition(axis) => {
                outing.position(*axis).map(format_number).unwrap_or_else(carry)
            }
            ColumnRule::PitchShare { code } => {
                let thrown = outing
                    .pitch_code()
                    .is_some_and(|pt| pt.eq_ignore_ascii_case(code));
                let flag = if thrown { "1" } else { "0" };
                flag.to_string()
            }
            ColumnRule::PitchTypePosition { code, axis } => {
                let same_type = outing
                    .pitch_code()
                    .is_some_and(|pt| pt.eq_ignore_ascii_case(code));
                match outing.position(*axis) {
                    Some(v) if same_type => format_number(v),
                    _ => carry(),
                }
            }
            ColumnRule::Copy => carry(),
        }
    }

    fn format_date(&self, date: chrono::NaiveDate) -> String {
        let mut out = String::new();
        if write!(out, "{}", date.format(&self.date_format)).is_err() {
            return date.format("%Y-%m-%d").to_string();
        }
        out
    }
}

fn format_number(v: f64) -> String {
    v.to_string()
}
