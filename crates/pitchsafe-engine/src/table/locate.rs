// Finding a player's most recent row.

use tracing::warn;

use super::record::parse_line;
use super::FeatureTable;
use crate::player::PlayerIdentity;

/// The most recently added row for a player.
#[derive(Debug, Clone, PartialEq)]
pub struct LastRow {
    /// Index into [`FeatureTable::lines`].
    pub line_index: usize,
    pub fields: Vec<String>,
}

impl LastRow {
    /// Field at column position `idx`, if the row has one.
    pub fn field(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }
}

/// Scan the table from the end for the last row whose first column
/// canonicalizes to `player`.
///
/// Blank lines are ignored. Rows whose width does not match the header are
/// skipped with a warning rather than aborting the scan.
pub fn find_last_row(table: &FeatureTable, player: &PlayerIdentity) -> Option<LastRow> {
    let width = table.schema().len();

    for (line_index, line) in table.lines().iter().enumerate().skip(1).rev() {
        if line.trim().is_empty() {
            continue;
        }

        let fields = parse_line(line);
        if fields.len() != width {
            warn!(
                line = line_index,
                expected = width,
                found = fields.len(),
                "skipping malformed feature row"
            );
            continue;
        }

        if PlayerIdentity::canonicalize(&fields[0]) == *player {
            return Some(LastRow { line_index, fields });
        }
    }

    None
}
