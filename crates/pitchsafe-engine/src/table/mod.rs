// Flat per-player feature table: header line plus one line per outing.

pub mod locate;
pub mod record;
pub mod store;

use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("feature table not found: {path}")]
    Missing { path: PathBuf },

    #[error("failed to read feature table {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write feature table {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to lock feature table via {path}: {source}")]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("feature table has no header line")]
    MissingHeader,

    #[error("failed to encode row: {0}")]
    Encode(String),
}

// ---------------------------------------------------------------------------
// FeatureTable
// ---------------------------------------------------------------------------

/// In-memory copy of the feature table.
///
/// Line 0 is the header; every following line is kept verbatim (blank lines
/// included) so that rewriting the table only changes the inserted row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    schema: Vec<String>,
    lines: Vec<String>,
    trailing_newline: bool,
}

/// Where a new row ended up after [`FeatureTable::place_row`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowPlacement {
    /// Inserted directly after the player's previous row.
    Inserted { line_index: usize },
    /// Appended at the end because the player had no previous row.
    Appended { line_index: usize },
}

impl RowPlacement {
    pub fn line_index(&self) -> usize {
        match self {
            RowPlacement::Inserted { line_index } | RowPlacement::Appended { line_index } => {
                *line_index
            }
        }
    }
}

impl FeatureTable {
    /// Parse the full table text. Accepts `\n` and `\r\n` line endings.
    pub fn parse(text: &str) -> Result<Self, TableError> {
        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);
        let lines: Vec<String> = body
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
            .collect();

        let header = lines.first().map(String::as_str).unwrap_or("");
        if header.trim().is_empty() {
            return Err(TableError::MissingHeader);
        }

        let schema = record::parse_line(header);
        for (i, col) in schema.iter().enumerate() {
            if schema[..i].contains(col) {
                warn!("duplicate column '{}' in feature table header", col);
            }
        }

        Ok(FeatureTable {
            schema,
            lines,
            trailing_newline,
        })
    }

    /// Ordered column names from the header line.
    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    /// All lines, header first.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of non-blank data rows.
    pub fn row_count(&self) -> usize {
        self.lines[1..].iter().filter(|l| !l.trim().is_empty()).count()
    }

    /// Put a serialized row into the table.
    ///
    /// With `after = Some(i)` the line goes directly after line `i`, keeping
    /// the player's rows contiguous. With `None` it is appended at the end.
    pub fn place_row(&mut self, line: String, after: Option<usize>) -> RowPlacement {
        match after {
            Some(i) if i < self.lines.len() => {
                self.lines.insert(i + 1, line);
                RowPlacement::Inserted { line_index: i + 1 }
            }
            _ => {
                self.lines.push(line);
                RowPlacement::Appended {
                    line_index: self.lines.len() - 1,
                }
            }
        }
    }

    /// Render the whole table back to text.
    pub fn to_text(&self) -> String {
        let mut text = self.lines.join("\n");
        if self.trailing_newline {
            text.push('\n');
        }
        text
    }
}
