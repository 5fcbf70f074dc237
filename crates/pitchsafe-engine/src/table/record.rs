// Line-level codec for feature-table rows.
//
// Parsing is a single quote-aware scan. Serialization goes through the csv
// writer with minimal quoting, which for single-line values quotes exactly
// the fields containing a comma or a quote.

use super::TableError;

/// Split one raw line into trimmed field values.
///
/// - `""` inside a quoted field yields a literal `"`.
/// - Any other `"` toggles the quoted state, wherever it appears.
/// - `,` separates fields only outside quotes.
///
/// Never fails: an empty line is one empty field, and an unbalanced quote
/// leaves the rest of the line inside the final field.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Join field values into one line, quoting only where needed.
pub fn serialize_fields<S: AsRef<str>>(fields: &[S]) -> Result<String, TableError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(fields.iter().map(|f| f.as_ref().as_bytes()))
        .map_err(|e| TableError::Encode(e.to_string()))?;
    let bytes = writer
        .into_inner()
        .map_err(|e| TableError::Encode(e.to_string()))?;
    let mut line = String::from_utf8(bytes).map_err(|e| TableError::Encode(e.to_string()))?;

    if line.ends_with('\n') {
        line.pop();
    }
    Ok(line)
}
