// Player identity canonicalization ("Family, Given").

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical `"Family, Given"` player key.
///
/// Used both to match rows in the feature table and to key the risk map, so
/// two raw names that canonicalize identically are the same player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerIdentity(String);

impl PlayerIdentity {
    /// Canonicalize a raw name string.
    ///
    /// - Surrounding quotes and whitespace are removed.
    /// - Names that already contain a comma are kept as written.
    /// - `"First Middle Last"` becomes `"Last, First Middle"`.
    /// - Single-word names are kept as written.
    pub fn canonicalize(raw: &str) -> Self {
        let cleaned = strip_quotes(raw);
        if cleaned.contains(',') {
            return PlayerIdentity(cleaned.to_string());
        }

        let parts: Vec<&str> = cleaned.split_whitespace().collect();
        match parts.split_last() {
            Some((last, given)) if !given.is_empty() => {
                let reordered = format!("{}, {}", last, given.join(" "));
                PlayerIdentity(strip_quotes(&reordered).to_string())
            }
            _ => PlayerIdentity(cleaned.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim whitespace and quote characters from both ends until stable.
fn strip_quotes(s: &str) -> &str {
    let mut current = s.trim();
    loop {
        let next = current.trim_matches('"').trim();
        if next == current {
            return current;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_family_is_reordered() {
        assert_eq!(PlayerIdentity::canonicalize("Gerrit Cole").as_str(), "Cole, Gerrit");
    }

    #[test]
    fn middle_names_stay_with_given_name() {
        assert_eq!(
            PlayerIdentity::canonicalize("Luis Enrique Gil").as_str(),
            "Gil, Luis Enrique"
        );
    }

    #[test]
    fn already_canonical_is_kept() {
        assert_eq!(PlayerIdentity::canonicalize("Cole, Gerrit").as_str(), "Cole, Gerrit");
    }

    #[test]
    fn surrounding_quotes_and_whitespace_removed() {
        assert_eq!(
            PlayerIdentity::canonicalize("  \"Cole, Gerrit\" ").as_str(),
            "Cole, Gerrit"
        );
        assert_eq!(PlayerIdentity::canonicalize("\"Gerrit Cole\"").as_str(), "Cole, Gerrit");
    }

    #[test]
    fn single_word_and_empty_names() {
        assert_eq!(PlayerIdentity::canonicalize("Ichiro").as_str(), "Ichiro");
        assert!(PlayerIdentity::canonicalize("").is_empty());
        assert!(PlayerIdentity::canonicalize("   ").is_empty());
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let samples = [
            "Gerrit Cole",
            "Cole, Gerrit",
            "\"Clarke Schmidt\"",
            "  Luis   Enrique Gil ",
            "Ichiro",
            "",
            "\"Rodón, Carlos\"",
            "\"\"Volpe\"\"",
            "Anthony \"Volpe",
        ];
        for raw in samples {
            let once = PlayerIdentity::canonicalize(raw);
            let twice = PlayerIdentity::canonicalize(once.as_str());
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }
}
