// Collapse raw predictions to one current entry per player.

use std::collections::btree_map::{BTreeMap, Entry};

use serde::Serialize;

use crate::outing::parse_outing_date;
use crate::player::PlayerIdentity;
use crate::predict::RawPrediction;

/// Latest prediction per canonical player identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PlayerRiskMap {
    entries: BTreeMap<PlayerIdentity, RawPrediction>,
}

impl PlayerRiskMap {
    /// Fold predictions so each player keeps the entry with the latest
    /// `game_date`. Equal dates, or dates that cannot be parsed, keep
    /// whichever entry was seen first.
    pub fn normalize<I>(predictions: I) -> Self
    where
        I: IntoIterator<Item = RawPrediction>,
    {
        let mut entries = BTreeMap::new();
        for prediction in predictions {
            let key = PlayerIdentity::canonicalize(&prediction.player_name);
            if key.is_empty() {
                continue;
            }
            match entries.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(prediction);
                }
                Entry::Occupied(mut slot) => {
                    if is_later(&prediction.game_date, &slot.get().game_date) {
                        slot.insert(prediction);
                    }
                }
            }
        }
        Self { entries }
    }

    pub fn get(&self, player: &PlayerIdentity) -> Option<&RawPrediction> {
        self.entries.get(player)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlayerIdentity, &RawPrediction)> {
        self.entries.iter()
    }
}

fn is_later(candidate: &str, current: &str) -> bool {
    match (parse_outing_date(candidate), parse_outing_date(current)) {
        (Some(a), Some(b)) => a > b,
        _ => false,
    }
}
