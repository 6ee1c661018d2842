//! Player profile.

use crate::GameTitle;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Reserved label for the checkpoint written after every state-changing operation.
pub const AUTOSAVE_LABEL: &str = "AutoSave";

/// One record per player identity.
///
/// Serialized as a flat JSON object: the identity under `email`, one array of
/// save labels per title keyed by the title name, and `lastGame`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ProfileRecord")]
pub struct Profile {
    pub email: String,
    #[serde(flatten)]
    saves: BTreeMap<GameTitle, BTreeSet<String>>,
    #[serde(rename = "lastGame")]
    pub last_game: Option<GameTitle>,
}

/// Wire form, before every title is guaranteed a save set.
#[derive(Deserialize)]
struct ProfileRecord {
    email: String,
    #[serde(flatten)]
    saves: BTreeMap<GameTitle, BTreeSet<String>>,
    #[serde(default, rename = "lastGame")]
    last_game: Option<GameTitle>,
}

impl From<ProfileRecord> for Profile {
    fn from(record: ProfileRecord) -> Self {
        let mut profile = Profile::new(record.email);
        profile.saves.extend(record.saves);
        profile.last_game = record.last_game;
        profile
    }
}

impl Profile {
    /// Fresh profile with an empty save set for every title.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            saves: GameTitle::ALL
                .into_iter()
                .map(|title| (title, BTreeSet::new()))
                .collect(),
            last_game: None,
        }
    }

    /// Labels recorded for a title.
    pub fn saves(&self, title: GameTitle) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        self.saves.get(&title).unwrap_or(&EMPTY)
    }

    pub fn has_save(&self, title: GameTitle, label: &str) -> bool {
        self.saves(title).contains(label)
    }

    /// Record a label; returns false if it was already present.
    pub fn record_save(&mut self, title: GameTitle, label: &str) -> bool {
        self.saves
            .entry(title)
            .or_default()
            .insert(label.to_string())
    }
}
