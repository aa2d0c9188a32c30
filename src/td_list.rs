use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::collection::{Collection, PlayerId};
use crate::error::RatingError;

/// Last known rating of a player before some date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TdListEntry {
    pub id: PlayerId,
    #[serde(default)]
    pub name: String,
    pub rating: f64,
    pub sigma: f64,
    pub last_rating_date: NaiveDate,
    #[serde(default)]
    pub rating_ante: f64,
    #[serde(default)]
    pub sigma_ante: f64,
    #[serde(default)]
    pub tournaments: Vec<String>,
    #[serde(default)]
    pub rating_updated: bool,
}

impl TdListEntry {
    pub fn new(id: PlayerId, rating: f64, sigma: f64, last_rating_date: NaiveDate) -> Self {
        Self {
            id,
            name: String::new(),
            rating,
            sigma,
            last_rating_date,
            rating_ante: 0.0,
            sigma_ante: 0.0,
            tournaments: Vec::new(),
            rating_updated: false,
        }
    }

    /// Legacy rows carry a zero rating or zero sigma; those are not real priors.
    pub fn is_usable_prior(&self) -> bool {
        self.rating != 0.0 && self.sigma != 0.0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TdList {
    entries: BTreeMap<PlayerId, TdListEntry>,
}

impl TdList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: TdListEntry) {
        self.entries.insert(entry.id, entry);
    }

    pub fn get(&self, id: PlayerId) -> Option<&TdListEntry> {
        self.entries.get(&id)
    }

    pub fn name_of(&self, id: PlayerId) -> &str {
        self.entries.get(&id).map(|e| e.name.as_str()).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TdListEntry> {
        self.entries.values()
    }

    pub fn updated(&self) -> impl Iterator<Item = &TdListEntry> {
        self.entries.values().filter(|e| e.rating_updated)
    }

    /// Fold a rated tournament into the list so the next tournament seeds from it.
    pub fn apply_results(&mut self, collection: &Collection) -> Result<(), RatingError> {
        let date = collection.date.ok_or_else(|| RatingError::MissingDate {
            tournament: collection.code.clone(),
        })?;
        for player in collection.players.values() {
            let entry = self
                .entries
                .entry(player.id)
                .or_insert_with(|| TdListEntry::new(player.id, 0.0, 0.0, date));

            entry.rating_ante = if entry.rating.abs() < 1.0 {
                0.0
            } else {
                entry.rating
            };
            entry.sigma_ante = if entry.sigma.abs() < 1e-7 {
                0.0
            } else {
                entry.sigma
            };
            entry.rating = player.rating;
            entry.sigma = player.sigma;
            entry.last_rating_date = date;
            entry.tournaments.push(collection.code.clone());
            entry.rating_updated = true;
        }
        Ok(())
    }
}

impl FromIterator<TdListEntry> for TdList {
    fn from_iter<I: IntoIterator<Item = TdListEntry>>(iter: I) -> Self {
        let mut list = TdList::new();
        for entry in iter {
            list.insert(entry);
        }
        list
    }
}
