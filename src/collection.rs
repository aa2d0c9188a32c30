use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type PlayerId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Prior mean rating for this tournament.
    pub seed: f64,
    /// Prior sigma after seeding, posterior sigma after rating.
    #[serde(default)]
    pub sigma: f64,
    #[serde(default)]
    pub rating: f64,
}

impl Player {
    pub fn new(id: PlayerId, seed: f64) -> Self {
        Self {
            id,
            seed,
            sigma: 0.0,
            rating: seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub white: PlayerId,
    pub black: PlayerId,
    pub white_wins: bool,
    #[serde(default)]
    pub handicap: u32,
    #[serde(default)]
    pub komi: f64,
}

impl Game {
    pub fn winner(&self) -> PlayerId {
        if self.white_wins { self.white } else { self.black }
    }

    pub fn involves(&self, id: PlayerId) -> bool {
        self.white == id || self.black == id
    }
}

/// Players and games of one tournament, rated as a unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Collection {
    pub code: String,
    #[serde(default)]
    pub name: String,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub players: BTreeMap<PlayerId, Player>,
    #[serde(default)]
    pub games: Vec<Game>,
}

impl Collection {
    pub fn new(code: impl Into<String>, name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            date: Some(date),
            players: BTreeMap::new(),
            games: Vec::new(),
        }
    }

    /// Clear players and games so the collection can hold the next tournament.
    pub fn reset(&mut self) {
        self.code.clear();
        self.name.clear();
        self.date = None;
        self.players.clear();
        self.games.clear();
    }

    /// Register a player at the entered seed; the first entry for an id wins.
    pub fn add_player(&mut self, id: PlayerId, seed: f64) {
        self.players.entry(id).or_insert_with(|| Player::new(id, seed));
    }

    pub fn add_game(&mut self, game: Game) {
        self.games.push(game);
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn win_counts(&self) -> HashMap<PlayerId, u32> {
        let mut wins: HashMap<PlayerId, u32> = self.players.keys().map(|id| (*id, 0)).collect();
        for game in &self.games {
            *wins.entry(game.winner()).or_insert(0) += 1;
        }
        wins
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

/// Bijection between player ids and optimization-vector positions.
///
/// Built from the player map at the start of each optimization attempt and
/// dropped afterwards.
#[derive(Debug, Clone)]
pub struct PlayerIndex {
    ids: Vec<PlayerId>,
    positions: HashMap<PlayerId, usize>,
}

impl PlayerIndex {
    pub fn build(collection: &Collection) -> Self {
        let ids: Vec<PlayerId> = collection.players.keys().copied().collect();
        let positions = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        Self { ids, positions }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn position(&self, id: PlayerId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn id_at(&self, position: usize) -> PlayerId {
        self.ids[position]
    }

    pub fn ids(&self) -> &[PlayerId] {
        &self.ids
    }
}
