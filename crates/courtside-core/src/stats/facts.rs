// Fact table builder: keys, deduplicates and enriches normalized rows into
// the canonical per-player-per-game store.
//
// A table is built whole for each rebuild cycle and never patched. Lookups by
// `player_game_key`, `player_id` and `game_id` are index-backed, and every
// listing preserves the order in which rows were first seen.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::stats::games::GameLog;
use crate::stats::normalize::{CountingStats, NormalizedRow};

/// Joins `game_id` and `player_id` into `player_game_key`.
pub const KEY_SEPARATOR: char = '_';

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error(
        "duplicate player_game_key {key} at input row {row}: \
         conflicts with game {existing_game_id} / player {existing_player_id}"
    )]
    DuplicateKey {
        key: String,
        row: usize,
        existing_game_id: String,
        existing_player_id: String,
    },
}

// ---------------------------------------------------------------------------
// Fact
// ---------------------------------------------------------------------------

/// Build the unique key for one player in one game.
pub fn player_game_key(game_id: &str, player_id: &str) -> String {
    format!("{game_id}{KEY_SEPARATOR}{player_id}")
}

/// `makes / attempts`, undefined when there were no attempts.
pub fn shooting_pct(makes: u32, attempts: u32) -> Option<f64> {
    if attempts == 0 {
        return None;
    }
    Some(makes as f64 / attempts as f64)
}

/// The canonical per-player-per-game record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerGameFact {
    pub player_game_key: String,
    pub game_id: String,
    pub player_id: String,
    pub first_name: String,
    pub family_name: String,
    pub team_id: String,
    pub team_tricode: String,
    pub minutes: f64,
    pub stats: CountingStats,
    pub fg_pct: Option<f64>,
    pub three_pct: Option<f64>,
    pub ft_pct: Option<f64>,
    /// From the game log; `None` without one or for an unknown game.
    pub is_win: Option<bool>,
}

impl PlayerGameFact {
    pub fn from_row(row: NormalizedRow, is_win: Option<bool>) -> Self {
        let s = row.stats;
        PlayerGameFact {
            player_game_key: player_game_key(&row.game_id, &row.player_id),
            fg_pct: shooting_pct(s.fgm, s.fga),
            three_pct: shooting_pct(s.fg3m, s.fg3a),
            ft_pct: shooting_pct(s.ftm, s.fta),
            game_id: row.game_id,
            player_id: row.player_id,
            first_name: row.first_name,
            family_name: row.family_name,
            team_id: row.team_id,
            team_tricode: row.team_tricode,
            minutes: row.minutes,
            stats: s,
            is_win,
        }
    }

    /// `First Family`, falling back to the player id when no name is known.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.family_name);
        let name = name.trim();
        if name.is_empty() {
            self.player_id.clone()
        } else {
            name.to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Deduplicated, keyed collection of facts for one rebuild cycle.
#[derive(Debug, Clone, Default)]
pub struct FactTable {
    facts: Vec<PlayerGameFact>,
    by_key: HashMap<String, usize>,
    by_player: HashMap<String, Vec<usize>>,
    by_game: HashMap<String, Vec<usize>>,
    player_order: Vec<String>,
    unknown_games: Vec<String>,
}

impl FactTable {
    /// Build a fresh table from the normalized rows of one cycle.
    ///
    /// A row repeating an existing key with identical content is a duplicate
    /// delivery and is skipped. A row repeating a key with different content
    /// aborts the build.
    ///
    /// Each row is paired with its 1-based position in the raw input, which
    /// is what a `DuplicateKey` error reports.
    ///
    /// When a game log is supplied each fact carries its `is_win`, and fact
    /// games missing from the log are recorded (and logged) as unknown.
    pub fn build(
        rows: impl IntoIterator<Item = (usize, NormalizedRow)>,
        games: Option<&GameLog>,
    ) -> Result<Self, BuildError> {
        let mut table = FactTable::default();
        for (input_row, row) in rows {
            let is_win = games.and_then(|log| log.is_win(&row.game_id));
            table.insert(PlayerGameFact::from_row(row, is_win), input_row)?;
        }

        if let Some(log) = games {
            let unknown: Vec<String> = table
                .game_ids()
                .into_iter()
                .filter(|id| !log.contains(id))
                .map(str::to_string)
                .collect();
            for game_id in &unknown {
                warn!("fact references game {} missing from the game log", game_id);
            }
            table.unknown_games = unknown;
        }

        Ok(table)
    }

    /// Assemble a table from already-built facts (e.g. loaded back from
    /// storage), enforcing the same key invariant as `build`.
    pub fn from_facts(facts: impl IntoIterator<Item = PlayerGameFact>) -> Result<Self, BuildError> {
        let mut table = FactTable::default();
        for (idx, fact) in facts.into_iter().enumerate() {
            table.insert(fact, idx + 1)?;
        }
        Ok(table)
    }

    fn insert(&mut self, fact: PlayerGameFact, row: usize) -> Result<(), BuildError> {
        if let Some(&existing) = self.by_key.get(&fact.player_game_key) {
            let prior = &self.facts[existing];
            if *prior == fact {
                debug!("row {}: duplicate delivery of {}, skipped", row, fact.player_game_key);
                return Ok(());
            }
            return Err(BuildError::DuplicateKey {
                key: fact.player_game_key,
                row,
                existing_game_id: prior.game_id.clone(),
                existing_player_id: prior.player_id.clone(),
            });
        }

        let idx = self.facts.len();
        self.by_key.insert(fact.player_game_key.clone(), idx);
        let player_rows = self.by_player.entry(fact.player_id.clone()).or_default();
        if player_rows.is_empty() {
            self.player_order.push(fact.player_id.clone());
        }
        player_rows.push(idx);
        self.by_game.entry(fact.game_id.clone()).or_default().push(idx);
        self.facts.push(fact);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// All facts in first-appearance order.
    pub fn facts(&self) -> &[PlayerGameFact] {
        &self.facts
    }

    pub fn get(&self, player_game_key: &str) -> Option<&PlayerGameFact> {
        self.by_key.get(player_game_key).map(|&i| &self.facts[i])
    }

    /// One player's facts in table order.
    pub fn for_player(&self, player_id: &str) -> Vec<&PlayerGameFact> {
        self.select(self.by_player.get(player_id))
    }

    /// Every player line of one game in table order.
    pub fn for_game(&self, game_id: &str) -> Vec<&PlayerGameFact> {
        self.select(self.by_game.get(game_id))
    }

    fn select(&self, indices: Option<&Vec<usize>>) -> Vec<&PlayerGameFact> {
        indices
            .map(|idx| idx.iter().map(|&i| &self.facts[i]).collect())
            .unwrap_or_default()
    }

    /// Player ids in order of first appearance.
    pub fn players(&self) -> &[String] {
        &self.player_order
    }

    /// Distinct game ids in order of first appearance.
    pub fn game_ids(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.facts
            .iter()
            .map(|f| f.game_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Fact games missing from the game log supplied to `build`.
    pub fn unknown_games(&self) -> &[String] {
        &self.unknown_games
    }
}
