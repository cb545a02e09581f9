// Team game log: the set of known games, their outcome, and the matchup.
//
// Used for referential-integrity checks on the fact table and for the single
// `is_win` derivation carried by each fact.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::warn;

use crate::stats::raw::LoadError;

/// Date formats seen in game-log extracts, tried in order.
const GAME_DATE_FORMATS: &[&str] = &["%b %d, %Y", "%Y-%m-%d", "%m/%d/%Y"];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    Win,
    Loss,
}

impl GameOutcome {
    /// Parse the `W` / `L` column.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "W" => Some(GameOutcome::Win),
            "L" => Some(GameOutcome::Loss),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            GameOutcome::Win => "W",
            GameOutcome::Loss => "L",
        }
    }
}

/// One game of the team under analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: String,
    pub game_date: Option<NaiveDate>,
    /// e.g. `DEN vs. LAL` (home) or `DEN @ BOS` (away).
    pub matchup: String,
    pub outcome: Option<GameOutcome>,
    pub team_points: Option<u32>,
}

impl GameRecord {
    pub fn is_win(&self) -> Option<bool> {
        self.outcome.map(|o| o == GameOutcome::Win)
    }

    /// `vs.` marks a home game, `@` an away game.
    pub fn is_home(&self) -> Option<bool> {
        if self.matchup.contains(" vs. ") {
            Some(true)
        } else if self.matchup.contains(" @ ") {
            Some(false)
        } else {
            None
        }
    }
}

/// Known games keyed by `game_id`, in load order.
#[derive(Debug, Clone, Default)]
pub struct GameLog {
    games: Vec<GameRecord>,
    index: HashMap<String, usize>,
}

impl GameLog {
    /// Build a log from records. A repeated `game_id` keeps the first record.
    pub fn from_records(records: impl IntoIterator<Item = GameRecord>) -> Self {
        let mut log = GameLog::default();
        for record in records {
            if log.index.contains_key(&record.game_id) {
                warn!("duplicate game log entry for {}, keeping the first", record.game_id);
                continue;
            }
            log.index.insert(record.game_id.clone(), log.games.len());
            log.games.push(record);
        }
        log
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn contains(&self, game_id: &str) -> bool {
        self.index.contains_key(game_id)
    }

    pub fn get(&self, game_id: &str) -> Option<&GameRecord> {
        self.index.get(game_id).map(|&i| &self.games[i])
    }

    /// Outcome of a game from the team's perspective; `None` for an unknown
    /// game or one without a recorded result.
    pub fn is_win(&self, game_id: &str) -> Option<bool> {
        self.get(game_id).and_then(GameRecord::is_win)
    }

    pub fn games(&self) -> &[GameRecord] {
        &self.games
    }
}

// ---------------------------------------------------------------------------
// Raw CSV rows (private)
// ---------------------------------------------------------------------------

/// Team game-log row, either with the source's column names or with the
/// renamed ones.
#[derive(Debug, Deserialize)]
struct RawGameRow {
    #[serde(alias = "Game_ID", alias = "GAME_ID", alias = "gameId")]
    game_id: String,
    #[serde(default, alias = "GAME_DATE")]
    game_date: Option<String>,
    #[serde(default, alias = "MATCHUP")]
    matchup: Option<String>,
    #[serde(default, alias = "WL")]
    win_loss: Option<String>,
    #[serde(default, alias = "PTS")]
    team_points: Option<String>,
}

/// Parse a game date in any of the known extract formats.
pub fn parse_game_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    GAME_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Team points, tolerating `"119.0"` renderings.
fn parse_points(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Ok(points) = text.parse::<u32>() {
        return Some(points);
    }
    let value = text.parse::<f64>().ok()?;
    (value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64).then_some(value as u32)
}

fn game_from_raw(raw: RawGameRow) -> GameRecord {
    let game_id = raw.game_id.trim().to_string();
    let game_date = raw.game_date.as_deref().and_then(|text| {
        let parsed = parse_game_date(text);
        if parsed.is_none() {
            warn!("game {}: unrecognized date {:?}", game_id, text);
        }
        parsed
    });
    let outcome = raw.win_loss.as_deref().and_then(GameOutcome::from_code);
    let team_points = raw.team_points.as_deref().and_then(parse_points);
    GameRecord {
        game_id,
        game_date,
        matchup: raw.matchup.unwrap_or_default().trim().to_string(),
        outcome,
        team_points,
    }
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

pub(crate) fn load_game_log_from_reader<R: Read>(rdr: R) -> Result<GameLog, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut records = Vec::new();
    for result in reader.deserialize::<RawGameRow>() {
        match result {
            Ok(raw) if raw.game_id.trim().is_empty() => {
                warn!("skipping game log row without a game_id");
            }
            Ok(raw) => records.push(game_from_raw(raw)),
            Err(e) => {
                warn!("skipping malformed game log row: {}", e);
            }
        }
    }
    Ok(GameLog::from_records(records))
}

/// Load the team game log from a CSV file.
pub fn load_game_log(path: &Path) -> Result<GameLog, LoadError> {
    let file = std::fs::File::open(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let log = load_game_log_from_reader(file).map_err(|e| LoadError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    if log.is_empty() {
        return Err(LoadError::Validation(format!(
            "game log CSV {} produced zero games",
            path.display()
        )));
    }
    Ok(log)
}
