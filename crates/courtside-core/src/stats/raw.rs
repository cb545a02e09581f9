// Raw box-score rows as delivered by the ingestion extract.
//
// Every field is carried as untyped text. Three header dialects are accepted:
// the renamed snake_case columns, the camelCase columns of the traditional
// box-score endpoint, and the upper-case columns of the legacy endpoint.

use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::warn;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Raw row
// ---------------------------------------------------------------------------

/// One player's line for one game, exactly as received. Consumed immediately
/// by the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawBoxScoreRow {
    #[serde(default, alias = "gameId", alias = "GAME_ID")]
    pub game_id: Option<String>,
    #[serde(default, alias = "teamId", alias = "TEAM_ID")]
    pub team_id: Option<String>,
    #[serde(default, alias = "teamTricode", alias = "TEAM_ABBREVIATION")]
    pub team_tricode: Option<String>,
    #[serde(default, alias = "personId", alias = "PLAYER_ID")]
    pub player_id: Option<String>,
    #[serde(default, alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(default, alias = "familyName")]
    pub family_name: Option<String>,
    #[serde(default, alias = "MIN")]
    pub minutes: Option<String>,
    #[serde(default, alias = "points", alias = "PTS")]
    pub pts: Option<String>,
    #[serde(default, alias = "assists", alias = "AST")]
    pub ast: Option<String>,
    #[serde(default, alias = "reboundsTotal", alias = "REB")]
    pub reb: Option<String>,
    #[serde(default, alias = "reboundsOffensive", alias = "OREB")]
    pub oreb: Option<String>,
    #[serde(default, alias = "reboundsDefensive", alias = "DREB")]
    pub dreb: Option<String>,
    #[serde(default, alias = "fieldGoalsMade", alias = "FGM")]
    pub fgm: Option<String>,
    #[serde(default, alias = "fieldGoalsAttempted", alias = "FGA")]
    pub fga: Option<String>,
    #[serde(default, alias = "threePointersMade", alias = "FG3M")]
    pub fg3m: Option<String>,
    #[serde(default, alias = "threePointersAttempted", alias = "FG3A")]
    pub fg3a: Option<String>,
    #[serde(default, alias = "freeThrowsMade", alias = "FTM")]
    pub ftm: Option<String>,
    #[serde(default, alias = "freeThrowsAttempted", alias = "FTA")]
    pub fta: Option<String>,
    #[serde(default, alias = "steals", alias = "STL")]
    pub stl: Option<String>,
    #[serde(default, alias = "blocks", alias = "BLK")]
    pub blk: Option<String>,
    #[serde(default, alias = "turnovers", alias = "TO", alias = "TOV")]
    pub tov: Option<String>,
    #[serde(default, alias = "foulsPersonal", alias = "PF")]
    pub pf: Option<String>,
    #[serde(default, alias = "plusMinusPoints", alias = "PLUS_MINUS")]
    pub plus_minus: Option<String>,
}

impl RawBoxScoreRow {
    /// Short identifier used when reporting a rejected row.
    pub fn describe(&self) -> String {
        let game = self.game_id.as_deref().map(str::trim).unwrap_or("?");
        let player = self.player_id.as_deref().map(str::trim).unwrap_or("?");
        format!("game {game} / player {player}")
    }
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

pub(crate) fn load_boxscores_from_reader<R: Read>(
    rdr: R,
) -> Result<Vec<RawBoxScoreRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut rows = Vec::new();
    for (idx, result) in reader.deserialize::<RawBoxScoreRow>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!("skipping malformed box score record {}: {}", idx + 1, e);
            }
        }
    }
    Ok(rows)
}

/// Load raw box-score rows from a CSV file.
pub fn load_boxscores(path: &Path) -> Result<Vec<RawBoxScoreRow>, LoadError> {
    let file = std::fs::File::open(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let rows = load_boxscores_from_reader(file).map_err(|e| LoadError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    if rows.is_empty() {
        return Err(LoadError::Validation(format!(
            "box score CSV {} produced zero rows",
            path.display()
        )));
    }
    Ok(rows)
}
