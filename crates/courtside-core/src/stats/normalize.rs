// Raw record normalizer: team filtering, minutes parsing and numeric typing.
//
// Pure functions of their inputs. A row from another team is filtered
// (`Ok(None)`), a malformed row is an error the caller reports and skips.

use serde::{Deserialize, Serialize};

use crate::stats::raw::RawBoxScoreRow;

/// Minutes value the source uses for a player who did not take the floor.
pub const ZERO_MINUTES: &str = "00:00";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("malformed minutes value {value:?}: {reason}")]
    Parse { value: String, reason: &'static str },

    /// Also raised for a blank required identifier, with an empty `value`.
    #[error("field `{field}` has missing, non-numeric or out-of-range value {value:?}")]
    Type { field: &'static str, value: String },
}

// ---------------------------------------------------------------------------
// Team filter
// ---------------------------------------------------------------------------

/// Selects the rows of the team under analysis, by numeric team id, by
/// tricode, or by either.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamFilter {
    pub team_id: Option<String>,
    pub tricode: Option<String>,
}

impl TeamFilter {
    pub fn by_id(team_id: impl Into<String>) -> Self {
        TeamFilter {
            team_id: Some(team_id.into()),
            tricode: None,
        }
    }

    pub fn by_tricode(tricode: impl Into<String>) -> Self {
        TeamFilter {
            team_id: None,
            tricode: Some(tricode.into()),
        }
    }

    /// True if the row belongs to the target team. A filter with neither
    /// field set matches nothing.
    pub fn matches(&self, row: &RawBoxScoreRow) -> bool {
        let id_match = match (&self.team_id, &row.team_id) {
            (Some(want), Some(got)) => want.trim() == got.trim(),
            _ => false,
        };
        let code_match = match (&self.tricode, &row.team_tricode) {
            (Some(want), Some(got)) => want.trim().eq_ignore_ascii_case(got.trim()),
            _ => false,
        };
        id_match || code_match
    }
}

// ---------------------------------------------------------------------------
// Normalized output
// ---------------------------------------------------------------------------

/// Typed counting stats for one player in one game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountingStats {
    pub pts: u32,
    pub ast: u32,
    pub reb: u32,
    pub oreb: u32,
    pub dreb: u32,
    pub fgm: u32,
    pub fga: u32,
    pub fg3m: u32,
    pub fg3a: u32,
    pub ftm: u32,
    pub fta: u32,
    pub stl: u32,
    pub blk: u32,
    pub tov: u32,
    pub pf: u32,
    pub plus_minus: i32,
}

/// A typed per-player-per-game record, not yet keyed.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub game_id: String,
    pub player_id: String,
    pub first_name: String,
    pub family_name: String,
    pub team_id: String,
    pub team_tricode: String,
    pub minutes: f64,
    pub stats: CountingStats,
}

// ---------------------------------------------------------------------------
// Minutes
// ---------------------------------------------------------------------------

/// Parse a `"MM:SS"` minutes string into fractional minutes.
///
/// Empty, missing and `"00:00"` all mean the player did not play and yield
/// `0.0`. Anything else must be two whole-number components separated by `:`
/// with seconds below 60.
pub fn parse_minutes(raw: Option<&str>) -> Result<f64, NormalizeError> {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(0.0);
    };
    if text == ZERO_MINUTES {
        return Ok(0.0);
    }

    let malformed = |reason| NormalizeError::Parse {
        value: text.to_string(),
        reason,
    };

    let (min_part, sec_part) = text
        .split_once(':')
        .ok_or_else(|| malformed("missing `:` separator"))?;
    let minutes =
        whole_number(min_part).ok_or_else(|| malformed("minutes component is not a whole number"))?;
    let seconds =
        whole_number(sec_part).ok_or_else(|| malformed("seconds component is not a whole number"))?;
    if seconds >= 60 {
        return Err(malformed("seconds component must be below 60"));
    }

    Ok(minutes as f64 + seconds as f64 / 60.0)
}

/// Digits only: no sign, no decimal point.
fn whole_number(part: &str) -> Option<u32> {
    let part = part.trim();
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

// ---------------------------------------------------------------------------
// Numeric fields
// ---------------------------------------------------------------------------

/// Parse an integer, accepting integral decimal renderings such as `"12.0"`
/// but never rounding a fractional value.
fn parse_integral(field: &'static str, text: &str) -> Result<i64, NormalizeError> {
    let type_error = || NormalizeError::Type {
        field,
        value: text.to_string(),
    };
    if let Ok(v) = text.parse::<i64>() {
        return Ok(v);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(v as i64),
        _ => Err(type_error()),
    }
}

/// Blank cells read as zero only when the player did not play.
fn field_text<'a>(
    field: &'static str,
    raw: Option<&'a str>,
    played: bool,
) -> Result<Option<&'a str>, NormalizeError> {
    match raw.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => Ok(Some(text)),
        None if played => Err(NormalizeError::Type {
            field,
            value: String::new(),
        }),
        None => Ok(None),
    }
}

fn parse_count(field: &'static str, raw: Option<&str>, played: bool) -> Result<u32, NormalizeError> {
    let Some(text) = field_text(field, raw, played)? else {
        return Ok(0);
    };
    let value = parse_integral(field, text)?;
    u32::try_from(value).map_err(|_| NormalizeError::Type {
        field,
        value: text.to_string(),
    })
}

fn parse_signed(field: &'static str, raw: Option<&str>, played: bool) -> Result<i32, NormalizeError> {
    let Some(text) = field_text(field, raw, played)? else {
        return Ok(0);
    };
    let value = parse_integral(field, text)?;
    i32::try_from(value).map_err(|_| NormalizeError::Type {
        field,
        value: text.to_string(),
    })
}

fn required(field: &'static str, raw: &Option<String>) -> Result<String, NormalizeError> {
    raw.as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or(NormalizeError::Type {
            field,
            value: String::new(),
        })
}

fn optional(raw: &Option<String>) -> String {
    raw.as_deref().map(str::trim).unwrap_or_default().to_string()
}

// ---------------------------------------------------------------------------
// Row normalization
// ---------------------------------------------------------------------------

/// Normalize one raw row for the given team.
///
/// Returns `Ok(None)` when the row belongs to a different team.
pub fn normalize_row(
    row: &RawBoxScoreRow,
    team: &TeamFilter,
) -> Result<Option<NormalizedRow>, NormalizeError> {
    if !team.matches(row) {
        return Ok(None);
    }

    let game_id = required("game_id", &row.game_id)?;
    let player_id = required("player_id", &row.player_id)?;
    let minutes = parse_minutes(row.minutes.as_deref())?;
    let played = minutes > 0.0;

    let stats = CountingStats {
        pts: parse_count("pts", row.pts.as_deref(), played)?,
        ast: parse_count("ast", row.ast.as_deref(), played)?,
        reb: parse_count("reb", row.reb.as_deref(), played)?,
        oreb: parse_count("oreb", row.oreb.as_deref(), played)?,
        dreb: parse_count("dreb", row.dreb.as_deref(), played)?,
        fgm: parse_count("fgm", row.fgm.as_deref(), played)?,
        fga: parse_count("fga", row.fga.as_deref(), played)?,
        fg3m: parse_count("fg3m", row.fg3m.as_deref(), played)?,
        fg3a: parse_count("fg3a", row.fg3a.as_deref(), played)?,
        ftm: parse_count("ftm", row.ftm.as_deref(), played)?,
        fta: parse_count("fta", row.fta.as_deref(), played)?,
        stl: parse_count("stl", row.stl.as_deref(), played)?,
        blk: parse_count("blk", row.blk.as_deref(), played)?,
        tov: parse_count("tov", row.tov.as_deref(), played)?,
        pf: parse_count("pf", row.pf.as_deref(), played)?,
        plus_minus: parse_signed("plus_minus", row.plus_minus.as_deref(), played)?,
    };

    Ok(Some(NormalizedRow {
        game_id,
        player_id,
        first_name: optional(&row.first_name),
        family_name: optional(&row.family_name),
        team_id: optional(&row.team_id),
        team_tricode: optional(&row.team_tricode),
        minutes,
        stats,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn den_row(minutes: Option<&str>) -> RawBoxScoreRow {
        RawBoxScoreRow {
            game_id: Some("0022300061".into()),
            team_id: Some("1610612743".into()),
            team_tricode: Some("DEN".into()),
            player_id: Some("203999".into()),
            first_name: Some("Nikola".into()),
            family_name: Some("Jokic".into()),
            minutes: minutes.map(String::from),
            pts: Some("29".into()),
            ast: Some("11".into()),
            reb: Some("13".into()),
            oreb: Some("3".into()),
            dreb: Some("10".into()),
            fgm: Some("12".into()),
            fga: Some("20".into()),
            fg3m: Some("1".into()),
            fg3a: Some("3".into()),
            ftm: Some("4".into()),
            fta: Some("5".into()),
            stl: Some("1".into()),
            blk: Some("1".into()),
            tov: Some("3".into()),
            pf: Some("2".into()),
            plus_minus: Some("12".into()),
        }
    }

    // ---- minutes ----

    #[test]
    fn minutes_round_trip_for_all_valid_seconds() {
        for m in [0u32, 1, 9, 12, 34, 48, 53] {
            for s in 0u32..60 {
                let text = format!("{m}:{s:02}");
                let parsed = parse_minutes(Some(&text)).unwrap();
                assert_eq!(parsed, m as f64 + s as f64 / 60.0, "input {text}");
            }
        }
    }

    #[test]
    fn minutes_zero_forms() {
        assert_eq!(parse_minutes(None).unwrap(), 0.0);
        assert_eq!(parse_minutes(Some("")).unwrap(), 0.0);
        assert_eq!(parse_minutes(Some("   ")).unwrap(), 0.0);
        assert_eq!(parse_minutes(Some("00:00")).unwrap(), 0.0);
    }

    #[test]
    fn minutes_known_value() {
        let parsed = parse_minutes(Some("34:30")).unwrap();
        assert!((parsed - 34.5).abs() < 1e-12);
    }

    #[test]
    fn minutes_malformed_is_parse_error() {
        for bad in [
            "34", "ab:12", "34:xy", "34:60", "-3:10", "34:12:05", "34.5:00", "+5:07", "5:+07",
        ] {
            let err = parse_minutes(Some(bad)).unwrap_err();
            assert!(
                matches!(err, NormalizeError::Parse { .. }),
                "expected Parse error for {bad:?}, got {err:?}"
            );
        }
    }

    // ---- team filter ----

    #[test]
    fn other_team_is_filtered_not_rejected() {
        let mut row = den_row(Some("30:00"));
        row.team_id = Some("1610612747".into());
        row.team_tricode = Some("LAL".into());
        assert_eq!(normalize_row(&row, &TeamFilter::by_tricode("DEN")).unwrap(), None);
        assert_eq!(normalize_row(&row, &TeamFilter::by_id("1610612743")).unwrap(), None);
    }

    #[test]
    fn team_filter_by_id_or_tricode() {
        let row = den_row(Some("30:00"));
        assert!(TeamFilter::by_id("1610612743").matches(&row));
        assert!(TeamFilter::by_tricode("den").matches(&row));
        assert!(!TeamFilter::default().matches(&row));
    }

    // ---- full rows ----

    #[test]
    fn normalizes_complete_row() {
        let row = den_row(Some("34:12"));
        let norm = normalize_row(&row, &TeamFilter::by_tricode("DEN"))
            .unwrap()
            .unwrap();
        assert_eq!(norm.game_id, "0022300061");
        assert_eq!(norm.player_id, "203999");
        assert_eq!(norm.family_name, "Jokic");
        assert!((norm.minutes - (34.0 + 12.0 / 60.0)).abs() < 1e-12);
        assert_eq!(norm.stats.pts, 29);
        assert_eq!(norm.stats.fga, 20);
        assert_eq!(norm.stats.plus_minus, 12);
    }

    #[test]
    fn integral_decimal_counts_accepted() {
        let mut row = den_row(Some("34:12"));
        row.plus_minus = Some("-7.0".into());
        row.pts = Some("29.0".into());
        let norm = normalize_row(&row, &TeamFilter::by_tricode("DEN"))
            .unwrap()
            .unwrap();
        assert_eq!(norm.stats.plus_minus, -7);
        assert_eq!(norm.stats.pts, 29);
    }

    #[test]
    fn non_numeric_count_is_type_error() {
        let mut row = den_row(Some("34:12"));
        row.ast = Some("eleven".into());
        let err = normalize_row(&row, &TeamFilter::by_tricode("DEN")).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::Type {
                field: "ast",
                value: "eleven".into()
            }
        );
    }

    #[test]
    fn fractional_count_is_not_rounded() {
        let mut row = den_row(Some("34:12"));
        row.pts = Some("29.5".into());
        let err = normalize_row(&row, &TeamFilter::by_tricode("DEN")).unwrap_err();
        assert!(matches!(err, NormalizeError::Type { field: "pts", .. }));
    }

    #[test]
    fn negative_count_is_type_error() {
        let mut row = den_row(Some("34:12"));
        row.reb = Some("-1".into());
        let err = normalize_row(&row, &TeamFilter::by_tricode("DEN")).unwrap_err();
        assert!(matches!(err, NormalizeError::Type { field: "reb", .. }));
    }

    #[test]
    fn blank_counts_on_did_not_play_row_are_zero() {
        let mut row = den_row(Some(""));
        row.pts = None;
        row.fga = Some(" ".into());
        row.plus_minus = None;
        let norm = normalize_row(&row, &TeamFilter::by_tricode("DEN"))
            .unwrap()
            .unwrap();
        assert_eq!(norm.minutes, 0.0);
        assert_eq!(norm.stats.pts, 0);
        assert_eq!(norm.stats.fga, 0);
        assert_eq!(norm.stats.plus_minus, 0);
    }

    #[test]
    fn blank_count_with_playing_time_is_type_error() {
        let mut row = den_row(Some("12:00"));
        row.pts = None;
        let err = normalize_row(&row, &TeamFilter::by_tricode("DEN")).unwrap_err();
        assert!(matches!(err, NormalizeError::Type { field: "pts", .. }));
    }

    #[test]
    fn malformed_minutes_rejects_row() {
        let row = den_row(Some("thirty"));
        let err = normalize_row(&row, &TeamFilter::by_tricode("DEN")).unwrap_err();
        assert!(matches!(err, NormalizeError::Parse { .. }));
    }

    #[test]
    fn missing_player_id_is_type_error() {
        let mut row = den_row(Some("10:00"));
        row.player_id = None;
        let err = normalize_row(&row, &TeamFilter::by_tricode("DEN")).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::Type {
                field: "player_id",
                value: String::new(),
            }
        );

        let mut row = den_row(Some("10:00"));
        row.game_id = Some("  ".into());
        let err = normalize_row(&row, &TeamFilter::by_tricode("DEN")).unwrap_err();
        assert!(matches!(err, NormalizeError::Type { field: "game_id", .. }));
    }
}
