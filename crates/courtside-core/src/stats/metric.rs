// Tracked per-game metrics and how to read them off a fact.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::stats::facts::PlayerGameFact;

/// A per-game statistic the engines can summarize.
///
/// Names match the fact table columns (`pts`, `fg_pct`, ...); the long forms
/// (`points`, `rebounds`, ...) are accepted as aliases in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "minutes")]
    Minutes,
    #[serde(rename = "pts", alias = "points")]
    Points,
    #[serde(rename = "ast", alias = "assists")]
    Assists,
    #[serde(rename = "reb", alias = "rebounds")]
    Rebounds,
    #[serde(rename = "oreb")]
    OffensiveRebounds,
    #[serde(rename = "dreb")]
    DefensiveRebounds,
    #[serde(rename = "stl", alias = "steals")]
    Steals,
    #[serde(rename = "blk", alias = "blocks")]
    Blocks,
    #[serde(rename = "tov", alias = "turnovers")]
    Turnovers,
    #[serde(rename = "pf", alias = "fouls")]
    PersonalFouls,
    #[serde(rename = "plus_minus")]
    PlusMinus,
    #[serde(rename = "fgm")]
    FieldGoalsMade,
    #[serde(rename = "fga")]
    FieldGoalsAttempted,
    #[serde(rename = "fg3m")]
    ThreesMade,
    #[serde(rename = "fg3a")]
    ThreesAttempted,
    #[serde(rename = "ftm")]
    FreeThrowsMade,
    #[serde(rename = "fta")]
    FreeThrowsAttempted,
    #[serde(rename = "fg_pct")]
    FieldGoalPct,
    #[serde(rename = "three_pct", alias = "fg3_pct")]
    ThreePointPct,
    #[serde(rename = "ft_pct")]
    FreeThrowPct,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric {0:?}")]
pub struct UnknownMetric(pub String);

impl Metric {
    pub const ALL: [Metric; 20] = [
        Metric::Minutes,
        Metric::Points,
        Metric::Assists,
        Metric::Rebounds,
        Metric::OffensiveRebounds,
        Metric::DefensiveRebounds,
        Metric::Steals,
        Metric::Blocks,
        Metric::Turnovers,
        Metric::PersonalFouls,
        Metric::PlusMinus,
        Metric::FieldGoalsMade,
        Metric::FieldGoalsAttempted,
        Metric::ThreesMade,
        Metric::ThreesAttempted,
        Metric::FreeThrowsMade,
        Metric::FreeThrowsAttempted,
        Metric::FieldGoalPct,
        Metric::ThreePointPct,
        Metric::FreeThrowPct,
    ];

    /// Column-style name, as stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Minutes => "minutes",
            Metric::Points => "pts",
            Metric::Assists => "ast",
            Metric::Rebounds => "reb",
            Metric::OffensiveRebounds => "oreb",
            Metric::DefensiveRebounds => "dreb",
            Metric::Steals => "stl",
            Metric::Blocks => "blk",
            Metric::Turnovers => "tov",
            Metric::PersonalFouls => "pf",
            Metric::PlusMinus => "plus_minus",
            Metric::FieldGoalsMade => "fgm",
            Metric::FieldGoalsAttempted => "fga",
            Metric::ThreesMade => "fg3m",
            Metric::ThreesAttempted => "fg3a",
            Metric::FreeThrowsMade => "ftm",
            Metric::FreeThrowsAttempted => "fta",
            Metric::FieldGoalPct => "fg_pct",
            Metric::ThreePointPct => "three_pct",
            Metric::FreeThrowPct => "ft_pct",
        }
    }

    /// True for the shooting ratios, which are undefined without attempts.
    pub fn is_ratio(self) -> bool {
        matches!(
            self,
            Metric::FieldGoalPct | Metric::ThreePointPct | Metric::FreeThrowPct
        )
    }

    /// The metric's value for one game, `None` when undefined for that game.
    pub fn value(self, fact: &PlayerGameFact) -> Option<f64> {
        let s = &fact.stats;
        let count = |v: u32| Some(v as f64);
        match self {
            Metric::Minutes => Some(fact.minutes),
            Metric::Points => count(s.pts),
            Metric::Assists => count(s.ast),
            Metric::Rebounds => count(s.reb),
            Metric::OffensiveRebounds => count(s.oreb),
            Metric::DefensiveRebounds => count(s.dreb),
            Metric::Steals => count(s.stl),
            Metric::Blocks => count(s.blk),
            Metric::Turnovers => count(s.tov),
            Metric::PersonalFouls => count(s.pf),
            Metric::PlusMinus => Some(s.plus_minus as f64),
            Metric::FieldGoalsMade => count(s.fgm),
            Metric::FieldGoalsAttempted => count(s.fga),
            Metric::ThreesMade => count(s.fg3m),
            Metric::ThreesAttempted => count(s.fg3a),
            Metric::FreeThrowsMade => count(s.ftm),
            Metric::FreeThrowsAttempted => count(s.fta),
            Metric::FieldGoalPct => fact.fg_pct,
            Metric::ThreePointPct => fact.three_pct,
            Metric::FreeThrowPct => fact.ft_pct,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::normalize::{CountingStats, NormalizedRow};

    fn fact(fgm: u32, fga: u32) -> PlayerGameFact {
        PlayerGameFact::from_row(
            NormalizedRow {
                game_id: "G1".into(),
                player_id: "P1".into(),
                first_name: String::new(),
                family_name: String::new(),
                team_id: String::new(),
                team_tricode: "DEN".into(),
                minutes: 31.5,
                stats: CountingStats {
                    pts: 22,
                    reb: 9,
                    fgm,
                    fga,
                    plus_minus: -6,
                    ..Default::default()
                },
            },
            None,
        )
    }

    #[test]
    fn reads_counting_and_derived_values() {
        let f = fact(8, 16);
        assert_eq!(Metric::Points.value(&f), Some(22.0));
        assert_eq!(Metric::Rebounds.value(&f), Some(9.0));
        assert_eq!(Metric::PlusMinus.value(&f), Some(-6.0));
        assert_eq!(Metric::Minutes.value(&f), Some(31.5));
        assert_eq!(Metric::FieldGoalPct.value(&f), Some(0.5));
    }

    #[test]
    fn ratio_without_attempts_is_undefined() {
        let f = fact(0, 0);
        assert_eq!(Metric::FieldGoalPct.value(&f), None);
        assert!(Metric::FieldGoalPct.is_ratio());
        assert!(!Metric::Points.is_ratio());
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for m in Metric::ALL {
            assert_eq!(m.as_str().parse::<Metric>().unwrap(), m);
        }
        assert!("dunks".parse::<Metric>().is_err());
    }

    #[test]
    fn serde_names_and_aliases() {
        #[derive(Deserialize)]
        struct Wrapper {
            metrics: Vec<Metric>,
        }
        let w: Wrapper =
            toml::from_str(r#"metrics = ["pts", "points", "fg_pct", "rebounds", "plus_minus"]"#).unwrap();
        assert_eq!(
            w.metrics,
            vec![
                Metric::Points,
                Metric::Points,
                Metric::FieldGoalPct,
                Metric::Rebounds,
                Metric::PlusMinus
            ]
        );
    }
}
