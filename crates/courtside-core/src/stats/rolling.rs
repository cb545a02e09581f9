// Rolling statistics engine: trailing-window mean and standard deviation
// over each player's ordered game sequence.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::stats::facts::{FactTable, PlayerGameFact};
use crate::stats::metric::Metric;
use crate::stats::summary::{summarize, Dispersion};

/// Default trailing window, in games.
pub const DEFAULT_WINDOW: usize = 5;

/// A fact tagged with its 1-based position in the player's game sequence.
#[derive(Debug, Clone, Copy)]
pub struct SequencedFact<'a> {
    pub sequence: usize,
    pub fact: &'a PlayerGameFact,
}

/// One trailing-window observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingWindowPoint {
    pub player_id: String,
    pub game_id: String,
    pub sequence: usize,
    pub metric: Metric,
    pub window: usize,
    pub value: Option<f64>,
    /// Over the defined values among the last `window` games, current
    /// game included.
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
}

/// Number one player's games by first appearance of each `game_id`.
///
/// A repeated `game_id` keeps its first position and later repeats are
/// dropped, so sequence numbers are strictly increasing without gaps.
pub fn assign_sequences<'a>(facts: &[&'a PlayerGameFact]) -> Vec<SequencedFact<'a>> {
    let mut seen = HashSet::new();
    facts
        .iter()
        .copied()
        .filter(|f| seen.insert(f.game_id.as_str()))
        .enumerate()
        .map(|(i, fact)| SequencedFact {
            sequence: i + 1,
            fact,
        })
        .collect()
}

/// Trailing-window points for one player's games, in table order.
///
/// Emits one point per position `i >= window`; earlier positions have too
/// few games and are skipped. A zero window emits nothing.
pub fn rolling_window(
    facts: &[&PlayerGameFact],
    metric: Metric,
    window: usize,
    dispersion: Dispersion,
) -> Vec<RollingWindowPoint> {
    if window == 0 {
        return Vec::new();
    }
    let sequenced = assign_sequences(facts);
    let values: Vec<Option<f64>> = sequenced.iter().map(|s| metric.value(s.fact)).collect();

    sequenced
        .iter()
        .enumerate()
        .skip(window - 1)
        .map(|(i, s)| {
            let in_window: Vec<f64> = values[i + 1 - window..=i].iter().flatten().copied().collect();
            let summary = summarize(&in_window, dispersion);
            RollingWindowPoint {
                player_id: s.fact.player_id.clone(),
                game_id: s.fact.game_id.clone(),
                sequence: s.sequence,
                metric,
                window,
                value: values[i],
                mean: summary.map(|x| x.mean),
                stddev: summary.and_then(|x| x.stddev),
            }
        })
        .collect()
}

/// Rolling points for every player in the table, players in first-appearance
/// order.
pub fn rolling_for_table(
    table: &FactTable,
    metric: Metric,
    window: usize,
    dispersion: Dispersion,
) -> Vec<RollingWindowPoint> {
    table
        .players()
        .iter()
        .flat_map(|player_id| rolling_window(&table.for_player(player_id), metric, window, dispersion))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::normalize::{CountingStats, NormalizedRow};

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn fact(game_id: &str, player_id: &str, pts: u32) -> PlayerGameFact {
        PlayerGameFact::from_row(
            NormalizedRow {
                game_id: game_id.into(),
                player_id: player_id.into(),
                first_name: String::new(),
                family_name: String::new(),
                team_id: String::new(),
                team_tricode: "DEN".into(),
                minutes: 30.0,
                stats: CountingStats {
                    pts,
                    ..Default::default()
                },
            },
            None,
        )
    }

    fn season(player_id: &str, points: &[u32]) -> Vec<PlayerGameFact> {
        points
            .iter()
            .enumerate()
            .map(|(i, &p)| fact(&format!("G{}", i + 1), player_id, p))
            .collect()
    }

    #[test]
    fn four_games_produce_no_points() {
        let games = season("P1", &[10, 12, 14, 16]);
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        assert!(rolling_window(&refs, Metric::Points, 5, Dispersion::Sample).is_empty());
    }

    #[test]
    fn five_games_produce_one_full_window() {
        let games = season("P1", &[10, 12, 14, 16, 28]);
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        let points = rolling_window(&refs, Metric::Points, 5, Dispersion::Sample);
        assert_eq!(points.len(), 1);
        let p = &points[0];
        assert_eq!(p.sequence, 5);
        assert_eq!(p.game_id, "G5");
        assert_eq!(p.value, Some(28.0));
        assert!(approx_eq(p.mean.unwrap(), 16.0, 1e-10));
    }

    #[test]
    fn window_trails_and_includes_current_game() {
        let games = season("P1", &[1, 2, 3, 4, 5, 6, 7]);
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        let points = rolling_window(&refs, Metric::Points, 3, Dispersion::Population);
        let seqs: Vec<usize> = points.iter().map(|p| p.sequence).collect();
        assert_eq!(seqs, vec![3, 4, 5, 6, 7]);
        // Window at position 5 covers games 3..=5
        assert!(approx_eq(points[2].mean.unwrap(), 4.0, 1e-10));
        assert!(approx_eq(points[2].stddev.unwrap(), (2.0f64 / 3.0).sqrt(), 1e-10));
    }

    #[test]
    fn window_of_one_with_sample_estimator() {
        let games = season("P1", &[8, 9]);
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        let points = rolling_window(&refs, Metric::Points, 1, Dispersion::Sample);
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].mean, Some(9.0));
        assert_eq!(points[1].stddev, None);
    }

    #[test]
    fn zero_window_emits_nothing() {
        let games = season("P1", &[8, 9]);
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        assert!(rolling_window(&refs, Metric::Points, 0, Dispersion::Sample).is_empty());
    }

    #[test]
    fn undefined_values_are_skipped_inside_window() {
        let mut games = season("P1", &[10, 10, 10]);
        games[0].fg_pct = Some(0.5);
        games[1].fg_pct = None;
        games[2].fg_pct = Some(0.7);
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        let points = rolling_window(&refs, Metric::FieldGoalPct, 3, Dispersion::Sample);
        assert_eq!(points.len(), 1);
        assert!(approx_eq(points[0].mean.unwrap(), 0.6, 1e-10));

        let window_two = rolling_window(&refs, Metric::FieldGoalPct, 2, Dispersion::Sample);
        assert_eq!(window_two[0].value, None);
        assert_eq!(window_two[0].mean, Some(0.5));
        assert_eq!(window_two[0].stddev, None);
    }

    #[test]
    fn recomputation_is_identical() {
        let games = season("P1", &[31, 7, 22, 19, 40, 3, 25, 18]);
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        let first = rolling_window(&refs, Metric::Points, 5, Dispersion::Sample);
        let second = rolling_window(&refs, Metric::Points, 5, Dispersion::Sample);
        assert_eq!(first, second);
    }

    #[test]
    fn sequences_follow_first_appearance() {
        let games = vec![fact("G7", "P1", 1), fact("G2", "P1", 2), fact("G7", "P1", 3)];
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        let seq = assign_sequences(&refs);
        assert_eq!(seq.len(), 2);
        assert_eq!((seq[0].sequence, seq[0].fact.game_id.as_str()), (1, "G7"));
        assert_eq!((seq[1].sequence, seq[1].fact.game_id.as_str()), (2, "G2"));
    }

    #[test]
    fn table_rolls_each_player_separately() {
        let mut facts = season("P1", &[10, 20, 30]);
        facts.extend(season("P2", &[5, 5]));
        let table = FactTable::from_facts(facts).unwrap();
        let points = rolling_for_table(&table, Metric::Points, 2, Dispersion::Sample);
        let owners: Vec<(&str, usize)> = points
            .iter()
            .map(|p| (p.player_id.as_str(), p.sequence))
            .collect();
        assert_eq!(owners, vec![("P1", 2), ("P1", 3), ("P2", 2)]);
        assert_eq!(points[2].stddev, Some(0.0));
    }
}
