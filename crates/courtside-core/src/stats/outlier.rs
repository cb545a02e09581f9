// Outlier detection: per-game z-scores against each player's own career
// distribution.

use serde::{Deserialize, Serialize};

use crate::stats::aggregate::group_by_player;
use crate::stats::facts::{FactTable, PlayerGameFact};
use crate::stats::metric::Metric;
use crate::stats::rolling::assign_sequences;
use crate::stats::summary::{summarize, zscore, Dispersion};

/// `|z|` above this marks a game as an outlier (roughly the outer 5% under a
/// normal approximation).
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 2.0;

/// One game scored against the player's career distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierRecord {
    pub player_id: String,
    pub game_id: String,
    pub sequence: usize,
    pub metric: Metric,
    pub value: Option<f64>,
    pub career_mean: Option<f64>,
    pub career_stddev: Option<f64>,
    pub z_score: Option<f64>,
    pub is_outlier: bool,
}

/// Per-player volatility: share of games flagged as outliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub player_id: String,
    pub games: usize,
    pub outliers: usize,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierDetector {
    threshold: f64,
    dispersion: Dispersion,
}

impl Default for OutlierDetector {
    fn default() -> Self {
        OutlierDetector {
            threshold: DEFAULT_OUTLIER_THRESHOLD,
            dispersion: Dispersion::default(),
        }
    }
}

impl OutlierDetector {
    pub fn new(dispersion: Dispersion) -> Self {
        OutlierDetector {
            dispersion,
            ..Default::default()
        }
    }

    pub fn with_threshold(self, threshold: f64) -> Self {
        OutlierDetector { threshold, ..self }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score every game of one player.
    ///
    /// The career summary is computed once over the games where `metric` is
    /// defined. With fewer than two such games, or no spread, every z-score
    /// is undefined; records are still returned for every game.
    pub fn detect(&self, facts: &[&PlayerGameFact], metric: Metric) -> Vec<OutlierRecord> {
        let sequenced = assign_sequences(facts);
        let values: Vec<f64> = sequenced.iter().filter_map(|s| metric.value(s.fact)).collect();
        let career = summarize(&values, self.dispersion);

        sequenced
            .iter()
            .map(|s| {
                let value = metric.value(s.fact);
                let z_score = match (value, career.as_ref()) {
                    (Some(v), Some(c)) => zscore(v, c),
                    _ => None,
                };
                RecordParts {
                    value,
                    z_score,
                    career_mean: career.map(|c| c.mean),
                    career_stddev: career.and_then(|c| c.stddev),
                }
                .into_record(s.fact, s.sequence, metric, self.threshold)
            })
            .collect()
    }

    /// Score every player in the table, players in first-appearance order.
    pub fn detect_table(&self, table: &FactTable, metric: Metric) -> Vec<OutlierRecord> {
        table
            .players()
            .iter()
            .flat_map(|player_id| self.detect(&table.for_player(player_id), metric))
            .collect()
    }
}

struct RecordParts {
    value: Option<f64>,
    z_score: Option<f64>,
    career_mean: Option<f64>,
    career_stddev: Option<f64>,
}

impl RecordParts {
    fn into_record(
        self,
        fact: &PlayerGameFact,
        sequence: usize,
        metric: Metric,
        threshold: f64,
    ) -> OutlierRecord {
        OutlierRecord {
            player_id: fact.player_id.clone(),
            game_id: fact.game_id.clone(),
            sequence,
            metric,
            value: self.value,
            career_mean: self.career_mean,
            career_stddev: self.career_stddev,
            z_score: self.z_score,
            is_outlier: self.z_score.is_some_and(|z| z.abs() > threshold),
        }
    }
}

/// Outlier games / total games; `None` for an empty slice.
pub fn outlier_rate(records: &[OutlierRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let flagged = records.iter().filter(|r| r.is_outlier).count();
    Some(flagged as f64 / records.len() as f64)
}

/// Per-player outlier rates, most volatile first. Ties keep first-appearance
/// order.
pub fn rank_by_volatility(records: &[OutlierRecord]) -> Vec<OutlierSummary> {
    let mut groups: Vec<(String, Vec<&OutlierRecord>)> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|(id, _)| *id == record.player_id) {
            Some((_, list)) => list.push(record),
            None => groups.push((record.player_id.clone(), vec![record])),
        }
    }

    let mut summaries: Vec<OutlierSummary> = groups
        .into_iter()
        .map(|(player_id, list)| {
            let outliers = list.iter().filter(|r| r.is_outlier).count();
            OutlierSummary {
                player_id,
                games: list.len(),
                outliers,
                rate: outliers as f64 / list.len() as f64,
            }
        })
        .collect();
    summaries.sort_by(|a, b| b.rate.partial_cmp(&a.rate).unwrap_or(std::cmp::Ordering::Equal));
    summaries
}

/// Convenience: group arbitrary facts by player and score each group.
pub fn detect_all<'a>(
    detector: &OutlierDetector,
    facts: impl IntoIterator<Item = &'a PlayerGameFact>,
    metric: Metric,
) -> Vec<OutlierRecord> {
    group_by_player(facts)
        .into_iter()
        .flat_map(|(_, games)| detector.detect(&games, metric))
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
    fn zscores_against_career() {
        // Population: mean 5, stddev 2
        let games = season("P1", &[2, 4, 4, 4, 5, 5, 7, 9]);
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        let records = OutlierDetector::new(Dispersion::Population).detect(&refs, Metric::Points);
        assert_eq!(records.len(), 8);
        assert!(approx_eq(records[0].career_mean.unwrap(), 5.0, 1e-10));
        assert!(approx_eq(records[0].career_stddev.unwrap(), 2.0, 1e-10));
        assert!(approx_eq(records[0].z_score.unwrap(), -1.5, 1e-10));
        assert!(approx_eq(records[7].z_score.unwrap(), 2.0, 1e-10));
        // |z| == 2 is not strictly above the threshold
        assert!(!records[7].is_outlier);
        assert_eq!(records[7].sequence, 8);
    }

    #[test]
    fn big_night_is_flagged() {
        let games = season("P1", &[20, 21, 19, 20, 22, 18, 20, 21, 19, 45]);
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        let records = OutlierDetector::default().detect(&refs, Metric::Points);
        let flagged: Vec<&str> = records
            .iter()
            .filter(|r| r.is_outlier)
            .map(|r| r.game_id.as_str())
            .collect();
        assert_eq!(flagged, vec!["G10"]);
        assert!(approx_eq(outlier_rate(&records).unwrap(), 0.1, 1e-10));
    }

    #[test]
    fn threshold_is_configurable() {
        let games = season("P1", &[2, 4, 4, 4, 5, 5, 7, 9]);
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        let detector = OutlierDetector::new(Dispersion::Population).with_threshold(1.4);
        assert!((detector.threshold() - 1.4).abs() < f64::EPSILON);
        let records = detector.detect(&refs, Metric::Points);
        let flagged: Vec<&str> = records
            .iter()
            .filter(|r| r.is_outlier)
            .map(|r| r.game_id.as_str())
            .collect();
        assert_eq!(flagged, vec!["G1", "G8"]);
    }

    #[test]
    fn constant_performance_has_no_zscores() {
        let games = season("P1", &[12, 12, 12, 12]);
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        let records = OutlierDetector::default().detect(&refs, Metric::Points);
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.z_score.is_none() && !r.is_outlier));
        assert_eq!(records[0].career_mean, Some(12.0));
    }

    #[test]
    fn single_game_is_kept_with_missing_zscore() {
        let games = season("P1", &[30]);
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        for dispersion in [Dispersion::Sample, Dispersion::Population] {
            let records = OutlierDetector::new(dispersion).detect(&refs, Metric::Points);
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].value, Some(30.0));
            assert_eq!(records[0].z_score, None);
        }
    }

    #[test]
    fn undefined_value_keeps_record_without_zscore() {
        let mut games = season("P1", &[10, 10, 10]);
        games[0].fg_pct = Some(0.4);
        games[1].fg_pct = None;
        games[2].fg_pct = Some(0.6);
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        let records = OutlierDetector::default().detect(&refs, Metric::FieldGoalPct);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].value, None);
        assert_eq!(records[1].z_score, None);
        assert!(records[0].z_score.is_some());
    }

    #[test]
    fn recomputation_is_bit_identical() {
        let games = season("P1", &[31, 7, 22, 19, 40, 3, 25, 18]);
        let refs: Vec<&PlayerGameFact> = games.iter().collect();
        let detector = OutlierDetector::default();
        let first = detector.detect(&refs, Metric::Points);
        let second = detector.detect(&refs, Metric::Points);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.z_score.map(f64::to_bits), b.z_score.map(f64::to_bits));
        }
    }

    #[test]
    fn volatility_ranking() {
        let mut facts = season("Steady", &[20, 20, 21, 19, 20, 20]);
        facts.extend(season("Wild", &[20, 20, 20, 20, 20, 20, 20, 20, 20, 60]));
        let table = FactTable::from_facts(facts).unwrap();
        let records = OutlierDetector::default().detect_table(&table, Metric::Points);
        assert_eq!(records.len(), 16);

        let ranking = rank_by_volatility(&records);
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].player_id, "Wild");
        assert_eq!((ranking[0].games, ranking[0].outliers), (10, 1));
        assert_eq!(ranking[1].player_id, "Steady");
        assert_eq!(ranking[1].outliers, 0);
    }

    #[test]
    fn detect_all_groups_loose_facts() {
        let mut facts = season("P1", &[10, 20]);
        facts.extend(season("P2", &[5]));
        let records = detect_all(&OutlierDetector::default(), &facts, Metric::Points);
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].player_id, "P2");
    }

    #[test]
    fn empty_rate_is_undefined() {
        assert_eq!(outlier_rate(&[]), None);
    }
}
