// Aggregation engine: per-player mean, standard deviation and coefficient of
// variation over a filtered subset of the fact table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::stats::facts::PlayerGameFact;
use crate::stats::games::GameOutcome;
use crate::stats::metric::Metric;
use crate::stats::summary::{coefficient_of_variation, summarize, Dispersion};

// ---------------------------------------------------------------------------
// Row filters
// ---------------------------------------------------------------------------

/// Row-level filters applied before grouping. Every unset field accepts all
/// rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FactFilter {
    pub min_minutes: Option<f64>,
    pub min_fga: Option<u32>,
    pub min_fg3a: Option<u32>,
    pub min_fta: Option<u32>,
    /// Keep only wins or only losses. Facts without a known outcome are
    /// dropped when this is set.
    pub outcome: Option<GameOutcome>,
}

impl FactFilter {
    pub fn accepts(&self, fact: &PlayerGameFact) -> bool {
        let s = &fact.stats;
        self.min_minutes.map_or(true, |m| fact.minutes >= m)
            && self.min_fga.map_or(true, |m| s.fga >= m)
            && self.min_fg3a.map_or(true, |m| s.fg3a >= m)
            && self.min_fta.map_or(true, |m| s.fta >= m)
            && self
                .outcome
                .map_or(true, |o| fact.is_win == Some(o == GameOutcome::Win))
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Summary of one metric for one player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: Metric,
    /// Games where the metric was defined (ratios need attempts).
    pub samples: usize,
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
    /// `stddev / mean * 100`; undefined for a zero mean.
    pub cv: Option<f64>,
}

/// One player's consistency profile over the included games.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSeasonStats {
    pub player_id: String,
    pub player_name: String,
    pub games_played: usize,
    pub metrics: Vec<MetricSummary>,
}

impl PlayerSeasonStats {
    pub fn metric(&self, metric: Metric) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.metric == metric)
    }
}

/// Parameters of one aggregation query.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationOptions {
    /// Players with fewer included games are excluded.
    pub min_games: usize,
    pub filter: FactFilter,
    pub metrics: Vec<Metric>,
    pub dispersion: Dispersion,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        AggregationOptions {
            min_games: 1,
            filter: FactFilter::default(),
            metrics: vec![
                Metric::Points,
                Metric::Assists,
                Metric::Rebounds,
                Metric::FieldGoalPct,
                Metric::PlusMinus,
            ],
            dispersion: Dispersion::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Group facts by `player_id`, preserving the order in which each player and
/// each of their games first appears.
pub fn group_by_player<'a>(
    facts: impl IntoIterator<Item = &'a PlayerGameFact>,
) -> Vec<(&'a str, Vec<&'a PlayerGameFact>)> {
    let mut slots: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<(&'a str, Vec<&'a PlayerGameFact>)> = Vec::new();
    for fact in facts {
        let slot = *slots.entry(fact.player_id.as_str()).or_insert_with(|| {
            groups.push((fact.player_id.as_str(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(fact);
    }
    groups
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Summarize one metric over a player's games, skipping games where the
/// metric is undefined.
pub fn summarize_metric(
    facts: &[&PlayerGameFact],
    metric: Metric,
    dispersion: Dispersion,
) -> MetricSummary {
    let values: Vec<f64> = facts.iter().filter_map(|f| metric.value(f)).collect();
    match summarize(&values, dispersion) {
        Some(summary) => MetricSummary {
            metric,
            samples: summary.count,
            mean: Some(summary.mean),
            stddev: summary.stddev,
            cv: coefficient_of_variation(&summary),
        },
        None => MetricSummary {
            metric,
            samples: 0,
            mean: None,
            stddev: None,
            cv: None,
        },
    }
}

/// Compute one `PlayerSeasonStats` per qualifying player.
///
/// Filters apply to rows before grouping. Output order is the order of each
/// player's first appearance in `facts`.
pub fn aggregate<'a>(
    facts: impl IntoIterator<Item = &'a PlayerGameFact>,
    options: &AggregationOptions,
) -> Vec<PlayerSeasonStats> {
    let included = facts.into_iter().filter(|f| options.filter.accepts(f));
    group_by_player(included)
        .into_iter()
        .filter(|(_, games)| games.len() >= options.min_games)
        .map(|(player_id, games)| PlayerSeasonStats {
            player_id: player_id.to_string(),
            player_name: games[0].display_name(),
            games_played: games.len(),
            metrics: options
                .metrics
                .iter()
                .map(|&m| summarize_metric(&games, m, options.dispersion))
                .collect(),
        })
        .collect()
}

/// Sort by CV ascending ("most consistent first"). Players whose CV for
/// `metric` is undefined go last; ties keep their current order.
pub fn sort_by_consistency(stats: &mut [PlayerSeasonStats], metric: Metric) {
    let cv = |s: &PlayerSeasonStats| s.metric(metric).and_then(|m| m.cv);
    stats.sort_by(|a, b| match (cv(a), cv(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}
