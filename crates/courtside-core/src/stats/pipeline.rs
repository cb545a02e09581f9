// One rebuild cycle: raw rows -> normalized rows -> fact table, followed by
// the analysis passes over the new snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::stats::aggregate::{aggregate, PlayerSeasonStats};
use crate::stats::facts::{BuildError, FactTable};
use crate::stats::games::GameLog;
use crate::stats::normalize::{normalize_row, NormalizeError, TeamFilter};
use crate::stats::outlier::OutlierRecord;
use crate::stats::raw::RawBoxScoreRow;
use crate::stats::rolling::{rolling_for_table, RollingWindowPoint};

/// A raw row that failed normalization and was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRejection {
    /// 1-based position in the input sequence.
    pub row: usize,
    pub row_id: String,
    pub reason: NormalizeError,
}

/// Result of one rebuild cycle.
#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub table: Arc<FactTable>,
    pub rejected: Vec<RowRejection>,
    /// Rows dropped because they belong to another team.
    pub filtered_out: usize,
}

/// Bookkeeping for one cycle, persisted alongside the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub rows_read: usize,
    pub facts: usize,
    pub players: usize,
    pub games: usize,
    pub rejected: usize,
    pub filtered_out: usize,
    pub unknown_games: usize,
    pub rebuilt_at: DateTime<Utc>,
}

impl RebuildOutcome {
    pub fn summary(&self, rows_read: usize, rebuilt_at: DateTime<Utc>) -> CycleSummary {
        CycleSummary {
            rows_read,
            facts: self.table.len(),
            players: self.table.players().len(),
            games: self.table.game_ids().len(),
            rejected: self.rejected.len(),
            filtered_out: self.filtered_out,
            unknown_games: self.table.unknown_games().len(),
            rebuilt_at,
        }
    }
}

/// Run one full rebuild over every raw row of the cycle.
///
/// Malformed rows are reported in `rejected` and skipped. A key conflict
/// aborts the cycle and no table is produced.
pub fn rebuild(
    rows: &[RawBoxScoreRow],
    filter: &TeamFilter,
    games: Option<&GameLog>,
) -> Result<RebuildOutcome, BuildError> {
    let mut normalized = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();
    let mut filtered_out = 0;

    for (idx, raw) in rows.iter().enumerate() {
        match normalize_row(raw, filter) {
            Ok(Some(row)) => normalized.push((idx + 1, row)),
            Ok(None) => filtered_out += 1,
            Err(reason) => {
                let rejection = RowRejection {
                    row: idx + 1,
                    row_id: raw.describe(),
                    reason,
                };
                warn!(
                    "row {} ({}) rejected: {}",
                    rejection.row, rejection.row_id, rejection.reason
                );
                rejected.push(rejection);
            }
        }
    }

    let table = FactTable::build(normalized, games)?;
    info!(
        "rebuilt fact table: {} facts, {} players, {} rejected, {} other-team rows",
        table.len(),
        table.players().len(),
        rejected.len(),
        filtered_out
    );

    Ok(RebuildOutcome {
        table: Arc::new(table),
        rejected,
        filtered_out,
    })
}

/// Everything computed from one snapshot.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOutput {
    pub season_stats: Vec<PlayerSeasonStats>,
    pub rolling: Vec<RollingWindowPoint>,
    pub outliers: Vec<OutlierRecord>,
}

/// Run the aggregation, rolling and outlier passes configured in `config`.
pub fn analyze(table: &FactTable, config: &AnalysisConfig) -> AnalysisOutput {
    let dispersion = config.statistics.dispersion;
    let season_stats = aggregate(table.facts(), &config.aggregation_options());

    let rolling = config
        .rolling
        .metrics
        .iter()
        .flat_map(|&metric| rolling_for_table(table, metric, config.rolling.window, dispersion))
        .collect();

    let detector = config.outlier_detector();
    let outliers = config
        .outliers
        .metrics
        .iter()
        .flat_map(|&metric| detector.detect_table(table, metric))
        .collect();

    AnalysisOutput {
        season_stats,
        rolling,
        outliers,
    }
}
