// Courtside entry point: one rebuild-and-analyze cycle.
//
// Sequence:
// 1. Initialize tracing (stderr)
// 2. Load config
// 3. Load box scores and, when configured, the game log
// 4. Rebuild the fact table
// 5. Run aggregation, rolling and outlier passes
// 6. Persist the snapshot and the cycle summary

use courtside_core::config;
use courtside_core::db;
use courtside_core::stats::aggregate::sort_by_consistency;
use courtside_core::stats::games::load_game_log;
use courtside_core::stats::outlier::rank_by_volatility;
use courtside_core::stats::pipeline::{analyze, rebuild};
use courtside_core::stats::raw::load_boxscores;

use anyhow::Context;
use std::path::Path;
use tracing::info;

/// Number of players listed in the end-of-cycle log lines.
const REPORT_TOP_N: usize = 5;

fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Courtside starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: team={}, season={}",
        config
            .team
            .tricode
            .as_deref()
            .or(config.team.id.as_deref())
            .unwrap_or("?"),
        config.team.season.as_deref().unwrap_or("unspecified")
    );

    // 3. Load inputs
    let rows = load_boxscores(Path::new(&config.data_paths.boxscores))
        .with_context(|| format!("failed to load box scores from {}", config.data_paths.boxscores))?;
    info!("Loaded {} box-score rows", rows.len());

    let games = match &config.data_paths.games {
        Some(path) => {
            let log = load_game_log(Path::new(path))
                .with_context(|| format!("failed to load game log from {path}"))?;
            info!("Loaded {} games", log.len());
            Some(log)
        }
        None => None,
    };

    // 4. Rebuild
    let outcome = rebuild(&rows, &config.team.filter(), games.as_ref())
        .context("rebuild cycle aborted")?;

    // 5. Analyze
    let output = analyze(&outcome.table, &config.analysis);
    info!(
        "Analysis complete: {} player summaries, {} rolling points, {} outlier records",
        output.season_stats.len(),
        output.rolling.len(),
        output.outliers.len()
    );

    if let Some(&metric) = config.analysis.aggregation.metrics.first() {
        let mut ranked = output.season_stats.clone();
        sort_by_consistency(&mut ranked, metric);
        for player in ranked.iter().take(REPORT_TOP_N) {
            if let Some(summary) = player.metric(metric) {
                info!(
                    "consistent {}: {} ({} games, mean {:?}, cv {:?})",
                    metric, player.player_name, player.games_played, summary.mean, summary.cv
                );
            }
        }
    }
    for volatile in rank_by_volatility(&output.outliers).iter().take(REPORT_TOP_N) {
        info!(
            "volatile: player {} ({}/{} outlier games)",
            volatile.player_id, volatile.outliers, volatile.games
        );
    }

    // 6. Persist
    let database = db::Database::open(&config.db_path).context("failed to open database")?;
    database
        .write_snapshot(&outcome.table, &output, games.as_ref())
        .context("failed to persist snapshot")?;

    let summary = outcome.summary(rows.len(), chrono::Utc::now());
    database
        .save_cycle_summary(&summary)
        .context("failed to record cycle summary")?;
    info!(
        "Snapshot written to {}: {}",
        config.db_path,
        serde_json::to_string(&summary).context("failed to serialize cycle summary")?
    );

    Ok(())
}

/// Initialize tracing to stderr so stdout stays free for piping.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("courtside=info,courtside_core=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
