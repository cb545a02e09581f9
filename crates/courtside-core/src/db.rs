// SQLite persistence layer for fact-table snapshots and analysis outputs.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use crate::stats::aggregate::{MetricSummary, PlayerSeasonStats};
use crate::stats::facts::{FactTable, PlayerGameFact};
use crate::stats::games::{GameLog, GameOutcome, GameRecord};
use crate::stats::metric::Metric;
use crate::stats::normalize::CountingStats;
use crate::stats::outlier::OutlierRecord;
use crate::stats::pipeline::{AnalysisOutput, CycleSummary};
use crate::stats::rolling::RollingWindowPoint;

/// Column list shared by every fact query; `fact_from_row` reads it by index.
const FACT_COLUMNS: &str = "player_game_key, game_id, player_id, first_name, family_name,
    team_id, team_tricode, minutes, pts, ast, reb, oreb, dreb, fgm, fga, fg3m, fg3a,
    ftm, fta, stl, blk, tov, pf, plus_minus, fg_pct, three_pct, ft_pct, is_win";

/// SQLite-backed persistence for the current snapshot: games, facts, season
/// summaries, rolling points, outlier records and key-value rebuild state.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Key under which the last `CycleSummary` is stored.
    const CYCLE_SUMMARY_KEY: &'static str = "last_cycle";

    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS games (
                game_id     TEXT PRIMARY KEY,
                seq_no      INTEGER NOT NULL,
                game_date   TEXT,
                matchup     TEXT NOT NULL,
                outcome     TEXT,
                team_points INTEGER
            );

            CREATE TABLE IF NOT EXISTS player_game_facts (
                player_game_key TEXT PRIMARY KEY,
                seq_no          INTEGER NOT NULL,
                game_id         TEXT NOT NULL,
                player_id       TEXT NOT NULL,
                first_name      TEXT NOT NULL,
                family_name     TEXT NOT NULL,
                team_id         TEXT NOT NULL,
                team_tricode    TEXT NOT NULL,
                minutes         REAL NOT NULL,
                pts             INTEGER NOT NULL,
                ast             INTEGER NOT NULL,
                reb             INTEGER NOT NULL,
                oreb            INTEGER NOT NULL,
                dreb            INTEGER NOT NULL,
                fgm             INTEGER NOT NULL,
                fga             INTEGER NOT NULL,
                fg3m            INTEGER NOT NULL,
                fg3a            INTEGER NOT NULL,
                ftm             INTEGER NOT NULL,
                fta             INTEGER NOT NULL,
                stl             INTEGER NOT NULL,
                blk             INTEGER NOT NULL,
                tov             INTEGER NOT NULL,
                pf              INTEGER NOT NULL,
                plus_minus      INTEGER NOT NULL,
                fg_pct          REAL,
                three_pct       REAL,
                ft_pct          REAL,
                is_win          INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_facts_player ON player_game_facts(player_id);
            CREATE INDEX IF NOT EXISTS idx_facts_game ON player_game_facts(game_id);

            CREATE TABLE IF NOT EXISTS player_season_stats (
                player_id    TEXT NOT NULL,
                metric       TEXT NOT NULL,
                seq_no       INTEGER NOT NULL,
                player_name  TEXT NOT NULL,
                games_played INTEGER NOT NULL,
                samples      INTEGER NOT NULL,
                mean         REAL,
                stddev       REAL,
                cv           REAL,
                PRIMARY KEY (player_id, metric)
            );

            CREATE TABLE IF NOT EXISTS rolling_points (
                player_id   TEXT NOT NULL,
                metric      TEXT NOT NULL,
                sequence    INTEGER NOT NULL,
                game_id     TEXT NOT NULL,
                window_size INTEGER NOT NULL,
                value       REAL,
                mean        REAL,
                stddev      REAL,
                PRIMARY KEY (player_id, metric, sequence)
            );

            CREATE TABLE IF NOT EXISTS outlier_records (
                player_id     TEXT NOT NULL,
                metric        TEXT NOT NULL,
                sequence      INTEGER NOT NULL,
                game_id       TEXT NOT NULL,
                value         REAL,
                career_mean   REAL,
                career_stddev REAL,
                z_score       REAL,
                is_outlier    INTEGER NOT NULL,
                PRIMARY KEY (player_id, metric, sequence)
            );

            CREATE TABLE IF NOT EXISTS rebuild_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Snapshot writes
    // ------------------------------------------------------------------

    /// Replace the stored fact table with `table` in one transaction.
    pub fn replace_facts(&self, table: &FactTable) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        insert_facts(&tx, table)?;
        tx.commit().context("failed to commit replace_facts")?;
        Ok(())
    }

    /// Replace the stored game log with `games` in one transaction.
    pub fn replace_games(&self, games: &GameLog) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        insert_games(&tx, games)?;
        tx.commit().context("failed to commit replace_games")?;
        Ok(())
    }

    /// Replace the whole snapshot (facts, analysis outputs and the game log)
    /// in a single transaction. Readers see either the old snapshot or the
    /// new one. Without a game log the stored games are cleared.
    pub fn write_snapshot(
        &self,
        table: &FactTable,
        output: &AnalysisOutput,
        games: Option<&GameLog>,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin snapshot transaction")?;

        match games {
            Some(games) => insert_games(&tx, games)?,
            None => {
                tx.execute("DELETE FROM games", [])
                    .context("failed to clear games")?;
            }
        }
        insert_facts(&tx, table)?;
        insert_season_stats(&tx, &output.season_stats)?;
        insert_rolling(&tx, &output.rolling)?;
        insert_outliers(&tx, &output.outliers)?;

        tx.commit().context("failed to commit snapshot")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Fact reads
    // ------------------------------------------------------------------

    /// Load the stored facts back into a table, in insertion order.
    pub fn load_facts(&self) -> Result<FactTable> {
        let facts = self.query_facts("ORDER BY seq_no", params![])?;
        FactTable::from_facts(facts).context("stored facts violate key uniqueness")
    }

    /// One player's facts in game-sequence order.
    pub fn facts_for_player(&self, player_id: &str) -> Result<Vec<PlayerGameFact>> {
        self.query_facts("WHERE player_id = ?1 ORDER BY seq_no", params![player_id])
    }

    pub fn fact_by_key(&self, player_game_key: &str) -> Result<Option<PlayerGameFact>> {
        let mut facts = self.query_facts("WHERE player_game_key = ?1", params![player_game_key])?;
        Ok(facts.pop())
    }

    fn query_facts(&self, clause: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<PlayerGameFact>> {
        let conn = self.conn();
        let sql = format!("SELECT {FACT_COLUMNS} FROM player_game_facts {clause}");
        let mut stmt = conn
            .prepare(&sql)
            .context("failed to prepare fact query")?;

        let facts = stmt
            .query_map(args, fact_from_row)
            .context("failed to query facts")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map fact rows")?;

        Ok(facts)
    }

    // ------------------------------------------------------------------
    // Game and analysis reads
    // ------------------------------------------------------------------

    pub fn load_games(&self) -> Result<GameLog> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT game_id, game_date, matchup, outcome, team_points
                 FROM games ORDER BY seq_no",
            )
            .context("failed to prepare load_games query")?;

        let records = stmt
            .query_map([], |row| {
                let game_date: Option<String> = row.get(1)?;
                let outcome: Option<String> = row.get(3)?;
                Ok(GameRecord {
                    game_id: row.get(0)?,
                    game_date: game_date.and_then(|d| d.parse::<NaiveDate>().ok()),
                    matchup: row.get(2)?,
                    outcome: outcome.as_deref().and_then(GameOutcome::from_code),
                    team_points: row.get(4)?,
                })
            })
            .context("failed to query games")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map game rows")?;

        Ok(GameLog::from_records(records))
    }

    /// Season summaries in the order they were computed, one entry per
    /// player with the metrics regrouped.
    pub fn load_season_stats(&self) -> Result<Vec<PlayerSeasonStats>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT player_id, player_name, games_played, metric, samples, mean, stddev, cv
                 FROM player_season_stats ORDER BY seq_no",
            )
            .context("failed to prepare load_season_stats query")?;

        let rows = stmt
            .query_map([], |row| {
                let player_id: String = row.get(0)?;
                let player_name: String = row.get(1)?;
                let games_played: usize = row.get(2)?;
                let summary = MetricSummary {
                    metric: metric_column(row, 3)?,
                    samples: row.get(4)?,
                    mean: row.get(5)?,
                    stddev: row.get(6)?,
                    cv: row.get(7)?,
                };
                Ok((player_id, player_name, games_played, summary))
            })
            .context("failed to query season stats")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map season stat rows")?;

        let mut stats: Vec<PlayerSeasonStats> = Vec::new();
        for (player_id, player_name, games_played, summary) in rows {
            match stats.last_mut() {
                Some(last) if last.player_id == player_id => last.metrics.push(summary),
                _ => stats.push(PlayerSeasonStats {
                    player_id,
                    player_name,
                    games_played,
                    metrics: vec![summary],
                }),
            }
        }
        Ok(stats)
    }

    pub fn load_rolling(&self, player_id: &str, metric: Metric) -> Result<Vec<RollingWindowPoint>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT player_id, game_id, sequence, metric, window_size, value, mean, stddev
                 FROM rolling_points WHERE player_id = ?1 AND metric = ?2 ORDER BY sequence",
            )
            .context("failed to prepare load_rolling query")?;

        let points = stmt
            .query_map(params![player_id, metric.as_str()], |row| {
                Ok(RollingWindowPoint {
                    player_id: row.get(0)?,
                    game_id: row.get(1)?,
                    sequence: row.get(2)?,
                    metric: metric_column(row, 3)?,
                    window: row.get(4)?,
                    value: row.get(5)?,
                    mean: row.get(6)?,
                    stddev: row.get(7)?,
                })
            })
            .context("failed to query rolling points")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map rolling point rows")?;

        Ok(points)
    }

    /// Outlier records for one metric, optionally only the flagged games.
    pub fn load_outliers(&self, metric: Metric, flagged_only: bool) -> Result<Vec<OutlierRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT player_id, game_id, sequence, metric, value, career_mean,
                        career_stddev, z_score, is_outlier
                 FROM outlier_records
                 WHERE metric = ?1 AND (?2 = 0 OR is_outlier = 1)
                 ORDER BY rowid",
            )
            .context("failed to prepare load_outliers query")?;

        let records = stmt
            .query_map(params![metric.as_str(), flagged_only], |row| {
                Ok(OutlierRecord {
                    player_id: row.get(0)?,
                    game_id: row.get(1)?,
                    sequence: row.get(2)?,
                    metric: metric_column(row, 3)?,
                    value: row.get(4)?,
                    career_mean: row.get(5)?,
                    career_stddev: row.get(6)?,
                    z_score: row.get(7)?,
                    is_outlier: row.get(8)?,
                })
            })
            .context("failed to query outlier records")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map outlier rows")?;

        Ok(records)
    }

    // ------------------------------------------------------------------
    // Key-value state
    // ------------------------------------------------------------------

    /// Persist an arbitrary JSON value under `key`. Uses INSERT OR REPLACE so
    /// repeated saves overwrite the previous value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str =
            serde_json::to_string(value).context("failed to serialize state value")?;
        conn.execute(
            "INSERT OR REPLACE INTO rebuild_state (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save state")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`. Returns `None` if the key
    /// does not exist.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT value FROM rebuild_state WHERE key = ?1")
            .context("failed to prepare load_state query")?;

        let mut rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))
            .context("failed to query rebuild state")?;

        match rows.next() {
            Some(row_result) => {
                let json_str = row_result.context("failed to read state row")?;
                let value: serde_json::Value = serde_json::from_str(&json_str)
                    .context("failed to deserialize state value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn save_cycle_summary(&self, summary: &CycleSummary) -> Result<()> {
        let value = serde_json::to_value(summary).context("failed to serialize cycle summary")?;
        self.save_state(Self::CYCLE_SUMMARY_KEY, &value)
    }

    pub fn load_cycle_summary(&self) -> Result<Option<CycleSummary>> {
        match self.load_state(Self::CYCLE_SUMMARY_KEY)? {
            Some(value) => {
                let summary =
                    serde_json::from_value(value).context("failed to decode cycle summary")?;
                Ok(Some(summary))
            }
            None => Ok(None),
        }
    }
}

// ----------------------------------------------------------------------
// Row helpers
// ----------------------------------------------------------------------

fn metric_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Metric> {
    let name: String = row.get(idx)?;
    name.parse::<Metric>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn fact_from_row(row: &Row<'_>) -> rusqlite::Result<PlayerGameFact> {
    Ok(PlayerGameFact {
        player_game_key: row.get(0)?,
        game_id: row.get(1)?,
        player_id: row.get(2)?,
        first_name: row.get(3)?,
        family_name: row.get(4)?,
        team_id: row.get(5)?,
        team_tricode: row.get(6)?,
        minutes: row.get(7)?,
        stats: CountingStats {
            pts: row.get(8)?,
            ast: row.get(9)?,
            reb: row.get(10)?,
            oreb: row.get(11)?,
            dreb: row.get(12)?,
            fgm: row.get(13)?,
            fga: row.get(14)?,
            fg3m: row.get(15)?,
            fg3a: row.get(16)?,
            ftm: row.get(17)?,
            fta: row.get(18)?,
            stl: row.get(19)?,
            blk: row.get(20)?,
            tov: row.get(21)?,
            pf: row.get(22)?,
            plus_minus: row.get(23)?,
        },
        fg_pct: row.get(24)?,
        three_pct: row.get(25)?,
        ft_pct: row.get(26)?,
        is_win: row.get(27)?,
    })
}

// ----------------------------------------------------------------------
// Transaction bodies (delete + insert)
// ----------------------------------------------------------------------

fn insert_games(conn: &Connection, games: &GameLog) -> Result<()> {
    conn.execute("DELETE FROM games", [])
        .context("failed to delete games")?;
    let mut stmt = conn
        .prepare(
            "INSERT INTO games (game_id, seq_no, game_date, matchup, outcome, team_points)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .context("failed to prepare game insert")?;
    for (seq_no, game) in games.games().iter().enumerate() {
        stmt.execute(params![
            game.game_id,
            seq_no,
            game.game_date.map(|d| d.to_string()),
            game.matchup,
            game.outcome.map(GameOutcome::code),
            game.team_points,
        ])
        .with_context(|| format!("failed to insert game {}", game.game_id))?;
    }
    Ok(())
}

fn insert_facts(conn: &Connection, table: &FactTable) -> Result<()> {
    conn.execute("DELETE FROM player_game_facts", [])
        .context("failed to delete facts")?;
    let mut stmt = conn
        .prepare(&format!(
            "INSERT INTO player_game_facts (seq_no, {FACT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)"
        ))
        .context("failed to prepare fact insert")?;
    for (seq_no, f) in table.facts().iter().enumerate() {
        let s = &f.stats;
        stmt.execute(params![
            seq_no,
            f.player_game_key,
            f.game_id,
            f.player_id,
            f.first_name,
            f.family_name,
            f.team_id,
            f.team_tricode,
            f.minutes,
            s.pts,
            s.ast,
            s.reb,
            s.oreb,
            s.dreb,
            s.fgm,
            s.fga,
            s.fg3m,
            s.fg3a,
            s.ftm,
            s.fta,
            s.stl,
            s.blk,
            s.tov,
            s.pf,
            s.plus_minus,
            f.fg_pct,
            f.three_pct,
            f.ft_pct,
            f.is_win,
        ])
        .with_context(|| format!("failed to insert fact {}", f.player_game_key))?;
    }
    Ok(())
}

fn insert_season_stats(conn: &Connection, stats: &[PlayerSeasonStats]) -> Result<()> {
    conn.execute("DELETE FROM player_season_stats", [])
        .context("failed to delete season stats")?;
    let mut stmt = conn
        .prepare(
            "INSERT INTO player_season_stats
                (player_id, metric, seq_no, player_name, games_played, samples, mean, stddev, cv)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .context("failed to prepare season stat insert")?;
    let rows = stats
        .iter()
        .flat_map(|p| p.metrics.iter().map(move |m| (p, m)))
        .enumerate();
    for (seq_no, (player, m)) in rows {
        stmt.execute(params![
            player.player_id,
            m.metric.as_str(),
            seq_no,
            player.player_name,
            player.games_played,
            m.samples,
            m.mean,
            m.stddev,
            m.cv,
        ])
        .with_context(|| format!("failed to insert season stats for {}", player.player_id))?;
    }
    Ok(())
}

fn insert_rolling(conn: &Connection, points: &[RollingWindowPoint]) -> Result<()> {
    conn.execute("DELETE FROM rolling_points", [])
        .context("failed to delete rolling points")?;
    let mut stmt = conn
        .prepare(
            "INSERT INTO rolling_points
                (player_id, metric, sequence, game_id, window_size, value, mean, stddev)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .context("failed to prepare rolling point insert")?;
    for p in points {
        stmt.execute(params![
            p.player_id,
            p.metric.as_str(),
            p.sequence,
            p.game_id,
            p.window,
            p.value,
            p.mean,
            p.stddev,
        ])
        .with_context(|| format!("failed to insert rolling point for {}", p.player_id))?;
    }
    Ok(())
}

fn insert_outliers(conn: &Connection, records: &[OutlierRecord]) -> Result<()> {
    conn.execute("DELETE FROM outlier_records", [])
        .context("failed to delete outlier records")?;
    let mut stmt = conn
        .prepare(
            "INSERT INTO outlier_records
                (player_id, metric, sequence, game_id, value, career_mean, career_stddev,
                 z_score, is_outlier)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .context("failed to prepare outlier insert")?;
    for r in records {
        stmt.execute(params![
            r.player_id,
            r.metric.as_str(),
            r.sequence,
            r.game_id,
            r.value,
            r.career_mean,
            r.career_stddev,
            r.z_score,
            r.is_outlier,
        ])
        .with_context(|| format!("failed to insert outlier record for {}", r.player_id))?;
    }
    Ok(())
}
