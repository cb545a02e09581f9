// Configuration loading and parsing (team.toml, analysis.toml).

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::stats::aggregate::{AggregationOptions, FactFilter};
use crate::stats::metric::Metric;
use crate::stats::normalize::TeamFilter;
use crate::stats::outlier::{OutlierDetector, DEFAULT_OUTLIER_THRESHOLD};
use crate::stats::rolling::DEFAULT_WINDOW;
use crate::stats::summary::Dispersion;

const CONFIG_DIR: &str = "config";
const DEFAULTS_DIR: &str = "defaults";
const TEAM_FILE: &str = "team.toml";
const ANALYSIS_FILE: &str = "analysis.toml";
const CONFIG_FILES: [&str; 2] = [TEAM_FILE, ANALYSIS_FILE];

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub team: TeamConfig,
    pub analysis: AnalysisConfig,
    pub db_path: String,
    pub data_paths: DataPaths,
}

// ---------------------------------------------------------------------------
// team.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[team]` table in team.toml.
#[derive(Debug, Clone, Deserialize)]
struct TeamFile {
    team: TeamConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamConfig {
    /// Numeric team id as it appears in the box scores (e.g. "1610612743").
    #[serde(default)]
    pub id: Option<String>,
    /// Three-letter code (e.g. "DEN"), matched case-insensitively.
    #[serde(default)]
    pub tricode: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
}

impl TeamConfig {
    pub fn filter(&self) -> TeamFilter {
        TeamFilter {
            team_id: self.id.clone(),
            tricode: self.tricode.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// analysis.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire analysis.toml file.
#[derive(Debug, Clone, Deserialize)]
struct AnalysisFile {
    aggregation: AggregationSection,
    #[serde(default)]
    filters: FactFilter,
    rolling: RollingSection,
    outliers: OutlierSection,
    #[serde(default)]
    statistics: StatisticsSection,
    database: DatabaseSection,
    data_paths: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AggregationSection {
    pub min_games: usize,
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RollingSection {
    pub window: usize,
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutlierSection {
    pub threshold: f64,
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatisticsSection {
    #[serde(default)]
    pub dispersion: Dispersion,
}

/// The analysis parameters assembled from the analysis.toml sections.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub aggregation: AggregationSection,
    pub filters: FactFilter,
    pub rolling: RollingSection,
    pub outliers: OutlierSection,
    pub statistics: StatisticsSection,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let options = AggregationOptions::default();
        AnalysisConfig {
            aggregation: AggregationSection {
                min_games: options.min_games,
                metrics: options.metrics,
            },
            filters: options.filter,
            rolling: RollingSection {
                window: DEFAULT_WINDOW,
                metrics: vec![Metric::Points],
            },
            outliers: OutlierSection {
                threshold: DEFAULT_OUTLIER_THRESHOLD,
                metrics: vec![Metric::Points],
            },
            statistics: StatisticsSection {
                dispersion: options.dispersion,
            },
        }
    }
}

impl AnalysisConfig {
    pub fn aggregation_options(&self) -> AggregationOptions {
        AggregationOptions {
            min_games: self.aggregation.min_games,
            filter: self.filters.clone(),
            metrics: self.aggregation.metrics.clone(),
            dispersion: self.statistics.dispersion,
        }
    }

    pub fn outlier_detector(&self) -> OutlierDetector {
        OutlierDetector::new(self.statistics.dispersion).with_threshold(self.outliers.threshold)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub boxscores: String,
    /// Team game log used to attach outcomes; optional.
    #[serde(default)]
    pub games: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/team.toml` and
/// `config/analysis.toml`, relative to the given `base_dir`.
///
/// This does not copy defaults; `load_config()` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join(CONFIG_DIR);

    // --- team.toml (required) ---
    let team_path = config_dir.join(TEAM_FILE);
    let team_text = read_file(&team_path)?;
    let team_file: TeamFile = toml::from_str(&team_text).map_err(|e| ConfigError::ParseError {
        path: team_path.clone(),
        source: e,
    })?;

    // --- analysis.toml (required) ---
    let analysis_path = config_dir.join(ANALYSIS_FILE);
    let analysis_text = read_file(&analysis_path)?;
    let analysis_file: AnalysisFile =
        toml::from_str(&analysis_text).map_err(|e| ConfigError::ParseError {
            path: analysis_path.clone(),
            source: e,
        })?;

    let analysis = AnalysisConfig {
        aggregation: analysis_file.aggregation,
        filters: analysis_file.filters,
        rolling: analysis_file.rolling,
        outliers: analysis_file.outliers,
        statistics: analysis_file.statistics,
    };

    let config = Config {
        team: team_file.team,
        analysis,
        db_path: analysis_file.database.path,
        data_paths: analysis_file.data_paths,
    };

    validate(&config)?;

    Ok(config)
}

/// Seed `config/team.toml` and `config/analysis.toml` from `defaults/` where
/// the user has no copy yet. Existing files are never touched.
///
/// Returns the files that were seeded.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join(DEFAULTS_DIR);
    let config_dir = base_dir.join(CONFIG_DIR);
    let mut seeded = Vec::new();

    for name in CONFIG_FILES {
        let target = config_dir.join(name);
        if target.is_file() {
            continue;
        }
        let source = defaults_dir.join(name);
        if !source.is_file() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "{} is missing and there is no {} to seed it from",
                    target.display(),
                    source.display()
                ),
            });
        }

        std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", config_dir.display()),
        })?;
        std::fs::copy(&source, &target).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to seed {name} from {}: {e}", source.display()),
        })?;
        info!("seeded {} from {}", target.display(), source.display());
        seeded.push(target);
    }

    Ok(seeded)
}

/// Seed any missing config files, then load both from the working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let base_dir = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from(CONFIG_DIR),
    })?;
    ensure_config_files(&base_dir)?;
    load_config_from(&base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if is_blank(&config.team.id) && is_blank(&config.team.tricode) {
        return Err(invalid("team", "set at least one of `id` or `tricode`"));
    }

    let analysis = &config.analysis;
    if analysis.aggregation.min_games == 0 {
        return Err(invalid("aggregation.min_games", "must be > 0"));
    }
    if analysis.rolling.window == 0 {
        return Err(invalid("rolling.window", "must be > 0"));
    }
    let threshold = analysis.outliers.threshold;
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(invalid(
            "outliers.threshold",
            format!("must be > 0, got {threshold}"),
        ));
    }

    let metric_lists: &[(&str, &[Metric])] = &[
        ("aggregation.metrics", &analysis.aggregation.metrics),
        ("rolling.metrics", &analysis.rolling.metrics),
        ("outliers.metrics", &analysis.outliers.metrics),
    ];
    for (name, metrics) in metric_lists {
        if metrics.is_empty() {
            return Err(invalid(name, "must list at least one metric"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = metrics.iter().find(|m| !seen.insert(**m)) {
            return Err(invalid(name, format!("lists `{dup}` more than once")));
        }
    }

    if let Some(min) = analysis.filters.min_minutes {
        if !(min.is_finite() && min >= 0.0) {
            return Err(invalid("filters.min_minutes", format!("must be >= 0, got {min}")));
        }
    }

    if config.db_path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }
    if config.data_paths.boxscores.trim().is_empty() {
        return Err(invalid("data_paths.boxscores", "must not be empty"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
