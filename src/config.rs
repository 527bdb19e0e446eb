// ⚙️ Pipeline Configuration
// Directory layout, known filenames and the run date threaded through every stage

use crate::error::PipelineError;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the optional config file looked up in the project root
pub const CONFIG_FILE_NAME: &str = "pipeline.toml";

// ============================================================================
// RUN DATE
// ============================================================================

/// RunDate - the calendar day a run selects inputs for and stamps outputs with
///
/// Read once from the clock by the runner, then passed explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunDate(NaiveDate);

impl RunDate {
    /// Today's date on the local clock
    pub fn today() -> Self {
        RunDate(Local::now().date_naive())
    }
}

/// `YYYY-MM-DD`, the stamp used in every file name
impl fmt::Display for RunDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for RunDate {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(RunDate)
            .map_err(|_| PipelineError::InvalidDate(s.to_string()))
    }
}

// ============================================================================
// PIPELINE CONFIG
// ============================================================================

/// Directory layout and lookup tables.
///
/// Directory fields are relative to `root` unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Project root; never read from the config file itself
    #[serde(skip)]
    pub root: PathBuf,

    /// Input queue of `.zip` archives
    pub raw_zips_dir: PathBuf,

    /// Staging area for renamed CSVs
    pub raw_dir: PathBuf,

    /// Where processed archives are moved
    pub archive_dir: PathBuf,

    /// Tiered lead files
    pub output_dir: PathBuf,

    /// Extraction logs
    pub log_dir: PathBuf,

    /// CSV names renamed verbatim to `{stem}_{date}.csv` (case-sensitive)
    pub known_files: Vec<String>,

    /// Free/generic email providers
    pub consumer_domains: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            root: PathBuf::from("."),
            raw_zips_dir: PathBuf::from("raw_zips"),
            raw_dir: PathBuf::from("raw"),
            archive_dir: PathBuf::from("archive").join("raw_zips"),
            output_dir: PathBuf::from("outputs"),
            log_dir: PathBuf::from("logs"),
            known_files: vec![
                "Filings.csv".to_string(),
                "Agents.csv".to_string(),
                "Principals.csv".to_string(),
            ],
            consumer_domains: vec![
                "gmail.com".to_string(),
                "yahoo.com".to_string(),
                "hotmail.com".to_string(),
                "outlook.com".to_string(),
                "aol.com".to_string(),
            ],
        }
    }
}

impl PipelineConfig {
    /// Default layout under `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        PipelineConfig {
            root: root.into(),
            ..PipelineConfig::default()
        }
    }

    /// Load configuration for `root`.
    ///
    /// An explicit `config_path` must exist. Without one, `root/pipeline.toml`
    /// is used when present and the defaults otherwise.
    pub fn load(root: &Path, config_path: Option<&Path>) -> Result<Self, PipelineError> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = root.join(CONFIG_FILE_NAME);
                if !candidate.exists() {
                    return Ok(PipelineConfig::with_root(root));
                }
                candidate
            }
        };

        let content = fs::read_to_string(&path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let mut config: PipelineConfig = toml::from_str(&content).map_err(|e| {
            let path = path.display();
            PipelineError::Config(format!("Failed to parse config file '{}': {}", path, e))
        })?;
        config.root = root.to_path_buf();
        Ok(config)
    }

    fn resolve(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.root.join(dir)
        }
    }

    pub fn raw_zips_path(&self) -> PathBuf {
        self.resolve(&self.raw_zips_dir)
    }

    pub fn raw_path(&self) -> PathBuf {
        self.resolve(&self.raw_dir)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.resolve(&self.archive_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    pub fn log_path(&self) -> PathBuf {
        self.resolve(&self.log_dir)
    }
}
