//! Pipeline configuration
//!
//! Values are resolved in three layers: built-in defaults, then `.env` /
//! process environment, then command-line overrides applied by the binary.

use cdp_common::{CdpError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default number of archives generated per run.
pub const DEFAULT_ARCHIVES_NUMBER: usize = 50;

/// Default number of record files per archive.
pub const DEFAULT_FILES_NUMBER: usize = 100;

/// Default wave width for both generation and extraction.
pub const DEFAULT_FILES_OPEN_IN_PARALLEL: usize = 25;

/// Working directory name used under the home directory.
pub const DEFAULT_WORKING_DIR_NAME: &str = "concurrency_demo";

/// How archive-level tasks are launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFanOut {
    /// Every archive task starts immediately; one join at the end
    #[default]
    Unbounded,
    /// Archive tasks run in waves of `files_open_in_parallel`
    Waves,
}

impl FromStr for ArchiveFanOut {
    type Err = CdpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "unbounded" | "all" => Ok(ArchiveFanOut::Unbounded),
            "waves" | "bounded" => Ok(ArchiveFanOut::Waves),
            _ => Err(CdpError::config(format!(
                "Invalid archive fan-out '{}': expected 'unbounded' or 'waves'",
                s
            ))),
        }
    }
}

impl fmt::Display for ArchiveFanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFanOut::Unbounded => write!(f, "unbounded"),
            ArchiveFanOut::Waves => write!(f, "waves"),
        }
    }
}

/// Configuration shared read-only by every stage of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of archives to generate
    pub archives_number: usize,

    /// Number of record files per archive
    pub files_number: usize,

    /// Wave width used by both generation and extraction
    pub files_open_in_parallel: usize,

    /// Root for every file the pipeline reads or writes
    pub working_dir: PathBuf,

    #[serde(default)]
    pub archive_fan_out: ArchiveFanOut,
}

impl PipelineConfig {
    /// Load configuration from `.env`, the environment, and defaults
    ///
    /// Environment variables:
    /// - `CDP_ARCHIVES_NUMBER`
    /// - `CDP_FILES_NUMBER`
    /// - `CDP_FILES_OPEN_IN_PARALLEL`
    /// - `CDP_WORKING_DIR`
    /// - `CDP_ARCHIVE_FAN_OUT` (`unbounded` or `waves`)
    ///
    /// Values that parse but are out of range are kept; call [`validate`]
    /// once command-line overrides have been applied.
    ///
    /// [`validate`]: PipelineConfig::validate
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let count = |key: &str, default: usize| -> Result<usize> {
            match lookup(key) {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    CdpError::config(format!("{} must be a positive integer, got '{}'", key, raw))
                }),
                None => Ok(default),
            }
        };

        Ok(PipelineConfig {
            archives_number: count("CDP_ARCHIVES_NUMBER", DEFAULT_ARCHIVES_NUMBER)?,
            files_number: count("CDP_FILES_NUMBER", DEFAULT_FILES_NUMBER)?,
            files_open_in_parallel: count(
                "CDP_FILES_OPEN_IN_PARALLEL",
                DEFAULT_FILES_OPEN_IN_PARALLEL,
            )?,
            working_dir: lookup("CDP_WORKING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_working_dir),
            archive_fan_out: lookup("CDP_ARCHIVE_FAN_OUT")
                .map(|raw| raw.parse())
                .transpose()?
                .unwrap_or_default(),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.archives_number == 0 {
            return Err(CdpError::config("archives_number must be greater than 0"));
        }

        if self.files_number == 0 {
            return Err(CdpError::config("files_number must be greater than 0"));
        }

        if self.files_open_in_parallel == 0 {
            return Err(CdpError::config(
                "files_open_in_parallel must be greater than 0",
            ));
        }

        if self.working_dir.as_os_str().is_empty() {
            return Err(CdpError::config("working_dir cannot be empty"));
        }

        if self.files_open_in_parallel > self.files_number {
            tracing::debug!(
                files_number = self.files_number,
                files_open_in_parallel = self.files_open_in_parallel,
                "Wave width exceeds files per archive; each archive runs in a single wave"
            );
        }

        Ok(())
    }

    /// Wave width for archive-level fan-out over `archives` archives
    pub fn archive_wave_width(&self, archives: usize) -> usize {
        match self.archive_fan_out {
            ArchiveFanOut::Unbounded => archives.max(1),
            ArchiveFanOut::Waves => self.files_open_in_parallel,
        }
    }

    /// Path of the first output table (`id`, `level`)
    pub fn first_sink_path(&self) -> PathBuf {
        self.working_dir.join(crate::sink::FIRST_SINK_FILE)
    }

    /// Path of the second output table (`id`, `object_name`)
    pub fn second_sink_path(&self) -> PathBuf {
        self.working_dir.join(crate::sink::SECOND_SINK_FILE)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            archives_number: DEFAULT_ARCHIVES_NUMBER,
            files_number: DEFAULT_FILES_NUMBER,
            files_open_in_parallel: DEFAULT_FILES_OPEN_IN_PARALLEL,
            working_dir: default_working_dir(),
            archive_fan_out: ArchiveFanOut::default(),
        }
    }
}

/// `~/concurrency_demo`, or `./concurrency_demo` when no home directory is known
pub fn default_working_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_WORKING_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKING_DIR_NAME))
}
