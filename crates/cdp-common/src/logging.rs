//! Logging Configuration and Initialization
//!
//! One place to configure `tracing` for every CDP binary:
//!
//! - Console, file, or both outputs
//! - Text or JSON formatting
//! - Daily rotating log files
//! - Environment overrides layered on top of the binary's defaults
//!
//! Library code logs through the `tracing` macros only, with structured
//! fields rather than interpolated strings where practical:
//!
//! ```rust
//! use tracing::{info, warn};
//!
//! let archive = "3.zip";
//! info!(archive = %archive, records = 100, "Archive built");
//! warn!(archive = %archive, "Archive has no entries");
//! ```
//!
//! # Example
//!
//! ```no_run
//! use cdp_common::logging::{init_logging, LogConfig, LogLevel};
//!
//! let defaults = LogConfig::builder().level(LogLevel::Debug).build();
//! let config = LogConfig::from_env_over(defaults).unwrap();
//! let _guard = init_logging(&config).unwrap();
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(anyhow::anyhow!("Invalid log level: {}", s)),
        }
    }
}

/// Output target for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    fn console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl FromStr for LogOutput {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(anyhow::anyhow!("Invalid log output: {}", s)),
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub output: LogOutput,
    pub format: LogFormat,

    /// Directory for log files (only used when output includes file)
    pub log_dir: PathBuf,

    /// Log file name prefix (e.g., "cdp" -> "cdp.2024-01-18")
    pub log_file_prefix: String,

    /// Additional filter directives (e.g., "cdp_pipeline=trace,zip=warn")
    pub filter_directives: Option<String>,

    pub include_location: bool,
    pub include_thread_ids: bool,
    pub include_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            output: LogOutput::Console,
            format: LogFormat::Text,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "cdp".to_string(),
            filter_directives: None,
            include_location: false,
            include_thread_ids: false,
            include_targets: true,
        }
    }
}

impl LogConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        Self::from_env_over(Self::default())
    }

    /// Apply environment overrides to `base`
    ///
    /// Environment variables:
    /// - `LOG_LEVEL`: trace, debug, info, warn, error
    /// - `LOG_OUTPUT`: console, file, both
    /// - `LOG_FORMAT`: text, json
    /// - `LOG_DIR`, `LOG_FILE_PREFIX`, `LOG_FILTER`
    /// - `LOG_INCLUDE_LOCATION`, `LOG_INCLUDE_THREAD_IDS`, `LOG_INCLUDE_TARGETS` (true/false)
    ///
    /// Unset variables leave the corresponding field of `base` untouched.
    pub fn from_env_over(base: Self) -> Result<Self> {
        Self::from_lookup(base, |key| std::env::var(key).ok())
    }

    fn from_lookup(mut config: Self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(level) = lookup("LOG_LEVEL") {
            config.level = level.parse()?;
        }
        if let Some(output) = lookup("LOG_OUTPUT") {
            config.output = output.parse()?;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            config.format = format.parse()?;
        }
        if let Some(dir) = lookup("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = lookup("LOG_FILE_PREFIX") {
            config.log_file_prefix = prefix;
        }
        if let Some(filter) = lookup("LOG_FILTER") {
            config.filter_directives = Some(filter);
        }

        let flag = |key: &str, current: bool| -> Result<bool> {
            match lookup(key) {
                Some(val) => val
                    .parse()
                    .with_context(|| format!("{} must be true or false, got '{}'", key, val)),
                None => Ok(current),
            }
        };
        config.include_location = flag("LOG_INCLUDE_LOCATION", config.include_location)?;
        config.include_thread_ids = flag("LOG_INCLUDE_THREAD_IDS", config.include_thread_ids)?;
        config.include_targets = flag("LOG_INCLUDE_TARGETS", config.include_targets)?;

        Ok(config)
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter =
            EnvFilter::from_default_env().add_directive(self.level.to_tracing_level().into());

        if let Some(ref directives) = self.filter_directives {
            for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
                filter = filter.add_directive(
                    directive
                        .trim()
                        .parse()
                        .with_context(|| format!("Failed to parse filter directive '{}'", directive))?,
                );
            }
        }

        Ok(filter)
    }

    fn fmt_layer<W>(&self, writer: W, ansi: bool) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(self.include_targets)
            .with_thread_ids(self.include_thread_ids)
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_span_events(FmtSpan::CLOSE);

        match self.format {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        }
    }
}

/// Builder for LogConfig
#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.log_file_prefix = prefix.into();
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter_directives = Some(filter.into());
        self
    }

    pub fn include_thread_ids(mut self, include: bool) -> Self {
        self.config.include_thread_ids = include;
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Install the global tracing subscriber
///
/// Call once at startup. When file output is enabled the returned guard owns
/// the background writer; keep it alive until the program exits or buffered
/// lines are lost.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = config.env_filter()?;
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if config.output.console() {
        layers.push(config.fmt_layer(std::io::stdout, true));
    }

    if config.output.file() {
        std::fs::create_dir_all(&config.log_dir).with_context(|| {
            format!("Failed to create log directory {}", config.log_dir.display())
        })?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        layers.push(config.fmt_layer(writer, false));
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_output_and_format_from_str() {
        assert_eq!("stdout".parse::<LogOutput>().unwrap(), LogOutput::Console);
        assert_eq!("all".parse::<LogOutput>().unwrap(), LogOutput::Both);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_env_overrides_keep_unset_fields() {
        let base = LogConfig::builder()
            .level(LogLevel::Debug)
            .log_file_prefix("cdp-test")
            .build();

        let config =
            LogConfig::from_lookup(base, lookup(&[("LOG_FORMAT", "json"), ("LOG_OUTPUT", "both")]))
                .unwrap();

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::Both);
        assert_eq!(config.log_file_prefix, "cdp-test");
    }

    #[test]
    fn test_invalid_flag_is_rejected() {
        let result = LogConfig::from_lookup(
            LogConfig::default(),
            lookup(&[("LOG_INCLUDE_LOCATION", "sometimes")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_sets_file_output_fields() {
        let config = LogConfig::builder()
            .output(LogOutput::File)
            .format(LogFormat::Json)
            .log_dir("/var/log/cdp")
            .include_thread_ids(true)
            .build();

        assert_eq!(config.output, LogOutput::File);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.log_dir, PathBuf::from("/var/log/cdp"));
        assert!(config.include_thread_ids);
        assert_eq!(config.log_file_prefix, "cdp");

        // Environment still wins over builder values
        let config =
            LogConfig::from_lookup(config, lookup(&[("LOG_INCLUDE_THREAD_IDS", "false")])).unwrap();
        assert!(!config.include_thread_ids);
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_filter_directives_parse() {
        let config = LogConfig::builder()
            .filter_directives("cdp_pipeline=trace, zip=warn")
            .build();
        assert!(config.env_filter().is_ok());
    }
}
