use std::fs;

use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Top-level configuration record. Unknown sections and unknown fields are
/// rejected outright so a typo cannot silently disable a knob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub scanner: ScannerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub file: Option<Utf8PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum LogLevel {
    #[serde(rename = "DEBUG", alias = "debug")]
    Debug,
    #[default]
    #[serde(rename = "INFO", alias = "info")]
    Info,
    #[serde(rename = "WARNING", alias = "warning")]
    Warning,
    #[serde(rename = "ERROR", alias = "error")]
    Error,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Simple,
    Detailed,
    #[default]
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScannerSettings {
    #[serde(default)]
    pub target_media_path: Utf8PathBuf,
    /// Catalog location. Defaults to `catalog.db` in the working directory.
    #[serde(default = "default_database_path")]
    pub database_path: Utf8PathBuf,
    /// Size of the blocking-IO pool.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Size of the CPU worker pool.
    #[serde(default = "default_worker_processes")]
    pub worker_processes: usize,
    #[serde(default = "default_queue_maxsize")]
    pub queue_maxsize: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub use_ffprobe: bool,
    #[serde(default)]
    pub use_exiftool: bool,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            target_media_path: Utf8PathBuf::new(),
            database_path: default_database_path(),
            worker_threads: default_worker_threads(),
            worker_processes: default_worker_processes(),
            queue_maxsize: default_queue_maxsize(),
            batch_size: default_batch_size(),
            use_ffprobe: false,
            use_exiftool: false,
        }
    }
}

fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_worker_threads() -> usize {
    (3 * cpu_count()).max(4)
}

fn default_worker_processes() -> usize {
    cpu_count().max(2)
}

fn default_queue_maxsize() -> usize {
    1000
}

fn default_batch_size() -> usize {
    100
}

fn default_database_path() -> Utf8PathBuf {
    Utf8PathBuf::from("catalog.db")
}

impl Settings {
    pub fn load(path: &Utf8Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("could not read config file {path}"))?;
        let settings: Settings = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {path}"))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let s = &self.scanner;
        if s.target_media_path.as_str().is_empty() {
            bail!("scanner.target_media_path must be set");
        }
        if s.worker_threads < 1 {
            bail!("scanner.worker_threads must be at least 1");
        }
        if s.worker_processes < 1 {
            bail!("scanner.worker_processes must be at least 1");
        }
        if s.queue_maxsize < 1 {
            bail!("scanner.queue_maxsize must be at least 1");
        }
        if s.batch_size < 1 {
            bail!("scanner.batch_size must be at least 1");
        }
        Ok(())
    }
}
