use crate::extract::FileFormat;
use anyhow::{bail, Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_STABLE_REPORT_CYCLES: u32 = 10;
const CONFIG_FILE_NAME: &str = "driftd.toml";

// ─── Watched-file declarations ───────────────────────────────────────────────

/// One expected key/value pair inside a `[[file]]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExpectSpec {
    /// Logical key within the file (e.g. `HOST`, `Server.BindAddr`).
    pub key: String,
    /// Expected on-disk value. May be empty.
    #[serde(default)]
    pub value: String,
}

/// A `[[file]]` section: one watched file and its expectations.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileSpec {
    /// Path to the watched file. Relative paths resolve against the
    /// config file's directory.
    pub path: PathBuf,
    /// On-disk syntax: "line-assignment" or "structured".
    pub format: FileFormat,
    /// Expected values, checked in declaration order.
    #[serde(default)]
    pub expect: Vec<ExpectSpec>,
}

// ─── TOML config file ────────────────────────────────────────────────────────

/// `driftd.toml` — all scalar fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Seconds between reconciliation cycles (default: 30).
    poll_interval_secs: Option<u64>,
    /// Clean cycles between "all stable" summaries (default: 10).
    stable_report_cycles: Option<u32>,
    /// Log level filter string, e.g. "debug", "info,driftd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// Watched files and their expectations.
    #[serde(default)]
    file: Vec<FileSpec>,
}

// ─── DaemonConfig ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Data directory holding the default config location.
    pub data_dir: PathBuf,
    /// Fixed period between reconciliation cycles.
    pub poll_interval: std::time::Duration,
    /// Clean cycles between "all stable" summaries (0 = every clean cycle).
    pub stable_report_cycles: u32,
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Watched files in declaration order.
    pub files: Vec<FileSpec>,
}

impl DaemonConfig {
    /// Build config from CLI/env args + the TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `--config` or `{data_dir}/driftd.toml`
    ///   3. Built-in defaults
    ///
    /// A missing config file is an error: a drift monitor with no watched
    /// files has nothing to do. A present but malformed file is also an
    /// error; silently falling back to defaults would disable monitoring.
    pub fn load(
        config_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        interval_secs: Option<u64>,
    ) -> Result<Self> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let config_path = config_path.unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME));

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read config file {}", config_path.display()))?;
        let toml: TomlConfig = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let poll_interval_secs = interval_secs
            .or(toml.poll_interval_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        if poll_interval_secs == 0 {
            bail!("poll_interval_secs must be at least 1");
        }

        let stable_report_cycles = toml
            .stable_report_cycles
            .unwrap_or(DEFAULT_STABLE_REPORT_CYCLES);

        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("DRIFTD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        // Resolve relative watched paths against the config file's directory
        // so a config can live alongside the files it governs.
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let files = toml
            .file
            .into_iter()
            .map(|mut spec| {
                if spec.path.is_relative() {
                    spec.path = config_dir.join(&spec.path);
                }
                spec
            })
            .collect();

        Ok(Self {
            data_dir,
            poll_interval: std::time::Duration::from_secs(poll_interval_secs),
            stable_report_cycles,
            log,
            log_format,
            files,
        })
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/driftd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("driftd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/driftd or ~/.local/share/driftd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("driftd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("driftd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\driftd
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("driftd");
        }
    }
    // Fallback
    PathBuf::from(".driftd")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
