/*============================================================
  Rainmeas Project: Registry Check
  Module: rainmeas_regcheck::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load operator configuration for the registry validator:
    registry layout, probe limits, and reporting policy.

  Security / Safety Notes:
    Reads a single TOML file; no values are executed.

  Dependencies:
    serde + toml for parsing, dirs for default locations.

  Operational Scope:
    Resolved once at startup; CLI flags override file values.

  Revision History:
    2026-10-17 RMS  Authored configuration layer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Safe defaults when no file is present
    - Explicit failure for operator-supplied paths
    - Clamped limits to keep probe pools sane
============================================================*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{RegcheckError, Result};

const CONFIG_DIR_NAME: &str = "rainmeas";
const CONFIG_FILE_NAME: &str = "regcheck.toml";

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegcheckConfig {
    pub registry: RegistryConfig,
    pub probe: ProbeConfig,
    pub report: ReportConfig,
}

/// Where the registry lives and how strictly file names are checked.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    pub root: PathBuf,
    pub index: PathBuf,
    pub packages_dir: PathBuf,
    pub require_file_name_match: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            index: PathBuf::from("index.json"),
            packages_dir: PathBuf::from("packages"),
            require_file_name_match: true,
        }
    }
}

/// Reachability probe limits. Durations are in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    pub enabled: bool,
    pub timeout: u64,
    pub deadline: u64,
    pub max_parallel_probes: usize,
    pub retries: usize,
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: 10,
            deadline: 300,
            max_parallel_probes: 8,
            retries: 1,
            user_agent: format!("Rainmeas-Regcheck/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Reporting policy and log placement.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub log_dir: Option<PathBuf>,
    pub fail_on_inconclusive: bool,
}

impl RegcheckConfig {
    /// Load from an explicit path, or from the default location when present.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(explicit) => Self::load(explicit),
            None => match default_config_path() {
                Some(candidate) if candidate.is_file() => Self::load(&candidate),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parse the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            RegcheckError::Config(format!("Failed to read {}: {err}", path.display()))
        })?;
        Self::parse(&raw)
            .map_err(|err| RegcheckError::Config(format!("{}: {err}", path.display())))
    }

    fn parse(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(raw)?;
        config.probe.timeout = config.probe.timeout.max(1);
        config.probe.deadline = config.probe.deadline.max(config.probe.timeout);
        config.probe.max_parallel_probes = config.probe.max_parallel_probes.max(1);
        Ok(config)
    }

    /// Absolute-or-relative path of the index file.
    pub fn index_path(&self) -> PathBuf {
        self.registry.root.join(&self.registry.index)
    }

    /// Path of the descriptor directory.
    pub fn packages_path(&self) -> PathBuf {
        self.registry.root.join(&self.registry.packages_dir)
    }

    /// Directory receiving session logs.
    pub fn log_dir(&self) -> PathBuf {
        self.report.log_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(CONFIG_DIR_NAME)
                .join("logs")
        })
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
