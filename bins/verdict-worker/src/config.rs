// Harness configuration for the verdict worker
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::probe::ProbeStrategy;

pub const DEFAULT_CONFIG_PATH: &str = "config/harness.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Bundled reference interpreter loaded by every harness document
    pub interpreter_script: PathBuf,
    pub poll_interval_ms: u64,
    /// `None` polls until the result shows up or the deadline hits
    pub max_poll_attempts: Option<u32>,
    pub timeout_ms: u64,
    pub strategy: ProbeStrategy,
    /// Where harness documents are staged; system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
    pub no_sandbox: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interpreter_script: PathBuf::from("runner/_stella_src.js"),
            poll_interval_ms: 100,
            max_poll_attempts: Some(100),
            timeout_ms: 30_000,
            strategy: ProbeStrategy::default(),
            scratch_dir: None,
            no_sandbox: false,
        }
    }
}

impl ProbeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Falls back to the number of available hardware threads
    pub parallelism: Option<usize>,
    pub source_extension: String,
    /// Appended to the source file name to find its oracle
    pub oracle_suffix: String,
    pub command_timeout_ms: Option<u64>,
    pub probe: ProbeConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            parallelism: None,
            source_extension: "stella".to_string(),
            oracle_suffix: ".out".to_string(),
            command_timeout_ms: None,
            probe: ProbeConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a JSON file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Harness config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: HarnessConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file if present, defaults otherwise
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.parallelism == Some(0) {
            bail!("parallelism must be at least 1");
        }
        if self.source_extension.is_empty() || self.oracle_suffix.is_empty() {
            bail!("source_extension and oracle_suffix cannot be empty");
        }
        if self.probe.poll_interval_ms == 0 {
            bail!("probe.poll_interval_ms must be positive");
        }
        Ok(())
    }

    /// Effective parallelism bound
    pub fn parallelism(&self) -> usize {
        self.parallelism.unwrap_or_else(default_parallelism)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }
}

/// Number of hardware execution contexts, at least 1
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
