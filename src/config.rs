//! TOML configuration for podbench.
//!
//! Layered the usual way: the `PODBENCH_CONFIG` environment variable, then
//! `/etc/podbench/podbench.toml`, then compiled-in defaults. Benchmark
//! protocol constants (ports, images, round count) live in `bench`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded podbench configuration");
        Ok(config)
    }

    /// Try, in order: `PODBENCH_CONFIG`, `/etc/podbench/podbench.toml`,
    /// compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var("PODBENCH_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "PODBENCH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new("/etc/podbench/podbench.toml");
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Path (or bare command name resolved via `$PATH`) to kubectl.
    pub kubectl: String,
    /// Explicit kubeconfig; kubectl's own discovery is used when unset.
    pub kubeconfig: Option<PathBuf>,
    /// Test namespaces are named `<prefix>-<run id>`.
    pub namespace_prefix: String,
    /// Node running the driver and same-host targets. Defaults to the first
    /// control-plane node.
    pub reference_host: Option<String>,
    /// Node running cross-host targets. Defaults to the first other node.
    pub secondary_host: Option<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            kubeconfig: None,
            namespace_prefix: "podbench".to_string(),
            reference_host: None,
            secondary_host: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound for a pod to become running / get its addresses.
    pub readiness_sec: u64,
    /// Delay between readiness polls.
    pub poll_interval_ms: u64,
}

impl TimeoutConfig {
    pub fn readiness(&self) -> Duration {
        Duration::from_secs(self.readiness_sec)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            readiness_sec: 90,
            poll_interval_ms: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of the human formatter.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
