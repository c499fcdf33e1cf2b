//! TOML configuration for campuswatch.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working setup. An explicit path (the `--config` flag or the
//! `CAMPUSWATCH_CONFIG` environment variable, both resolved by the CLI) must
//! load. Otherwise `/etc/campuswatch/campuswatch.toml` is tried, then the
//! compiled-in defaults. Analytics values are checked at load time.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analytics::buffer::DEFAULT_SEGMENTS;
use crate::analytics::cluster::ClusterParams;

pub const SYSTEM_CONFIG_PATH: &str = "/etc/campuswatch/campuswatch.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampusWatchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CampusWatchConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config
            .analytics
            .validate()
            .with_context(|| format!("invalid [analytics] section in {}", path.display()))?;
        info!(path = %path.display(), "loaded campuswatch configuration");
        Ok(config)
    }

    /// An explicitly requested file must load; otherwise fall back through
    /// [`load_or_default`](Self::load_or_default).
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => Ok(Self::load_or_default()),
        }
    }

    /// Try the system path, then defaults. An unreadable system file is
    /// logged and skipped.
    pub fn load_or_default() -> Self {
        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %format!("{e:#}"),
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
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address and port for the HTTP API.
    pub bind: String,
    /// Attach a permissive CORS layer so a separately hosted map front-end
    /// can call the API.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            cors_permissive: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    /// Insert the sample campus incidents when the table is empty.
    pub seed_when_empty: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("campuswatch.db"),
            seed_when_empty: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// DBSCAN neighborhood radius in degrees.
    pub cluster_eps: f64,
    /// DBSCAN core-point threshold, counting the point itself.
    pub cluster_min_points: usize,
    /// Minimum number of valid points before clustering is attempted.
    pub cluster_min_input: usize,
    pub trend_window_days: u32,
    pub recent_window_hours: u32,
    /// Vertices per buffer ring.
    pub buffer_segments: usize,
    /// Wall-clock limit on fetch plus compute for one request.
    pub compute_timeout_secs: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        let cluster = ClusterParams::default();
        Self {
            cluster_eps: cluster.eps,
            cluster_min_points: cluster.min_points,
            cluster_min_input: cluster.min_input,
            trend_window_days: 30,
            recent_window_hours: 24,
            buffer_segments: DEFAULT_SEGMENTS,
            compute_timeout_secs: 10,
        }
    }
}

impl AnalyticsConfig {
    pub fn cluster_params(&self) -> ClusterParams {
        ClusterParams {
            eps: self.cluster_eps,
            min_points: self.cluster_min_points,
            min_input: self.cluster_min_input,
        }
    }

    pub fn trend_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.trend_window_days))
    }

    pub fn recent_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.recent_window_hours))
    }

    pub fn compute_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.compute_timeout_secs)
    }

    /// Reject values that would make every analytics request fail.
    pub fn validate(&self) -> Result<()> {
        if !(self.cluster_eps.is_finite() && self.cluster_eps > 0.0) {
            bail!("cluster_eps must be a positive number of degrees, got {}", self.cluster_eps);
        }
        if self.cluster_min_points == 0 {
            bail!("cluster_min_points must be at least 1");
        }
        if self.buffer_segments < 3 {
            bail!(
                "buffer_segments must be at least 3, got {}",
                self.buffer_segments
            );
        }
        if self.compute_timeout_secs == 0 {
            bail!("compute_timeout_secs must be at least 1");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
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
