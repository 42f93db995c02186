//! Agent configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/hostmetrics/agent.toml`
//! - Windows: `%APPDATA%/hostmetrics/agent.toml`
//!
//! `HOSTMETRICS_CONFIG` overrides the location.

use std::path::PathBuf;
use std::time::Duration;

use hostmetrics_telemetry::{FallbackEstimate, PlausibleRange, SamplerConfig};
use serde::{Deserialize, Serialize};

const CONFIG_ENV: &str = "HOSTMETRICS_CONFIG";

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sampling interval in seconds (0 = default of 2).
    #[serde(default = "default_interval")]
    pub interval_sec: u32,

    /// Filesystems to report, by any path on them.
    #[serde(default = "default_disk_paths")]
    pub disk_paths: Vec<PathBuf>,

    /// Longest a single temperature probe may take.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Readings at or below this are rejected.
    #[serde(default = "default_plausible_min")]
    pub plausible_min: f64,

    /// Readings at or above this are rejected.
    #[serde(default = "default_plausible_max")]
    pub plausible_max: f64,

    /// Estimate used when no sensor works and CPU usage is unknown.
    #[serde(default = "default_fallback_constant")]
    pub fallback_constant: f64,

    /// Estimate is `fallback_baseline + usage / fallback_scale_factor`.
    #[serde(default = "default_fallback_baseline")]
    pub fallback_baseline: f64,

    #[serde(default = "default_fallback_scale_factor")]
    pub fallback_scale_factor: f64,

    /// Attach hostname, OS and CPU model to each snapshot.
    #[serde(default = "default_true")]
    pub include_host_info: bool,
}

fn default_interval() -> u32 {
    2
}

fn default_disk_paths() -> Vec<PathBuf> {
    if cfg!(windows) {
        vec![PathBuf::from("C:\\")]
    } else {
        vec![PathBuf::from("/")]
    }
}

fn default_probe_timeout_ms() -> u64 {
    hostmetrics_telemetry::DEFAULT_PROBE_TIMEOUT.as_millis() as u64
}

fn default_plausible_min() -> f64 {
    PlausibleRange::default().min_exclusive
}

fn default_plausible_max() -> f64 {
    PlausibleRange::default().max_exclusive
}

fn default_fallback_constant() -> f64 {
    FallbackEstimate::default().constant
}

fn default_fallback_baseline() -> f64 {
    FallbackEstimate::default().baseline
}

fn default_fallback_scale_factor() -> f64 {
    FallbackEstimate::default().scale_factor
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_sec: default_interval(),
            disk_paths: default_disk_paths(),
            probe_timeout_ms: default_probe_timeout_ms(),
            plausible_min: default_plausible_min(),
            plausible_max: default_plausible_max(),
            fallback_constant: default_fallback_constant(),
            fallback_baseline: default_fallback_baseline(),
            fallback_scale_factor: default_fallback_scale_factor(),
            include_host_info: default_true(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path()?;

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Saves the current configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.plausible_min >= self.plausible_max {
            anyhow::bail!(
                "plausible_min ({}) must be below plausible_max ({})",
                self.plausible_min,
                self.plausible_max
            );
        }
        if self.fallback_scale_factor <= 0.0 {
            anyhow::bail!("fallback_scale_factor must be positive");
        }
        Ok(())
    }

    /// Sampler settings derived from this configuration.
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            probe_timeout: Duration::from_millis(self.probe_timeout_ms.max(1)),
            plausible: PlausibleRange {
                min_exclusive: self.plausible_min,
                max_exclusive: self.plausible_max,
            },
            fallback: FallbackEstimate {
                constant: self.fallback_constant,
                baseline: self.fallback_baseline,
                scale_factor: self.fallback_scale_factor,
            },
        }
    }
}

/// Returns the configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("hostmetrics")
            .join("agent.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("hostmetrics").join("agent.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/hostmetrics/agent.toml"))
    }
}
