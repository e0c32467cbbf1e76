//! System-wide configuration
//!
//! Stored as TOML at `<config dir>/kbpick/config.toml`. `KBPICK_CONFIG`
//! overrides the location. A missing file means defaults.

use anyhow::{Context, Result};
use kbpick_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "KBPICK_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSection {
    /// Delay between convergence poll attempts
    pub interval_ms: u64,
    pub max_attempts: u32,
    /// Background refetch period while work is in flight
    pub refetch_interval_ms: u64,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_attempts: 10,
            refetch_interval_ms: 4000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchSection {
    pub enabled: bool,
    /// Age after which cached listings are fetched again
    pub stale_after_secs: u64,
}

impl Default for PrefetchSection {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_after_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub poll: PollSection,
    pub prefetch: PrefetchSection,
}

impl SystemConfig {
    /// Check every value against its documented range
    pub fn validate(&self) -> Result<()> {
        check_range("poll.interval_ms", self.poll.interval_ms, 10, 60_000)?;
        check_range("poll.max_attempts", self.poll.max_attempts as u64, 1, 1000)?;
        check_range(
            "poll.refetch_interval_ms",
            self.poll.refetch_interval_ms,
            100,
            600_000,
        )?;
        check_range(
            "prefetch.stale_after_secs",
            self.prefetch.stale_after_secs,
            0,
            86_400,
        )?;
        Ok(())
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            poll_interval: Duration::from_millis(self.poll.interval_ms),
            poll_max_attempts: self.poll.max_attempts,
            refetch_interval: Duration::from_millis(self.poll.refetch_interval_ms),
            prefetch_enabled: self.prefetch.enabled,
            stale_after: Duration::from_secs(self.prefetch.stale_after_secs),
        }
    }

    /// Read a value by dotted key
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "poll.interval_ms" => self.poll.interval_ms.to_string(),
            "poll.max_attempts" => self.poll.max_attempts.to_string(),
            "poll.refetch_interval_ms" => self.poll.refetch_interval_ms.to_string(),
            "prefetch.enabled" => self.prefetch.enabled.to_string(),
            "prefetch.stale_after_secs" => self.prefetch.stale_after_secs.to_string(),
            _ => anyhow::bail!(
                "Unknown config key: {}. Use 'kbpick config list' to see available keys.",
                key
            ),
        };
        Ok(value)
    }

    /// Set a value by dotted key; does not validate
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "poll.interval_ms" => {
                self.poll.interval_ms = value
                    .parse()
                    .context("Invalid value: must be a positive integer")?;
            }
            "poll.max_attempts" => {
                self.poll.max_attempts = value
                    .parse()
                    .context("Invalid value: must be a positive integer")?;
            }
            "poll.refetch_interval_ms" => {
                self.poll.refetch_interval_ms = value
                    .parse()
                    .context("Invalid value: must be a positive integer")?;
            }
            "prefetch.enabled" => {
                self.prefetch.enabled = value
                    .parse()
                    .context("Invalid value: must be 'true' or 'false'")?;
            }
            "prefetch.stale_after_secs" => {
                self.prefetch.stale_after_secs = value
                    .parse()
                    .context("Invalid value: must be a non-negative integer")?;
            }
            _ => anyhow::bail!(
                "Unknown config key: {}. Use 'kbpick config list' to see available keys.",
                key
            ),
        }
        Ok(())
    }
}

fn check_range(key: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        anyhow::bail!("{} must be between {} and {} (got {})", key, min, max, value);
    }
    Ok(())
}

/// Location of the config file
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("kbpick").join("config.toml"))
}

/// Load the config, falling back to defaults when there is no file
pub fn load() -> Result<SystemConfig> {
    let Some(path) = config_file_path() else {
        return Ok(SystemConfig::default());
    };
    if !path.exists() {
        return Ok(SystemConfig::default());
    }

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: SystemConfig = toml::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

pub fn save(config: &SystemConfig) -> Result<()> {
    let path = config_file_path().context("Could not determine config file path")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let text = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write the defaults unless a file already exists
pub fn init_if_missing() -> Result<PathBuf> {
    let path = config_file_path().context("Could not determine config file path")?;
    if !path.exists() {
        save(&SystemConfig::default())?;
    }
    Ok(path)
}

/// Commented example with the default values
pub fn example_config() -> String {
    r#"# kbpick configuration

[poll]
# Delay between convergence checks after an index request (10-60000)
interval_ms = 2000
# Checks before pending items are given up on (1-1000)
max_attempts = 10
# Background refresh period while indexing is in flight (100-600000)
refetch_interval_ms = 4000

[prefetch]
# Warm folder listings when a folder is hovered
enabled = true
# Seconds before a cached listing is fetched again (0-86400)
stale_after_secs = 120
"#
    .to_string()
}
