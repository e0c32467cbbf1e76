//! Configuration management command
//!
//! View and edit the system configuration file.

use crate::system_config::{self, SystemConfig};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

const KEYS: [&str; 5] = [
    "poll.interval_ms",
    "poll.max_attempts",
    "poll.refetch_interval_ms",
    "prefetch.enabled",
    "prefetch.stale_after_secs",
];

/// List all configuration values
pub fn run_list() -> Result<()> {
    let config = system_config::load()?;
    let config_path = system_config::config_file_path()
        .context("Could not determine config file path")?;

    println!("{}", "System Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    let mut section = "";
    for key in KEYS {
        let (head, name) = key.split_once('.').unwrap_or(("", key));
        if head != section {
            if !section.is_empty() {
                println!();
            }
            println!("{}", format!("[{}]", head).yellow());
            section = head;
        }
        println!("  {} = {}", name.cyan(), config.get(key)?);
    }

    println!("\n{}", "Valid Ranges:".bold());
    println!("  interval_ms: 10-60,000");
    println!("  max_attempts: 1-1,000");
    println!("  refetch_interval_ms: 100-600,000");
    println!("  stale_after_secs: 0-86,400");

    Ok(())
}

/// Get a single configuration value
pub fn run_get(key: &str) -> Result<()> {
    let config = system_config::load()?;
    println!("{}", config.get(key)?);
    Ok(())
}

/// Set a configuration value
pub fn run_set(key: &str, value: &str) -> Result<()> {
    let mut config: SystemConfig = system_config::load()?;
    config.set(key, value)?;

    // Validate before saving
    config.validate().context("Invalid configuration value")?;
    system_config::save(&config)?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    Ok(())
}

/// Show the config file path and optionally create it
pub fn run_path(create: bool) -> Result<()> {
    let config_path = system_config::config_file_path()
        .context("Could not determine config file path")?;

    if create && !config_path.exists() {
        system_config::init_if_missing()?;
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else {
        println!("{}", config_path.display());
        if !config_path.exists() {
            println!("{}", "File does not exist. Use --create to create it.".yellow());
        }
    }

    Ok(())
}

/// Show example configuration
pub fn run_example() -> Result<()> {
    println!("{}", system_config::example_config());
    Ok(())
}
