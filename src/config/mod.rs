mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./evermedia.toml",
        "~/.config/evermedia/config.toml",
        "/etc/evermedia/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let ext = config.library.link_extension.trim_start_matches('.');
    let suffix = config.library.sidecar_suffix.trim_start_matches('.');

    if ext.is_empty() {
        anyhow::bail!("Link extension cannot be empty");
    }
    if suffix.is_empty() {
        anyhow::bail!("Sidecar suffix cannot be empty");
    }
    if ext.eq_ignore_ascii_case(suffix) {
        anyhow::bail!("Sidecar suffix cannot equal the link extension");
    }

    if config.persist.refresh_timeout_secs == 0 {
        anyhow::bail!("Refresh timeout cannot be 0");
    }
    if config.persist.refresh_poll_interval_ms == 0 {
        anyhow::bail!("Refresh poll interval cannot be 0");
    }

    if config.dispatch.queue_capacity == 0 {
        anyhow::bail!("Dispatch queue capacity cannot be 0");
    }
    if config.dispatch.max_concurrent_runs == 0 {
        anyhow::bail!("Max concurrent runs cannot be 0");
    }

    for path in &config.watch.paths {
        if !path.exists() {
            tracing::warn!("Watch path does not exist: {:?}", path);
        }
    }

    Ok(())
}
