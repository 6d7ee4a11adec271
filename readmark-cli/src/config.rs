//! Configuration loading for the readmark CLI.

use anyhow::{Context, Result};
use readmark_client::Config;
use readmark_types::UserId;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "readmark.toml";

/// Load the configuration.
///
/// An explicit path must exist. Without one, `readmark.toml` is used if
/// present, otherwise the built-in defaults.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                tracing::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                return Ok(Config::default());
            }
            fallback
        }
    };

    let config = Config::from_file(&path)?;
    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

/// The acting user from the configuration.
pub fn user_id(config: &Config) -> Result<UserId> {
    UserId::new(config.homeserver.user_id.as_str()).context("Invalid homeserver.user_id")
}
