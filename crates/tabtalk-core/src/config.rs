//! Environment Configuration Loader
//!
//! Loads environment variables from a shared environment file so the CLI
//! and any embedding process see the same provider configuration.
//!
//! Call `load_environment()` early in main() before accessing any config.

use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Paths checked for an environment file (in order of priority)
pub const ENV_FILE_PATHS: &[&str] = &["/etc/tabtalk/environment", ".env"];

/// Load environment variables from the configuration file.
///
/// Checks `TABTALK_ENV_FILE` first, then the well-known paths. Existing
/// environment variables are never overridden. Returns the path that was
/// loaded, or None if no file was found.
pub fn load_environment() -> Option<String> {
    if let Ok(custom_path) = std::env::var("TABTALK_ENV_FILE") {
        if let Some(path) = try_load_env_file(&custom_path) {
            return Some(path);
        }
    }

    for path in ENV_FILE_PATHS {
        if let Some(loaded_path) = try_load_env_file(path) {
            return Some(loaded_path);
        }
    }

    debug!("No environment file found, using existing environment");
    None
}

/// Try to load an environment file from the given path.
fn try_load_env_file(path: &str) -> Option<String> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return None;
    }

    match fs::read_to_string(path_obj) {
        Ok(content) => {
            let mut loaded_count = 0;
            let mut skipped_count = 0;

            for line in content.lines() {
                let line = line.trim();

                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                if let Some((key, value)) = parse_env_line(line) {
                    if std::env::var(&key).is_err() {
                        std::env::set_var(&key, &value);
                        loaded_count += 1;
                    } else {
                        skipped_count += 1;
                        debug!("Skipped (already set): {}", key);
                    }
                }
            }

            info!(
                "Loaded {} environment variables from {} ({} skipped - already set)",
                loaded_count, path, skipped_count
            );

            Some(path.to_string())
        }
        Err(e) => {
            warn!("Failed to read environment file {}: {}", path, e);
            None
        }
    }
}

/// Parse a single environment line into key-value pair.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    // Handle: KEY=VALUE, KEY="VALUE", KEY='VALUE'
    let mut parts = line.splitn(2, '=');
    let key = parts.next()?.trim();
    let value = parts.next()?.trim();

    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}

/// Get a configuration value with a default.
pub fn get_config(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an optional configuration value.
pub fn get_config_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Default chat-completion endpoint base
pub const DEFAULT_BASE_URL: &str = "https://api.siliconflow.cn/v1";

/// Default model id
pub const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-V3.1";

/// Provider connection settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl ProviderSettings {
    /// Resolve settings from `TABTALK_API_KEY` (or `OPENAI_API_KEY`),
    /// `TABTALK_BASE_URL` and `TABTALK_MODEL`.
    pub fn from_env() -> Result<Self> {
        let api_key = get_config_opt("TABTALK_API_KEY")
            .or_else(|| get_config_opt("OPENAI_API_KEY"))
            .ok_or_else(|| Error::config("TABTALK_API_KEY or OPENAI_API_KEY must be set"))?;

        Ok(Self {
            api_key,
            base_url: get_config("TABTALK_BASE_URL", DEFAULT_BASE_URL),
            model: get_config("TABTALK_MODEL", DEFAULT_MODEL),
        })
    }
}
