//! TOML-based engine configuration.
//!
//! Stores operator defaults applied to new profiles:
//! - Default timezone for signups
//! - Default daily actions target
//! - Default miss penalty
//! - Reconciliation watch interval
//!
//! Configuration is stored at `~/.config/questlog/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;
use crate::player::{DEFAULT_DAILY_TARGET, DEFAULT_PENALTY_XP};

/// Defaults applied when a profile is created without explicit values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_daily_target")]
    pub daily_actions_target: i64,
    #[serde(default = "default_penalty_xp")]
    pub penalty_xp: u32,
}

/// Reconciliation watch-mode configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Minutes between reconciliation passes in watch mode.
    #[serde(default = "default_interval_mins")]
    pub interval_mins: u64,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/questlog/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

// Default functions
fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_daily_target() -> i64 {
    DEFAULT_DAILY_TARGET
}
fn default_penalty_xp() -> u32 {
    DEFAULT_PENALTY_XP
}
fn default_interval_mins() -> u64 {
    60
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            daily_actions_target: default_daily_target(),
            penalty_xp: default_penalty_xp(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_mins: default_interval_mins(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl EngineConfig {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// A missing file yields the default configuration and writes it
    /// out, so the operator has a file to edit.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content)
                .map_err(|e| ConfigError::ParseFailed(e.to_string())),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "defaults.timezone" => Some(self.defaults.timezone.clone()),
            "defaults.daily_actions_target" => Some(self.defaults.daily_actions_target.to_string()),
            "defaults.penalty_xp" => Some(self.defaults.penalty_xp.to_string()),
            "watch.interval_mins" => Some(self.watch.interval_mins.to_string()),
            _ => None,
        }
    }

    /// All known keys with their current values, in listing order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        [
            "defaults.timezone",
            "defaults.daily_actions_target",
            "defaults.penalty_xp",
            "watch.interval_mins",
        ]
        .iter()
        .filter_map(|key| self.get(key).map(|value| (*key, value)))
        .collect()
    }

    /// Set a config value by key and persist. Values are validated
    /// against the key's domain before anything is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be
    /// parsed, or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "defaults.timezone" => {
                if value.parse::<chrono_tz::Tz>().is_err() {
                    return Err(invalid(key, format!("unknown timezone: {value}")));
                }
                self.defaults.timezone = value.to_string();
            }
            "defaults.daily_actions_target" => {
                let n: i64 = value
                    .parse()
                    .map_err(|_| invalid(key, format!("not a number: {value}")))?;
                if n < 1 {
                    return Err(invalid(key, "target must be at least 1".to_string()));
                }
                self.defaults.daily_actions_target = n;
            }
            "defaults.penalty_xp" => {
                self.defaults.penalty_xp = value
                    .parse()
                    .map_err(|_| invalid(key, format!("not a number: {value}")))?;
            }
            "watch.interval_mins" => {
                let n: u64 = value
                    .parse()
                    .map_err(|_| invalid(key, format!("not a number: {value}")))?;
                if n == 0 {
                    return Err(invalid(key, "interval must be at least 1".to_string()));
                }
                self.watch.interval_mins = n;
            }
            _ => {
                return Err(invalid(key, "unknown configuration key".to_string()));
            }
        }
        self.save()?;
        Ok(())
    }
}

fn invalid(key: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.defaults.timezone, "UTC");
        assert_eq!(parsed.defaults.daily_actions_target, 3);
        assert_eq!(parsed.defaults.penalty_xp, 100);
        assert_eq!(parsed.watch.interval_mins, 60);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let parsed: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(parsed, EngineConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let parsed: EngineConfig = toml::from_str(
            "[defaults]\n\
             timezone = \"Asia/Tokyo\"\n",
        )
        .unwrap();
        assert_eq!(parsed.defaults.timezone, "Asia/Tokyo");
        assert_eq!(parsed.defaults.daily_actions_target, 3);
        assert_eq!(parsed.watch.interval_mins, 60);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.get("defaults.timezone").as_deref(), Some("UTC"));
        assert_eq!(cfg.get("watch.interval_mins").as_deref(), Some("60"));
        assert!(cfg.get("defaults.missing_key").is_none());
    }

    #[test]
    fn entries_cover_every_key() {
        let cfg = EngineConfig::default();
        let entries = cfg.entries();
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().any(|(k, _)| *k == "defaults.penalty_xp"));
    }

    #[test]
    fn set_rejects_bad_values_without_mutating() {
        let mut cfg = EngineConfig::default();
        assert!(cfg.set("defaults.timezone", "Foo/Bar").is_err());
        assert_eq!(cfg.defaults.timezone, "UTC");

        assert!(cfg.set("defaults.daily_actions_target", "0").is_err());
        assert!(cfg.set("defaults.daily_actions_target", "abc").is_err());
        assert_eq!(cfg.defaults.daily_actions_target, 3);

        assert!(cfg.set("watch.interval_mins", "0").is_err());
        assert!(cfg.set("bogus.key", "1").is_err());
    }
}
