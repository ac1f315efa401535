use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::storage::RetryPolicy;
use crate::utils::paths::{get_config_path, get_database_path};

/// Startup retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl InitConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database file. Defaults to `homekeep.db` in the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub init: InitConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;

        Ok(())
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => get_database_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::paths::HOME_ENV_VAR;
    use serial_test::serial;
    use std::path::Path;
    use tempfile::TempDir;

    /// Points the data directory at `dir` until dropped.
    struct HomeOverride;

    impl HomeOverride {
        fn set(dir: &Path) -> Self {
            // SAFETY: serialized with every other test that touches the variable.
            unsafe { std::env::set_var(HOME_ENV_VAR, dir) };
            HomeOverride
        }
    }

    impl Drop for HomeOverride {
        fn drop(&mut self) {
            unsafe { std::env::remove_var(HOME_ENV_VAR) };
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database_path.is_none());
        assert_eq!(config.init.max_attempts, 3);
        assert_eq!(config.init.base_delay_ms, 500);
    }

    #[test]
    fn test_deserialization_fills_defaults() {
        let toml_str = r#"
        [init]
        max_attempts = 5
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.init.max_attempts, 5);
        assert_eq!(config.init.base_delay_ms, 500);
    }

    #[test]
    fn test_retry_policy() {
        let init = InitConfig {
            max_attempts: 0,
            base_delay_ms: 250,
        };
        let policy = init.retry_policy();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_explicit_database_path() {
        let config: Config = toml::from_str(r#"database_path = "/data/hk.db""#).unwrap();
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/data/hk.db"));
    }

    #[test]
    #[serial]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let _home = HomeOverride::set(temp.path());

        assert!(Config::load().unwrap().database_path.is_none());

        let mut config = Config::default();
        config.init.base_delay_ms = 50;
        config.save().unwrap();

        let loaded = Config::load().unwrap();
        assert_eq!(loaded.init.base_delay_ms, 50);
        assert_eq!(
            loaded.database_path().unwrap(),
            temp.path().join("homekeep.db")
        );
    }
}
