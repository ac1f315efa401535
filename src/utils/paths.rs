use anyhow::{Result, anyhow};
use std::env;
use std::path::PathBuf;

/// Overrides the data directory. Mostly for tests and sandboxed runs.
pub const HOME_ENV_VAR: &str = "HOMEKEEP_HOME";

pub fn get_homekeep_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
    Ok(home.join(".homekeep"))
}

pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_homekeep_dir()?.join("config.toml"))
}

pub fn get_database_path() -> Result<PathBuf> {
    Ok(get_homekeep_dir()?.join("homekeep.db"))
}

pub fn get_logs_dir() -> Result<PathBuf> {
    Ok(get_homekeep_dir()?.join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_default_dir() {
        // SAFETY: serialized with every other test that touches the variable.
        unsafe { env::remove_var(HOME_ENV_VAR) };
        let dir = get_homekeep_dir().unwrap();
        assert!(dir.to_string_lossy().ends_with(".homekeep"));
    }

    #[test]
    #[serial]
    fn test_env_override() {
        unsafe { env::set_var(HOME_ENV_VAR, "/tmp/homekeep-test") };
        assert_eq!(get_homekeep_dir().unwrap(), PathBuf::from("/tmp/homekeep-test"));
        assert_eq!(
            get_database_path().unwrap(),
            PathBuf::from("/tmp/homekeep-test/homekeep.db")
        );
        assert_eq!(
            get_config_path().unwrap(),
            PathBuf::from("/tmp/homekeep-test/config.toml")
        );
        assert_eq!(
            get_logs_dir().unwrap(),
            PathBuf::from("/tmp/homekeep-test/logs")
        );
        unsafe { env::remove_var(HOME_ENV_VAR) };
    }
}
