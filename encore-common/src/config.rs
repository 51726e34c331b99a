//! Configuration loading and database path resolution
//!
//! Startup configuration follows one priority chain:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file in the OS config directory
//! 4. OS-dependent compiled default (fallback)
//!
//! Runtime-tunable values (poll intervals, device timeouts) live in the
//! settings table instead; see `db::settings`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming the database file
pub const DB_ENV_VAR: &str = "ENCORE_DB";

/// Database file name inside the data directory
pub const DB_FILE_NAME: &str = "encore.db";

/// Optional TOML config file contents
///
/// All fields optional: a partial or missing file degrades to the next
/// link in the priority chain, never to a startup failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Database file path
    pub database: Option<PathBuf>,
    /// HTTP listen port for the queue daemon
    pub port: Option<u16>,
}

/// Resolve the database path following the startup priority chain
pub fn resolve_database_path(cli_arg: Option<&PathBuf>) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(path.clone());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(DB_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if let Ok(config) = load_config() {
        if let Some(database) = config.database {
            return Ok(database);
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_data_dir().join(DB_FILE_NAME))
}

/// Load and parse the TOML config file, if one exists
pub fn load_config() -> Result<TomlConfig> {
    let path = config_file_path()?;
    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Locate the config file for the platform
fn config_file_path() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/encore/config.toml first, then /etc/encore/config.toml
        if let Some(user_config) = dirs::config_dir().map(|d| d.join("encore").join("config.toml"))
        {
            if user_config.exists() {
                return Ok(user_config);
            }
        }
        let system_config = PathBuf::from("/etc/encore/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else {
        let path = dirs::config_dir()
            .map(|d| d.join("encore").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        }
    }
}

/// OS-dependent default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("encore"))
        .unwrap_or_else(|| PathBuf::from("./encore_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_arg_takes_precedence() {
        let cli = PathBuf::from("/tmp/encore-cli-test.db");
        let resolved = resolve_database_path(Some(&cli)).unwrap();
        assert_eq!(resolved, cli);
    }

    #[test]
    fn test_default_path_is_non_empty() {
        let dir = default_data_dir();
        assert!(!dir.as_os_str().is_empty());
        assert!(dir.to_string_lossy().contains("encore"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = TomlConfig {
            database: Some(PathBuf::from("/var/lib/encore/encore.db")),
            port: Some(5750),
        };

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: TomlConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.database, Some(PathBuf::from("/var/lib/encore/encore.db")));
        assert_eq!(parsed.port, Some(5750));
    }

    #[test]
    fn test_partial_config_file_parses() {
        let config: TomlConfig = toml::from_str("port = 8080\n").unwrap();
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.database, None);

        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, None);
        assert_eq!(config.database, None);
    }
}
