//! Configuration management
//!
//! Settings live in `settings.json` inside the wallet directory:
//! ```json
//! {
//!   "database": { "file": "wallet.duckdb" },
//!   "transfers": { "overdraft": { "mode": "limit", "limit": "50.00" } },
//!   "activityLog": true
//! }
//! ```
//! Keys the wallet does not manage are kept as-is when saving.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::result::{Error, Result};
use crate::domain::OverdraftPolicy;

pub const DEFAULT_DATABASE_FILE: &str = "wallet.duckdb";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    database: DatabaseSettings,
    #[serde(default)]
    transfers: TransferSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    activity_log: Option<bool>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    overdraft: Option<OverdraftPolicy>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Wallet configuration (resolved view of the settings)
#[derive(Debug, Clone)]
pub struct Config {
    /// Database file name, relative to the wallet directory unless absolute
    pub database_file: String,
    pub overdraft: OverdraftPolicy,
    /// Record command and transfer activity in logs.duckdb
    pub activity_log: bool,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            overdraft: OverdraftPolicy::default(),
            activity_log: true,
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl Config {
    /// Load config from the wallet directory
    ///
    /// `WALLET_OVERDRAFT` and `WALLET_ACTIVITY_LOG` override the file.
    pub fn load(wallet_dir: &Path) -> Result<Self> {
        Self::load_with_env(wallet_dir, |key| std::env::var(key).ok())
    }

    /// Load config, reading overrides through `env` instead of the process environment
    pub fn load_with_env(wallet_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let settings_path = wallet_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %settings_path.display(), error = %e, "ignoring malformed settings");
                SettingsFile::default()
            })
        } else {
            SettingsFile::default()
        };

        let overdraft = match env("WALLET_OVERDRAFT") {
            Some(value) => OverdraftPolicy::parse(&value).ok_or_else(|| {
                Error::configuration(format!(
                    "WALLET_OVERDRAFT must be 'allow', 'disallow' or a decimal limit, got '{}'",
                    value
                ))
            })?,
            None => raw.transfers.overdraft.clone().unwrap_or_default(),
        };

        let activity_log = match env("WALLET_ACTIVITY_LOG").as_deref() {
            Some("true" | "1" | "yes" | "TRUE" | "YES") => true,
            Some("false" | "0" | "no" | "FALSE" | "NO") => false,
            _ => raw.activity_log.unwrap_or(true),
        };

        Ok(Self {
            database_file: raw
                .database
                .file
                .clone()
                .unwrap_or_else(|| DEFAULT_DATABASE_FILE.to_string()),
            overdraft,
            activity_log,
            _raw_settings: raw,
        })
    }

    /// Save config to the wallet directory
    /// Preserves other settings that the wallet doesn't manage
    pub fn save(&self, wallet_dir: &Path) -> Result<()> {
        let settings_path = wallet_dir.join("settings.json");

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            self._raw_settings.clone()
        };

        settings.database.file = Some(self.database_file.clone());
        settings.transfers.overdraft = Some(self.overdraft.clone());
        settings.activity_log = Some(self.activity_log);

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Absolute path of the wallet database
    pub fn database_path(&self, wallet_dir: &Path) -> PathBuf {
        let file = Path::new(&self.database_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            wallet_dir.join(file)
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_with_env(dir.path(), no_env).unwrap();

        assert_eq!(config.database_file, "wallet.duckdb");
        assert_eq!(config.overdraft, OverdraftPolicy::Disallow);
        assert!(config.activity_log);
        assert_eq!(config.database_path(dir.path()), dir.path().join("wallet.duckdb"));
    }

    #[test]
    fn test_reads_settings_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{
                "database": { "file": "other.duckdb" },
                "transfers": { "overdraft": { "mode": "limit", "limit": "50.00" } },
                "activityLog": false
            }"#,
        )
        .unwrap();

        let config = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(config.database_file, "other.duckdb");
        assert_eq!(config.overdraft, OverdraftPolicy::Limit { limit: Decimal::new(5000, 2) });
        assert!(!config.activity_log);
    }

    #[test]
    fn test_malformed_settings_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("settings.json"), "{ not json").unwrap();

        let config = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(config.overdraft, OverdraftPolicy::Disallow);
    }

    #[test]
    fn test_env_overrides() {
        let dir = TempDir::new().unwrap();
        let env = |key: &str| match key {
            "WALLET_OVERDRAFT" => Some("allow".to_string()),
            "WALLET_ACTIVITY_LOG" => Some("0".to_string()),
            _ => None,
        };

        let config = Config::load_with_env(dir.path(), env).unwrap();
        assert_eq!(config.overdraft, OverdraftPolicy::Allow);
        assert!(!config.activity_log);

        let err = Config::load_with_env(dir.path(), |_| Some("sometimes".to_string())).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let settings_path = dir.path().join("settings.json");
        std::fs::write(
            &settings_path,
            r#"{ "theme": "dark", "database": { "file": "wallet.duckdb", "readOnly": false } }"#,
        )
        .unwrap();

        let mut config = Config::load_with_env(dir.path(), no_env).unwrap();
        config.overdraft = OverdraftPolicy::Allow;
        config.save(dir.path()).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&settings_path).unwrap()).unwrap();
        assert_eq!(saved["theme"], "dark");
        assert_eq!(saved["database"]["readOnly"], false);
        assert_eq!(saved["transfers"]["overdraft"]["mode"], "allow");

        let reloaded = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(reloaded.overdraft, OverdraftPolicy::Allow);
    }
}
