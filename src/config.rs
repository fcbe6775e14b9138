use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::entities::{HistoryPolicy, TimeFormatter};
use crate::net::EngineVersion;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Initial value of the user field
    #[serde(default)]
    pub username: String,

    /// Base URL of the chat server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Engine.IO revision the server speaks, `v3` or `v4`
    #[serde(default)]
    pub engine_io: EngineVersion,

    /// Locale used for message time labels
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Fixed display offset from UTC; the system zone is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,

    #[serde(default)]
    pub history_policy: HistoryPolicy,

    /// Log file, relative paths resolve against the config directory
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_locale() -> String {
    "en_US".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("chat-feed.log")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            server_url: default_server_url(),
            engine_io: EngineVersion::default(),
            locale: default_locale(),
            utc_offset_minutes: None,
            history_policy: HistoryPolicy::default(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// Get the default config file path: ~/.config/chat-feed/config.toml
    pub fn default_config_path() -> Result<PathBuf> {
        let home_dir = std::env::home_dir().context("Could not determine home directory")?;

        Ok(home_dir.join(".config").join("chat-feed").join("config.toml"))
    }

    /// Load config from a file path, creating default config if file doesn't exist
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            Ok(config)
        } else {
            let config = Config::default();
            config.save_to_path(path)?;
            Ok(config)
        }
    }

    /// Save config to a file path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Resolve the log file against the directory holding `config_path`.
    pub fn log_path(&self, config_path: &Path) -> PathBuf {
        match config_path.parent() {
            Some(dir) if self.log_file.is_relative() => dir.join(&self.log_file),
            _ => self.log_file.clone(),
        }
    }

    pub fn time_formatter(&self) -> Result<TimeFormatter> {
        let formatter = TimeFormatter::from_locale_name(&self.locale)?;
        match self.utc_offset_minutes {
            Some(minutes) => formatter.with_offset_minutes(minutes),
            None => Ok(formatter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.username, "");
        assert_eq!(config.server_url, "http://localhost:8080");
        assert_eq!(config.engine_io, EngineVersion::V3);
        assert_eq!(config.locale, "en_US");
        assert_eq!(config.history_policy, HistoryPolicy::AbortBatch);
        assert!(config.utc_offset_minutes.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            username = "alice"
            history_policy = "skip-malformed"
            "#,
        )
        .unwrap();

        assert_eq!(config.username, "alice");
        assert_eq!(config.history_policy, HistoryPolicy::SkipMalformed);
        assert_eq!(config.server_url, "http://localhost:8080");
        assert_eq!(config.log_file, PathBuf::from("chat-feed.log"));
    }

    #[test]
    fn test_engine_io_names() {
        let config: Config = toml::from_str(r#"engine_io = "v4""#).unwrap();
        assert_eq!(config.engine_io, EngineVersion::V4);

        let config: Config = toml::from_str(r#"engine_io = "v3""#).unwrap();
        assert_eq!(config.engine_io, EngineVersion::V3);

        assert!(toml::from_str::<Config>(r#"engine_io = "v5""#).is_err());
    }

    #[test]
    fn test_config_load_save() -> Result<()> {
        let temp_dir = tempdir()?;
        let config_path = temp_dir.path().join("test_config.toml");

        let original_config = Config {
            username: "alice".to_string(),
            server_url: "https://chat.example.org".to_string(),
            engine_io: EngineVersion::V4,
            locale: "de_DE".to_string(),
            utc_offset_minutes: Some(120),
            history_policy: HistoryPolicy::SkipMalformed,
            log_file: PathBuf::from("/tmp/chat.log"),
        };

        original_config.save_to_path(&config_path)?;
        let loaded_config = Config::load_from_path(&config_path)?;

        assert_eq!(original_config, loaded_config);
        Ok(())
    }

    #[test]
    fn test_config_load_nonexistent_creates_default() -> Result<()> {
        let temp_dir = tempdir()?;
        let config_path = temp_dir.path().join("nested").join("config.toml");

        assert!(!config_path.exists());

        let config = Config::load_from_path(&config_path)?;

        assert!(config_path.exists());
        assert_eq!(config, Config::default());
        Ok(())
    }

    #[test]
    fn test_log_path_resolution() {
        let config = Config::default();
        assert_eq!(
            config.log_path(Path::new("/home/a/.config/chat-feed/config.toml")),
            PathBuf::from("/home/a/.config/chat-feed/chat-feed.log")
        );

        let absolute = Config {
            log_file: PathBuf::from("/var/log/chat.log"),
            ..Config::default()
        };
        assert_eq!(
            absolute.log_path(Path::new("/etc/config.toml")),
            PathBuf::from("/var/log/chat.log")
        );
    }

    #[test]
    fn test_time_formatter_rejects_bad_locale() {
        let config = Config {
            locale: "nowhere".to_string(),
            ..Config::default()
        };
        assert!(config.time_formatter().is_err());
        assert!(Config::default().time_formatter().is_ok());
    }
}
