//! `keystone.toml` loading and setting resolution.
//!
//! Precedence for every setting: command-line flag, then environment
//! variable, then config file, then built-in default.

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub(crate) const DEFAULT_CONFIG_FILE: &str = "keystone.toml";
pub(crate) const DEFAULT_DB_FILE: &str = "keystone.db";
pub(crate) const DEFAULT_LOG_LEVEL: &str = "warn";

pub(crate) const ENV_DB: &str = "KEYSTONE_DB";
pub(crate) const ENV_LOG: &str = "KEYSTONE_LOG";
pub(crate) const ENV_LOG_JSON: &str = "KEYSTONE_LOG_JSON";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("cannot read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    pub store: StoreConfig,
    pub log: LogConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct StoreConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LogConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl Config {
    /// Load `path`. A missing file is only an error when the caller named it
    /// explicitly; the default location is optional.
    pub(crate) fn load(path: &Path, explicit: bool) -> Result<Config, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                return Ok(Config::default())
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub(crate) fn parse(text: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(text)
    }

    pub(crate) fn db_path(&self, flag: Option<&Path>, env: Option<String>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
            .or_else(|| self.store.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE))
    }

    pub(crate) fn log_json(&self, env: Option<String>) -> bool {
        env.map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .or(self.log.json)
            .unwrap_or(false)
    }

    pub(crate) fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.db_path(None, None), PathBuf::from("keystone.db"));
        assert_eq!(config.log_level(), "warn");
        assert!(!config.log_json(None));
    }

    #[test]
    fn sections_are_read() {
        let config = Config::parse(
            r#"
            [store]
            path = "/var/lib/keystone/site.db"

            [log]
            level = "debug"
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(
            config.db_path(None, None),
            PathBuf::from("/var/lib/keystone/site.db")
        );
        assert_eq!(config.log_level(), "debug");
        assert!(config.log_json(None));
    }

    #[test]
    fn flag_beats_env_beats_file() {
        let config = Config::parse("[store]\npath = \"file.db\"\n").unwrap();
        assert_eq!(
            config.db_path(Some(Path::new("flag.db")), Some("env.db".into())),
            PathBuf::from("flag.db")
        );
        assert_eq!(
            config.db_path(None, Some("env.db".into())),
            PathBuf::from("env.db")
        );
        assert_eq!(config.db_path(None, Some(String::new())), PathBuf::from("file.db"));
    }

    #[test]
    fn env_overrides_json_flag() {
        let config = Config::parse("[log]\njson = true\n").unwrap();
        assert!(!config.log_json(Some("0".into())));
        assert!(config.log_json(Some("TRUE".into())));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::parse("[store]\nurl = \"x\"\n").is_err());
    }

    #[test]
    fn missing_default_file_is_fine_but_explicit_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Config::load(&path, false).is_ok());
        assert!(matches!(
            Config::load(&path, true),
            Err(ConfigError::Read { .. })
        ));
    }
}
