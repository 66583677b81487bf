// Runtime configuration, read from the environment (and an optional .env file).

use crate::core::mentions::{NotificationSettings, SettingsError};
use crate::infra::reddit::reddit_client::DEFAULT_API_BASE;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_APP_ACCOUNT: &str = "mod-mentions";
const DEFAULT_DATA_DIR: &str = "data";
const DATABASE_FILE: &str = "mod_mentions.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    Missing(&'static str),

    #[error("Invalid settings in {path}: {source}")]
    Settings {
        path: String,
        source: SettingsError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub reddit_access_token: String,
    pub reddit_user_agent: String,
    pub reddit_api_base: String,
    pub community: String,
    pub app_account: String,
    pub storage: StorageBackend,
    pub settings: NotificationSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let storage = match get("STORAGE").as_deref() {
            Some("memory") => StorageBackend::Memory,
            _ => {
                let data_dir = get("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
                StorageBackend::Sqlite {
                    path: PathBuf::from(data_dir).join(DATABASE_FILE),
                }
            }
        };

        let settings = match get("SETTINGS_FILE") {
            Some(path) => NotificationSettings::load(&path)
                .map_err(|source| ConfigError::Settings { path, source })?,
            None => NotificationSettings::default(),
        };

        Ok(Self {
            reddit_access_token: require("REDDIT_ACCESS_TOKEN")?,
            reddit_user_agent: get("REDDIT_USER_AGENT")
                .unwrap_or_else(|| format!("mod-mentions/{}", env!("CARGO_PKG_VERSION"))),
            reddit_api_base: get("REDDIT_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            community: require("SUBREDDIT")?,
            app_account: get("APP_ACCOUNT").unwrap_or_else(|| DEFAULT_APP_ACCOUNT.to_string()),
            storage,
            settings,
        })
    }
}
