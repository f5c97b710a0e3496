//! Bootstrap configuration for infusion-reminder.
//!
//! This module loads the settings the panel needs before it can open its
//! variable store: where to listen, the secret key, where the database lives
//! and the base URLs of the outbound services. Reminder settings edited
//! through the panel (phone numbers, toggles, ...) live in the store instead;
//! the `[variables]` table here only seeds them on first start.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::variables;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "infusion-reminder";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "reminder.db";

/// Default upload directory name (inside the data directory).
const UPLOAD_DIR_NAME: &str = "uploaded";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables prefixed with `REMINDER_`, sections separated by
///    a double underscore (`REMINDER_SERVER__SECRET_KEY`)
/// 2. TOML config file at `~/.config/infusion-reminder/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Web server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Outbound service configuration.
    pub services: ServicesConfig,
    /// Initial values for configuration variables, written to the store
    /// only when the variable is not set yet.
    pub variables: BTreeMap<String, String>,
}

/// Web server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the panel listens on.
    pub listen_addr: String,
    /// Externally reachable base URL, handed to ATrigger for the next run.
    pub public_url: String,
    /// Shared secret required as `?key=` on every admin endpoint.
    pub secret_key: String,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/infusion-reminder/reminder.db`
    pub database_path: Option<PathBuf>,
    /// Directory holding the uploaded ATrigger verification file.
    /// Defaults to `~/.local/share/infusion-reminder/uploaded`
    pub upload_dir: Option<PathBuf>,
}

/// Outbound service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Twilio REST API base URL.
    pub twilio_api_base: String,
    /// IFTTT maker webhook base URL.
    pub ifttt_base: String,
    /// IFTTT event name fired for every maker key.
    pub ifttt_event: String,
    /// ATrigger API base URL.
    pub atrigger_base: String,
    /// Timeout for every outbound HTTP request, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8000".to_string(),
            public_url: "http://127.0.0.1:8000".to_string(),
            secret_key: String::new(), // Must be provided
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            twilio_api_base: "https://api.twilio.com".to_string(),
            ifttt_base: "https://maker.ifttt.com".to_string(),
            ifttt_event: "reminder".to_string(),
            atrigger_base: "https://api.atrigger.com".to_string(),
            http_timeout_secs: 15,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config: Config = Self::figment(config_path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration without validating it.
    ///
    /// Used by commands that only display configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_unchecked(config_path: Option<PathBuf>) -> Result<Self> {
        Ok(Self::figment(config_path).extract()?)
    }

    fn figment(config_path: Option<PathBuf>) -> Figment {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("REMINDER_").split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.secret_key.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "server.secret_key must not be empty".to_string(),
            });
        }

        if self.server.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "server.listen_addr is not a socket address: {}",
                    self.server.listen_addr
                ),
            });
        }

        if self.services.http_timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "services.http_timeout_secs must be greater than 0".to_string(),
            });
        }

        let urls = [
            ("server.public_url", &self.server.public_url),
            ("services.twilio_api_base", &self.services.twilio_api_base),
            ("services.ifttt_base", &self.services.ifttt_base),
            ("services.atrigger_base", &self.services.atrigger_base),
        ];
        for (field, url) in urls {
            if reqwest::Url::parse(url).is_err() {
                return Err(Error::ConfigValidation {
                    message: format!("{field} is not a valid URL: {url}"),
                });
            }
        }

        if self.services.ifttt_event.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "services.ifttt_event must not be empty".to_string(),
            });
        }

        for (name, value) in &self.variables {
            variables::normalize(name, value).map_err(|message| Error::ConfigValidation {
                message: format!("variables.{name}: {message}"),
            })?;
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the upload directory, resolving defaults if not set.
    #[must_use]
    pub fn upload_dir(&self) -> PathBuf {
        self.storage
            .upload_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(UPLOAD_DIR_NAME))
    }

    /// Get the outbound HTTP timeout as a Duration.
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.services.http_timeout_secs)
    }
}
