use serde::Deserialize;
use std::path::PathBuf;

use taskfit_core::User;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: PathBuf,
    /// Sync server base URL, e.g. https://sync.example.com
    pub server_url: Option<String>,
    /// Bearer key for the sync server
    pub api_key: Option<String>,
    /// Display name for this user
    pub name: String,
    /// Email for this user
    pub email: String,
    /// IANA timezone for parsing dates and evaluating quiet hours
    pub timezone: String,
    /// Local wall-clock "HH:mm"
    pub quiet_hours_start: String,
    /// Local wall-clock "HH:mm"
    pub quiet_hours_end: String,
}

impl Default for Config {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self {
            database_path: PathBuf::from(&home).join(".taskfit").join("taskfit.db"),
            server_url: None,
            api_key: None,
            name: "default".to_string(),
            email: "default@localhost".to_string(),
            timezone: "UTC".to_string(),
            quiet_hours_start: "22:00".to_string(),
            quiet_hours_end: "08:00".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Self::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("TASKFIT_DATABASE_PATH") {
            config.database_path = PathBuf::from(db_path);
        }
        if let Ok(server_url) = std::env::var("TASKFIT_SERVER_URL") {
            config.server_url = Some(server_url);
        }
        if let Ok(api_key) = std::env::var("TASKFIT_API_KEY") {
            config.api_key = Some(api_key);
        }
        if let Ok(timezone) = std::env::var("TASKFIT_TIMEZONE") {
            config.timezone = timezone;
        }

        Ok(config)
    }

    /// Default config file path: ~/.config/taskfit/config.yaml
    pub fn default_config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".config")
            .join("taskfit")
            .join("config.yaml")
    }

    /// The local user profile the selection engine reads.
    pub fn user(&self) -> User {
        User::new("local", self.email.clone(), self.name.clone())
            .with_quiet_hours(self.quiet_hours_start.clone(), self.quiet_hours_end.clone())
            .with_timezone(self.timezone.clone())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    e
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
