use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::SecTrackError;

pub static CONFIG: OnceCell<Config> = OnceCell::new();
static DATA_DIR: OnceCell<PathBuf> = OnceCell::new();

const DB_FILENAME: &str = "sectrack.db";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl LoggingConfig {
    const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    const DEFAULT_LEVEL: &str = "info";

    fn default() -> Self {
        LoggingConfig {
            level: Self::DEFAULT_LEVEL.to_string(),
        }
    }

    fn ensure_valid(&mut self) {
        let str_original = self.level.clone();
        self.level = self.level.trim().to_ascii_lowercase();
        if !Self::LOG_LEVELS.contains(&self.level.as_str()) {
            eprintln!(
                "Config error: log level of '{}' is invalid - using default of '{}'",
                str_original,
                Self::DEFAULT_LEVEL
            );
            self.level = Self::DEFAULT_LEVEL.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatabaseConfig {
    /// Explicit database file path. When unset the database lives in the
    /// app data directory. Overridable via SECTRACK_DATABASE_PATH, which is
    /// how deployments point dev and production at different files.
    pub path: Option<String>,
}

impl DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig { path: None }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

impl Config {
    /// Loads the configuration from a TOML file in the app data directory,
    /// overlaid with SECTRACK_* environment variables. If the file is
    /// missing it is written with defaults; if it fails to parse, defaults
    /// are used.
    pub fn load_config(project_dirs: &ProjectDirs) -> Self {
        let config_path = project_dirs.data_local_dir().join("config.toml");

        let default_config = Config {
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
        };

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    eprintln!(
                        "Failed to create configuration directory {}: {}",
                        parent.display(),
                        e
                    );
                }
            }
            if let Ok(toml_string) = toml::to_string_pretty(&default_config) {
                if let Err(e) = fs::write(&config_path, toml_string) {
                    eprintln!(
                        "Failed to write default config to {}: {}",
                        config_path.display(),
                        e
                    );
                }
            } else {
                eprintln!("Failed to serialize default config.");
            }
        }

        let figment = Figment::from(Serialized::defaults(default_config.clone()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("SECTRACK_").split("_"));

        let mut config = figment.extract().unwrap_or_else(|err| {
            eprintln!(
                "Could not load config file {}: {}. Using default configuration.",
                config_path.display(),
                err
            );
            default_config
        });

        config.ensure_valid();

        config
    }

    fn ensure_valid(&mut self) {
        self.logging.ensure_valid();
    }

    /// Loads the config and records the data directory. Called once from
    /// main before anything touches CONFIG.
    pub fn init(project_dirs: &ProjectDirs) -> Result<(), SecTrackError> {
        let config = Config::load_config(project_dirs);
        DATA_DIR
            .set(project_dirs.data_local_dir().to_path_buf())
            .ok();
        CONFIG
            .set(config)
            .map_err(|_| SecTrackError::Error("Config already initialized".to_string()))
    }

    fn get() -> &'static Config {
        CONFIG.get().expect("Config not initialized")
    }

    pub fn get_server_host() -> String {
        Config::get().server.host.clone()
    }

    pub fn get_server_port() -> u16 {
        Config::get().server.port
    }

    pub fn get_log_level() -> String {
        Config::get().logging.level.clone()
    }

    pub fn get_db_path() -> PathBuf {
        match &Config::get().database.path {
            Some(path) => PathBuf::from(path),
            None => DATA_DIR
                .get()
                .expect("Data directory not initialized")
                .join(DB_FILENAME),
        }
    }
}
