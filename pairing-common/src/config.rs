//! Bootstrap configuration loading and root folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! A missing or unreadable TOML file never stops startup: a warning is logged
//! and defaults apply.

use crate::cache::CacheTtls;
use crate::{Error, Result};
use serde::Deserialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Directory name used under platform config/data folders
const APP_DIR: &str = "dish-pairing";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5740;

/// Legacy routing prefix historically prepended to dish slugs
pub const DEFAULT_LEGACY_PREFIX: &str = "what-to-serve-with-";

/// Deployment mode; controls how much internal detail error responses reveal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(Error::Config(format!("Unknown environment '{}'", other))),
        }
    }
}

/// Key-value store backing the cache accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local map
    #[default]
    Memory,
    /// Shared SQLite key-value file
    Sqlite,
}

impl FromStr for CacheBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "sqlite" => Ok(CacheBackend::Sqlite),
            other => Err(Error::Config(format!("Unknown cache backend '{}'", other))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// SQLite cache file (sqlite backend only); defaults to `<root>/cache.db`
    pub path: Option<PathBuf>,
    pub dish_ttl_secs: u64,
    pub pairings_ttl_secs: u64,
    pub search_ttl_secs: u64,
    pub categories_ttl_secs: u64,
    pub listing_ttl_secs: u64,
    pub popular_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let ttls = CacheTtls::default();
        Self {
            backend: CacheBackend::Memory,
            path: None,
            dish_ttl_secs: ttls.dish,
            pairings_ttl_secs: ttls.pairings,
            search_ttl_secs: ttls.search,
            categories_ttl_secs: ttls.categories,
            listing_ttl_secs: ttls.listing,
            popular_ttl_secs: ttls.popular,
        }
    }
}

impl CacheConfig {
    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            dish: self.dish_ttl_secs,
            pairings: self.pairings_ttl_secs,
            search: self.search_ttl_secs,
            categories: self.categories_ttl_secs,
            listing: self.listing_ttl_secs,
            popular: self.popular_ttl_secs,
        }
    }
}

/// Write authorization configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret; `None` loads it from the settings table, `0` disables auth
    pub shared_secret: Option<i64>,
    /// Maximum age of a request timestamp
    pub max_past_ms: i64,
    /// Maximum clock drift into the future
    pub max_future_ms: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            shared_secret: None,
            max_past_ms: 30_000,
            max_future_ms: 1_000,
        }
    }
}

/// Bootstrap configuration loaded from TOML, environment and command line
///
/// These settings cannot change during runtime.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Root folder holding the database and cache files
    pub root_folder: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    /// SQLite database file; defaults to `<root>/pairings.db`
    pub database_path: Option<PathBuf>,
    pub environment: Environment,
    pub legacy_prefix: String,
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            database_path: None,
            environment: Environment::Production,
            legacy_prefix: DEFAULT_LEGACY_PREFIX.to_string(),
            logging: LoggingConfig::default(),
            cache: CacheConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub root_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<PathBuf>,
}

impl ServiceConfig {
    /// Resolve the full configuration (CLI > ENV > TOML > defaults)
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match locate_config_file(overrides.config_file.as_deref()) {
            Some(path) => Self::from_toml_file(&path),
            None => {
                info!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env()?;
        config.apply_overrides(overrides);
        config.fill_paths();

        Ok(config)
    }

    /// Parse a TOML file, falling back to defaults when it is missing or invalid
    pub fn from_toml_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<ServiceConfig>(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Invalid config file {}: {}. Using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Could not read config file {}: {}. Using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(root) = env_override::<PathBuf>("PAIRING_ROOT_FOLDER")? {
            self.root_folder = Some(root);
        }
        if let Some(host) = env_override::<String>("PAIRING_HOST")? {
            self.host = host;
        }
        if let Some(port) = env_override::<u16>("PAIRING_PORT")? {
            self.port = port;
        }
        if let Some(path) = env_override::<PathBuf>("PAIRING_DATABASE")? {
            self.database_path = Some(path);
        }
        if let Some(environment) = env_override::<Environment>("PAIRING_ENV")? {
            self.environment = environment;
        }
        if let Some(prefix) = env_override::<String>("PAIRING_LEGACY_PREFIX")? {
            self.legacy_prefix = prefix;
        }
        if let Some(backend) = env_override::<CacheBackend>("PAIRING_CACHE_BACKEND")? {
            self.cache.backend = backend;
        }
        if let Some(secret) = env_override::<i64>("PAIRING_SHARED_SECRET")? {
            self.auth.shared_secret = Some(secret);
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(root) = &overrides.root_folder {
            self.root_folder = Some(root.clone());
        }
        if let Some(host) = &overrides.host {
            self.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(database) = &overrides.database {
            self.database_path = Some(database.clone());
        }
    }

    fn fill_paths(&mut self) {
        let root = self
            .root_folder
            .clone()
            .unwrap_or_else(default_root_folder);

        if self.database_path.is_none() {
            self.database_path = Some(root.join("pairings.db"));
        }
        if self.cache.path.is_none() {
            self.cache.path = Some(root.join("cache.db"));
        }
        self.root_folder = Some(root);
    }

    /// Resolved database path (root folder default applied)
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            self.root_folder
                .clone()
                .unwrap_or_else(default_root_folder)
                .join("pairings.db")
        })
    }

    /// Resolved cache file path for the sqlite backend
    pub fn cache_path(&self) -> PathBuf {
        self.cache.path.clone().unwrap_or_else(|| {
            self.root_folder
                .clone()
                .unwrap_or_else(default_root_folder)
                .join("cache.db")
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read and parse an environment variable; unset or empty is `None`
fn env_override<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid {} value '{}': {}", key, value, e))),
        _ => Ok(None),
    }
}

/// Find the TOML config file
///
/// Explicit path first, then PAIRING_CONFIG, then the per-user and system locations.
fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var("PAIRING_CONFIG") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc").join(APP_DIR).join("config.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./dish_pairing_data"))
}
