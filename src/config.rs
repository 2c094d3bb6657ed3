// src/config.rs - Configuration loading: defaults, optional TOML file, env overrides
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub keep_alive: u64,
    pub client_timeout: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Whole-state JSON document.
    pub data_file: String,
    /// Keep state in memory only; nothing is written to disk.
    pub ephemeral: bool,
    pub pretty: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
    pub default_admin_username: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub max_request_size: usize,
    pub require_https: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            workers: None,
            keep_alive: 30,
            client_timeout: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: "db.json".to_string(),
            ephemeral: false,
            pretty: true,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
            default_admin_username: "admin".to_string(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            max_request_size: 1024 * 1024,
            require_https: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

pub fn load_config() -> Result<Config> {
    load_env_file()?;

    let mut config = if let Ok(config_file) = env::var("CONFIG_FILE") {
        read_config_file(Path::new(&config_file))?
    } else {
        Config::default()
    };

    override_with_env(&mut config);

    config.validate().context("Configuration validation failed")?;

    Ok(config)
}

pub fn read_config_file(path: &Path) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&config_str).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn override_with_env(config: &mut Config) {
    override_with(config, |key| env::var(key).ok());
}

/// Applies overrides from `lookup`, which maps a variable name to its value.
pub fn override_with<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("BIND_ADDRESS") {
        config.server.host = host;
    }
    if let Some(port) = lookup("MOVEIT_PORT").or_else(|| lookup("PORT")) {
        match port.parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(_) => log::warn!("Ignoring invalid port '{}'", port),
        }
    }
    if let Some(workers) = lookup("MOVEIT_WORKERS").and_then(|w| w.parse::<usize>().ok()) {
        config.server.workers = Some(workers);
    }
    if let Some(data_file) = lookup("MOVEIT_DATA_FILE") {
        config.storage.data_file = data_file;
    }
    if let Some(ephemeral) = lookup("MOVEIT_EPHEMERAL") {
        config.storage.ephemeral = matches!(ephemeral.as_str(), "1" | "true" | "yes");
    }
    if let Some(cost) = lookup("AUTH_BCRYPT_COST").and_then(|c| c.parse::<u32>().ok()) {
        config.auth.bcrypt_cost = cost;
    }
    if let Some(origins) = lookup("ALLOWED_ORIGINS") {
        config.security.allowed_origins = origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(size) = lookup("MOVEIT_MAX_REQUEST_SIZE").and_then(|s| s.parse::<usize>().ok()) {
        config.security.max_request_size = size;
    }
    if let Some(level) = lookup("RUST_LOG") {
        config.logging.level = level;
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if !self.storage.ephemeral && self.storage.data_file.trim().is_empty() {
            anyhow::bail!("storage.data_file must be set unless storage is ephemeral");
        }
        if self.security.max_request_size == 0 {
            anyhow::bail!("security.max_request_size must be greater than zero");
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            anyhow::bail!("auth.bcrypt_cost must be between 4 and 31 (current: {})", self.auth.bcrypt_cost);
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        env::var("MOVEIT_ENV").map(|v| v == "production").unwrap_or(false)
    }

    /// Checks that only apply when running in production.
    pub fn validate_production(&self) -> Result<()> {
        if self.security.allowed_origins.iter().any(|o| o == "*") {
            anyhow::bail!("Wildcard CORS origins not allowed in production!");
        }
        if self.storage.ephemeral {
            anyhow::bail!("Ephemeral storage is not allowed in production");
        }
        Ok(())
    }

    pub fn print_startup_info(&self) {
        log::info!("MoveIt starting up...");
        log::info!("Server: {}:{}", self.server.host, self.server.port);
        if self.storage.ephemeral {
            log::info!("Storage: in-memory (ephemeral)");
        } else {
            log::info!("Storage: {}", self.storage.data_file);
        }
        log::info!("Logging: {} level", self.logging.level);

        if !self.is_production() {
            log::warn!("Running in development mode");
        } else if !self.security.require_https {
            log::warn!("HTTPS not required in production mode");
        }
    }
}

pub fn load_env_file() -> Result<()> {
    if let Ok(env_file) = env::var("ENV_FILE") {
        dotenvy::from_filename(&env_file)
            .with_context(|| format!("Failed to load environment file: {}", env_file))?;
    } else if Path::new(".env").exists() {
        dotenvy::dotenv().context("Failed to load .env file")?;
    }
    Ok(())
}
