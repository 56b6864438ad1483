// src/config.rs - Configuration management
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub import: ImportConfig,
    /// Directory with the browser front-end, served at `/` when set.
    pub static_dir: Option<String>,
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
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub require_https: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ImportConfig {
    /// Check every row for the required columns instead of only the first.
    pub strict_schema: bool,
    pub max_rows: usize,
    pub accept_xlsx: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
            keep_alive: 30,
            client_timeout: 30,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:8080".to_string(),
                "http://localhost:8080".to_string(),
            ],
            max_upload_bytes: 5 * 1024 * 1024,
            require_https: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            strict_schema: false,
            max_rows: 10_000,
            accept_xlsx: true,
        }
    }
}

pub fn load_config() -> Result<Config> {
    load_env_file()?;

    let mut config = if let Ok(config_file) = env::var("CONFIG_FILE") {
        let path = Path::new(&config_file);
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", config_file))?;
        toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", config_file))?
    } else {
        Config::default()
    };

    override_with_env(&mut config)?;

    config.validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

fn override_with_env(config: &mut Config) -> Result<()> {
    if let Ok(host) = env::var("BIND_ADDRESS") {
        config.server.host = host;
    }
    if let Ok(port_str) = env::var("POWERCALC_PORT") {
        config.server.port = port_str
            .parse::<u16>()
            .with_context(|| format!("POWERCALC_PORT is not a port number: {}", port_str))?;
    }
    if let Ok(workers_str) = env::var("POWERCALC_WORKERS") {
        if let Ok(workers) = workers_str.parse::<usize>() {
            config.server.workers = Some(workers);
        }
    }
    if let Ok(origins_str) = env::var("ALLOWED_ORIGINS") {
        config.security.allowed_origins = origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Ok(size_str) = env::var("POWERCALC_MAX_UPLOAD_BYTES") {
        if let Ok(size) = size_str.parse::<usize>() {
            config.security.max_upload_bytes = size;
        }
    }
    if let Ok(strict) = env::var("POWERCALC_STRICT_SCHEMA") {
        config.import.strict_schema = matches!(strict.trim(), "1" | "true" | "yes");
    }
    if let Ok(dir) = env::var("POWERCALC_STATIC_DIR") {
        config.static_dir = Some(dir).filter(|d| !d.trim().is_empty());
    }
    if let Ok(level) = env::var("RUST_LOG") {
        config.logging.level = level;
    }

    Ok(())
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("server.port must not be 0"));
        }

        if self.import.max_rows == 0 {
            return Err(anyhow::anyhow!("import.max_rows must be at least 1"));
        }

        if self.security.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("security.max_upload_bytes must be at least 1"));
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(anyhow::anyhow!(
                "logging.format must be 'json' or 'pretty' (got '{}')",
                self.logging.format
            ));
        }

        if self.is_production() && self.security.allowed_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!("Wildcard CORS origins not allowed in production!"));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        env::var("POWERCALC_ENV").map(|v| v == "production").unwrap_or(false)
    }

    pub fn print_startup_info(&self) {
        log::info!("⚡ Power calculator starting up...");
        log::info!("🌐 Server: {}:{}", self.server.host, self.server.port);
        log::info!(
            "📄 Import: {} schema check, up to {} devices per file, XLSX {}",
            if self.import.strict_schema { "per-row" } else { "first-row" },
            self.import.max_rows,
            if self.import.accept_xlsx { "enabled" } else { "disabled" }
        );
        log::info!("📊 Logging: {} level", self.logging.level);
        if let Some(ref dir) = self.static_dir {
            log::info!("🗂  Serving front-end from {}", dir);
        }

        if !self.is_production() {
            log::warn!("🚧 Running in development mode");
        }

        if self.security.require_https {
            log::info!("🔒 HTTPS enforcement enabled");
        } else if self.is_production() {
            log::warn!("⚠️  HTTPS not required in production mode");
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
