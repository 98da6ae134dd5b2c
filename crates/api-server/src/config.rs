use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,

    // Provider
    pub polygon_api_key: Option<String>,
    pub polygon_rate_limit: usize,         // requests per minute
    pub max_directory_size: usize,         // per ticker type

    // Directory snapshot
    pub directory_ttl_secs: u64,           // 86400 (1 day)

    // Search
    pub search_default_limit: usize,       // 10
    pub search_max_limit: usize,           // 50

    // Simulation
    pub simulation_timeout_secs: u64,      // 30

    // CORS; empty means any origin
    pub cors_allowed_origins: Vec<String>,

    pub json_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            polygon_api_key: None,
            polygon_rate_limit: 500,
            max_directory_size: 20_000,
            directory_ttl_secs: 86_400,
            search_default_limit: 10,
            search_max_limit: 50,
            simulation_timeout_secs: 30,
            cors_allowed_origins: Vec::new(),
            json_logging: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            polygon_api_key: env::var("POLYGON_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            polygon_rate_limit: parse_var("POLYGON_RATE_LIMIT", defaults.polygon_rate_limit)?,
            max_directory_size: parse_var("MAX_DIRECTORY_SIZE", defaults.max_directory_size)?,
            directory_ttl_secs: parse_var("DIRECTORY_TTL_SECS", defaults.directory_ttl_secs)?,
            search_default_limit: parse_var("SEARCH_DEFAULT_LIMIT", defaults.search_default_limit)?,
            search_max_limit: parse_var("SEARCH_MAX_LIMIT", defaults.search_max_limit)?,
            simulation_timeout_secs: parse_var(
                "SIMULATION_TIMEOUT_SECS",
                defaults.simulation_timeout_secs,
            )?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or_default(),
            json_logging: env::var("RUST_LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.search_max_limit == 0 {
            anyhow::bail!("SEARCH_MAX_LIMIT must be at least 1");
        }
        if self.search_default_limit == 0 || self.search_default_limit > self.search_max_limit {
            anyhow::bail!(
                "SEARCH_DEFAULT_LIMIT must be between 1 and SEARCH_MAX_LIMIT ({})",
                self.search_max_limit
            );
        }
        if self.simulation_timeout_secs == 0 {
            anyhow::bail!("SIMULATION_TIMEOUT_SECS must be at least 1");
        }
        Ok(())
    }

    pub fn directory_ttl(&self) -> Duration {
        Duration::from_secs(self.directory_ttl_secs)
    }

    pub fn simulation_timeout(&self) -> Duration {
        Duration::from_secs(self.simulation_timeout_secs)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}
