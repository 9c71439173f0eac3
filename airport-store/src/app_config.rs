use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    /// Attempts to derive a free record code before giving up
    #[serde(default = "default_max_key_attempts")]
    pub max_key_attempts: u32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            max_key_attempts: default_max_key_attempts(),
        }
    }
}

fn default_max_connections() -> u32 { 5 }

fn default_acquire_timeout() -> u64 { 3 }

fn default_max_key_attempts() -> u32 { airport_core::service::DEFAULT_MAX_KEY_ATTEMPTS }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `AIRPORT_DATABASE__URL=postgres://...` sets `database.url`
            .add_source(config::Environment::with_prefix("AIRPORT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
