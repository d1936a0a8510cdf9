//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Default collections period (12 hours)
const DEFAULT_COLLECTIONS_INTERVAL_SECS: u64 = 12 * 60 * 60;

/// Default penalty: 10% of the installment per missed cycle
pub const DEFAULT_PENALTY_RATE: Decimal = dec!(0.10);

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Period between collection cycles
    pub collections_interval: Duration,

    /// Fraction of the installment amount added as penalty per missed cycle
    pub penalty_rate: Decimal,

    /// Users allowed on `/admin` routes; empty locks them for everyone
    pub admin_user_ids: Vec<Uuid>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", "10")?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_var("PORT", "3000")?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let interval_secs: u64 = parse_var(
            "COLLECTIONS_INTERVAL_SECS",
            &DEFAULT_COLLECTIONS_INTERVAL_SECS.to_string(),
        )?;
        if interval_secs == 0 {
            return Err(ConfigError::InvalidValue("COLLECTIONS_INTERVAL_SECS"));
        }

        let penalty_rate: Decimal = parse_var("PENALTY_RATE", &DEFAULT_PENALTY_RATE.to_string())?;
        validate_penalty_rate(penalty_rate)?;

        let admin_user_ids = parse_user_ids(&env::var("ADMIN_USER_IDS").unwrap_or_default())?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            collections_interval: Duration::from_secs(interval_secs),
            penalty_rate,
            admin_user_ids,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name))
}

/// Comma-separated user ids; blanks between commas are ignored
pub fn parse_user_ids(value: &str) -> Result<Vec<Uuid>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| Uuid::parse_str(id).map_err(|_| ConfigError::InvalidValue("ADMIN_USER_IDS")))
        .collect()
}

/// Penalty rate must be a fraction in [0, 1]
pub fn validate_penalty_rate(rate: Decimal) -> Result<(), ConfigError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(ConfigError::InvalidValue("PENALTY_RATE"));
    }
    Ok(())
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
