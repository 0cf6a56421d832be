//! Billing settings

use std::env;

use crate::error::BillingError;
use crate::invoice::{DEFAULT_CURRENCY, DEFAULT_DUE_DAYS};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Settings loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingSettings {
    /// ISO 4217 code, lowercase
    pub currency: String,
    pub invoice_due_days: i64,

    // Database
    pub database_url: Option<String>,
    pub database_max_connections: u32,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            invoice_due_days: DEFAULT_DUE_DAYS,
            database_url: None,
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl BillingSettings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let currency = match env::var("XYRA_CURRENCY") {
            Ok(raw) => parse_currency(&raw)?,
            Err(_) => DEFAULT_CURRENCY.to_string(),
        };

        let invoice_due_days = match env::var("XYRA_INVOICE_DUE_DAYS") {
            Ok(raw) => match raw.trim().parse::<i64>() {
                Ok(days) if (0..=365).contains(&days) => days,
                _ => return Err(ConfigError::Invalid("XYRA_INVOICE_DUE_DAYS", raw)),
            },
            Err(_) => DEFAULT_DUE_DAYS,
        };

        let database_max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::Invalid("DATABASE_MAX_CONNECTIONS", raw)),
            },
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            currency,
            invoice_due_days,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            database_max_connections,
        })
    }

    /// The database URL, for callers that cannot run without one
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }
}

fn parse_currency(raw: &str) -> Result<String, ConfigError> {
    let code = raw.trim().to_lowercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(ConfigError::Invalid("XYRA_CURRENCY", raw.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

impl From<ConfigError> for BillingError {
    fn from(err: ConfigError) -> Self {
        BillingError::Config(err.to_string())
    }
}
