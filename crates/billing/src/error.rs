//! Billing error types

use thiserror::Error;
use xyra_shared::XyraError;

/// Billing-specific errors
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Unsupported billing model type: {0}")]
    UnsupportedModelType(String),

    #[error("No active {0} configuration for billing model")]
    NoActiveConfig(String),

    #[error("Billing model has {count} active {model_type} configurations, expected exactly one")]
    MultipleActiveConfigs { model_type: String, count: usize },

    #[error("Invalid usage data: {0}")]
    InvalidUsageData(String),

    #[error("Invalid pricing configuration: {0}")]
    InvalidConfig(String),

    #[error("Arithmetic overflow while calculating {0}")]
    ArithmeticOverflow(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BillingError {
    /// Whether the error was caused by the caller's input rather than by
    /// stored state or infrastructure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BillingError::UnsupportedModelType(_)
                | BillingError::InvalidUsageData(_)
                | BillingError::InvalidInput(_)
                | BillingError::NotFound(_)
        )
    }
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for BillingError {
    fn from(err: serde_json::Error) -> Self {
        BillingError::Serialization(err.to_string())
    }
}

impl From<XyraError> for BillingError {
    fn from(err: XyraError) -> Self {
        match err {
            XyraError::Validation(msg) => BillingError::InvalidInput(msg),
        }
    }
}

pub type BillingResult<T> = Result<T, BillingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(BillingError::InvalidUsageData("seats".into()).is_client_error());
        assert!(BillingError::UnsupportedModelType("barter".into()).is_client_error());
        assert!(!BillingError::NoActiveConfig("outcome".into()).is_client_error());
        assert!(!BillingError::ArithmeticOverflow("outcome fee").is_client_error());
        assert!(!BillingError::Database("timeout".into()).is_client_error());
    }

    #[test]
    fn test_shared_error_conversion() {
        let err: BillingError = XyraError::Validation("bad id".into()).into();
        assert!(matches!(err, BillingError::InvalidInput(msg) if msg == "bad id"));
    }
}
