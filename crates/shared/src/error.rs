//! Error types for Xyra

use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyraError {
    #[error("Validation error: {0}")]
    Validation(String),
}
