//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`InvalidAmount`] thrown when a money amount is missing, not positive or
//!   would overflow.
//! - [`KeyNotFound`] thrown when an item is not found or not owned by the
//!   caller.
//! - [`Conflict`] thrown when a concurrent writer changed a budget between
//!   read and write.
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`Conflict`]: EngineError::Conflict
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Concurrent update: {0}")]
    Conflict(String),
    #[error("Export failed: {0}")]
    Export(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidPeriod(a), Self::InvalidPeriod(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Export(a), Self::Export(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl From<csv::Error> for EngineError {
    fn from(value: csv::Error) -> Self {
        Self::Export(value.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(value: std::io::Error) -> Self {
        Self::Export(value.to_string())
    }
}
