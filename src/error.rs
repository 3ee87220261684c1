
use thiserror::Error;

use crate::datatype::Identity;

#[derive(Error, Debug)]
pub enum QuizError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Validation error on '{field}': {message}")]
    Validation { field: &'static str, message: String },
    #[error("Referential integrity error on '{field}': no {target} with id {id}")]
    Reference { field: &'static str, target: &'static str, id: Identity },
    #[error("No {model} with id {id}")]
    NotFound { model: &'static str, id: Identity },
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

impl QuizError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { field, message: message.into() }
    }
    /// The offending field for validation and reference errors.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } | Self::Reference { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, QuizError>;

// Helper conversions
impl From<rusqlite::Error> for QuizError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<config::ConfigError> for QuizError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
