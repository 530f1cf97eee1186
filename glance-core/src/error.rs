//! Error types for the glance ecosystem.

use thiserror::Error;

/// Errors that can occur in glance operations.
#[derive(Error, Debug)]
pub enum GlanceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Calendar source error: {0}")]
    Source(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for glance operations.
pub type GlanceResult<T> = Result<T, GlanceError>;
