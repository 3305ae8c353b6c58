//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Storage error: {0}")]
    Storage(String),

    /// Update targeted an id the store does not hold.
    #[error("Exercise not found: {0}")]
    ExerciseNotFound(i64),

    /// A stored value could not be mapped back into the domain (e.g. unknown enum name).
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// The platform refused to deliver/schedule a notification.
    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input error: {0}")]
    Input(String),
}
