//! Error types for Plan Bot.

/// Top-level error type for the planner.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} disconnected: {reason}")]
    Disconnected { name: String, reason: String },
}

/// Errors raised by the planning engine and its question catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// The answer could not be accepted. The message is shown to the user
    /// and the same question is asked again.
    #[error("{message}")]
    Validation { message: String },

    /// The catalog declared the interview finished but the allocation
    /// formula still lacks an attribute. Fatal for the session.
    #[error("Cannot recommend a budget: missing attribute '{key}'")]
    MissingAttribute { key: String },

    /// A known attribute holds a value the formula cannot read
    /// (typically a hand-edited or corrupted restore).
    #[error("Cannot recommend a budget: attribute '{key}' has unusable value '{value}'")]
    InvalidAttribute { key: String, value: String },

    /// A recommendation was requested while a question is still pending.
    #[error("No recommendation yet: the interview is still in progress")]
    NotReady,
}

impl PlanError {
    /// Create a user-facing validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a missing-attribute error.
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingAttribute { key: key.into() }
    }
}
