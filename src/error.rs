//! Error types for racesim.
//!
//! Every fallible operation returns `Result<T, SimError>` instead of panicking.
//! Degenerate simulation states are not errors: they short-circuit to a
//! deterministic ranking inside the engine. Validator findings are values.

use thiserror::Error;

/// Result type alias for racesim operations.
pub type SimResult<T> = Result<T, SimError>;

/// Unified error type for all racesim operations.
#[derive(Debug, Error)]
pub enum SimError {
    // ===== Input Errors =====
    /// Malformed or incomplete event descriptor.
    #[error("Invalid event '{event}': {message}")]
    InvalidEvent {
        /// Event identifier (or `<unnamed>`).
        event: String,
        /// What is wrong with it.
        message: String,
    },

    /// Malformed or incomplete roster.
    #[error("Invalid roster: {message}")]
    InvalidRoster {
        /// What is wrong with it.
        message: String,
    },

    /// Event id not present in the season calendar.
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// Competitor id not present in the roster.
    #[error("Unknown competitor '{competitor}' in {context}")]
    UnknownCompetitor {
        /// Offending identifier.
        competitor: String,
        /// Where it was referenced.
        context: String,
    },

    // ===== Configuration Errors =====
    /// Invalid configuration parameter.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    // ===== Concurrency Errors =====
    /// A trial partition failed on the calling thread after its worker retry.
    #[error("Partition {partition} failed: {message}")]
    PartitionFailed {
        /// Partition index.
        partition: usize,
        /// Failure description.
        message: String,
    },

    /// The run was cancelled before completion; partial results are discarded.
    #[error("Monte Carlo run cancelled")]
    Cancelled,

    // ===== I/O Errors =====
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SimError {
    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid-event error.
    #[must_use]
    pub fn invalid_event(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEvent {
            event: event.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-roster error.
    #[must_use]
    pub fn invalid_roster(message: impl Into<String>) -> Self {
        Self::InvalidRoster {
            message: message.into(),
        }
    }

    /// Create an unknown-competitor error.
    #[must_use]
    pub fn unknown_competitor(competitor: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnknownCompetitor {
            competitor: competitor.into(),
            context: context.into(),
        }
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Check if this error was caused by caller-supplied data.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidEvent { .. }
                | Self::InvalidRoster { .. }
                | Self::UnknownEvent(_)
                | Self::UnknownCompetitor { .. }
                | Self::Config { .. }
                | Self::YamlParse(_)
                | Self::Validation(_)
        )
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
