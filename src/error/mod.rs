//! Error types for toolcode.

use thiserror::Error;

/// Primary error type for all toolcode operations.
#[derive(Error, Debug)]
pub enum ToolcodeError {
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Unsafe tool code: {0}")]
    UnsafeInput(String),

    #[error("Tool code timed out after {0}ms")]
    Timeout(u64),

    #[error("Tool code output exceeded {limit} bytes (got {actual})")]
    OutputTooLarge { limit: usize, actual: usize },

    #[error("Tool code failed: {0}")]
    Runtime(String),

    #[error("Agent processing exceeded maximum cycle cost of {max}")]
    CycleBudgetExceeded { max: u32 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The model transport failed; never recovered inside a turn.
    Generation,
    /// The sandbox rejected or failed a call; fed back to the model.
    Sandbox,
    /// The turn ran out of cycles.
    Budget,
    Configuration,
    Serialization,
    Io,
}

impl ToolcodeError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a generation failure.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Generation(_) | Self::Api { .. } | Self::Authentication(_) | Self::Network(_) => {
                ErrorCategory::Generation
            }
            Self::UnsafeInput(_)
            | Self::Timeout(_)
            | Self::OutputTooLarge { .. }
            | Self::Runtime(_) => ErrorCategory::Sandbox,
            Self::CycleBudgetExceeded { .. } => ErrorCategory::Budget,
            Self::Configuration(_) | Self::InvalidArgument(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Io(_) => ErrorCategory::Io,
        }
    }

    /// Whether this error is recovered locally by feeding it back to the model.
    pub fn is_sandbox_failure(&self) -> bool {
        self.category() == ErrorCategory::Sandbox
    }

    /// Whether this error ends `process_turn` abnormally.
    pub fn is_fatal_to_turn(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Generation | ErrorCategory::Budget
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ToolcodeError>;
