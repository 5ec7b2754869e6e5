//! Error types for semantic page chunking

/// Error types for chunking operations
#[derive(thiserror::Error, Debug)]
pub enum ChunkingError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Regex compilation error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Page decoding failed: {0}")]
    Decoding(#[from] anyhow::Error),

    #[error("Internal processing error: {0}")]
    Internal(String),
}

/// Result type for chunking operations
pub type Result<T> = std::result::Result<T, ChunkingError>;

impl ChunkingError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal processing error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is recoverable
    ///
    /// Configuration problems abort a run before any page is processed; a
    /// single undecodable page or a failed worker does not poison the rest.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Configuration(_) | Self::Regex(_) => false,
            Self::Validation(_) | Self::Decoding(_) => true,
            Self::Internal(_) => false,
        }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::Regex(_) => "regex",
            Self::Decoding(_) => "decoding",
            Self::Internal(_) => "internal",
        }
    }
}
