//! Error types for ConvLSTM construction and rollouts.

use thiserror::Error;

/// Result type for ConvLSTM operations.
pub type Result<T> = std::result::Result<T, ConvLstmError>;

/// Errors raised while building or running a [`ConvLstm`](crate::rnn::ConvLstm).
#[derive(Debug, Error)]
pub enum ConvLstmError {
    /// The layer configuration is inconsistent; fix it and rebuild the model
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A tensor or state does not have the shape the model was built for
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// A forward call argument is outside its documented domain
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Configuration could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error while persisting a configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvLstmError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}
