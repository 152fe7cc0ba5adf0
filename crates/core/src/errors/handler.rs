use thiserror::Error;

/// Failure raised by a pipeline stage while a request or event is dispatched
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("access denied by guard '{guard}'")]
    Forbidden { guard: String },

    #[error("{status}: {message}")]
    Status { status: u16, message: String },

    #[error("provider '{dependency}' is not available to this handler")]
    MissingProvider { dependency: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl HandlerError {
    /// Create an error carrying an explicit status code
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Status code a transport would report for this failure
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Forbidden { .. } => 403,
            Self::Status { status, .. } => *status,
            Self::MissingProvider { .. } | Self::Internal { .. } => 500,
        }
    }
}

/// Result type returned by every pipeline stage
pub type HandlerResult = Result<(), HandlerError>;
