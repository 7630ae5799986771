//! Error taxonomy of the adapter.
//! Every variant is fatal for the invocation it occurred in and is returned to the runtime as-is.

use thiserror::Error;

/// Boxed error type accepted from the application and its factory.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared result type.
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Stable, message-independent error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnrecognizedEventShape,
    MalformedRequestEvent,
    BodyDecodeError,
    ResponseTooLarge,
    ApplicationInitializationError,
    Application,
    InvalidResponse,
    InvalidConfig,
}

impl ErrorKind {
    /// String representation used in logs and tests.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnrecognizedEventShape => "UnrecognizedEventShape",
            ErrorKind::MalformedRequestEvent => "MalformedRequestEvent",
            ErrorKind::BodyDecodeError => "BodyDecodeError",
            ErrorKind::ResponseTooLarge => "ResponseTooLarge",
            ErrorKind::ApplicationInitializationError => "ApplicationInitializationError",
            ErrorKind::Application => "Application",
            ErrorKind::InvalidResponse => "InvalidResponse",
            ErrorKind::InvalidConfig => "InvalidConfig",
        }
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("unrecognized event shape: {0}")]
    UnrecognizedEventShape(String),
    #[error("malformed request event: {0}")]
    MalformedRequestEvent(String),
    #[error("request body is not valid base64: {0}")]
    BodyDecodeError(#[from] base64::DecodeError),
    #[error("response body of {size} bytes exceeds the {limit} bytes limit")]
    ResponseTooLarge { size: usize, limit: usize },
    #[error("application initialization failed: {0}")]
    ApplicationInitializationError(String),
    #[error("application error: {0}")]
    Application(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl AdapterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::UnrecognizedEventShape(_) => ErrorKind::UnrecognizedEventShape,
            AdapterError::MalformedRequestEvent(_) => ErrorKind::MalformedRequestEvent,
            AdapterError::BodyDecodeError(_) => ErrorKind::BodyDecodeError,
            AdapterError::ResponseTooLarge { .. } => ErrorKind::ResponseTooLarge,
            AdapterError::ApplicationInitializationError(_) => ErrorKind::ApplicationInitializationError,
            AdapterError::Application(_) => ErrorKind::Application,
            AdapterError::InvalidResponse(_) => ErrorKind::InvalidResponse,
            AdapterError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinguishable() {
        let err = AdapterError::ResponseTooLarge { size: 11, limit: 10 };
        assert_eq!(err.kind(), ErrorKind::ResponseTooLarge);
        assert_eq!(err.kind().as_str(), "ResponseTooLarge");
        assert_eq!(err.to_string(), "response body of 11 bytes exceeds the 10 bytes limit");
    }
}
