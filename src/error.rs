//! Error types for streamscribe.

use crate::stt::client::SttError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamscribeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Voice-activity classification errors
    #[error("Classifier failure: {message}")]
    Classifier { message: String },

    // Transcription errors
    #[error("Transcription error: {0}")]
    Stt(#[from] SttError),

    // Session lifecycle errors
    #[error("Session is not running")]
    SessionNotStarted,

    // Recording archive errors
    #[error("Recording error: {message}")]
    Recording { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, StreamscribeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = StreamscribeError::ConfigInvalidValue {
            key: "chunk_duration_secs".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for chunk_duration_secs: must be positive"
        );
    }

    #[test]
    fn test_classifier_display() {
        let error = StreamscribeError::Classifier {
            message: "model returned NaN".to_string(),
        };
        assert_eq!(error.to_string(), "Classifier failure: model returned NaN");
    }

    #[test]
    fn test_stt_display() {
        let error: StreamscribeError = SttError::Transient("connection reset".to_string()).into();
        assert_eq!(
            error.to_string(),
            "Transcription error: transient transcription failure: connection reset"
        );
    }

    #[test]
    fn test_session_not_started_display() {
        assert_eq!(
            StreamscribeError::SessionNotStarted.to_string(),
            "Session is not running"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: StreamscribeError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: StreamscribeError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_other_display() {
        let error = StreamscribeError::Other("unexpected error".to_string());
        assert_eq!(error.to_string(), "unexpected error");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<StreamscribeError>();
        assert_sync::<StreamscribeError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
