//! Error types shared by the pipeline and the generation backends.

use thiserror::Error;

/// Everything that can go wrong between receiving turns and finishing a stream.
///
/// None of these are retried or translated by the pipeline; they travel to the
/// caller exactly as the backend produced them.
#[derive(Error, Debug)]
pub enum TavernError {
    /// Connection failure, timeout, or a broken body while reading the stream
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status
    #[error("Provider error {status}: {body}")]
    Provider { status: u16, body: String },

    /// A streamed chunk could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The body could not be split into lines (overlong or not UTF-8)
    #[error("Stream framing error: {0}")]
    Framing(String),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TavernError {
    pub fn provider(status: u16, body: impl Into<String>) -> Self {
        Self::Provider {
            status,
            body: body.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, TavernError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_message() {
        let err = TavernError::provider(401, "invalid api key");
        assert_eq!(err.to_string(), "Provider error 401: invalid api key");
    }

    #[test]
    fn test_decode_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: TavernError = serde_err.into();
        assert!(matches!(err, TavernError::Decode(_)));
    }
}
