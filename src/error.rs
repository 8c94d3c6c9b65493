//! Error types for the dialogue loop

use thiserror::Error;

/// Result type alias for dialogue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the dialogue loop
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or capture error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Language model error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Session log email delivery error
    #[error("mail error: {0}")]
    Mail(String),

    /// Provider call exceeded its time budget
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
