//! Text-to-speech (TTS) provider
//!
//! The synthesis server renders speech to a file it hosts and answers with
//! the URL; the host fetches or streams the audio from there.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Synthesis request body
#[derive(Debug, Clone, Serialize)]
pub struct SpeechRequest<'a> {
    /// Text to speak
    pub text: &'a str,
    /// Locale of the voice
    pub lang: &'a str,
    /// What the partner said, for servers that condition prosody on it
    pub transcript: &'a str,
    /// Speaking-rate factor; above 1.0 is slower
    pub length_scale: f64,
}

#[derive(Deserialize)]
struct SpeechResponse {
    url: String,
}

/// A service turning text into a playable audio URL
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize speech and return the audio URL
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<String>;
}

/// HTTP client for the speech server
pub struct TtsClient {
    client: reqwest::Client,
    url: String,
}

impl TtsClient {
    /// Create a TTS client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl SpeechSynthesizer for TtsClient {
    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<String> {
        tracing::debug!(text = request.text, lang = request.lang, "synthesizing");

        let response = self.client.post(&self.url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("TTS error {status}: {body}")));
        }

        let result: SpeechResponse = response.json().await?;
        if result.url.is_empty() {
            return Err(Error::Tts("TTS returned an empty url".to_string()));
        }

        Ok(result.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = SpeechRequest {
            text: "Moien!",
            lang: "lb",
            transcript: "moien",
            length_scale: 1.1,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "text": "Moien!",
                "lang": "lb",
                "transcript": "moien",
                "length_scale": 1.1
            })
        );
    }
}
