//! Speech-to-text (STT) providers

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// `[00:00:01 - 00:00:03] SPEAKER_00:` style diarization prefixes
static DIARIZATION_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\[.*?\]\s*SPEAKER_\d+:\s*").expect("valid regex")
});

/// A service turning WAV audio into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe WAV bytes
    ///
    /// # Errors
    ///
    /// Returns error if the provider call fails
    async fn transcribe(&self, wav: &[u8]) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Remove diarization prefixes and surrounding whitespace
#[must_use]
pub fn strip_diarization(text: &str) -> String {
    DIARIZATION_PREFIX.replace_all(text, "").trim().to_string()
}

/// LuxASR: Luxembourgish ASR with speaker diarization
pub struct LuxAsr {
    client: reqwest::Client,
    url: String,
}

impl LuxAsr {
    /// Create a LuxASR client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: String, timeout: Duration, accept_invalid_certs: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl Transcriber for LuxAsr {
    async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting LuxASR transcription");

        let form = reqwest::multipart::Form::new().part(
            "audio_file",
            reqwest::multipart::Part::bytes(wav.to_vec())
                .file_name("audio.wav")
                .mime_str("audio/wav")
                .map_err(|e| Error::Stt(e.to_string()))?,
        );

        let response = self
            .client
            .post(&self.url)
            .query(&[("diarization", "Enabled"), ("outfmt", "text")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "LuxASR request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "LuxASR error");
            return Err(Error::Stt(format!("LuxASR error {status}: {body}")));
        }

        let text = strip_diarization(&response.text().await?);
        tracing::info!(transcript = %text, "LuxASR transcription complete");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "luxasr"
    }
}

/// Response from a Whisper-compatible transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Whisper-compatible transcription (`OpenAI` or a local server)
pub struct Whisper {
    client: reqwest::Client,
    url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl Whisper {
    /// Create a Whisper client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        url: String,
        api_key: Option<SecretString>,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl Transcriber for Whisper {
    async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "Whisper request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        let text = result.text.trim().to_string();
        tracing::info!(transcript = %text, "Whisper transcription complete");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "whisper"
    }
}
