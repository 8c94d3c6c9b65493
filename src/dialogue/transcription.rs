//! Primary transcription with fallback to the host's own transcript

use std::sync::Arc;
use std::time::Duration;

use crate::voice::{Transcriber, encode_wav};

/// Outcome of resolving one listening turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcript {
    /// The primary provider understood the utterance
    Primary(String),
    /// The host platform's transcript was used
    Fallback(String),
    /// Nothing usable was heard
    NoInput,
}

impl Transcript {
    /// Resolved text, if any
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Primary(text) | Self::Fallback(text) => Some(text),
            Self::NoInput => None,
        }
    }

    /// Short label of the winning source
    #[must_use]
    pub const fn source(&self) -> &'static str {
        match self {
            Self::Primary(_) => "primary",
            Self::Fallback(_) => "fallback",
            Self::NoInput => "none",
        }
    }
}

/// Runs the primary transcriber and degrades to the host transcript
#[derive(Clone)]
pub struct TranscriptionFallback {
    primary: Option<Arc<dyn Transcriber>>,
    sample_rate: u32,
    timeout: Duration,
}

impl TranscriptionFallback {
    /// `primary` of `None` means the host transcript is always used
    #[must_use]
    pub fn new(primary: Option<Arc<dyn Transcriber>>, sample_rate: u32, timeout: Duration) -> Self {
        Self {
            primary,
            sample_rate,
            timeout,
        }
    }

    /// Resolve a captured window against the host transcript
    ///
    /// Never fails: provider errors and timeouts count as a blank result.
    pub async fn resolve(&self, pcm: &[u8], host_transcript: &str) -> Transcript {
        let primary = self.transcribe_primary(pcm).await;
        if !primary.is_empty() {
            return Transcript::Primary(primary);
        }

        let fallback = host_transcript.trim();
        if fallback.is_empty() {
            tracing::debug!("no transcript from either source");
            Transcript::NoInput
        } else {
            tracing::info!(transcript = fallback, "using host transcript");
            Transcript::Fallback(fallback.to_string())
        }
    }

    async fn transcribe_primary(&self, pcm: &[u8]) -> String {
        let Some(primary) = &self.primary else {
            return String::new();
        };

        if pcm.is_empty() {
            tracing::debug!(provider = primary.name(), "empty capture window, skipping");
            return String::new();
        }

        let wav = encode_wav(pcm, self.sample_rate);
        tracing::debug!(bytes = pcm.len(), provider = primary.name(), "transcribing capture");

        match tokio::time::timeout(self.timeout, primary.transcribe(&wav)).await {
            Ok(Ok(text)) => text.trim().to_string(),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, provider = primary.name(), "transcription failed");
                String::new()
            }
            Err(_) => {
                tracing::warn!(provider = primary.name(), "transcription timed out");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::{Error, Result};

    struct Fixed {
        reply: Result<String>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(Error::Stt("503".to_string())),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Transcriber for Fixed {
        async fn transcribe(&self, wav: &[u8]) -> Result<String> {
            assert_eq!(&wav[0..4], b"RIFF");
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(Error::Stt("503".to_string())),
            }
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    struct Stalled;

    #[async_trait]
    impl Transcriber for Stalled {
        async fn transcribe(&self, _wav: &[u8]) -> Result<String> {
            std::future::pending().await
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    fn fallback(primary: Arc<dyn Transcriber>) -> TranscriptionFallback {
        TranscriptionFallback::new(Some(primary), 16_000, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_primary_wins() {
        let primary = Fixed::ok(" Moien ");
        let result = fallback(primary.clone()).resolve(&[0, 0], "hello").await;

        assert_eq!(result, Transcript::Primary("Moien".to_string()));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_primary_uses_fallback() {
        let result = fallback(Fixed::ok("")).resolve(&[0, 0], " Moien ").await;

        assert_eq!(result, Transcript::Fallback("Moien".to_string()));
    }

    #[tokio::test]
    async fn test_failed_primary_uses_fallback() {
        let result = fallback(Fixed::failing()).resolve(&[0, 0], "Moien").await;

        assert_eq!(result.text(), Some("Moien"));
        assert_eq!(result.source(), "fallback");
    }

    #[tokio::test]
    async fn test_empty_window_skips_primary() {
        let primary = Fixed::ok("should not be used");
        let result = fallback(primary.clone()).resolve(&[], "Moien").await;

        assert_eq!(result, Transcript::Fallback("Moien".to_string()));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_both_blank_is_no_input() {
        let result = fallback(Fixed::ok("  ")).resolve(&[0, 0], "   ").await;

        assert_eq!(result, Transcript::NoInput);
        assert_eq!(result.text(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_primary_times_out() {
        let result = fallback(Arc::new(Stalled)).resolve(&[0, 0], "Moien").await;

        assert_eq!(result, Transcript::Fallback("Moien".to_string()));
    }

    #[tokio::test]
    async fn test_no_primary_configured() {
        let transcription = TranscriptionFallback::new(None, 16_000, Duration::from_secs(1));

        assert_eq!(
            transcription.resolve(&[1, 2], "Moien").await,
            Transcript::Fallback("Moien".to_string())
        );
    }
}
