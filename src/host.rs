//! Desktop stand-in for the robot
//!
//! Listens on the default microphone, decides when the partner has finished
//! speaking with an energy detector, and plays synthesized speech on the
//! default output device. LEDs and gestures are rendered as log lines.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::config::Config;
use crate::dialogue::{ConversationHost, Gesture, ListenEvent, TurnState};
use crate::voice::{
    AudioCapture, AudioPlayback, MicrophoneFeed, SampleTap, Transcriber, UtteranceDetector,
    Whisper, encode_wav, f32_to_pcm16,
};
use crate::{Error, Result};

/// How often the microphone tap is drained
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// LED color shown for each state
#[must_use]
pub const fn led_color(state: TurnState) -> &'static str {
    match state {
        TurnState::Idle => "off",
        TurnState::Listening => "green",
        TurnState::Transcribing | TurnState::AwaitingReply => "blue",
        TurnState::Speaking => "red",
    }
}

/// Microphone and speakers of the local machine
pub struct LocalHost {
    feed: MicrophoneFeed,
    tap: SampleTap,
    detector: UtteranceDetector,
    transcriber: Option<Arc<dyn Transcriber>>,
    asr_timeout: Duration,
    playback: Option<AudioPlayback>,
    http: reqwest::Client,
    presence: Arc<watch::Sender<bool>>,
    sample_rate: u32,
    listen_timeout: Duration,
    engaged: bool,
}

impl LocalHost {
    /// Open the microphone and speakers
    ///
    /// Frames from the microphone feed `capture`. The secondary transcriber
    /// is only enabled when an API key is configured.
    ///
    /// # Errors
    ///
    /// Returns error if the microphone cannot be opened
    pub fn new(config: &Config, capture: Arc<AudioCapture>) -> Result<Self> {
        let tap = SampleTap::default();
        let feed = MicrophoneFeed::start(capture, Arc::clone(&tap), config.sample_rate)?;

        let playback = AudioPlayback::new()
            .inspect_err(|e| tracing::warn!(error = %e, "no speaker output, replies stay silent"))
            .ok();

        let transcriber: Option<Arc<dyn Transcriber>> = match &config.llm.api_key {
            Some(key) => Some(Arc::new(Whisper::new(
                config.host_asr.url.clone(),
                Some(key.clone()),
                config.host_asr.model.clone(),
                config.asr.timeout,
            )?)),
            None => {
                tracing::info!("no API key, host transcript disabled");
                None
            }
        };

        let http = reqwest::Client::builder()
            .timeout(config.tts.timeout)
            .build()?;

        Ok(Self {
            feed,
            tap,
            detector: UtteranceDetector::new(),
            transcriber,
            asr_timeout: config.asr.timeout,
            playback,
            http,
            presence: Arc::new(watch::channel(false).0),
            sample_rate: config.sample_rate,
            listen_timeout: config.dialogue.listen_timeout,
            engaged: false,
        })
    }

    fn drain_tap(&self) -> Vec<f32> {
        self.tap
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Transcribe the detected utterance with the secondary provider
    async fn host_transcript(&self, speech: &[f32]) -> String {
        let Some(transcriber) = &self.transcriber else {
            return String::new();
        };

        let wav = encode_wav(&f32_to_pcm16(speech), self.sample_rate);
        match tokio::time::timeout(self.asr_timeout, transcriber.transcribe(&wav)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "host transcription failed");
                String::new()
            }
            Err(_) => {
                tracing::warn!(
                    error = %Error::Timeout("host transcription"),
                    "host transcript dropped"
                );
                String::new()
            }
        }
    }

    async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Tts(format!("audio fetch returned {}", response.status())));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ConversationHost for LocalHost {
    async fn await_partner(&mut self) -> bool {
        // A local session starts immediately and ends on Ctrl+C
        if self.engaged {
            return false;
        }
        self.engaged = true;

        if !self.feed.capture_supported() {
            tracing::warn!("microphone is not stereo 16-bit, relying on host transcript");
        }

        let presence = Arc::clone(&self.presence);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, ending session");
                presence.send_replace(false);
            }
        });

        self.presence.send_replace(true);
        tracing::info!("partner engaged, press Ctrl+C to end the session");
        true
    }

    fn presence(&self) -> watch::Receiver<bool> {
        self.presence.subscribe()
    }

    async fn listen(&mut self) -> ListenEvent {
        self.drain_tap();
        self.detector.reset();
        let started = Instant::now();

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            if !*self.presence.borrow() {
                return ListenEvent::PartnerLeft;
            }

            let samples = self.drain_tap();
            if self.detector.process(&samples) {
                let speech = self.detector.take_speech_buffer();
                tracing::debug!(samples = speech.len(), "end of utterance");
                let host_transcript = self.host_transcript(&speech).await;
                return ListenEvent::Utterance { host_transcript };
            }

            if started.elapsed() > self.listen_timeout
                && self.detector.state() == crate::voice::DetectorState::Idle
            {
                return ListenEvent::Silence;
            }
        }
    }

    fn show_state(&mut self, state: TurnState) {
        tracing::info!(led = led_color(state), state = ?state, "state");
    }

    async fn gesture(&mut self, gesture: Gesture) {
        tracing::info!(gesture = ?gesture, "gesture");
    }

    async fn say(&mut self, audio_url: &str, text: &str) {
        tracing::info!(text, "speaking");

        let Some(playback) = self.playback.clone() else {
            return;
        };

        let audio = match self.fetch_audio(audio_url).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, url = audio_url, "failed to fetch synthesized audio");
                return;
            }
        };

        match tokio::task::spawn_blocking(move || playback.play_encoded(&audio)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "playback failed"),
            Err(e) => tracing::warn!(error = %e, "playback task failed"),
        }
    }
}
