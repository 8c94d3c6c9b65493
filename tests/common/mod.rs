//! Shared test utilities
//!
//! In-memory stand-ins for the robot and the remote providers, so the
//! dialogue loop can be driven without audio hardware or network.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::watch;

use moien::dialogue::{
    ConversationHost, DialogueProviders, DialogueSettings, Gesture, ListenEvent,
    TranscriptionFallback, Turn, TurnOrchestrator, TurnState,
};
use moien::llm::{ChatModel, DeltaStream};
use moien::session::{PipelineInfo, SessionArchive, SessionLog, SessionMeta};
use moien::voice::{AudioCapture, SAMPLE_RATE, SpeechRequest, SpeechSynthesizer, Transcriber};
use moien::{Error, Result};

/// Generate sine wave audio samples
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// One interleaved stereo 16-bit sample group
pub fn stereo_frame(left: i16, right: i16) -> Vec<u8> {
    let mut frame = left.to_le_bytes().to_vec();
    frame.extend_from_slice(&right.to_le_bytes());
    frame
}

/// Transcriber returning a fixed text
pub struct FakeTranscriber {
    text: String,
    hang: bool,
    pub calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            hang: false,
            calls: AtomicUsize::new(0),
        })
    }

    /// Never answers
    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            text: String::new(),
            hang: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        assert!(wav.starts_with(b"RIFF"));
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            return std::future::pending().await;
        }
        Ok(self.text.clone())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// How the fake model answers
#[derive(Clone)]
pub enum ChatReply {
    Text(String),
    Fragments(Vec<String>),
    Fail,
    /// Never answers
    Hang,
    /// Streams these fragments, then goes quiet without closing
    Stall(Vec<String>),
}

/// Chat model with canned replies that records what it was shown
pub struct FakeChat {
    reply: ChatReply,
    greeting: Option<String>,
    seen: Mutex<Vec<Vec<Turn>>>,
}

impl FakeChat {
    pub fn new(reply: ChatReply) -> Self {
        Self {
            reply,
            greeting: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(ChatReply::Text(text.to_string()))
    }

    pub fn fragments(fragments: &[&str]) -> Self {
        Self::new(ChatReply::Fragments(
            fragments.iter().map(|f| (*f).to_string()).collect(),
        ))
    }

    pub fn stalling(fragments: &[&str]) -> Self {
        Self::new(ChatReply::Stall(
            fragments.iter().map(|f| (*f).to_string()).collect(),
        ))
    }

    pub fn with_greeting(mut self, greeting: &str) -> Self {
        self.greeting = Some(greeting.to_string());
        self
    }

    /// History snapshot of every request, in order
    pub fn seen(&self) -> Vec<Vec<Turn>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn record(&self, history: &[Turn]) {
        self.seen.lock().unwrap().push(history.to_vec());
    }
}

#[async_trait]
impl ChatModel for FakeChat {
    async fn complete(&self, history: &[Turn]) -> Result<String> {
        self.record(history);
        match &self.reply {
            ChatReply::Text(text) => Ok(text.clone()),
            ChatReply::Fragments(fragments) => Ok(fragments.concat()),
            ChatReply::Fail => Err(Error::Llm("model unavailable".to_string())),
            ChatReply::Hang | ChatReply::Stall(_) => std::future::pending().await,
        }
    }

    async fn stream(&self, history: &[Turn]) -> Result<DeltaStream> {
        self.record(history);
        match &self.reply {
            ChatReply::Text(text) => Ok(futures::stream::iter(vec![text.clone()]).boxed()),
            ChatReply::Fragments(fragments) => {
                Ok(futures::stream::iter(fragments.clone()).boxed())
            }
            ChatReply::Stall(fragments) => Ok(futures::stream::iter(fragments.clone())
                .chain(futures::stream::pending())
                .boxed()),
            ChatReply::Fail => Err(Error::Llm("model unavailable".to_string())),
            ChatReply::Hang => std::future::pending().await,
        }
    }

    async fn greeting(&self) -> Result<String> {
        self.greeting
            .clone()
            .ok_or_else(|| Error::Llm("no greeting".to_string()))
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

/// Synthesizer handing out numbered URLs
#[derive(Default)]
pub struct FakeTts {
    fail: bool,
    requests: Mutex<Vec<(String, String)>>,
}

impl FakeTts {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(text, transcript)` of every request
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeTts {
    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<String> {
        assert_eq!(request.lang, "lb");
        if self.fail {
            return Err(Error::Tts("speech server down".to_string()));
        }

        let mut requests = self.requests.lock().unwrap();
        requests.push((request.text.to_string(), request.transcript.to_string()));
        Ok(format!("http://tts.test/{}.wav", requests.len() - 1))
    }
}

/// Archive keeping sealed logs in memory
#[derive(Clone, Default)]
pub struct MemoryArchive {
    logs: Arc<Mutex<Vec<SessionLog>>>,
}

impl MemoryArchive {
    pub fn logs(&self) -> Vec<SessionLog> {
        self.logs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionArchive for MemoryArchive {
    async fn store(&self, log: &SessionLog) -> Result<()> {
        self.logs.lock().unwrap().push(log.clone());
        Ok(())
    }
}

/// Scripted robot
pub struct FakeHost {
    events: VecDeque<ListenEvent>,
    capture: Arc<AudioCapture>,
    mic_frame: Option<Vec<u8>>,
    leave_on: Option<Gesture>,
    leave_in: Option<TurnState>,
    leave_after_speaking: bool,
    presence: watch::Sender<bool>,
    partners: usize,
    pub states: Vec<TurnState>,
    pub gestures: Vec<Gesture>,
    pub said: Vec<(String, String)>,
}

impl FakeHost {
    pub fn new(capture: Arc<AudioCapture>, events: Vec<ListenEvent>) -> Self {
        Self {
            events: events.into(),
            capture,
            mic_frame: None,
            leave_on: None,
            leave_in: None,
            leave_after_speaking: false,
            presence: watch::channel(false).0,
            partners: 1,
            states: Vec::new(),
            gestures: Vec::new(),
            said: Vec::new(),
        }
    }

    /// Audio the microphone picks up during each utterance
    pub fn with_mic_frame(mut self, frame: Vec<u8>) -> Self {
        self.mic_frame = Some(frame);
        self
    }

    /// Walk away as soon as the robot makes this gesture
    pub fn leave_on_gesture(mut self, gesture: Gesture) -> Self {
        self.leave_on = Some(gesture);
        self
    }

    /// Walk away as soon as the robot enters this state
    pub fn leave_in_state(mut self, state: TurnState) -> Self {
        self.leave_in = Some(state);
        self
    }

    /// Walk away once the robot has said something
    pub fn leave_after_speaking(mut self) -> Self {
        self.leave_after_speaking = true;
        self
    }

    pub fn with_partners(mut self, partners: usize) -> Self {
        self.partners = partners;
        self
    }

    /// Engage without going through `await_partner`
    pub fn engage(&self) {
        self.presence.send_replace(true);
    }

    pub fn said_texts(&self) -> Vec<&str> {
        self.said.iter().map(|(_, text)| text.as_str()).collect()
    }

    fn leave(&self) {
        self.presence.send_replace(false);
    }
}

#[async_trait]
impl ConversationHost for FakeHost {
    async fn await_partner(&mut self) -> bool {
        if self.partners == 0 {
            return false;
        }
        self.partners -= 1;
        self.engage();
        true
    }

    fn presence(&self) -> watch::Receiver<bool> {
        self.presence.subscribe()
    }

    async fn listen(&mut self) -> ListenEvent {
        match self.events.pop_front() {
            Some(ListenEvent::PartnerLeft) | None => {
                self.leave();
                ListenEvent::PartnerLeft
            }
            Some(event @ ListenEvent::Utterance { .. }) => {
                if let Some(frame) = &self.mic_frame {
                    self.capture.on_frame(frame);
                }
                event
            }
            Some(event) => event,
        }
    }

    fn show_state(&mut self, state: TurnState) {
        self.states.push(state);
        if self.leave_in == Some(state) {
            self.leave();
        }
    }

    async fn gesture(&mut self, gesture: Gesture) {
        self.gestures.push(gesture);
        if self.leave_on == Some(gesture) {
            self.leave();
        }
    }

    async fn say(&mut self, audio_url: &str, text: &str) {
        self.said.push((audio_url.to_string(), text.to_string()));
        if self.leave_after_speaking {
            self.leave();
        }
    }
}

/// Utterance with a blank host transcript
pub fn utterance() -> ListenEvent {
    heard("")
}

/// Utterance the host itself transcribed as `text`
pub fn heard(text: &str) -> ListenEvent {
    ListenEvent::Utterance {
        host_transcript: text.to_string(),
    }
}

/// Orchestrator wired to fakes
pub struct Rig {
    pub orchestrator: TurnOrchestrator,
    pub capture: Arc<AudioCapture>,
    pub asr: Arc<FakeTranscriber>,
    pub chat: Arc<FakeChat>,
    pub tts: Arc<FakeTts>,
    pub archive: MemoryArchive,
}

impl Rig {
    pub fn new(settings: DialogueSettings, asr_text: &str, chat: FakeChat) -> Self {
        Self::with_tts(settings, asr_text, chat, FakeTts::default())
    }

    pub fn with_tts(
        settings: DialogueSettings,
        asr_text: &str,
        chat: FakeChat,
        tts: FakeTts,
    ) -> Self {
        Self::assemble(settings, FakeTranscriber::new(asr_text), chat, tts)
    }

    pub fn with_transcriber(
        settings: DialogueSettings,
        asr: Arc<FakeTranscriber>,
        chat: FakeChat,
    ) -> Self {
        Self::assemble(settings, asr, chat, FakeTts::default())
    }

    fn assemble(
        settings: DialogueSettings,
        asr: Arc<FakeTranscriber>,
        chat: FakeChat,
        tts: FakeTts,
    ) -> Self {
        let capture = Arc::new(AudioCapture::new());
        let chat = Arc::new(chat);
        let tts = Arc::new(tts);
        let archive = MemoryArchive::default();

        let primary: Arc<dyn Transcriber> = asr.clone();
        let providers = DialogueProviders {
            transcription: TranscriptionFallback::new(
                Some(primary),
                SAMPLE_RATE,
                Duration::from_secs(15),
            ),
            chat: chat.clone(),
            tts: tts.clone(),
        };

        let orchestrator = TurnOrchestrator::new(
            settings,
            Arc::clone(&capture),
            providers,
            Arc::new(archive.clone()),
            meta(),
        );

        Self {
            orchestrator,
            capture,
            asr,
            chat,
            tts,
            archive,
        }
    }

    pub fn host(&self, events: Vec<ListenEvent>) -> FakeHost {
        FakeHost::new(Arc::clone(&self.capture), events)
    }
}

pub fn meta() -> SessionMeta {
    SessionMeta {
        participant_id: "P01".to_string(),
        task_id: "T1".to_string(),
        pipeline: PipelineInfo {
            asr_mode: "luxasr".to_string(),
            llm_backend: "openai".to_string(),
            model: "fake-model".to_string(),
        },
    }
}
