//! Per-turn conversation state machine
//!
//! One partner at a time: listen, transcribe, ask the model, speak, listen
//! again. Every provider call runs in its own task and is raced against the
//! partner's presence, so a departure abandons the turn without waiting for
//! slow services. Abandoned calls finish in the background and their results
//! are dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{mpsc, watch};

use super::history::{BoundedHistory, Role, Turn};
use super::prompt::DEFAULT_GREETING;
use super::reply::{
    Emotion, ParsedReply, TARGET_LANGUAGE, parse_reply, response_emotion, spoken_text,
};
use super::segmenter::{Segmented, StreamingSegmenter};
use super::transcription::{Transcript, TranscriptionFallback};
use crate::llm::ChatModel;
use crate::session::{ActiveSession, SessionArchive, SessionLog, SessionMeta};
use crate::voice::{AudioCapture, SpeechRequest, SpeechSynthesizer};
use crate::{Error, Result};

/// Notes recorded when a partner walks away
const DEPARTURE_NOTES: &str = "User left";

/// Where the orchestrator is within a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Listening,
    Transcribing,
    AwaitingReply,
    Speaking,
}

/// What came of one listening period
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenEvent {
    /// The partner finished speaking; the host's own transcript, possibly blank
    Utterance { host_transcript: String },
    /// Nobody said anything before the host gave up
    Silence,
    /// The partner walked away
    PartnerLeft,
}

/// Non-verbal expressions the host can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Smile,
    BigSmile,
    ExpressSad,
    ExpressAnger,
    Thoughtful,
}

impl Gesture {
    /// Expression matching the reply's intended affect
    #[must_use]
    pub const fn for_emotion(emotion: Emotion) -> Self {
        match emotion {
            Emotion::Happy => Self::Smile,
            Emotion::Sad => Self::ExpressSad,
            Emotion::Angry => Self::ExpressAnger,
            Emotion::Calm => Self::Thoughtful,
        }
    }
}

/// The embodiment the conversation runs on
///
/// A robot, or a desktop stand-in with a microphone and speakers.
#[async_trait]
pub trait ConversationHost: Send {
    /// Wait until someone engages; `false` means no one ever will
    async fn await_partner(&mut self) -> bool;

    /// Partner presence, `true` while engaged
    fn presence(&self) -> watch::Receiver<bool>;

    /// Listen for one utterance
    async fn listen(&mut self) -> ListenEvent;

    /// Reflect the current state (e.g. LED color)
    fn show_state(&mut self, state: TurnState);

    /// Perform a gesture
    async fn gesture(&mut self, gesture: Gesture);

    /// Play synthesized audio, with its text for display or lip sync
    async fn say(&mut self, audio_url: &str, text: &str);
}

/// How model replies are requested and spoken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplyMode {
    /// One request, one synthesis
    #[default]
    Complete,
    /// Sentences are spoken as the completion streams in
    Streaming,
}

impl std::str::FromStr for ReplyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "complete" => Ok(Self::Complete),
            "streaming" => Ok(Self::Streaming),
            other => Err(Error::Config(format!("unknown reply mode: {other}"))),
        }
    }
}

/// Tunables of the dialogue loop
#[derive(Debug, Clone)]
pub struct DialogueSettings {
    pub history_capacity: usize,
    pub reply_mode: ReplyMode,
    pub greet: bool,
    pub length_scale: f64,
    pub llm_timeout: Duration,
    pub tts_timeout: Duration,
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self {
            history_capacity: 10,
            reply_mode: ReplyMode::Complete,
            greet: false,
            length_scale: 1.0,
            llm_timeout: Duration::from_secs(15),
            tts_timeout: Duration::from_secs(10),
        }
    }
}

/// Remote services a turn depends on
#[derive(Clone)]
pub struct DialogueProviders {
    pub transcription: TranscriptionFallback,
    pub chat: Arc<dyn ChatModel>,
    pub tts: Arc<dyn SpeechSynthesizer>,
}

/// Whether the conversation goes on after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Departed,
}

/// Outcome of a suspended provider call
enum Resumed<T> {
    /// The call finished; `None` if it failed or timed out
    Ready(Option<T>),
    /// The partner left first
    Departed,
}

enum StreamPiece {
    Sentence(String),
    Finished(String),
}

/// Drives conversations turn by turn
pub struct TurnOrchestrator {
    settings: DialogueSettings,
    history: BoundedHistory,
    capture: Arc<AudioCapture>,
    providers: DialogueProviders,
    archive: Arc<dyn SessionArchive>,
    meta: SessionMeta,
    state: TurnState,
}

impl TurnOrchestrator {
    #[must_use]
    pub fn new(
        settings: DialogueSettings,
        capture: Arc<AudioCapture>,
        providers: DialogueProviders,
        archive: Arc<dyn SessionArchive>,
        meta: SessionMeta,
    ) -> Self {
        Self {
            history: BoundedHistory::new(settings.history_capacity),
            settings,
            capture,
            providers,
            archive,
            meta,
            state: TurnState::Idle,
        }
    }

    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    #[must_use]
    pub const fn history(&self) -> &BoundedHistory {
        &self.history
    }

    /// Serve partners until the host has no more
    pub async fn run<H: ConversationHost>(&mut self, host: &mut H) {
        while host.await_partner().await {
            self.run_session(host).await;
        }
        tracing::info!("host closed, dialogue loop stopped");
    }

    /// Hold one conversation, returning its sealed log
    pub async fn run_session<H: ConversationHost>(&mut self, host: &mut H) -> SessionLog {
        let mut session = ActiveSession::start(self.meta.clone());
        let mut presence = host.presence();

        self.converse(host, &mut session, &mut presence).await;
        self.close_session(host, session).await
    }

    async fn converse<H: ConversationHost>(
        &mut self,
        host: &mut H,
        session: &mut ActiveSession,
        presence: &mut watch::Receiver<bool>,
    ) {
        host.gesture(Gesture::BigSmile).await;

        if self.settings.greet && self.greet(host, presence).await == Flow::Departed {
            return;
        }

        loop {
            self.capture.start();
            self.transition(host, TurnState::Listening);

            let event = tokio::select! {
                event = host.listen() => event,
                () = departed(presence) => ListenEvent::PartnerLeft,
            };

            match event {
                ListenEvent::Silence => {
                    tracing::debug!("no response, listening again");
                }
                ListenEvent::PartnerLeft => return,
                ListenEvent::Utterance { host_transcript } => {
                    if self.take_turn(host, session, presence, host_transcript).await
                        == Flow::Departed
                    {
                        return;
                    }
                }
            }
        }
    }

    async fn take_turn<H: ConversationHost>(
        &mut self,
        host: &mut H,
        session: &mut ActiveSession,
        presence: &mut watch::Receiver<bool>,
        host_transcript: String,
    ) -> Flow {
        self.transition(host, TurnState::Transcribing);
        let pcm = self.capture.stop();

        let transcription = self.providers.transcription.clone();
        let resolving =
            async move { Some(transcription.resolve(&pcm, &host_transcript).await) };
        let Resumed::Ready(transcript) = suspend(presence, resolving).await else {
            return Flow::Departed;
        };

        let transcript = transcript.unwrap_or(Transcript::NoInput);
        let Some(user_text) = transcript.text().map(str::to_string) else {
            tracing::debug!("blank transcript, discarding turn");
            return Flow::Continue;
        };
        tracing::info!(source = transcript.source(), text = %user_text, "partner said");

        self.history.append(Role::User, user_text.as_str());
        self.transition(host, TurnState::AwaitingReply);
        host.gesture(Gesture::Thoughtful).await;

        match self.settings.reply_mode {
            ReplyMode::Complete => {
                self.reply_complete(host, session, presence, &user_text)
                    .await
            }
            ReplyMode::Streaming => {
                self.reply_streaming(host, session, presence, &user_text)
                    .await
            }
        }
    }

    async fn reply_complete<H: ConversationHost>(
        &mut self,
        host: &mut H,
        session: &mut ActiveSession,
        presence: &mut watch::Receiver<bool>,
        user_text: &str,
    ) -> Flow {
        let chat = Arc::clone(&self.providers.chat);
        let snapshot = self.history.snapshot();
        let completing = bounded("chat completion", self.settings.llm_timeout, async move {
            chat.complete(&snapshot).await
        });

        let Resumed::Ready(raw) = suspend(presence, completing).await else {
            return Flow::Departed;
        };

        let reply = parse_reply(raw.as_deref().unwrap_or_default());
        host.gesture(Gesture::for_emotion(reply.response_emotion)).await;
        self.record(session, user_text, &reply);

        if reply.spoken_text.is_empty() {
            tracing::warn!("blank reply, nothing to say");
            return Flow::Continue;
        }

        self.transition(host, TurnState::Speaking);
        self.speak(host, presence, &reply.spoken_text, user_text).await
    }

    async fn reply_streaming<H: ConversationHost>(
        &mut self,
        host: &mut H,
        session: &mut ActiveSession,
        presence: &mut watch::Receiver<bool>,
        user_text: &str,
    ) -> Flow {
        let mut pieces = stream_sentences(
            Arc::clone(&self.providers.chat),
            self.history.snapshot(),
            self.settings.llm_timeout,
        );

        let mut full_text = String::new();
        loop {
            let piece = tokio::select! {
                piece = pieces.recv() => piece,
                () = departed(presence) => return Flow::Departed,
            };

            match piece {
                Some(StreamPiece::Sentence(sentence)) => {
                    let text = spoken_text(&sentence);
                    if text.is_empty() {
                        continue;
                    }
                    self.transition(host, TurnState::Speaking);
                    if self.speak(host, presence, &text, user_text).await == Flow::Departed {
                        return Flow::Departed;
                    }
                }
                Some(StreamPiece::Finished(text)) => {
                    full_text = text;
                    break;
                }
                None => break,
            }
        }

        let reply = parse_reply(&full_text);
        host.gesture(Gesture::for_emotion(reply.response_emotion)).await;
        self.record(session, user_text, &reply);
        Flow::Continue
    }

    /// Optional opener before the first listening period
    async fn greet<H: ConversationHost>(
        &mut self,
        host: &mut H,
        presence: &mut watch::Receiver<bool>,
    ) -> Flow {
        self.transition(host, TurnState::AwaitingReply);

        let chat = Arc::clone(&self.providers.chat);
        let greeting = bounded("greeting", self.settings.llm_timeout, async move {
            chat.greeting().await
        });
        let Resumed::Ready(raw) = suspend(presence, greeting).await else {
            return Flow::Departed;
        };

        // An untagged greeting is still a cheerful one
        let reply = raw
            .map(|raw| ParsedReply {
                response_emotion: response_emotion(&raw).unwrap_or(Emotion::Happy),
                ..parse_reply(&raw)
            })
            .filter(|reply| !reply.spoken_text.is_empty())
            .unwrap_or_else(|| ParsedReply {
                language_code: TARGET_LANGUAGE,
                spoken_text: DEFAULT_GREETING.to_string(),
                response_emotion: Emotion::Happy,
                user_emotion: Emotion::Calm,
            });

        host.gesture(Gesture::for_emotion(reply.response_emotion)).await;
        self.history.append(Role::Assistant, reply.spoken_text.as_str());

        self.transition(host, TurnState::Speaking);
        self.speak(host, presence, &reply.spoken_text, "").await
    }

    /// Log the exchange; only speakable replies enter the history
    fn record(&mut self, session: &mut ActiveSession, user_text: &str, reply: &ParsedReply) {
        if !reply.spoken_text.is_empty() {
            self.history.append(Role::Assistant, reply.spoken_text.as_str());
        }
        session.log_turn(
            user_text,
            reply.user_emotion,
            &reply.spoken_text,
            reply.response_emotion,
        );
    }

    async fn speak<H: ConversationHost>(
        &self,
        host: &mut H,
        presence: &mut watch::Receiver<bool>,
        text: &str,
        transcript: &str,
    ) -> Flow {
        let tts = Arc::clone(&self.providers.tts);
        let length_scale = self.settings.length_scale;
        let (owned_text, owned_transcript) = (text.to_string(), transcript.to_string());

        let synthesis = bounded("speech synthesis", self.settings.tts_timeout, async move {
            let request = SpeechRequest {
                text: &owned_text,
                lang: TARGET_LANGUAGE,
                transcript: &owned_transcript,
                length_scale,
            };
            tts.synthesize(&request).await
        });

        let Resumed::Ready(url) = suspend(presence, synthesis).await else {
            return Flow::Departed;
        };

        match url.filter(|url| !url.is_empty()) {
            Some(url) => host.say(&url, text).await,
            None => tracing::warn!(text, "no audio synthesized, skipping"),
        }

        Flow::Continue
    }

    async fn close_session<H: ConversationHost>(
        &mut self,
        host: &mut H,
        session: ActiveSession,
    ) -> SessionLog {
        self.capture.halt();
        self.history.clear();
        self.transition(host, TurnState::Idle);

        let log = session.seal(true, DEPARTURE_NOTES);
        if let Err(e) = self.archive.store(&log).await {
            tracing::error!(error = %e, "failed to archive session log");
        }

        log
    }

    fn transition<H: ConversationHost>(&mut self, host: &mut H, next: TurnState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "turn state");
            self.state = next;
        }
        host.show_state(next);
    }
}

/// Resolves once the partner is gone, or the host dropped its signal
async fn departed(presence: &mut watch::Receiver<bool>) {
    // A closed channel means the host is gone too
    let _ = presence.wait_for(|present| !present).await;
}

/// Run `call` in its own task until it completes or the partner leaves
async fn suspend<T, F>(presence: &mut watch::Receiver<bool>, call: F) -> Resumed<T>
where
    T: Send + 'static,
    F: Future<Output = Option<T>> + Send + 'static,
{
    let task = tokio::spawn(call);

    tokio::select! {
        joined = task => match joined {
            Ok(value) => Resumed::Ready(value),
            Err(e) => {
                tracing::error!(error = %e, "provider task failed");
                Resumed::Ready(None)
            }
        },
        () = departed(presence) => {
            tracing::info!("partner left, abandoning pending call");
            Resumed::Departed
        }
    }
}

/// Apply a time budget to a provider call, logging failures
async fn bounded<T>(
    what: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<T>>,
) -> Option<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, call = what, "provider call failed");
            None
        }
        Err(_) => {
            tracing::warn!(error = %Error::Timeout(what), "provider call abandoned");
            None
        }
    }
}

/// Stream a completion, releasing sentences as they are detected
///
/// The receiver yields sentences in detection order followed by the full
/// completion text. Dropping the receiver stops consumption of the stream.
fn stream_sentences(
    chat: Arc<dyn ChatModel>,
    history: Vec<Turn>,
    limit: Duration,
) -> mpsc::Receiver<StreamPiece> {
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        let Some(mut deltas) = bounded("chat stream", limit, chat.stream(&history)).await else {
            let _ = tx.send(StreamPiece::Finished(String::new())).await;
            return;
        };

        let mut segmenter = StreamingSegmenter::new();
        loop {
            let delta = match tokio::time::timeout(limit, deltas.next()).await {
                Ok(Some(delta)) => delta,
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(error = %Error::Timeout("chat stream"), "stream stalled");
                    break;
                }
            };

            if let Some(sentence) = segmenter.push(&delta)
                && tx.send(StreamPiece::Sentence(sentence)).await.is_err()
            {
                return;
            }
        }

        let Segmented { tail, full_text } = segmenter.finish();
        if let Some(tail) = tail
            && tx.send(StreamPiece::Sentence(tail)).await.is_err()
        {
            return;
        }
        let _ = tx.send(StreamPiece::Finished(full_text)).await;
    });

    rx
}
