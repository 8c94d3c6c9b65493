//! Moien - spoken-dialogue loop for a Luxembourgish-speaking social robot
//!
//! This library provides the pieces of one conversation:
//! - Audio capture and WAV encoding for the transcription provider
//! - Transcription with fallback to the host's own transcript
//! - Emotion-tagged replies from an `OpenAI`-compatible chat model,
//!   optionally streamed and spoken sentence by sentence
//! - Speech synthesis and session transcripts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                       Host                           │
//! │   Microphone  │  Speakers  │  LEDs  │  Gestures      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 TurnOrchestrator                     │
//! │   History  │  Reply parser  │  Segmenter  │  Session │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Providers                         │
//! │   LuxASR  │  Whisper  │  Chat completions  │  TTS    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod dialogue;
pub mod error;
pub mod host;
pub mod llm;
pub mod session;
pub mod voice;

pub use config::Config;
pub use dialogue::{
    BoundedHistory, ConversationHost, DialogueProviders, DialogueSettings, Emotion, Gesture,
    ListenEvent, ParsedReply, ReplyMode, Role, StreamingSegmenter, Transcript,
    TranscriptionFallback, Turn, TurnOrchestrator, TurnState, parse_reply,
};
pub use error::{Error, Result};
pub use host::LocalHost;
pub use llm::{ChatModel, OpenAiChat};
pub use session::{ActiveSession, FileArchive, Mailer, SessionArchive, SessionLog, SessionMeta};
pub use voice::{AudioCapture, LuxAsr, SpeechSynthesizer, Transcriber, TtsClient, encode_wav};
