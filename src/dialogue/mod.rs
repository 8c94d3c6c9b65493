//! Conversation logic
//!
//! Pure pieces (history, reply parsing, sentence segmentation) plus the
//! orchestrator that strings them together with the providers.

mod history;
mod orchestrator;
pub mod prompt;
mod reply;
mod segmenter;
mod transcription;

pub use history::{BoundedHistory, Role, Turn};
pub use orchestrator::{
    ConversationHost, DialogueProviders, DialogueSettings, Gesture, ListenEvent, ReplyMode,
    TurnOrchestrator, TurnState,
};
pub use reply::{
    Emotion, ParsedReply, TARGET_LANGUAGE, parse_reply, response_emotion, spoken_text,
};
pub use segmenter::{Segmented, StreamingSegmenter};
pub use transcription::{Transcript, TranscriptionFallback};
