//! Language-model access
//!
//! The orchestrator talks to the model through [`ChatModel`]; the only
//! shipped implementation speaks the `OpenAI` chat completions protocol.

mod openai;
pub mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::Result;
use crate::dialogue::Turn;

pub use openai::OpenAiChat;
pub use sse::{SseDecoder, SseEvent};

/// Content fragments of a streamed reply, in arrival order
pub type DeltaStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// A chat model conditioned on a fixed system instruction
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Request a full reply to the conversation so far
    ///
    /// # Errors
    ///
    /// Returns error if the provider call fails
    async fn complete(&self, history: &[Turn]) -> Result<String>;

    /// Request a reply as a stream of content fragments
    ///
    /// The stream ends at the provider's end marker or when the connection
    /// closes; undecodable events are skipped.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be started
    async fn stream(&self, history: &[Turn]) -> Result<DeltaStream>;

    /// Request a one-line opening greeting
    ///
    /// # Errors
    ///
    /// Returns error if the provider call fails or the reply is unusable
    async fn greeting(&self) -> Result<String>;

    /// Model identifier, recorded in session logs
    fn model(&self) -> &str;
}
