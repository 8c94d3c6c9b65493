//! `OpenAI`-compatible chat completions client

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::sse::{SseDecoder, SseEvent};
use super::{ChatModel, DeltaStream};
use crate::dialogue::Turn;
use crate::dialogue::prompt::{GREETING_PROMPT, GREETING_REQUEST};
use crate::{Error, Result};

/// Token cap for streamed replies
const STREAM_MAX_TOKENS: u32 = 500;

/// Token cap for the greeting
const GREETING_MAX_TOKENS: u32 = 200;

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat client with a fixed system prompt
pub struct OpenAiChat {
    client: reqwest::Client,
    url: String,
    api_key: Option<SecretString>,
    model: String,
    system_prompt: String,
}

impl OpenAiChat {
    /// Create a chat client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        url: String,
        api_key: Option<SecretString>,
        model: String,
        system_prompt: String,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.is_none() {
            tracing::warn!(url = %url, "no API key configured for chat completions");
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url,
            api_key,
            model,
            system_prompt,
        })
    }

    /// System prompt followed by the conversation
    fn messages<'a>(&'a self, history: &'a [Turn]) -> Vec<Message<'a>> {
        std::iter::once(Message {
            role: "system",
            content: &self.system_prompt,
        })
        .chain(history.iter().map(|turn| Message {
            role: turn.role.as_str(),
            content: &turn.content,
        }))
        .collect()
    }

    async fn send(&self, request: &ChatCompletionRequest<'_>) -> Result<reqwest::Response> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }
        if request.stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(error = %e, "chat request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(Error::Llm(format!("chat API error {status}: {body}")));
        }

        Ok(response)
    }

    async fn complete_messages(
        &self,
        messages: Vec<Message<'_>>,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            stream: false,
            max_tokens,
        };

        let result: ChatCompletionResponse = self.send(&request).await?.json().await?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| Error::Llm("no choices in response".to_string()))
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, history: &[Turn]) -> Result<String> {
        if let Some(last) = history.iter().rev().find(|t| t.role == crate::dialogue::Role::User) {
            tracing::debug!(transcript = %last.content, "requesting reply");
        }

        let reply = self.complete_messages(self.messages(history), None).await?;
        tracing::debug!(reply = %reply, "model replied");
        Ok(reply)
    }

    async fn stream(&self, history: &[Turn]) -> Result<DeltaStream> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: self.messages(history),
            stream: true,
            max_tokens: Some(STREAM_MAX_TOKENS),
        };

        let response = self.send(&request).await?;
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(decode_deltas(body))
    }

    async fn greeting(&self) -> Result<String> {
        let messages = vec![
            Message {
                role: "system",
                content: GREETING_PROMPT,
            },
            Message {
                role: "user",
                content: GREETING_REQUEST,
            },
        ];

        self.complete_messages(messages, Some(GREETING_MAX_TOKENS)).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}

struct DeltaState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    finished: bool,
}

impl DeltaState {
    /// Queue deltas; returns true once the end marker is seen
    fn accept(&mut self, events: impl IntoIterator<Item = SseEvent>) -> bool {
        for event in events {
            match event {
                SseEvent::Delta(text) => self.ready.push_back(text),
                SseEvent::Done => return true,
            }
        }
        false
    }
}

/// Turn a raw SSE body into content fragments
fn decode_deltas(body: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> DeltaStream {
    let state = DeltaState {
        body,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.ready.pop_front() {
                return Some((delta, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.push(&bytes);
                    state.finished = state.accept(events);
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "chat stream interrupted");
                    state.finished = true;
                }
                None => {
                    let tail = state.decoder.finish();
                    state.accept(tail);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(chunks: Vec<&'static str>) -> BoxStream<'static, reqwest::Result<Vec<u8>>> {
        futures::stream::iter(chunks.into_iter().map(|c| Ok(c.as_bytes().to_vec()))).boxed()
    }

    #[tokio::test]
    async fn test_stream_stops_at_done() {
        let deltas: Vec<String> = decode_deltas(body(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Moien. \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Wéi \"}}]}\n\ndata: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        ]))
        .collect()
        .await;

        assert_eq!(deltas, vec!["Moien. ", "Wéi "]);
    }

    #[tokio::test]
    async fn test_stream_ends_on_close_without_done() {
        let deltas: Vec<String> = decode_deltas(body(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"geet\"}}]}\n",
            "data: garbage\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" et?\"}}]}",
        ]))
        .collect()
        .await;

        assert_eq!(deltas, vec!["geet", " et?"]);
    }

    #[test]
    fn test_request_wire_format() {
        let chat = OpenAiChat::new(
            "http://localhost".to_string(),
            None,
            "test-model".to_string(),
            "be brief".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        let history = vec![Turn::user("Moien"), Turn::assistant("Moien!")];

        let request = ChatCompletionRequest {
            model: chat.model(),
            messages: chat.messages(&history),
            stream: false,
            max_tokens: None,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "model": "test-model",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "Moien"},
                    {"role": "assistant", "content": "Moien!"}
                ]
            })
        );
    }
}
