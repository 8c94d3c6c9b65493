//! Sentence segmentation of a streamed completion
//!
//! Deltas from a streaming chat completion are accumulated until a
//! sentence-terminal character followed by whitespace shows up. The first
//! complete sentence is released right away so synthesis can start before
//! the model has finished.

/// Characters that end a speakable unit
const TERMINALS: [char; 3] = ['.', '!', '?'];

/// Output of [`StreamingSegmenter::finish`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmented {
    /// Unterminated text left when the stream ended, if any
    pub tail: Option<String>,
    /// Every fragment received, concatenated
    pub full_text: String,
}

/// Incremental sentence splitter for one streamed response
#[derive(Debug, Default)]
pub struct StreamingSegmenter {
    full: String,
    pending: String,
}

impl StreamingSegmenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one delta, returning a completed sentence if one is now available
    ///
    /// At most one sentence is released per call; further terminals stay in
    /// the pending buffer until the next delta or the end of the stream.
    pub fn push(&mut self, fragment: &str) -> Option<String> {
        self.full.push_str(fragment);
        self.pending.push_str(fragment);

        if !has_boundary(&self.pending) {
            return None;
        }

        let split = self.pending.find(TERMINALS)?;
        // Terminals are ASCII, so split + 1 is a char boundary
        if split + 1 >= self.pending.len() {
            return None;
        }

        let sentence = self.pending[..=split].trim().to_string();
        self.pending = self.pending[split + 1..].trim().to_string();

        if sentence.is_empty() {
            None
        } else {
            tracing::trace!(sentence = %sentence, "sentence ready");
            Some(sentence)
        }
    }

    /// Text received but not yet released
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Text received so far
    #[must_use]
    pub fn full_text(&self) -> &str {
        &self.full
    }

    /// Close the stream, releasing any non-blank remainder
    #[must_use]
    pub fn finish(self) -> Segmented {
        let tail = self.pending.trim();
        Segmented {
            tail: (!tail.is_empty()).then(|| tail.to_string()),
            full_text: self.full,
        }
    }
}

/// A terminal followed by whitespace somewhere in `text`
fn has_boundary(text: &str) -> bool {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if TERMINALS.contains(&c) && chars.peek().is_some_and(|n| n.is_whitespace()) {
            return true;
        }
    }
    false
}
