//! Emotion-tagged reply parsing
//!
//! The model is instructed to close every reply with two tags,
//! `<user_emotion=..>` and `<response_emotion=..>`, and to prefix the spoken
//! text with a language code. This module turns a raw completion into the
//! text the robot should speak plus the two emotions.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Locale every reply is synthesized in
pub const TARGET_LANGUAGE: &str = "lb";

static RESPONSE_EMOTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<response_emotion=(\w+)>").expect("valid regex")
});

static USER_EMOTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<user_emotion=(\w+)>").expect("valid regex"));

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<.*?>").expect("valid regex"));

static LANGUAGE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z]{2,3}:\s*").expect("valid regex"));

/// Affect carried by an emotion tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    #[default]
    Calm,
}

impl Emotion {
    /// Match a tag value case-insensitively
    #[must_use]
    pub fn from_tag(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "happy" => Some(Self::Happy),
            "sad" => Some(Self::Sad),
            "angry" => Some(Self::Angry),
            "calm" => Some(Self::Calm),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "Happy",
            Self::Sad => "Sad",
            Self::Angry => "Angry",
            Self::Calm => "Calm",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the robot says and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// Always [`TARGET_LANGUAGE`]; synthesis supports no other locale
    pub language_code: &'static str,
    pub spoken_text: String,
    pub response_emotion: Emotion,
    /// Perceived affect of the partner, kept for the session log
    pub user_emotion: Emotion,
}

fn extract_emotion(pattern: &Regex, raw: &str) -> Option<Emotion> {
    pattern
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| Emotion::from_tag(m.as_str()))
}

/// The `<response_emotion=..>` tag, if present and recognized
#[must_use]
pub fn response_emotion(raw: &str) -> Option<Emotion> {
    extract_emotion(&RESPONSE_EMOTION, raw)
}

/// Strip tags and a leading language prefix from model output
#[must_use]
pub fn spoken_text(raw: &str) -> String {
    let untagged = ANY_TAG.replace_all(raw, "");
    LANGUAGE_PREFIX
        .replace(untagged.trim(), "")
        .trim()
        .to_string()
}

/// Parse a raw completion
#[must_use]
pub fn parse_reply(raw: &str) -> ParsedReply {
    let response_emotion = response_emotion(raw).unwrap_or_default();
    let user_emotion = extract_emotion(&USER_EMOTION, raw).unwrap_or_default();

    ParsedReply {
        language_code: TARGET_LANGUAGE,
        spoken_text: spoken_text(raw),
        response_emotion,
        user_emotion,
    }
}
