//! Session transcripts
//!
//! A [`SessionLog`] is opened when a partner engages and sealed when they
//! leave. Sealing consumes the active log, so a sealed transcript can be
//! archived but never appended to again.

mod archive;
mod mail;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dialogue::Emotion;

pub use archive::{FileArchive, SessionArchive};
pub use mail::{DEFAULT_SMTP_PORT, MailConfig, Mailer};

/// Timestamp format used throughout the transcript
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Pipeline setup recorded with each session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub asr_mode: String,
    pub llm_backend: String,
    pub model: String,
}

/// Who and what a session is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMeta {
    pub participant_id: String,
    pub task_id: String,
    pub pipeline: PipelineInfo,
}

/// Partner side of a logged turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub asr_text: String,
    pub emotion: Emotion,
}

/// Robot side of a logged turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantRecord {
    pub response_text: String,
    pub emotion: Emotion,
}

/// One exchange in the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn_id: String,
    pub timestamp: String,
    pub user: UserRecord,
    pub assistant: AssistantRecord,
}

/// Closing summary written when the session is sealed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub num_turns: usize,
    pub completed: bool,
    pub notes: String,
}

/// Sealed transcript, as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLog {
    pub session_id: String,
    pub participant_id: String,
    pub task_id: String,
    pub config: PipelineInfo,
    pub start_time: String,
    pub end_time: String,
    pub turns: Vec<TurnRecord>,
    pub summary: SessionSummary,
}

impl SessionLog {
    /// Per-session artifact name
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}_task{}_{}.json",
            self.participant_id, self.task_id, self.session_id
        )
    }
}

/// Transcript of the conversation in progress
#[derive(Debug)]
pub struct ActiveSession {
    session_id: String,
    meta: SessionMeta,
    start_time: String,
    turns: Vec<TurnRecord>,
}

impl ActiveSession {
    /// Open a new session
    #[must_use]
    pub fn start(meta: SessionMeta) -> Self {
        let session = Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            start_time: timestamp(Utc::now()),
            meta,
            turns: Vec::new(),
        };

        tracing::info!(
            session_id = %session.session_id,
            participant = %session.meta.participant_id,
            task = %session.meta.task_id,
            "session started"
        );

        session
    }

    /// Append one exchange
    pub fn log_turn(
        &mut self,
        user_text: &str,
        user_emotion: Emotion,
        assistant_text: &str,
        assistant_emotion: Emotion,
    ) {
        self.turns.push(TurnRecord {
            turn_id: uuid::Uuid::new_v4().to_string(),
            timestamp: timestamp(Utc::now()),
            user: UserRecord {
                asr_text: user_text.to_string(),
                emotion: user_emotion,
            },
            assistant: AssistantRecord {
                response_text: assistant_text.to_string(),
                emotion: assistant_emotion,
            },
        });

        tracing::info!(
            user = user_text,
            user_emotion = %user_emotion,
            assistant = assistant_text,
            assistant_emotion = %assistant_emotion,
            "turn logged"
        );
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn turns(&self) -> &[TurnRecord] {
        &self.turns
    }

    /// Close the session with its summary
    #[must_use]
    pub fn seal(self, completed: bool, notes: &str) -> SessionLog {
        let num_turns = self.turns.len();
        tracing::info!(session_id = %self.session_id, turns = num_turns, "session sealed");

        SessionLog {
            session_id: self.session_id,
            participant_id: self.meta.participant_id,
            task_id: self.meta.task_id,
            config: self.meta.pipeline,
            start_time: self.start_time,
            end_time: timestamp(Utc::now()),
            turns: self.turns,
            summary: SessionSummary {
                num_turns,
                completed,
                notes: notes.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> SessionMeta {
        SessionMeta {
            participant_id: "20260219_101500".to_string(),
            task_id: "T1".to_string(),
            pipeline: PipelineInfo {
                asr_mode: "luxasr".to_string(),
                llm_backend: "openai".to_string(),
                model: "gpt-test".to_string(),
            },
        }
    }

    #[test]
    fn test_seal_writes_summary() {
        let mut session = ActiveSession::start(meta());
        session.log_turn("Moien", Emotion::Happy, "Moien! Wéi geet et?", Emotion::Happy);
        session.log_turn("Gutt", Emotion::Calm, "Super.", Emotion::Calm);

        let log = session.seal(true, "User left");

        assert_eq!(log.turns.len(), 2);
        assert_eq!(log.summary.num_turns, 2);
        assert!(log.summary.completed);
        assert_eq!(log.summary.notes, "User left");
        assert_ne!(log.turns[0].turn_id, log.turns[1].turn_id);
    }

    #[test]
    fn test_json_shape() {
        let mut session = ActiveSession::start(meta());
        session.log_turn("Moien", Emotion::Sad, "Oh nee.", Emotion::Calm);
        let log = session.seal(false, "");

        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["participant_id"], "20260219_101500");
        assert_eq!(json["config"]["asr_mode"], "luxasr");
        assert_eq!(json["turns"][0]["user"]["asr_text"], "Moien");
        assert_eq!(json["turns"][0]["user"]["emotion"], "Sad");
        assert_eq!(json["turns"][0]["assistant"]["emotion"], "Calm");
        assert_eq!(json["summary"]["num_turns"], 1);
        assert_eq!(json["summary"]["completed"], false);

        let start = json["start_time"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(start).is_ok());
        assert!(start.ends_with('Z'));
    }

    #[test]
    fn test_file_name() {
        let log = ActiveSession::start(meta()).seal(true, "");

        assert_eq!(
            log.file_name(),
            format!("20260219_101500_taskT1_{}.json", log.session_id)
        );
    }
}
