//! Persistence of sealed session logs

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{Mailer, SessionLog};
use crate::Result;

/// Destination for sealed transcripts
#[async_trait]
pub trait SessionArchive: Send + Sync {
    /// Persist a sealed log
    ///
    /// # Errors
    ///
    /// Returns error if the log cannot be written
    async fn store(&self, log: &SessionLog) -> Result<()>;
}

/// Writes one pretty-printed JSON file per session, then optionally emails it
pub struct FileArchive {
    dir: PathBuf,
    mailer: Option<Mailer>,
}

impl FileArchive {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, mailer: Option<Mailer>) -> Self {
        Self {
            dir: dir.into(),
            mailer,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl SessionArchive for FileArchive {
    async fn store(&self, log: &SessionLog) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let body = serde_json::to_vec_pretty(log)?;
        let path = self.dir.join(log.file_name());
        tokio::fs::write(&path, &body).await?;

        tracing::info!(path = %path.display(), "session log saved");

        // Delivery is best effort; the file on disk is the record
        if let Some(mailer) = &self.mailer
            && let Err(e) = mailer.send(log, body).await
        {
            tracing::warn!(error = %e, "failed to email session log");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::Emotion;
    use crate::session::{ActiveSession, MailConfig, PipelineInfo, SessionMeta};
    use secrecy::SecretString;

    #[tokio::test]
    async fn test_store_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FileArchive::new(dir.path().join("logs"), None);

        let mut session = ActiveSession::start(SessionMeta {
            participant_id: "p7".to_string(),
            task_id: "T_UNKNOWN".to_string(),
            pipeline: PipelineInfo {
                asr_mode: "luxasr".to_string(),
                llm_backend: "openai".to_string(),
                model: "m".to_string(),
            },
        });
        session.log_turn("Moien", Emotion::Calm, "Moien!", Emotion::Happy);
        let log = session.seal(true, "User left");

        tokio_test::assert_ok!(archive.store(&log).await);

        let path = archive.dir().join(log.file_name());
        let stored: SessionLog =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(stored, log);
    }

    #[tokio::test]
    async fn test_store_survives_unreachable_relay() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = Mailer::new(MailConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "robot".to_string(),
            password: SecretString::from("secret"),
            from: "robot@example.org".to_string(),
            to: "lab@example.org".to_string(),
        });
        let archive = FileArchive::new(dir.path(), Some(mailer));

        let mut session = ActiveSession::start(SessionMeta {
            participant_id: "p9".to_string(),
            task_id: "T2".to_string(),
            pipeline: PipelineInfo {
                asr_mode: "luxasr".to_string(),
                llm_backend: "openai".to_string(),
                model: "m".to_string(),
            },
        });
        session.log_turn("Moien", Emotion::Happy, "Moien!", Emotion::Happy);
        let log = session.seal(true, "User left");

        tokio_test::assert_ok!(archive.store(&log).await);
        assert!(archive.dir().join(log.file_name()).exists());
    }

    #[tokio::test]
    async fn test_store_fails_when_dir_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let archive = FileArchive::new(blocker, None);
        let log = ActiveSession::start(SessionMeta {
            participant_id: "p8".to_string(),
            task_id: "T1".to_string(),
            pipeline: PipelineInfo {
                asr_mode: "luxasr".to_string(),
                llm_backend: "openai".to_string(),
                model: "m".to_string(),
            },
        })
        .seal(true, "User left");

        tokio_test::assert_err!(archive.store(&log).await);
    }
}
