//! Email delivery of sealed session logs

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};

use super::SessionLog;
use crate::{Error, Result};

/// Default submission port (STARTTLS)
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP relay and addressing for log delivery
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from: String,
    pub to: String,
}

/// Sends sealed logs as email attachments
#[derive(Debug, Clone)]
pub struct Mailer {
    config: MailConfig,
}

impl Mailer {
    #[must_use]
    pub const fn new(config: MailConfig) -> Self {
        Self { config }
    }

    /// Build the message for a sealed log
    ///
    /// # Errors
    ///
    /// Returns error if an address does not parse or the message cannot be assembled
    pub fn compose(&self, log: &SessionLog, body: Vec<u8>) -> Result<Message> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e| Error::Mail(format!("invalid sender address: {e}")))?;
        let to: Mailbox = self
            .config
            .to
            .parse()
            .map_err(|e| Error::Mail(format!("invalid recipient address: {e}")))?;

        let file_name = log.file_name();
        let summary = format!(
            "Participant: {}\nTask: {}\nTurns: {}\n\nFull log attached.",
            log.participant_id, log.task_id, log.summary.num_turns
        );
        let json = ContentType::parse("application/json")
            .map_err(|e| Error::Mail(format!("content type: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(format!("Session log: {file_name}"))
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(summary))
                    .singlepart(Attachment::new(file_name).body(body, json)),
            )
            .map_err(|e| Error::Mail(e.to_string()))
    }

    /// Send a sealed log with its serialized body attached
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or the relay rejects it
    pub async fn send(&self, log: &SessionLog, body: Vec<u8>) -> Result<()> {
        let message = self.compose(log, body)?;
        let config = self.config.clone();

        // lettre's sync transport blocks on the socket
        tokio::task::spawn_blocking(move || {
            let transport = SmtpTransport::starttls_relay(&config.host)
                .map_err(|e| Error::Mail(e.to_string()))?
                .port(config.port)
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.expose_secret().to_string(),
                ))
                .build();

            transport
                .send(&message)
                .map_err(|e| Error::Mail(e.to_string()))?;

            tracing::info!(to = %config.to, "session log emailed");
            Ok(())
        })
        .await
        .map_err(|e| Error::Mail(format!("mail task failed: {e}")))?
    }
}
