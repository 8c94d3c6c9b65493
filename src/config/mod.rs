//! Configuration management for the dialogue loop
//!
//! Values are layered env > `config.toml` > defaults.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::dialogue::{DialogueSettings, ReplyMode};
use crate::session::{MailConfig, PipelineInfo, SessionMeta};
use crate::voice::SAMPLE_RATE;

use file::MoienConfigFile;

pub const DEFAULT_ASR_URL: &str = "https://luxasr.uni.lu/v2/asr";
pub const DEFAULT_LLM_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "gpt-5-chat-latest";
pub const DEFAULT_HOST_ASR_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
pub const DEFAULT_HOST_ASR_MODEL: &str = "whisper-1";
pub const DEFAULT_TTS_URL: &str = "http://localhost:5000/tts";
pub const DEFAULT_TASK_ID: &str = "T_UNKNOWN";

/// Dialogue loop configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Primary transcription (`LuxASR`)
    pub asr: AsrConfig,

    /// Host-side transcription used when the primary yields nothing
    pub host_asr: HostAsrConfig,

    /// Chat model
    pub llm: LlmConfig,

    /// Speech synthesis
    pub tts: TtsConfig,

    /// Turn-taking behaviour
    pub dialogue: DialogueConfig,

    /// Session logging
    pub session: SessionConfig,

    /// Microphone sample rate in Hz
    pub sample_rate: u32,
}

#[derive(Debug, Clone)]
pub struct AsrConfig {
    pub url: String,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone)]
pub struct HostAsrConfig {
    pub url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
    pub persona: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub url: String,
    pub timeout: Duration,
    pub length_scale: f64,
}

#[derive(Debug, Clone)]
pub struct DialogueConfig {
    pub history: usize,
    pub reply_mode: ReplyMode,
    pub greet: bool,
    /// How long the local host listens before reporting silence
    pub listen_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub log_dir: PathBuf,
    pub participant_id: String,
    pub task_id: String,
    /// Present only when every required SMTP setting is
    pub mail: Option<MailConfig>,
}

impl Config {
    /// Load configuration from the environment and the config file
    #[must_use]
    pub fn load() -> Self {
        Self::resolve(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Layer `env` over `fc` over defaults
    pub fn resolve(fc: MoienConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str, file: Option<u64>, default: u64| {
            Duration::from_secs(parsed(&env, key).or(file).unwrap_or(default))
        };

        let asr = AsrConfig {
            url: env("MOIEN_ASR_URL")
                .or(fc.asr.url)
                .unwrap_or_else(|| DEFAULT_ASR_URL.to_string()),
            timeout: secs("MOIEN_ASR_TIMEOUT_SECS", fc.asr.timeout_secs, 15),
            accept_invalid_certs: flag(&env, "MOIEN_ASR_INSECURE")
                .or(fc.asr.accept_invalid_certs)
                .unwrap_or(false),
        };

        let host_asr = HostAsrConfig {
            url: env("MOIEN_HOST_ASR_URL")
                .or(fc.host_asr.url)
                .unwrap_or_else(|| DEFAULT_HOST_ASR_URL.to_string()),
            model: env("MOIEN_HOST_ASR_MODEL")
                .or(fc.host_asr.model)
                .unwrap_or_else(|| DEFAULT_HOST_ASR_MODEL.to_string()),
        };

        let llm = LlmConfig {
            url: env("MOIEN_LLM_URL")
                .or(fc.llm.url)
                .unwrap_or_else(|| DEFAULT_LLM_URL.to_string()),
            model: env("MOIEN_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            api_key: env("OPENAI_API_KEY")
                .or(fc.llm.api_key)
                .filter(|key| !key.is_empty())
                .map(SecretString::from),
            timeout: secs("MOIEN_LLM_TIMEOUT_SECS", fc.llm.timeout_secs, 15),
            persona: env("MOIEN_PERSONA").or(fc.llm.persona),
        };

        let tts = TtsConfig {
            url: env("MOIEN_TTS_URL")
                .or(fc.tts.url)
                .unwrap_or_else(|| DEFAULT_TTS_URL.to_string()),
            timeout: secs("MOIEN_TTS_TIMEOUT_SECS", fc.tts.timeout_secs, 10),
            length_scale: parsed(&env, "MOIEN_TTS_LENGTH_SCALE")
                .or(fc.tts.length_scale)
                .unwrap_or(1.0),
        };

        let reply_mode = env("MOIEN_REPLY_MODE")
            .or(fc.dialogue.reply_mode)
            .and_then(|mode| {
                mode.parse::<ReplyMode>()
                    .inspect_err(|e| tracing::warn!(error = %e, "ignoring reply mode"))
                    .ok()
            })
            .unwrap_or_default();

        let dialogue = DialogueConfig {
            history: parsed(&env, "MOIEN_HISTORY")
                .or(fc.dialogue.history)
                .unwrap_or(10),
            reply_mode,
            greet: flag(&env, "MOIEN_GREET")
                .or(fc.dialogue.greet)
                .unwrap_or(false),
            listen_timeout: secs(
                "MOIEN_LISTEN_TIMEOUT_SECS",
                fc.dialogue.listen_timeout_secs,
                8,
            ),
        };

        let smtp = fc.session.smtp;
        let mail = match (
            env("MOIEN_SMTP_HOST").or(smtp.host),
            env("MOIEN_SMTP_USERNAME").or(smtp.username),
            env("MOIEN_SMTP_PASSWORD").or(smtp.password),
            env("MOIEN_SMTP_TO").or(smtp.to),
        ) {
            (Some(host), Some(username), Some(password), Some(to)) => Some(MailConfig {
                host,
                port: parsed(&env, "MOIEN_SMTP_PORT")
                    .or(smtp.port)
                    .unwrap_or(crate::session::DEFAULT_SMTP_PORT),
                from: env("MOIEN_SMTP_FROM")
                    .or(smtp.from)
                    .unwrap_or_else(|| username.clone()),
                username,
                password: SecretString::from(password),
                to,
            }),
            _ => None,
        };

        let session = SessionConfig {
            log_dir: env("MOIEN_LOG_DIR")
                .or(fc.session.log_dir)
                .map_or_else(default_log_dir, PathBuf::from),
            participant_id: env("PARTICIPANT_ID").unwrap_or_else(|| {
                chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
            }),
            task_id: env("TASK_ID").unwrap_or_else(|| DEFAULT_TASK_ID.to_string()),
            mail,
        };

        Self {
            asr,
            host_asr,
            llm,
            tts,
            dialogue,
            session,
            sample_rate: parsed(&env, "MOIEN_SAMPLE_RATE")
                .or(fc.audio.sample_rate)
                .unwrap_or(SAMPLE_RATE),
        }
    }

    /// Orchestrator tunables
    #[must_use]
    pub fn dialogue_settings(&self) -> DialogueSettings {
        DialogueSettings {
            history_capacity: self.dialogue.history,
            reply_mode: self.dialogue.reply_mode,
            greet: self.dialogue.greet,
            length_scale: self.tts.length_scale,
            llm_timeout: self.llm.timeout,
            tts_timeout: self.tts.timeout,
        }
    }

    /// Metadata recorded with every session
    #[must_use]
    pub fn session_meta(&self) -> SessionMeta {
        SessionMeta {
            participant_id: self.session.participant_id.clone(),
            task_id: self.session.task_id.clone(),
            pipeline: PipelineInfo {
                asr_mode: "luxasr".to_string(),
                llm_backend: "openai".to_string(),
                model: self.llm.model.clone(),
            },
        }
    }
}

/// Session logs live under `~/.local/share/moien/logs` on Linux
fn default_log_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("logs"),
        |d| d.data_dir().join("moien").join("logs"),
    )
}

fn parsed<T: std::str::FromStr>(env: impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = env(key)?;
    let parsed = value.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!(key, value = %value, "ignoring unparsable setting");
    }
    parsed
}

fn flag(env: impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    env(key).map(|value| {
        matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}
