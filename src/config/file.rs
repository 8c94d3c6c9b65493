//! TOML configuration file loading
//!
//! Supports `~/.config/moien/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MoienConfigFile {
    /// Primary transcription provider
    #[serde(default)]
    pub asr: AsrFileConfig,

    /// Host-side transcription used as fallback
    #[serde(default)]
    pub host_asr: HostAsrFileConfig,

    /// Chat model
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech synthesis
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Conversation behaviour
    #[serde(default)]
    pub dialogue: DialogueFileConfig,

    /// Session logging and delivery
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Audio input
    #[serde(default)]
    pub audio: AudioFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct AsrFileConfig {
    /// Transcription endpoint URL
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Accept self-signed certificates from the endpoint
    pub accept_invalid_certs: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HostAsrFileConfig {
    /// OpenAI-compatible `/audio/transcriptions` endpoint
    pub url: Option<String>,
    /// Model name (e.g. "whisper-1")
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Chat completions endpoint URL
    pub url: Option<String>,
    /// Model identifier (e.g. "gpt-5-chat-latest")
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Persona text replacing the built-in one
    pub persona: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Speaking-rate factor
    pub length_scale: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DialogueFileConfig {
    /// Turns kept in the model context
    pub history: Option<usize>,
    /// "complete" or "streaming"
    pub reply_mode: Option<String>,
    /// Open each session with a generated greeting
    pub greet: Option<bool>,
    /// Seconds of silence before listening restarts
    pub listen_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Directory for session logs
    pub log_dir: Option<String>,
    #[serde(default)]
    pub smtp: SmtpFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct SmtpFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Microphone sample rate in Hz
    pub sample_rate: Option<u32>,
}

/// Load the TOML config file from the standard path
///
/// Returns `MoienConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> MoienConfigFile {
    let Some(path) = config_file_path() else {
        return MoienConfigFile::default();
    };

    if !path.exists() {
        return MoienConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config_file(&content).unwrap_or_else(|e| {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config file, using defaults"
            );
            MoienConfigFile::default()
        }),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            MoienConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the contents are not valid TOML for the schema
pub fn parse_config_file(content: &str) -> crate::Result<MoienConfigFile> {
    let config = toml::from_str(content)?;
    tracing::info!("loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/moien/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("moien").join("config.toml"))
}
