//! Audio in and out, plus the speech providers
//!
//! Capture and endpointing run locally; transcription and synthesis are
//! remote HTTP services behind the [`Transcriber`] and
//! [`SpeechSynthesizer`] traits.

mod capture;
mod endpoint;
mod microphone;
mod playback;
mod stt;
mod tts;
mod wav;

/// Capture rate expected by the transcription providers
pub const SAMPLE_RATE: u32 = 16000;

pub use capture::{AudioCapture, BYTES_PER_SAMPLE, INPUT_CHANNELS, extract_first_channel};
pub use endpoint::{DetectorState, UtteranceDetector, calculate_energy};
pub use microphone::{MicrophoneFeed, SampleTap};
pub use playback::AudioPlayback;
pub use stt::{LuxAsr, Transcriber, Whisper, strip_diarization};
pub use tts::{SpeechRequest, SpeechSynthesizer, TtsClient};
pub use wav::{WAV_HEADER_LEN, encode_wav, f32_to_pcm16};
