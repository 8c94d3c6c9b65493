//! End-of-utterance detection
//!
//! Energy-based voice activity detection used by the local host to decide
//! when the partner has finished speaking. A robot platform provides this
//! signal itself.

/// Minimum RMS energy to consider a chunk speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum speech length to count as an utterance (0.3 s at 16 kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence that ends an utterance (0.8 s at 16 kHz)
const SILENCE_SAMPLES: usize = 12_800;

/// State of the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Idle,
    /// Speech detected, accumulating until trailing silence
    Speaking,
}

/// Detects the end of a spoken utterance in a mono sample stream
pub struct UtteranceDetector {
    state: DetectorState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceDetector {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: DetectorState::Idle,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Process a chunk of samples
    ///
    /// Returns true once enough speech has been followed by enough silence.
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            DetectorState::Idle => {
                if is_speech {
                    self.state = DetectorState::Speaking;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected");
                }
            }
            DetectorState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.is_utterance_complete() {
                    tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                    return true;
                }

                // Too much silence without enough speech: a cough or a click
                if self.silence_counter > SILENCE_SAMPLES * 2 {
                    tracing::trace!("speech too short, resetting");
                    self.reset();
                }
            }
        }

        false
    }

    /// Speech followed by trailing silence has been seen
    #[must_use]
    pub fn is_utterance_complete(&self) -> bool {
        self.state == DetectorState::Speaking
            && self.silence_counter > SILENCE_SAMPLES
            && self.speech_buffer.len() > MIN_SPEECH_SAMPLES
    }

    /// Samples of the current utterance
    #[must_use]
    pub fn speech_buffer(&self) -> &[f32] {
        &self.speech_buffer
    }

    /// Take the utterance samples and return to idle
    pub fn take_speech_buffer(&mut self) -> Vec<f32> {
        let samples = std::mem::take(&mut self.speech_buffer);
        self.reset();
        samples
    }

    /// Return to idle, dropping any partial utterance
    pub fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }

    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }
}

/// RMS energy of audio samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
