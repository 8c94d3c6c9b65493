//! Capture-window accumulation of microphone frames
//!
//! The microphone delivers interleaved stereo 16-bit PCM on its own thread
//! while the turn state machine opens and closes capture windows. Flag and
//! buffer share one lock, so a frame racing a window boundary lands either
//! entirely inside the window or entirely outside it.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Interleaved channels expected from the feed
pub const INPUT_CHANNELS: usize = 2;

/// Bytes per 16-bit sample
pub const BYTES_PER_SAMPLE: usize = 2;

/// Bytes in one interleaved sample group
const FRAME_BYTES: usize = INPUT_CHANNELS * BYTES_PER_SAMPLE;

#[derive(Debug, Default)]
struct Window {
    capturing: bool,
    pcm: Vec<u8>,
}

/// Accumulates the first channel of interleaved frames while a window is open
///
/// Input must be 2-channel, 16-bit little-endian PCM.
#[derive(Debug, Default)]
pub struct AudioCapture {
    window: Mutex<Window>,
}

impl AudioCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a capture window, discarding anything left from a previous one
    pub fn start(&self) {
        let mut window = self.lock();
        window.pcm.clear();
        window.capturing = true;
        tracing::trace!("capture window opened");
    }

    /// Deliver one raw frame from the feed
    pub fn on_frame(&self, raw: &[u8]) {
        let mut window = self.lock();
        if !window.capturing {
            return;
        }
        extract_first_channel(raw, &mut window.pcm);
    }

    /// Close the window and hand over the mono PCM it collected
    #[must_use]
    pub fn stop(&self) -> Vec<u8> {
        let mut window = self.lock();
        window.capturing = false;
        let pcm = std::mem::take(&mut window.pcm);
        tracing::debug!(bytes = pcm.len(), "capture window closed");
        pcm
    }

    /// Close the window and drop its contents
    pub fn halt(&self) {
        let mut window = self.lock();
        window.capturing = false;
        window.pcm.clear();
    }

    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.lock().capturing
    }
}

/// Append the first channel of each complete sample group to `out`
///
/// A trailing incomplete group is ignored.
pub fn extract_first_channel(raw: &[u8], out: &mut Vec<u8>) {
    out.reserve(raw.len() / INPUT_CHANNELS);
    for group in raw.chunks_exact(FRAME_BYTES) {
        out.extend_from_slice(&group[..BYTES_PER_SAMPLE]);
    }
}
