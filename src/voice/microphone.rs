//! Microphone feed from the default input device
//!
//! The cpal stream lives on its own thread for the lifetime of the feed.
//! Each callback pushes raw interleaved frames into the [`AudioCapture`]
//! window and a mono copy into a tap used for activity detection.

use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig, SupportedStreamConfigRange};

use super::capture::{AudioCapture, INPUT_CHANNELS};
use crate::{Error, Result};

/// Mono f32 samples shared with the activity detector
pub type SampleTap = Arc<Mutex<Vec<f32>>>;

/// Running microphone stream
pub struct MicrophoneFeed {
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    capture_supported: bool,
}

impl MicrophoneFeed {
    /// Open the default input device and start streaming
    ///
    /// Prefers interleaved stereo 16-bit input, which is fed to `capture`.
    /// Devices without it fall back to mono f32; the tap keeps working but
    /// capture windows stay empty and transcription relies on the host.
    ///
    /// # Errors
    ///
    /// Returns error if no input device or usable configuration exists
    pub fn start(capture: Arc<AudioCapture>, tap: SampleTap, sample_rate: u32) -> Result<Self> {
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<bool>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("microphone".to_string())
            .spawn(move || match open_stream(capture, tap, sample_rate) {
                Ok((stream, capture_supported)) => {
                    let _ = ready_tx.send(Ok(capture_supported));
                    // Park until the feed is dropped
                    let _ = stop_rx.recv();
                    drop(stream);
                    tracing::debug!("microphone stream closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| Error::Audio(format!("failed to spawn microphone thread: {e}")))?;

        let capture_supported = ready_rx
            .recv()
            .map_err(|_| Error::Audio("microphone thread exited early".to_string()))??;

        Ok(Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            capture_supported,
        })
    }

    /// Whether frames reach the capture window
    #[must_use]
    pub const fn capture_supported(&self) -> bool {
        self.capture_supported
    }
}

impl Drop for MicrophoneFeed {
    fn drop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn matches(
    range: &SupportedStreamConfigRange,
    channels: u16,
    format: SampleFormat,
    rate: u32,
) -> bool {
    range.channels() == channels
        && range.sample_format() == format
        && range.min_sample_rate() <= SampleRate(rate)
        && range.max_sample_rate() >= SampleRate(rate)
}

/// Build and start the input stream, returning whether capture is fed
#[allow(clippy::cast_possible_truncation)]
fn open_stream(
    capture: Arc<AudioCapture>,
    tap: SampleTap,
    sample_rate: u32,
) -> Result<(Stream, bool)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

    let ranges: Vec<SupportedStreamConfigRange> = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .collect();

    let err_fn = |err: cpal::StreamError| tracing::error!(error = %err, "audio capture error");

    if let Some(range) = ranges
        .iter()
        .find(|r| matches(r, INPUT_CHANNELS as u16, SampleFormat::I16, sample_rate))
    {
        let config: StreamConfig = range.with_sample_rate(SampleRate(sample_rate)).config();
        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "stereo 16-bit microphone feed"
        );

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let raw: Vec<u8> = data.iter().flat_map(|s| s.to_le_bytes()).collect();
                    capture.on_frame(&raw);

                    if let Ok(mut buf) = tap.lock() {
                        buf.extend(
                            data.chunks_exact(INPUT_CHANNELS)
                                .map(|frame| f32::from(frame[0]) / 32768.0),
                        );
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        return Ok((stream, true));
    }

    let range = ranges
        .iter()
        .find(|r| matches(r, 1, SampleFormat::F32, sample_rate))
        .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;
    let config: StreamConfig = range.with_sample_rate(SampleRate(sample_rate)).config();

    tracing::warn!(
        device = device.name().unwrap_or_default(),
        "no stereo 16-bit input, capture window unsupported"
    );

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = tap.lock() {
                    buf.extend_from_slice(data);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;
    Ok((stream, false))
}
