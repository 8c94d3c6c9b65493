//! Canonical WAV container for mono 16-bit PCM

/// Size of the canonical PCM header
pub const WAV_HEADER_LEN: usize = 44;

/// Wrap mono 16-bit little-endian PCM in a 44-byte RIFF/WAVE header
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn encode_wav(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let data_size = pcm.len() as u32;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_size).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16_u32.to_le_bytes());
    out.extend_from_slice(&1_u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1_u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2_u16.to_le_bytes());
    out.extend_from_slice(&16_u16.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    out.extend_from_slice(pcm);

    out
}

/// Convert f32 samples in [-1.0, 1.0] to 16-bit little-endian PCM
#[must_use]
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            sample_i16.to_le_bytes()
        })
        .collect()
}
