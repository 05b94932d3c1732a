//! WAV export
//!
//! Serializes a `SampleBuffer` into a canonical 44-byte-header RIFF/WAVE
//! stream with 16-bit little-endian PCM samples.

use std::path::Path;

use tracing::info;

use crate::config::DEFAULT_EXPORT_FILE_NAME;
use crate::engine::buffer::SampleBuffer;
use crate::error::{Result, StudioError};

/// Size of the RIFF + fmt + data headers
pub const WAV_HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u16 = BITS_PER_SAMPLE / 8;
const PCM_FORMAT: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// Convert a float sample to signed 16-bit PCM
///
/// Negative values scale by 32768 and positive values by 32767, so -1.0 maps
/// to -32768 and +1.0 to 32767 without overflow.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0).round() as i16
    } else {
        (s * 32767.0).round() as i16
    }
}

/// 16-bit PCM WAV encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder;

impl WavEncoder {
    /// Encode the buffer as a complete WAV file
    ///
    /// # Errors
    /// * `InvalidBuffer` - channel count or data size does not fit the WAV
    ///   header fields
    pub fn encode(&self, buffer: &SampleBuffer) -> Result<Vec<u8>> {
        let num_channels =
            u16::try_from(buffer.channel_count()).map_err(|_| StudioError::InvalidBuffer {
                reason: format!("{} channels exceed the WAV limit", buffer.channel_count()),
            })?;
        let block_align = num_channels
            .checked_mul(BYTES_PER_SAMPLE)
            .ok_or_else(|| StudioError::InvalidBuffer {
                reason: format!("{} channels exceed the WAV limit", num_channels),
            })?;

        let data_size = (buffer.frame_count() as u64)
            .checked_mul(u64::from(block_align))
            .and_then(|size| u32::try_from(size).ok())
            .filter(|size| size.checked_add(36).is_some())
            .ok_or_else(|| StudioError::InvalidBuffer {
                reason: format!(
                    "{} frames x {} channels exceed the 4 GiB WAV limit",
                    buffer.frame_count(),
                    num_channels
                ),
            })?;

        let sample_rate = buffer.sample_rate();
        let byte_rate = sample_rate
            .checked_mul(u32::from(block_align))
            .ok_or_else(|| StudioError::InvalidBuffer {
                reason: format!("byte rate overflows at {} Hz", sample_rate),
            })?;

        let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_size as usize);

        // RIFF chunk descriptor
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_size).to_le_bytes());
        out.extend_from_slice(b"WAVE");

        // fmt sub-chunk
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        out.extend_from_slice(&PCM_FORMAT.to_le_bytes());
        out.extend_from_slice(&num_channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

        // data sub-chunk
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_size.to_le_bytes());

        for frame in 0..buffer.frame_count() {
            for channel in buffer.channels() {
                out.extend_from_slice(&sample_to_i16(channel[frame]).to_le_bytes());
            }
        }

        debug_assert_eq!(out.len(), WAV_HEADER_LEN + data_size as usize);
        Ok(out)
    }
}

/// Encode and write a buffer to disk
pub fn write_wav(path: &Path, buffer: &SampleBuffer) -> Result<()> {
    let bytes = WavEncoder.encode(buffer)?;
    std::fs::write(path, &bytes)?;
    info!(
        path = %path.display(),
        bytes = bytes.len(),
        frames = buffer.frame_count(),
        "exported WAV"
    );
    Ok(())
}

/// Derive the export file name from the source name
///
/// Any existing extension is replaced with `.wav`; an empty name falls back
/// to `edited_audio.wav`.
pub fn export_file_name(source_name: &str) -> String {
    let name = Path::new(source_name.trim())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.is_empty() {
        return DEFAULT_EXPORT_FILE_NAME.to_string();
    }

    let stem = Path::new(&name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(name);
    format!("{}.wav", stem)
}

// ============================================================================
// Tests
// ============================================================================
