//! Audio input for WaveStudio
//!
//! Validates raw uploads before any decoding is attempted, then hands the
//! bytes to an `AudioDecoder`. The crate ships a WAV decoder built on `hound`;
//! compressed formats plug in through the same trait.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader};
use tracing::{debug, info};

use crate::config::InputConfig;
use crate::engine::buffer::SampleBuffer;
use crate::error::{Result, StudioError};

/// Raw file contents as received from the host loader
#[derive(Debug, Clone)]
pub struct AudioInput {
    /// Original file name, used to derive the export name
    pub name: String,
    /// MIME type reported by the host (e.g. "audio/wav")
    pub mime_type: String,
    /// File contents
    pub bytes: Vec<u8>,
}

impl AudioInput {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, inferring the MIME type from its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_type_for_extension(path).to_string();
        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }

    /// Size of the payload in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Map common audio extensions to MIME types
fn mime_type_for_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "wav" | "wave" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" | "aac" => "audio/aac",
        _ => "application/octet-stream",
    }
}

/// Check MIME type and size limits
///
/// The type check runs first, so an oversized non-audio file reports
/// `InvalidInputType`.
///
/// # Errors
/// * `InvalidInputType` - MIME type does not contain the required fragment
/// * `FileTooLarge` - payload exceeds the configured byte limit
pub fn validate_input(input: &AudioInput, config: &InputConfig) -> Result<()> {
    if !input.mime_type.contains(&config.required_mime_fragment) {
        return Err(StudioError::InvalidInputType {
            mime_type: input.mime_type.clone(),
        });
    }

    if input.size() > config.max_bytes {
        return Err(StudioError::FileTooLarge {
            size: input.size(),
            limit: config.max_bytes,
        });
    }

    Ok(())
}

/// Decoder seam: turns raw file bytes into a `SampleBuffer`
pub trait AudioDecoder {
    /// Decode the payload
    ///
    /// # Errors
    /// * `DecodeError` - if the bytes cannot be parsed
    fn decode(&self, bytes: &[u8]) -> Result<SampleBuffer>;
}

/// Validate then decode an upload
pub fn load_input(
    input: &AudioInput,
    decoder: &dyn AudioDecoder,
    config: &InputConfig,
) -> Result<SampleBuffer> {
    validate_input(input, config)?;

    let buffer = decoder.decode(&input.bytes)?;
    info!(
        name = %input.name,
        channels = buffer.channel_count(),
        frames = buffer.frame_count(),
        sample_rate = buffer.sample_rate(),
        "audio loaded"
    );
    Ok(buffer)
}

/// WAV decoder backed by `hound`
///
/// Supports 8/16/24/32-bit integer PCM and 32-bit float. The source sample
/// rate is kept as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<SampleBuffer> {
        let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| StudioError::DecodeError {
            reason: format!("Failed to parse WAV header: {}", e),
            source: Some(Box::new(e)),
        })?;

        let spec = reader.spec();
        debug!(
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            bits = spec.bits_per_sample,
            "decoding WAV"
        );

        if spec.channels == 0 {
            return Err(StudioError::DecodeError {
                reason: "WAV header declares zero channels".to_string(),
                source: None,
            });
        }

        let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
        let usable = interleaved.len() - interleaved.len() % spec.channels as usize;

        SampleBuffer::from_interleaved(
            &interleaved[..usable],
            spec.channels as usize,
            spec.sample_rate,
        )
        .map_err(|e| StudioError::DecodeError {
            reason: e.to_string(),
            source: Some(Box::new(e)),
        })
    }
}

/// Read samples from a WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    fn decode_err(bits: &str, e: hound::Error) -> StudioError {
        StudioError::DecodeError {
            reason: format!("Failed to read {} samples: {}", bits, e),
            source: Some(Box::new(e)),
        }
    }

    match (sample_format, bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| decode_err("float", e)),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| f32::from(v) / 128.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| decode_err("8-bit", e)),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| f32::from(v) / 32768.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| decode_err("16-bit", e)),
        // 24-bit stored as i32 in hound
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8_388_608.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| decode_err("24-bit", e)),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2_147_483_648.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| decode_err("32-bit", e)),
        (format, bits) => Err(StudioError::DecodeError {
            reason: format!("unsupported WAV encoding: {:?} {}-bit", format, bits),
            source: None,
        }),
    }
}

/// Generate a mono sine test tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> SampleBuffer {
    generate_tone_channels(&[frequency], duration_secs, sample_rate)
}

/// Generate a stereo test tone with a different frequency per channel
pub fn generate_stereo_test_tone(
    freq_left: f32,
    freq_right: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> SampleBuffer {
    generate_tone_channels(&[freq_left, freq_right], duration_secs, sample_rate)
}

fn generate_tone_channels(frequencies: &[f32], duration_secs: f32, sample_rate: u32) -> SampleBuffer {
    let sample_rate = sample_rate.max(1);
    let num_frames = (duration_secs.max(0.0) * sample_rate as f32) as usize;
    let mut channels: Vec<Vec<f32>> = frequencies
        .iter()
        .map(|&freq| {
            let angular = 2.0 * std::f32::consts::PI * freq / sample_rate as f32;
            (0..num_frames).map(|i| (angular * i as f32).sin()).collect()
        })
        .collect();
    if channels.is_empty() {
        channels.push(vec![0.0; num_frames]);
    }

    SampleBuffer::from_parts(channels, sample_rate)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn wav_bytes(spec: WavSpec, samples: &[i32]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                match spec.bits_per_sample {
                    8 => writer.write_sample(s as i8).unwrap(),
                    16 => writer.write_sample(s as i16).unwrap(),
                    _ => writer.write_sample(s).unwrap(),
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn int_spec(channels: u16, bits: u16) -> WavSpec {
        WavSpec {
            channels,
            sample_rate: 22_050,
            bits_per_sample: bits,
            sample_format: SampleFormat::Int,
        }
    }

    #[test]
    fn test_validate_rejects_non_audio_mime() {
        let input = AudioInput::new("photo.png", "image/png", vec![0; 16]);
        let err = validate_input(&input, &InputConfig::default()).unwrap_err();
        assert!(matches!(err, StudioError::InvalidInputType { .. }));
    }

    #[test]
    fn test_validate_rejects_oversized() {
        let config = InputConfig::default();
        let input = AudioInput::new("big.wav", "audio/wav", vec![0; config.max_bytes as usize + 1]);
        match validate_input(&input, &config).unwrap_err() {
            StudioError::FileTooLarge { size, limit } => {
                assert_eq!(size, limit + 1);
                assert_eq!(limit, 10 * 1024 * 1024);
            }
            other => panic!("Expected FileTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_accepts_exact_limit() {
        let config = InputConfig {
            max_bytes: 8,
            ..InputConfig::default()
        };
        let input = AudioInput::new("a.wav", "audio/x-wav", vec![0; 8]);
        assert!(validate_input(&input, &config).is_ok());
    }

    #[test]
    fn test_type_checked_before_size() {
        let config = InputConfig {
            max_bytes: 4,
            ..InputConfig::default()
        };
        let input = AudioInput::new("a.txt", "text/plain", vec![0; 100]);
        assert!(matches!(
            validate_input(&input, &config),
            Err(StudioError::InvalidInputType { .. })
        ));
    }

    #[test]
    fn test_decode_16bit_stereo() {
        let bytes = wav_bytes(int_spec(2, 16), &[16384, -16384, 0, 32767]);
        let buffer = WavDecoder.decode(&bytes).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.sample_rate(), 22_050);
        assert_eq!(buffer.sample(0, 0), Some(0.5));
        assert_eq!(buffer.sample(1, 0), Some(-0.5));
    }

    #[test]
    fn test_decode_24bit_mono() {
        let bytes = wav_bytes(int_spec(1, 24), &[4_194_304, -8_388_608]);
        let buffer = WavDecoder.decode(&bytes).unwrap();
        assert_eq!(buffer.channel(0).unwrap(), &[0.5, -1.0]);
    }

    #[test]
    fn test_decode_float() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(0.25_f32).unwrap();
            writer.write_sample(-0.75_f32).unwrap();
            writer.finalize().unwrap();
        }
        let buffer = WavDecoder.decode(&cursor.into_inner()).unwrap();
        assert_eq!(buffer.channel(0).unwrap(), &[0.25, -0.75]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = WavDecoder.decode(b"definitely not a wav file").unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
    }

    #[test]
    fn test_load_input_validates_first() {
        struct PanickingDecoder;
        impl AudioDecoder for PanickingDecoder {
            fn decode(&self, _bytes: &[u8]) -> Result<SampleBuffer> {
                panic!("decoder must not run for rejected input");
            }
        }

        let input = AudioInput::new("a.png", "image/png", vec![1, 2, 3]);
        let result = load_input(&input, &PanickingDecoder, &InputConfig::default());
        assert!(matches!(result, Err(StudioError::InvalidInputType { .. })));
    }

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_type_for_extension(Path::new("a.WAV")), "audio/wav");
        assert_eq!(mime_type_for_extension(Path::new("a.mp3")), "audio/mpeg");
        assert_eq!(
            mime_type_for_extension(Path::new("a.txt")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_generate_test_tone() {
        let buffer = generate_test_tone(440.0, 1.0, 48_000);
        assert_eq!(buffer.frame_count(), 48_000);
        assert_eq!(buffer.channel_count(), 1);

        let samples_per_cycle = 48_000.0 / 440.0;
        let half_cycle = (samples_per_cycle / 2.0) as usize;
        assert!(buffer.sample(0, half_cycle).unwrap().abs() < 0.1);
    }

    #[test]
    fn test_generate_stereo_test_tone() {
        let buffer = generate_stereo_test_tone(440.0, 880.0, 0.5, 48_000);
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 24_000);
        let left = buffer.sample(0, 100).unwrap();
        let right = buffer.sample(1, 100).unwrap();
        assert!((left - right).abs() > 0.01);
    }

    #[test]
    fn test_from_path_reads_file_and_infers_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Take 2.WAV");
        std::fs::write(&path, wav_bytes(int_spec(1, 16), &[0, 1000, -1000])).unwrap();

        let input = AudioInput::from_path(&path).unwrap();
        assert_eq!(input.name, "Take 2.WAV");
        assert_eq!(input.mime_type, "audio/wav");
        assert_eq!(input.size(), std::fs::metadata(&path).unwrap().len());
        let buffer = load_input(&input, &WavDecoder, &InputConfig::default()).unwrap();
        assert_eq!(buffer.frame_count(), 3);

        let other = dir.path().join("notes.xyz");
        std::fs::write(&other, b"text").unwrap();
        let input = AudioInput::from_path(&other).unwrap();
        assert_eq!(input.mime_type, "application/octet-stream");

        let err = AudioInput::from_path(&dir.path().join("missing.wav")).unwrap_err();
        assert!(matches!(err, StudioError::Io(_)));
    }
}
