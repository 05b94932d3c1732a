//! Integration Tests
//!
//! End-to-end tests for the WaveStudio editing pipeline: upload, edit,
//! equalize, render and export.

use std::io::Cursor;

use anyhow::Result;
use pretty_assertions::assert_eq;
use test_case::test_case;

use wavestudio::config::StudioConfig;
use wavestudio::dsp::{EqualizerChain, GraphContext, BAND_COUNT};
use wavestudio::engine::{
    generate_stereo_test_tone, AudioInput, SampleBuffer, Selection, SelectionEditor, TrimOutcome,
    WavDecoder, WavEncoder, WaveformRenderer,
};
use wavestudio::logging::init_test_logging;
use wavestudio::{StudioError, StudioSession};

/// Buffer with deterministic pseudo-random content in [-1, 1]
fn noise_buffer(channels: usize, frames: usize, sample_rate: u32) -> SampleBuffer {
    let mut seed: u32 = 0x1234_5678;
    let data = (0..channels)
        .map(|_| {
            (0..frames)
                .map(|_| {
                    seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                    (seed >> 8) as f32 / (1 << 24) as f32 * 2.0 - 1.0
                })
                .collect()
        })
        .collect();
    SampleBuffer::from_channels(data, sample_rate).unwrap()
}

// === WAV Round Trip ===

#[test_case(1, 44_100 ; "mono 44k1")]
#[test_case(2, 48_000 ; "stereo 48k")]
#[test_case(6, 8_000 ; "surround 8k")]
fn test_wav_roundtrip_through_hound(channels: usize, sample_rate: u32) -> Result<()> {
    init_test_logging();
    let buffer = noise_buffer(channels, 1000, sample_rate);
    let bytes = WavEncoder.encode(&buffer)?;

    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, sample_rate);
    assert_eq!(spec.channels as usize, channels);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.duration() as usize, 1000);

    let decoded: Vec<i16> = reader.samples::<i16>().collect::<std::result::Result<_, _>>()?;
    for (i, &pcm) in decoded.iter().enumerate() {
        let original = buffer.sample(i % channels, i / channels).unwrap();
        let scale = if pcm < 0 { 32768.0 } else { 32767.0 };
        let restored = f32::from(pcm) / scale;
        assert!(
            (original - restored).abs() <= 1.0 / 32768.0,
            "sample {}: {} vs {}",
            i,
            original,
            restored
        );
    }
    Ok(())
}

#[test]
fn test_export_then_reload_with_wav_decoder() -> Result<()> {
    let buffer = generate_stereo_test_tone(440.0, 880.0, 0.25, 22_050);
    let bytes = WavEncoder.encode(&buffer)?;

    let mut session = StudioSession::default();
    session.load(&AudioInput::new("export.wav", "audio/wav", bytes), &WavDecoder)?;

    let reloaded = session.buffer().unwrap();
    assert_eq!(reloaded.sample_rate(), 22_050);
    assert_eq!(reloaded.channel_count(), 2);
    assert_eq!(reloaded.frame_count(), buffer.frame_count());
    Ok(())
}

// === Upload Validation ===

#[test]
fn test_upload_rules_checked_before_decode() {
    let mut session = StudioSession::default();

    // garbage bytes never reach the decoder when the type is wrong
    let err = session
        .load(&AudioInput::new("a.png", "image/png", vec![1, 2, 3]), &WavDecoder)
        .unwrap_err();
    assert!(matches!(err, StudioError::InvalidInputType { .. }));

    let oversized = vec![0u8; 10 * 1024 * 1024 + 1];
    let err = session
        .load(&AudioInput::new("big.wav", "audio/wav", oversized), &WavDecoder)
        .unwrap_err();
    assert!(matches!(err, StudioError::FileTooLarge { .. }));

    let err = session
        .load(&AudioInput::new("bad.wav", "audio/wav", vec![1, 2, 3]), &WavDecoder)
        .unwrap_err();
    assert!(matches!(err, StudioError::DecodeError { .. }));
    assert!(!session.is_loaded());
}

// === Editing Workflow ===

#[test]
fn test_trim_then_split_workflow() -> Result<()> {
    let mut session = StudioSession::default();
    session.load_buffer(SampleBuffer::silent(2, 441_000, 44_100)?, "ten_seconds.wav");

    session.set_region(2.5, 7.5)?;
    assert_eq!(session.trim()?, TrimOutcome::Trimmed { frames: 220_500 });
    assert_eq!(session.selection(), Some(Selection::new(0.0, 5.0)));

    assert_eq!(session.split()?, 2.5);
    assert_eq!(session.selection(), Some(Selection::new(0.0, 2.5)));
    assert_eq!(session.buffer().unwrap().frame_count(), 220_500);
    Ok(())
}

#[test]
fn test_trim_frame_count_matches_ceiling() {
    let buffer = noise_buffer(1, 10_000, 44_100);
    let duration = buffer.duration_secs();
    for (start, end) in [(0.0, 0.01), (0.013, 0.1), (0.05, duration), (0.1, 0.1)] {
        // ceiling after snapping values within 1e-6 of a whole frame
        let expected = ((end - start) * 44_100.0_f64 - 1e-6).ceil().max(0.0) as usize;
        let trimmed = buffer.trim(start, end).unwrap();
        assert_eq!(trimmed.frame_count(), expected, "{}..{}", start, end);
    }
}

#[test]
fn test_identity_trim_reproduces_buffer() {
    let buffer = noise_buffer(2, 12_345, 44_100);
    assert_eq!(buffer.trim(0.0, buffer.duration_secs()).unwrap(), buffer);
}

#[test]
fn test_selection_always_normalized() {
    let mut editor = SelectionEditor::new();
    editor.load(SampleBuffer::silent(1, 1000, 100).unwrap());
    let times = [-50.0, -0.1, 0.0, 3.3, 9.99, 10.0, 12.0, 1e9];
    for &a in &times {
        for &b in &times {
            let selection = editor.set_region(a, b).unwrap();
            assert!(selection.start <= selection.end);
            assert!(selection.start >= 0.0 && selection.end <= 10.0);
        }
    }
}

// === Equalizer ===

#[test]
fn test_gain_clamp_examples() -> Result<()> {
    let mut chain = EqualizerChain::new();
    chain.build(GraphContext::new(44_100, 2));

    chain.set_gain(0, 25.0)?;
    assert_eq!(chain.gain(0), Some(20.0));
    chain.set_gain(0, -100.0)?;
    assert_eq!(chain.gain(0), Some(-20.0));

    for band in 0..BAND_COUNT {
        chain.set_gain(band, 1000.0)?;
    }
    assert!(chain.gains().iter().all(|&g| g == 20.0));
    Ok(())
}

// === Waveform ===

#[test]
fn test_waveform_is_deterministic() -> Result<()> {
    let buffer = noise_buffer(2, 44_100, 44_100);
    let renderer = WaveformRenderer::new(StudioConfig::default().waveform);
    let selection = Selection::new(0.25, 0.5);

    let first = renderer.render(&buffer, 640, 120, selection, 0.3)?;
    let second = renderer.render(&buffer, 640, 120, selection, 0.3)?;
    assert_eq!(first, second);
    assert_eq!(first.envelope.len(), 640);
    assert!(first.envelope.iter().all(|e| e.map_or(false, |e| e.min <= e.max)));
    Ok(())
}

// === Export ===

#[test]
fn test_export_to_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut session = StudioSession::default();
    session.load_buffer(generate_stereo_test_tone(440.0, 660.0, 1.0, 8000), "clip.mp3");
    session.set_region(0.0, 0.5)?;
    session.trim()?;

    let path = dir.path().join(session.export_name());
    session.export_to(&path)?;

    let reader = hound::WavReader::open(&path)?;
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.duration(), 4000);
    assert!(path.ends_with("edited_audio.wav"));
    Ok(())
}
