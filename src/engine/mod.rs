//! Audio Engine Module
//!
//! Core editing engine:
//! - Sample buffer model and trim/partition transforms
//! - Input validation and decoding
//! - Selection editing
//! - Waveform rendering
//! - WAV export
//! - Playback scheduling

pub mod buffer;
pub mod io;
pub mod playback;
pub mod selection;
pub mod timecode;
pub mod waveform;
pub mod wav;

pub use buffer::{SampleBuffer, MAX_FRAMES};
pub use io::{
    generate_stereo_test_tone, generate_test_tone, load_input, validate_input, AudioDecoder,
    AudioInput, WavDecoder,
};
pub use playback::{
    Clock, ManualClock, PlaybackScheduler, PlaybackState, PositionCallback, PositionTicker,
    SystemClock,
};
pub use selection::{RegionCallback, Selection, SelectionEditor, TrimOutcome};
pub use timecode::{format_time, format_time_short};
pub use waveform::{Envelope, Raster, WaveformFrame, WaveformRenderer, MAX_CANVAS_PIXELS};
pub use wav::{export_file_name, sample_to_i16, write_wav, WavEncoder, WAV_HEADER_LEN};
