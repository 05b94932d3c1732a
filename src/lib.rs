//! WaveStudio - Audio Editing Core
//!
//! Load a short clip, select a region, trim it, shape it with an 8-band
//! equalizer and export it as 16-bit PCM WAV.
//!
//! # Architecture
//!
//! - `engine`: sample buffers, input decoding, selection editing, waveform
//!   rendering, WAV export and playback scheduling
//! - `dsp`: biquad filters and the equalizer chain
//! - `session`: a composition root driving all of the above for a host UI
//!
//! Buffers are immutable values; every edit produces a new `SampleBuffer`.
//!
//! # Example
//! ```
//! use wavestudio::engine::{generate_stereo_test_tone, TrimOutcome};
//! use wavestudio::StudioSession;
//!
//! let mut session = StudioSession::default();
//! session.load_buffer(generate_stereo_test_tone(440.0, 660.0, 10.0, 44_100), "tone.wav");
//! session.set_region(2.5, 7.5).unwrap();
//! assert_eq!(session.trim().unwrap(), TrimOutcome::Trimmed { frames: 220_500 });
//! session.set_gain(0, 25.0).unwrap();
//! assert_eq!(session.equalizer().gain(0), Some(20.0));
//! let wav = session.export_wav().unwrap();
//! assert_eq!(&wav[0..4], b"RIFF");
//! ```

pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod logging;
pub mod session;

pub use config::StudioConfig;
pub use error::{Result, StudioError};
pub use session::StudioSession;
