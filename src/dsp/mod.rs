//! Signal processing
//!
//! Biquad primitives and the 8-band equalizer chain used for playback and
//! equalized export.

mod biquad;
mod eq;

pub use biquad::{BandKind, BiquadCoeffs, BiquadState};
pub use eq::{
    clamp_gain, EqualizerChain, FilterBand, GainCallback, GraphContext, RouteNode,
    BAND_COUNT, BAND_FREQUENCIES, BAND_Q, MAX_GAIN_DB, MIN_GAIN_DB,
};
