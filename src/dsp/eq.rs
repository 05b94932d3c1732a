//! 8-band graphic equalizer
//!
//! `EqualizerChain` keeps two things apart: the persisted per-band gains, a
//! plain array that survives any number of rebuilds, and the live stage
//! graph, which is bound to one `GraphContext` (buffer/output pairing) and is
//! thrown away whenever that pairing changes.
//!
//! Signal flow once built:
//! source -> band 0 (low shelf) -> band 1..6 (peaking) -> band 7 (high shelf) -> destination

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::biquad::{BandKind, BiquadCoeffs, BiquadState};
use crate::engine::buffer::SampleBuffer;
use crate::error::{Result, StudioError};

// ============================================================================
// Constants
// ============================================================================

/// Number of bands; fixed for the life of a chain
pub const BAND_COUNT: usize = 8;

/// Corner/centre frequency of each band in Hz
pub const BAND_FREQUENCIES: [f32; BAND_COUNT] =
    [60.0, 170.0, 310.0, 600.0, 1000.0, 3000.0, 6000.0, 12000.0];

/// Lowest accepted band gain in dB
pub const MIN_GAIN_DB: f32 = -20.0;

/// Highest accepted band gain in dB
pub const MAX_GAIN_DB: f32 = 20.0;

/// Quality factor shared by every band
pub const BAND_Q: f32 = 1.0;

/// Callback fired with `(band_index, gain_db)` after a gain is applied
pub type GainCallback = Box<dyn FnMut(usize, f32) + Send>;

// ============================================================================
// Bands and context
// ============================================================================

/// Parameters of one equalizer band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterBand {
    pub frequency: f32,
    pub gain_db: f32,
    pub q: f32,
    pub kind: BandKind,
}

impl FilterBand {
    /// Band `index` of the fixed layout with the given gain
    ///
    /// Band 0 is a low shelf, the last band a high shelf, everything in
    /// between peaking.
    pub fn for_index(index: usize, gain_db: f32) -> Self {
        let kind = match index {
            0 => BandKind::LowShelf,
            i if i == BAND_COUNT - 1 => BandKind::HighShelf,
            _ => BandKind::Peaking,
        };
        Self {
            frequency: BAND_FREQUENCIES[index.min(BAND_COUNT - 1)],
            gain_db,
            q: BAND_Q,
            kind,
        }
    }

    fn coeffs(&self, sample_rate: u32) -> BiquadCoeffs {
        BiquadCoeffs::calculate(
            self.kind,
            f64::from(sample_rate),
            f64::from(self.frequency),
            f64::from(self.gain_db),
            f64::from(self.q),
        )
    }
}

/// Clamp a gain into `[MIN_GAIN_DB, MAX_GAIN_DB]`
#[inline]
pub fn clamp_gain(db: f32) -> f32 {
    db.clamp(MIN_GAIN_DB, MAX_GAIN_DB)
}

/// A buffer/output pairing the stage graph is built for
///
/// Every call to `new` yields a distinct id, so two contexts with identical
/// format still count as different pairings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphContext {
    id: Uuid,
    sample_rate: u32,
    channels: usize,
}

impl GraphContext {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            sample_rate,
            channels,
        }
    }

    /// Context matching a buffer's format
    pub fn for_buffer(buffer: &SampleBuffer) -> Self {
        Self::new(buffer.sample_rate(), buffer.channel_count())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

/// One hop of the audio route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteNode {
    Source,
    Band(usize),
    Destination,
}

// ============================================================================
// Live stages
// ============================================================================

/// Processing node for one band
#[derive(Debug, Clone)]
struct Stage {
    band: FilterBand,
    sample_rate: u32,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>, // one per channel
}

impl Stage {
    fn new(band: FilterBand, context: &GraphContext) -> Self {
        Self {
            band,
            sample_rate: context.sample_rate,
            coeffs: band.coeffs(context.sample_rate),
            states: vec![BiquadState::default(); context.channels],
        }
    }

    fn set_gain(&mut self, gain_db: f32) {
        self.band.gain_db = gain_db;
        self.coeffs = self.band.coeffs(self.sample_rate);
    }

    /// Bypassed stages still run their state so history stays current when
    /// the band comes back
    #[inline]
    fn process(&mut self, sample: f64, channel: usize) -> f64 {
        match self.states.get_mut(channel) {
            Some(state) => state.process(sample, &self.coeffs),
            None => sample,
        }
    }

    fn clear(&mut self) {
        self.states.iter_mut().for_each(BiquadState::reset);
    }
}

/// Stages wired in series for one context
#[derive(Debug)]
struct StageGraph {
    context: GraphContext,
    stages: Vec<Stage>,
}

impl StageGraph {
    fn new(context: GraphContext, gains: &[f32; BAND_COUNT]) -> Self {
        let stages = gains
            .iter()
            .enumerate()
            .map(|(i, &gain)| Stage::new(FilterBand::for_index(i, gain), &context))
            .collect();
        Self { context, stages }
    }

    #[inline]
    fn process_sample(&mut self, sample: f32, channel: usize) -> f32 {
        let mut out = f64::from(sample);
        for stage in &mut self.stages {
            out = stage.process(out, channel);
        }
        out as f32
    }
}

// ============================================================================
// Equalizer chain
// ============================================================================

/// Persisted gains plus a rebuildable series of filter stages
pub struct EqualizerChain {
    gains: [f32; BAND_COUNT],
    graph: Option<StageGraph>,
    generation: u64,
    on_gain_change: Option<GainCallback>,
}

impl Default for EqualizerChain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EqualizerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EqualizerChain")
            .field("gains", &self.gains)
            .field("context", &self.context())
            .field("generation", &self.generation)
            .finish()
    }
}

impl EqualizerChain {
    /// Flat, unbuilt chain
    pub fn new() -> Self {
        Self {
            gains: [0.0; BAND_COUNT],
            graph: None,
            generation: 0,
            on_gain_change: None,
        }
    }

    /// Register the gain-change callback
    pub fn set_on_gain_change(&mut self, callback: impl FnMut(usize, f32) + Send + 'static) {
        self.on_gain_change = Some(Box::new(callback));
    }

    /// (Re)build the stage graph for `context`
    ///
    /// Any existing graph is disconnected first; the fresh stages are seeded
    /// with the persisted gains.
    pub fn build(&mut self, context: GraphContext) {
        self.disconnect();
        self.generation += 1;
        info!(
            context = %context.id,
            sample_rate = context.sample_rate,
            channels = context.channels,
            generation = self.generation,
            "equalizer built"
        );
        self.graph = Some(StageGraph::new(context, &self.gains));
    }

    /// Tear down the live stages, leaving the persisted gains untouched
    pub fn disconnect(&mut self) {
        if let Some(graph) = self.graph.take() {
            debug!(context = %graph.context.id, "equalizer disconnected");
        }
    }

    pub fn is_built(&self) -> bool {
        self.graph.is_some()
    }

    /// Context of the live graph
    pub fn context(&self) -> Option<&GraphContext> {
        self.graph.as_ref().map(|g| &g.context)
    }

    /// Number of builds so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Set the gain of band `band`, clamped to +/-20 dB
    ///
    /// Before the first `build` this is a no-op and returns `Ok(())`: neither
    /// the persisted nor any live gain changes.
    ///
    /// # Errors
    /// * `InvalidParameter` - band index out of range or gain is NaN
    pub fn set_gain(&mut self, band: usize, db: f32) -> Result<()> {
        if band >= BAND_COUNT {
            return Err(StudioError::InvalidParameter {
                param: "band".to_string(),
                value: band.to_string(),
                expected: format!("0-{}", BAND_COUNT - 1),
            });
        }
        if db.is_nan() {
            return Err(StudioError::InvalidParameter {
                param: "gain_db".to_string(),
                value: db.to_string(),
                expected: format!("{} to {} dB", MIN_GAIN_DB, MAX_GAIN_DB),
            });
        }

        let Some(graph) = self.graph.as_mut() else {
            debug!(band, db, "gain change ignored, equalizer not built");
            return Ok(());
        };

        let gain = clamp_gain(db);
        graph.stages[band].set_gain(gain);
        self.gains[band] = gain;
        debug!(band, requested = db, applied = gain, "band gain set");

        if let Some(callback) = self.on_gain_change.as_mut() {
            callback(band, gain);
        }
        Ok(())
    }

    /// Persisted gain of one band
    pub fn gain(&self, band: usize) -> Option<f32> {
        self.gains.get(band).copied()
    }

    pub fn gains(&self) -> &[f32; BAND_COUNT] {
        &self.gains
    }

    /// Band parameters as currently persisted
    pub fn bands(&self) -> [FilterBand; BAND_COUNT] {
        std::array::from_fn(|i| FilterBand::for_index(i, self.gains[i]))
    }

    /// Set every band to 0 dB and push that into the live stages
    pub fn reset(&mut self) {
        self.gains = [0.0; BAND_COUNT];
        if let Some(graph) = self.graph.as_mut() {
            for stage in &mut graph.stages {
                stage.set_gain(0.0);
            }
        }
        if let Some(callback) = self.on_gain_change.as_mut() {
            for band in 0..BAND_COUNT {
                callback(band, 0.0);
            }
        }
        debug!("equalizer reset");
    }

    /// Clear filter memory without touching gains
    pub fn clear_history(&mut self) {
        if let Some(graph) = self.graph.as_mut() {
            graph.stages.iter_mut().for_each(Stage::clear);
        }
    }

    /// Current audio route; an unbuilt chain routes source straight to the
    /// destination
    pub fn route(&self) -> Vec<RouteNode> {
        let mut route = vec![RouteNode::Source];
        if let Some(graph) = &self.graph {
            route.extend((0..graph.stages.len()).map(RouteNode::Band));
        }
        route.push(RouteNode::Destination);
        route
    }

    /// Filter interleaved frames in place through the live stages
    ///
    /// Passes audio through unchanged when the chain is not built.
    pub fn process_interleaved(&mut self, samples: &mut [f32], channels: usize) {
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        if channels == 0 {
            return;
        }
        for frame in samples.chunks_mut(channels) {
            for (ch, sample) in frame.iter_mut().enumerate() {
                *sample = graph.process_sample(*sample, ch);
            }
        }
    }

    /// Render a whole buffer through fresh stages seeded with the persisted
    /// gains; live stages and their state are not touched
    pub fn apply_offline(&self, buffer: &SampleBuffer) -> SampleBuffer {
        let mut graph = StageGraph::new(GraphContext::for_buffer(buffer), &self.gains);
        let channels = buffer
            .channels()
            .enumerate()
            .map(|(ch, data)| {
                data.iter()
                    .map(|&s| graph.process_sample(s, ch))
                    .collect()
            })
            .collect();
        SampleBuffer::from_parts(channels, buffer.sample_rate())
    }
}

// ============================================================================
// Tests
// ============================================================================
