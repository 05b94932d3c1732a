//! Waveform rendering
//!
//! Downsamples channel 0 of a buffer into one min/max envelope per pixel
//! column and lays the selection highlight and playhead over it. Rendering
//! happens in two stages: `WaveformRenderer::render` produces a resolution
//! bound `WaveformFrame` (pure geometry), and `WaveformFrame::rasterize`
//! paints it into an RGBA `Raster`.

use tracing::trace;

use crate::config::{Rgba, WaveformStyle};
use crate::engine::buffer::SampleBuffer;
use crate::engine::selection::Selection;
use crate::error::{Result, StudioError};

/// Largest canvas, in pixels, a frame may be rendered or painted at
pub const MAX_CANVAS_PIXELS: usize = 1 << 26;

/// Reject canvases whose pixel count overflows or exceeds `MAX_CANVAS_PIXELS`
fn check_canvas(width: usize, height: usize) -> Result<()> {
    match width.max(1).checked_mul(height.max(1)) {
        Some(pixels) if pixels <= MAX_CANVAS_PIXELS => Ok(()),
        _ => Err(StudioError::InvalidParameter {
            param: "canvas".to_string(),
            value: format!("{}x{}", width, height),
            expected: format!("at most {} pixels", MAX_CANVAS_PIXELS),
        }),
    }
}

/// Min/max of one column window, in sample units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min: f32,
    pub max: f32,
}

impl Envelope {
    /// Vertical pixel span `((1+min)*H/2, (1+max)*H/2)`
    pub fn pixel_span(&self, height: usize) -> (f32, f32) {
        let half = height as f32 / 2.0;
        ((1.0 + self.min) * half, (1.0 + self.max) * half)
    }
}

/// Vector description of one rendered waveform
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformFrame {
    pub width: usize,
    pub height: usize,
    /// Highlighted columns `[start, end)`; `end` may equal `width`
    pub selection: Option<(usize, usize)>,
    /// One entry per column; `None` where the column window holds no samples
    pub envelope: Vec<Option<Envelope>>,
    /// Playhead column; only drawn when `< width`
    pub playhead: Option<usize>,
}

impl WaveformFrame {
    fn flat(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            selection: None,
            envelope: vec![None; width],
            playhead: None,
        }
    }

    /// True if nothing but the background would be painted
    pub fn is_flat(&self) -> bool {
        self.selection.is_none()
            && self.playhead.is_none()
            && self.envelope.iter().all(Option::is_none)
    }

    /// Paint the frame into an RGBA raster
    ///
    /// Layers are drawn back to front: background, selection highlight
    /// (alpha blended), envelope segments, playhead.
    ///
    /// # Errors
    /// * `InvalidParameter` - the canvas exceeds `MAX_CANVAS_PIXELS`
    pub fn rasterize(&self, style: &WaveformStyle) -> Result<Raster> {
        let mut raster = Raster::filled(self.width, self.height, style.background)?;
        if self.width == 0 || self.height == 0 {
            return Ok(raster);
        }

        if let Some((start, end)) = self.selection {
            for x in start.min(self.width)..end.min(self.width) {
                for y in 0..self.height {
                    raster.blend(x, y, style.selection);
                }
            }
        }

        let last_row = self.height - 1;
        for (x, column) in self.envelope.iter().enumerate() {
            let Some(env) = column else { continue };
            let (lo, hi) = env.pixel_span(self.height);
            let top = (lo.min(hi).floor().max(0.0) as usize).min(last_row);
            let bottom = (lo.max(hi).floor().max(0.0) as usize).min(last_row);
            for y in top..=bottom {
                raster.put(x, y, style.envelope);
            }
        }

        if let Some(x) = self.playhead.filter(|&x| x < self.width) {
            for y in 0..self.height {
                raster.put(x, y, style.playhead);
            }
        }

        Ok(raster)
    }
}

/// Row-major RGBA pixel buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Raster {
    fn filled(width: usize, height: usize, colour: Rgba) -> Result<Self> {
        check_canvas(width, height)?;
        let len = width * height * 4;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|e| StudioError::InvalidParameter {
                param: "canvas".to_string(),
                value: format!("{}x{}", width, height),
                expected: format!("an allocatable raster ({})", e),
            })?;
        pixels.extend(colour.iter().copied().cycle().take(len));
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGBA bytes, row-major
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel at (x, y), or `None` if out of range
    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    fn put(&mut self, x: usize, y: usize, colour: Rgba) {
        let i = (y * self.width + x) * 4;
        self.pixels[i..i + 4].copy_from_slice(&colour);
    }

    /// Source-over compositing
    fn blend(&mut self, x: usize, y: usize, src: Rgba) {
        let i = (y * self.width + x) * 4;
        let dst = &mut self.pixels[i..i + 4];

        let sa = f32::from(src[3]) / 255.0;
        let da = f32::from(dst[3]) / 255.0;
        let out_a = sa + da * (1.0 - sa);
        if out_a <= 0.0 {
            dst.copy_from_slice(&[0, 0, 0, 0]);
            return;
        }
        for c in 0..3 {
            let s = f32::from(src[c]) * sa;
            let d = f32::from(dst[c]) * da * (1.0 - sa);
            dst[c] = ((s + d) / out_a).round().clamp(0.0, 255.0) as u8;
        }
        dst[3] = (out_a * 255.0).round() as u8;
    }
}

/// Produces waveform frames for a buffer
#[derive(Debug, Clone, Default)]
pub struct WaveformRenderer {
    style: WaveformStyle,
}

impl WaveformRenderer {
    pub fn new(style: WaveformStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &WaveformStyle {
        &self.style
    }

    /// Compute the waveform geometry for a `width` x `height` canvas
    ///
    /// An empty buffer or a zero-sized canvas yields a flat frame.
    ///
    /// # Errors
    /// * `InvalidParameter` - the canvas exceeds `MAX_CANVAS_PIXELS`
    pub fn render(
        &self,
        buffer: &SampleBuffer,
        width: usize,
        height: usize,
        selection: Selection,
        playhead: f64,
    ) -> Result<WaveformFrame> {
        check_canvas(width, height)?;
        let duration = buffer.duration_secs();
        let samples = buffer.channel(0).unwrap_or(&[]);
        if width == 0 || height == 0 || samples.is_empty() || duration <= 0.0 {
            return Ok(WaveformFrame::flat(width, height));
        }

        let column_of = |t: f64| {
            let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, duration) };
            (t / duration * width as f64).floor() as usize
        };

        let frame = WaveformFrame {
            width,
            height,
            selection: Some((column_of(selection.start), column_of(selection.end))),
            envelope: column_envelopes(samples, width),
            playhead: Some(column_of(playhead)),
        };
        trace!(width, height, frames = samples.len(), "rendered waveform frame");
        Ok(frame)
    }

    /// Render and paint in one step with the configured colours
    pub fn render_raster(
        &self,
        buffer: &SampleBuffer,
        width: usize,
        height: usize,
        selection: Selection,
        playhead: f64,
    ) -> Result<Raster> {
        self.render(buffer, width, height, selection, playhead)?
            .rasterize(&self.style)
    }

    /// Horizontal fraction of a click at pixel `x` on a `width` wide canvas
    pub fn click_fraction(x: f64, width: usize) -> f64 {
        if width == 0 {
            return 0.0;
        }
        x / width as f64
    }
}

/// Per-column min/max over windows of `ceil(len / width)` samples
fn column_envelopes(samples: &[f32], width: usize) -> Vec<Option<Envelope>> {
    let step = samples.len().div_ceil(width);
    (0..width)
        .map(|i| {
            let start = i * step;
            if start >= samples.len() {
                return None;
            }
            let end = (start + step).min(samples.len());
            let (mut min, mut max) = (f32::INFINITY, f32::NEG_INFINITY);
            for &v in &samples[start..end] {
                if v < min {
                    min = v;
                }
                if v > max {
                    max = v;
                }
            }
            (min.is_finite() && max.is_finite()).then_some(Envelope { min, max })
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
