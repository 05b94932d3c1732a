//! Sample Buffer
//!
//! Immutable planar float storage for decoded audio. Editing transforms
//! (trim, partition) never mutate a buffer in place; they always return a new
//! `SampleBuffer`.

use crate::error::{Result, StudioError};

// ============================================================================
// Constants
// ============================================================================

/// Tolerance, in frames, used to absorb floating-point noise when converting
/// seconds to frame positions. `2.5 * 44100.0` must land on frame 110250, not
/// on 110249.99999 or 110250.00001.
const FRAME_EPSILON: f64 = 1e-6;

/// Longest buffer a transform may produce, in frames. Matches the most
/// frames a mono 16-bit WAV data chunk can address.
pub const MAX_FRAMES: usize = (u32::MAX / 2) as usize;

// ============================================================================
// Helper Functions
// ============================================================================

/// `floor(seconds * sample_rate)` as a signed frame index.
pub(crate) fn floor_frames(seconds: f64, sample_rate: u32) -> i64 {
    let exact = seconds * f64::from(sample_rate);
    if !exact.is_finite() {
        return 0;
    }
    let nearest = exact.round();
    if (exact - nearest).abs() < FRAME_EPSILON {
        nearest as i64
    } else {
        exact.floor() as i64
    }
}

/// `ceil(seconds * sample_rate)` as a frame count. Negative spans yield zero.
pub(crate) fn ceil_frames(seconds: f64, sample_rate: u32) -> usize {
    let exact = seconds * f64::from(sample_rate);
    if !exact.is_finite() || exact <= 0.0 {
        return 0;
    }
    let nearest = exact.round();
    if (exact - nearest).abs() < FRAME_EPSILON {
        nearest as usize
    } else {
        exact.ceil() as usize
    }
}

// ============================================================================
// Sample Buffer
// ============================================================================

/// Decoded multi-channel audio
///
/// Samples are stored non-interleaved: one `Vec<f32>` per channel, all of
/// identical length. Values are nominally in [-1.0, 1.0] but are not clamped.
///
/// # Example
/// ```
/// use wavestudio::engine::SampleBuffer;
///
/// let buffer = SampleBuffer::silent(2, 44_100, 44_100).unwrap();
/// assert_eq!(buffer.channel_count(), 2);
/// assert_eq!(buffer.frame_count(), 44_100);
/// assert_eq!(buffer.duration_secs(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Build a buffer from planar channel data
    ///
    /// # Errors
    /// * `InvalidBuffer` - no channels, zero sample rate, or channels of
    ///   differing lengths
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if channels.is_empty() {
            return Err(StudioError::InvalidBuffer {
                reason: "buffer must have at least one channel".to_string(),
            });
        }
        if sample_rate == 0 {
            return Err(StudioError::InvalidBuffer {
                reason: "sample rate must be positive".to_string(),
            });
        }

        let frames = channels[0].len();
        if let Some((index, channel)) = channels
            .iter()
            .enumerate()
            .find(|(_, ch)| ch.len() != frames)
        {
            return Err(StudioError::InvalidBuffer {
                reason: format!(
                    "channel {} has {} frames, channel 0 has {}",
                    index,
                    channel.len(),
                    frames
                ),
            });
        }

        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Assemble a buffer whose shape the caller has already guaranteed
    /// (at least one channel, equal lengths, positive rate).
    pub(crate) fn from_parts(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        debug_assert!(!channels.is_empty() && sample_rate > 0);
        debug_assert!(channels.iter().all(|ch| ch.len() == channels[0].len()));
        Self {
            channels,
            sample_rate,
        }
    }

    /// Create a zero-filled buffer
    pub fn silent(channel_count: usize, frame_count: usize, sample_rate: u32) -> Result<Self> {
        Self::from_channels(vec![vec![0.0; frame_count]; channel_count], sample_rate)
    }

    /// Create a buffer from interleaved sample data (L, R, L, R, ...)
    pub fn from_interleaved(
        interleaved: &[f32],
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if channel_count == 0 {
            return Err(StudioError::InvalidBuffer {
                reason: "buffer must have at least one channel".to_string(),
            });
        }
        if interleaved.len() % channel_count != 0 {
            return Err(StudioError::InvalidBuffer {
                reason: format!(
                    "interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    channel_count
                ),
            });
        }

        let frames = interleaved.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in interleaved.chunks_exact(channel_count) {
            for (ch, &sample) in frame.iter().enumerate() {
                channels[ch].push(sample);
            }
        }

        Self::from_channels(channels, sample_rate)
    }

    /// Convert to interleaved order (L, R, L, R, ...)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channel_count() * self.frame_count());
        for frame in 0..self.frame_count() {
            for channel in &self.channels {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples per channel
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Duration in seconds (`frame_count / sample_rate`)
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / f64::from(self.sample_rate)
    }

    /// Read-only view of one channel, or `None` if out of range
    #[inline]
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Iterate over all channels
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(Vec::as_slice)
    }

    /// Sample at (channel, frame), or `None` if out of range
    #[inline]
    pub fn sample(&self, channel: usize, frame: usize) -> Option<f32> {
        self.channels
            .get(channel)
            .and_then(|ch| ch.get(frame).copied())
    }

    /// Cut the region `[start, end)` seconds into a new buffer
    ///
    /// The result has `ceil((end - start) * sample_rate)` frames and copies
    /// from source frame `floor(start * sample_rate)` on. Both roundings first
    /// snap to the nearest whole frame when within 1e-6 of it, so
    /// `trim(0, duration)` is exact. Source indices outside the original
    /// buffer are left silent. A reversed or empty range yields an empty
    /// buffer.
    ///
    /// # Errors
    /// * `InvalidParameter` - the region is longer than `MAX_FRAMES` or its
    ///   samples cannot be allocated
    ///
    /// # Example
    /// ```
    /// use wavestudio::engine::SampleBuffer;
    ///
    /// let buffer = SampleBuffer::silent(2, 441_000, 44_100).unwrap();
    /// let trimmed = buffer.trim(2.5, 7.5).unwrap();
    /// assert_eq!(trimmed.frame_count(), 220_500);
    /// ```
    pub fn trim(&self, start: f64, end: f64) -> Result<SampleBuffer> {
        let length = ceil_frames(end - start, self.sample_rate);
        let offset = floor_frames(start, self.sample_rate);

        let too_long = || StudioError::InvalidParameter {
            param: "end".to_string(),
            value: end.to_string(),
            expected: format!("a region of at most {} frames", MAX_FRAMES),
        };
        if length > MAX_FRAMES {
            return Err(too_long());
        }

        let mut channels = Vec::with_capacity(self.channels.len());
        for source in &self.channels {
            let mut data = Vec::new();
            data.try_reserve_exact(length).map_err(|_| too_long())?;
            data.extend((0..length).map(|i| {
                offset
                    .checked_add(i as i64)
                    .and_then(|index| usize::try_from(index).ok())
                    .and_then(|index| source.get(index).copied())
                    .unwrap_or(0.0)
            }));
            channels.push(data);
        }

        Ok(SampleBuffer {
            channels,
            sample_rate: self.sample_rate,
        })
    }

    /// Partition the buffer at `position` seconds into head and tail buffers
    ///
    /// Equivalent to `trim(0, position)` and `trim(position, duration)`.
    /// `position` is clamped into `[0, duration]`.
    pub fn partition(&self, position: f64) -> Result<(SampleBuffer, SampleBuffer)> {
        let duration = self.duration_secs();
        let position = if position.is_nan() {
            0.0
        } else {
            position.clamp(0.0, duration)
        };
        Ok((self.trim(0.0, position)?, self.trim(position, duration)?))
    }
}

// ============================================================================
// Tests
// ============================================================================
