//! Selection editing
//!
//! `SelectionEditor` owns the active buffer and the selected region over its
//! timeline. It is either Idle (nothing loaded) or Active (a buffer and a
//! selection inside `[0, duration]`).

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::engine::buffer::SampleBuffer;
use crate::engine::timecode::format_time;
use crate::error::{Result, StudioError};

/// Callback fired whenever the region is updated or normalized
pub type RegionCallback = Box<dyn FnMut(f64, f64) + Send>;

/// A region of the timeline in seconds, `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Selection {
    pub start: f64,
    pub end: f64,
}

impl Selection {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Selection covering `[0, duration]`
    pub fn full(duration: f64) -> Self {
        Self::new(0.0, duration)
    }

    /// Swap bounds if needed and clamp both into `[0, duration]`
    ///
    /// Non-finite bounds are treated as 0.
    pub fn normalized(self, duration: f64) -> Self {
        let duration = if duration.is_finite() {
            duration.max(0.0)
        } else {
            0.0
        };
        let clamp = |t: f64| {
            if t.is_nan() {
                0.0
            } else {
                t.clamp(0.0, duration)
            }
        };
        let (a, b) = (clamp(self.start), clamp(self.end));
        if a <= b {
            Self::new(a, b)
        } else {
            Self::new(b, a)
        }
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.duration() <= 0.0
    }

    /// Midpoint of the region
    #[inline]
    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    /// Human-readable range, e.g. `0:02.50 - 0:07.50`
    pub fn label(&self) -> String {
        format!("{} - {}", format_time(self.start), format_time(self.end))
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}s, {:.3}s]", self.start, self.end)
    }
}

/// Result of a trim request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimOutcome {
    /// The buffer was replaced by the selected region
    Trimmed { frames: usize },
    /// The selection had zero length; the buffer was left untouched
    EmptySelection,
}

/// Editor state
enum EditorState {
    Idle,
    Active {
        buffer: Arc<SampleBuffer>,
        selection: Selection,
    },
}

/// Owns the active buffer and its selection
pub struct SelectionEditor {
    state: EditorState,
    on_region_change: Option<RegionCallback>,
}

impl Default for SelectionEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SelectionEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionEditor")
            .field("active", &self.is_active())
            .field("selection", &self.selection())
            .finish()
    }
}

impl SelectionEditor {
    /// Create an idle editor
    pub fn new() -> Self {
        Self {
            state: EditorState::Idle,
            on_region_change: None,
        }
    }

    /// Register the region-change callback
    pub fn set_on_region_change(&mut self, callback: impl FnMut(f64, f64) + Send + 'static) {
        self.on_region_change = Some(Box::new(callback));
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Take ownership of a buffer and select all of it
    ///
    /// State transition: Idle/Active -> Active
    pub fn load(&mut self, buffer: SampleBuffer) {
        let selection = Selection::full(buffer.duration_secs());
        debug!(
            frames = buffer.frame_count(),
            channels = buffer.channel_count(),
            "editor loaded buffer"
        );
        self.state = EditorState::Active {
            buffer: Arc::new(buffer),
            selection,
        };
        self.notify(selection);
    }

    /// Set the region; ordering is normalized and bounds clamped to the buffer
    ///
    /// # Errors
    /// * `NoBufferLoaded` - if the editor is idle
    pub fn set_region(&mut self, start: f64, end: f64) -> Result<Selection> {
        let selection = match &mut self.state {
            EditorState::Idle => return Err(StudioError::NoBufferLoaded),
            EditorState::Active { buffer, selection } => {
                *selection = Selection::new(start, end).normalized(buffer.duration_secs());
                *selection
            }
        };
        self.notify(selection);
        Ok(selection)
    }

    /// Move whichever endpoint is closer to `time`, then renormalize
    ///
    /// Ties move the end point.
    pub fn select_at_time(&mut self, time: f64) -> Result<Selection> {
        let current = self.selection().ok_or(StudioError::NoBufferLoaded)?;
        let candidate = if (time - current.start).abs() < (time - current.end).abs() {
            Selection::new(time, current.end)
        } else {
            Selection::new(current.start, time)
        };
        self.set_region(candidate.start, candidate.end)
    }

    /// Map a click at horizontal fraction `fraction` of the waveform to a time
    /// and move the nearer endpoint there
    pub fn click(&mut self, fraction: f64) -> Result<Selection> {
        let duration = self.duration().ok_or(StudioError::NoBufferLoaded)?;
        self.select_at_time(fraction * duration)
    }

    /// Replace the buffer with the selected region
    ///
    /// The selection is reset to the whole new buffer. A zero-length selection
    /// is a no-op that reports `TrimOutcome::EmptySelection`.
    pub fn trim(&mut self) -> Result<TrimOutcome> {
        let (buffer, selection) = match &self.state {
            EditorState::Idle => return Err(StudioError::NoBufferLoaded),
            EditorState::Active { buffer, selection } => (buffer, *selection),
        };

        if selection.is_empty() {
            debug!(%selection, "trim skipped for empty selection");
            return Ok(TrimOutcome::EmptySelection);
        }

        let trimmed = buffer.trim(selection.start, selection.end)?;
        let frames = trimmed.frame_count();
        info!(
            %selection,
            frames_before = buffer.frame_count(),
            frames_after = frames,
            "trimmed buffer"
        );
        self.load(trimmed);
        Ok(TrimOutcome::Trimmed { frames })
    }

    /// Narrow the selection to its first half
    ///
    /// Split updates the active selection to the first half; it does not
    /// partition the underlying buffer. Use `SampleBuffer::partition` for a
    /// real split. Returns the split position.
    pub fn split(&mut self) -> Result<f64> {
        let selection = self.selection().ok_or(StudioError::NoBufferLoaded)?;
        let mid = selection.midpoint();
        self.set_region(0.0, mid)?;
        debug!(split_at = mid, "selection split");
        Ok(mid)
    }

    /// Discard the buffer and selection
    ///
    /// State transition: Active -> Idle
    pub fn reset(&mut self) {
        self.state = EditorState::Idle;
        debug!("editor reset");
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn is_active(&self) -> bool {
        matches!(self.state, EditorState::Active { .. })
    }

    /// The active buffer, shared read-only
    pub fn buffer(&self) -> Option<&Arc<SampleBuffer>> {
        match &self.state {
            EditorState::Idle => None,
            EditorState::Active { buffer, .. } => Some(buffer),
        }
    }

    pub fn selection(&self) -> Option<Selection> {
        match &self.state {
            EditorState::Idle => None,
            EditorState::Active { selection, .. } => Some(*selection),
        }
    }

    pub fn duration(&self) -> Option<f64> {
        self.buffer().map(|b| b.duration_secs())
    }

    fn notify(&mut self, selection: Selection) {
        if let Some(callback) = self.on_region_change.as_mut() {
            callback(selection.start, selection.end);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
