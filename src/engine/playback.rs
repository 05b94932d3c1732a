//! Playback scheduling
//!
//! `PlaybackScheduler` plays a selection of a shared buffer through the
//! equalizer and reports the elapsed position. The host owns real-time
//! timing: it pulls audio with `render` from its audio callback and polls
//! the position from its render loop, or lets a `PositionTicker` poll on a
//! background thread.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::dsp::EqualizerChain;
use crate::engine::buffer::{ceil_frames, floor_frames, SampleBuffer};
use crate::engine::selection::Selection;

/// Callback receiving the current playback position in seconds
pub type PositionCallback = Box<dyn FnMut(f64) + Send>;

// ============================================================================
// Clocks
// ============================================================================

/// Monotonic time source
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs.max(0.0)));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Playback states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "Stopped"),
            PlaybackState::Playing => write!(f, "Playing"),
        }
    }
}

/// Active playback of one selection
struct Voice {
    buffer: Arc<SampleBuffer>,
    selection: Selection,
    offset: f64,
    span: f64,
    started_at: Duration,
    cursor: usize,
    end_frame: usize,
}

/// Drives playback of a buffer selection and tracks the playhead
pub struct PlaybackScheduler {
    clock: Arc<dyn Clock>,
    voice: Option<Voice>,
    position: f64,
    on_position: Option<PositionCallback>,
}

impl fmt::Debug for PlaybackScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackScheduler")
            .field("state", &self.state())
            .field("position", &self.position)
            .finish()
    }
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock::default()))
    }
}

impl PlaybackScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            voice: None,
            position: 0.0,
            on_position: None,
        }
    }

    /// Register the position callback, fired on every poll while playing
    pub fn set_on_position(&mut self, callback: impl FnMut(f64) + Send + 'static) {
        self.on_position = Some(Box::new(callback));
    }

    pub fn state(&self) -> PlaybackState {
        if self.voice.is_some() {
            PlaybackState::Playing
        } else {
            PlaybackState::Stopped
        }
    }

    pub fn is_playing(&self) -> bool {
        self.voice.is_some()
    }

    /// Last reported position in seconds
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Start playing `selection` of `buffer`
    ///
    /// `offset = clamp(start, 0, duration)` and
    /// `span = min(end - start, duration - offset)`. A non-positive span
    /// completes immediately: the scheduler stays Stopped at `selection.start`.
    /// Any current playback is stopped first.
    pub fn play(&mut self, buffer: Arc<SampleBuffer>, selection: Selection) -> PlaybackState {
        self.stop();

        let duration = buffer.duration_secs();
        let offset = if selection.start.is_nan() {
            0.0
        } else {
            selection.start.clamp(0.0, duration)
        };
        let span = (selection.end - selection.start).min(duration - offset);

        if span.is_nan() || span <= 0.0 {
            debug!(%selection, "zero-length playback completed immediately");
            self.position = selection.start;
            return PlaybackState::Stopped;
        }

        let frames = buffer.frame_count();
        let cursor = (floor_frames(offset, buffer.sample_rate()).max(0) as usize).min(frames);
        let end_frame = cursor
            .saturating_add(ceil_frames(span, buffer.sample_rate()))
            .min(frames);

        info!(offset, span, %selection, "playback started");
        self.voice = Some(Voice {
            buffer,
            selection,
            offset,
            span,
            started_at: self.clock.now(),
            cursor,
            end_frame,
        });
        self.position = offset;
        PlaybackState::Playing
    }

    /// Publish the current position
    ///
    /// While playing this is `offset + elapsed`. Once elapsed time reaches the
    /// span, playback stops and the position snaps back to `selection.start`.
    pub fn poll(&mut self) -> f64 {
        let Some(voice) = &self.voice else {
            return self.position;
        };

        let elapsed = self
            .clock
            .now()
            .saturating_sub(voice.started_at)
            .as_secs_f64();

        if elapsed >= voice.span {
            let start = voice.selection.start;
            debug!(elapsed, span = voice.span, "playback reached end of selection");
            self.voice = None;
            self.position = start;
        } else {
            self.position = voice.offset + elapsed;
        }

        let position = self.position;
        if let Some(callback) = self.on_position.as_mut() {
            callback(position);
        }
        position
    }

    /// Halt output; a no-op when already stopped
    ///
    /// The playhead stays at the last reported position.
    pub fn stop(&mut self) {
        if self.voice.take().is_some() {
            info!(position = self.position, "playback stopped");
        }
    }

    /// Move the playhead while stopped
    ///
    /// Ignored during playback; returns the resulting position.
    pub fn seek(&mut self, time: f64) -> f64 {
        if self.is_playing() {
            warn!(time, "seek ignored during playback");
        } else if time.is_finite() {
            self.position = time.max(0.0);
        }
        self.position
    }

    /// Fill `out` with interleaved frames of the playing selection, filtered
    /// through `equalizer`
    ///
    /// Returns the number of frames written; the rest of `out` is silence.
    /// Nothing is written while stopped.
    pub fn render(&mut self, equalizer: &mut EqualizerChain, out: &mut [f32]) -> usize {
        let Some(voice) = self.voice.as_mut() else {
            out.fill(0.0);
            return 0;
        };

        let channels = voice.buffer.channel_count();
        let capacity = out.len() / channels;
        let frames = capacity.min(voice.end_frame - voice.cursor);

        for i in 0..frames {
            let frame = voice.cursor + i;
            for (ch, data) in voice.buffer.channels().enumerate() {
                out[i * channels + ch] = data[frame];
            }
        }
        out[frames * channels..].fill(0.0);

        equalizer.process_interleaved(&mut out[..frames * channels], channels);
        voice.cursor += frames;
        frames
    }

    /// Channel count of the playing buffer
    pub fn channels(&self) -> Option<usize> {
        self.voice.as_ref().map(|v| v.buffer.channel_count())
    }
}

// ============================================================================
// Position ticker
// ============================================================================

/// Background thread that polls a shared scheduler at a fixed interval
///
/// The thread exits on `cancel`, on drop, or after the poll that observes the
/// end of playback. Polls run under the scheduler lock, so once
/// `PlaybackScheduler::stop` has returned no further position is published.
#[derive(Debug)]
pub struct PositionTicker {
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PositionTicker {
    pub fn spawn(scheduler: Arc<Mutex<PlaybackScheduler>>, interval: Duration) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let handle = thread::spawn(move || {
            debug!(interval_ms = interval.as_millis() as u64, "position ticker started");
            loop {
                thread::sleep(interval);
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                let mut scheduler = scheduler.lock().unwrap_or_else(PoisonError::into_inner);
                if flag.load(Ordering::SeqCst) || !scheduler.is_playing() {
                    break;
                }
                scheduler.poll();
                if !scheduler.is_playing() {
                    break;
                }
            }
            debug!("position ticker stopped");
        });

        Self {
            cancelled,
            handle: Some(handle),
        }
    }

    /// True once the ticker thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the ticker and wait for its thread
    ///
    /// Must not be called while holding the scheduler lock.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("position ticker panicked");
            }
        }
    }
}

impl Drop for PositionTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================
