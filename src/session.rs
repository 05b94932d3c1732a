//! Editing session
//!
//! `StudioSession` wires the editing components together the way a host UI
//! drives them: one active buffer owned by the selection editor, an
//! equalizer rebuilt for every new buffer, a shared playback scheduler and
//! an optional background position ticker.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::StudioConfig;
use crate::dsp::{EqualizerChain, GraphContext};
use crate::engine::io::{load_input, AudioDecoder, AudioInput};
use crate::engine::playback::{Clock, PlaybackScheduler, PlaybackState, PositionTicker, SystemClock};
use crate::engine::selection::{Selection, SelectionEditor, TrimOutcome};
use crate::engine::waveform::{Raster, WaveformFrame, WaveformRenderer};
use crate::engine::wav::{export_file_name, WavEncoder};
use crate::engine::SampleBuffer;
use crate::error::{Result, StudioError};

fn lock(scheduler: &Mutex<PlaybackScheduler>) -> MutexGuard<'_, PlaybackScheduler> {
    scheduler.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One editing session over a single active buffer
#[derive(Debug)]
pub struct StudioSession {
    config: StudioConfig,
    editor: SelectionEditor,
    equalizer: EqualizerChain,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    ticker: Option<PositionTicker>,
    renderer: WaveformRenderer,
    source_name: Option<String>,
}

impl Default for StudioSession {
    fn default() -> Self {
        Self::new(StudioConfig::default())
    }
}

impl StudioSession {
    /// Create an idle session on the system clock
    pub fn new(config: StudioConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::default()))
    }

    /// Create an idle session with a custom playback clock
    pub fn with_clock(config: StudioConfig, clock: Arc<dyn Clock>) -> Self {
        let renderer = WaveformRenderer::new(config.waveform.clone());
        Self {
            config,
            editor: SelectionEditor::new(),
            equalizer: EqualizerChain::new(),
            scheduler: Arc::new(Mutex::new(PlaybackScheduler::new(clock))),
            ticker: None,
            renderer,
            source_name: None,
        }
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    pub fn on_region_change(&mut self, callback: impl FnMut(f64, f64) + Send + 'static) {
        self.editor.set_on_region_change(callback);
    }

    pub fn on_gain_change(&mut self, callback: impl FnMut(usize, f32) + Send + 'static) {
        self.equalizer.set_on_gain_change(callback);
    }

    pub fn on_position(&mut self, callback: impl FnMut(f64) + Send + 'static) {
        lock(&self.scheduler).set_on_position(callback);
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Validate, decode and activate an upload
    ///
    /// On failure the previous buffer, selection and playback are untouched.
    pub fn load(&mut self, input: &AudioInput, decoder: &dyn AudioDecoder) -> Result<()> {
        let buffer = load_input(input, decoder, &self.config.input)?;
        self.activate(buffer, input.name.clone());
        Ok(())
    }

    /// Activate an already decoded buffer
    pub fn load_buffer(&mut self, buffer: SampleBuffer, name: impl Into<String>) {
        self.activate(buffer, name.into());
    }

    fn activate(&mut self, buffer: SampleBuffer, name: String) {
        self.stop();
        self.equalizer.build(GraphContext::for_buffer(&buffer));
        self.editor.load(buffer);
        lock(&self.scheduler).seek(0.0);
        debug!(name = %name, "session buffer activated");
        self.source_name = Some(name);
    }

    pub fn is_loaded(&self) -> bool {
        self.editor.is_active()
    }

    pub fn buffer(&self) -> Option<&Arc<SampleBuffer>> {
        self.editor.buffer()
    }

    pub fn selection(&self) -> Option<Selection> {
        self.editor.selection()
    }

    pub fn equalizer(&self) -> &EqualizerChain {
        &self.equalizer
    }

    // ========================================================================
    // Editing
    // ========================================================================

    pub fn set_region(&mut self, start: f64, end: f64) -> Result<Selection> {
        self.editor.set_region(start, end)
    }

    /// Click at horizontal fraction `fraction` of the waveform
    pub fn click_waveform(&mut self, fraction: f64) -> Result<Selection> {
        self.editor.click(fraction)
    }

    /// Trim the buffer to the selection
    ///
    /// A real trim stops playback, rewinds the playhead and rebuilds the
    /// equalizer for the new buffer, keeping the gains.
    pub fn trim(&mut self) -> Result<TrimOutcome> {
        let outcome = self.editor.trim()?;
        if let TrimOutcome::Trimmed { .. } = outcome {
            self.stop();
            if let Some(buffer) = self.editor.buffer() {
                self.equalizer.build(GraphContext::for_buffer(buffer));
            }
            lock(&self.scheduler).seek(0.0);
        }
        Ok(outcome)
    }

    /// Narrow the selection to its first half; the buffer is not partitioned
    pub fn split(&mut self) -> Result<f64> {
        self.editor.split()
    }

    pub fn set_gain(&mut self, band: usize, db: f32) -> Result<()> {
        self.equalizer.set_gain(band, db)
    }

    pub fn reset_equalizer(&mut self) {
        self.equalizer.reset();
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Play the current selection
    ///
    /// Starts the background ticker when `playback.background_ticker` is set.
    pub fn play(&mut self) -> Result<PlaybackState> {
        let buffer = Arc::clone(self.editor.buffer().ok_or(StudioError::NoBufferLoaded)?);
        let selection = self.editor.selection().ok_or(StudioError::NoBufferLoaded)?;

        self.cancel_ticker();
        self.equalizer.clear_history();
        let state = lock(&self.scheduler).play(buffer, selection);

        if state == PlaybackState::Playing && self.config.playback.background_ticker {
            let interval = Duration::from_millis(self.config.playback.report_interval_ms);
            self.ticker = Some(PositionTicker::spawn(Arc::clone(&self.scheduler), interval));
        }
        Ok(state)
    }

    /// Halt playback and the position ticker; idempotent
    pub fn stop(&mut self) {
        self.cancel_ticker();
        lock(&self.scheduler).stop();
    }

    fn cancel_ticker(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    pub fn playback_state(&self) -> PlaybackState {
        lock(&self.scheduler).state()
    }

    /// Poll the scheduler from the host's render loop
    pub fn poll_position(&mut self) -> f64 {
        lock(&self.scheduler).poll()
    }

    /// Last reported playhead position
    pub fn position(&self) -> f64 {
        lock(&self.scheduler).position()
    }

    /// Move the playhead to the selection start (while stopped)
    pub fn seek_to_selection_start(&mut self) -> Result<f64> {
        let selection = self.editor.selection().ok_or(StudioError::NoBufferLoaded)?;
        Ok(lock(&self.scheduler).seek(selection.start))
    }

    /// Move the playhead to the selection end (while stopped)
    pub fn seek_to_selection_end(&mut self) -> Result<f64> {
        let selection = self.editor.selection().ok_or(StudioError::NoBufferLoaded)?;
        Ok(lock(&self.scheduler).seek(selection.end))
    }

    /// Pull interleaved output frames for the host audio callback
    pub fn render_audio(&mut self, out: &mut [f32]) -> usize {
        lock(&self.scheduler).render(&mut self.equalizer, out)
    }

    // ========================================================================
    // Display and export
    // ========================================================================

    /// Waveform geometry for a `width` x `height` canvas
    pub fn render_waveform(&self, width: usize, height: usize) -> Result<WaveformFrame> {
        let buffer = self.editor.buffer().ok_or(StudioError::NoBufferLoaded)?;
        let selection = self.editor.selection().ok_or(StudioError::NoBufferLoaded)?;
        self.renderer
            .render(buffer, width, height, selection, self.position())
    }

    /// Waveform painted with the configured colours
    pub fn render_waveform_raster(&self, width: usize, height: usize) -> Result<Raster> {
        self.render_waveform(width, height)?
            .rasterize(self.renderer.style())
    }

    /// Encode the active buffer as WAV bytes
    ///
    /// The equalizer is rendered into the file when `export.apply_equalizer`
    /// is set.
    pub fn export_wav(&self) -> Result<Vec<u8>> {
        let buffer = self.editor.buffer().ok_or(StudioError::NoBufferLoaded)?;
        if self.config.export.apply_equalizer {
            WavEncoder.encode(&self.equalizer.apply_offline(buffer))
        } else {
            WavEncoder.encode(buffer)
        }
    }

    /// File name offered for the export
    pub fn export_name(&self) -> String {
        match &self.source_name {
            Some(name) if self.config.export.name_from_source => export_file_name(name),
            _ => self.config.export.file_name.clone(),
        }
    }

    /// Write the WAV export to `path`
    pub fn export_to(&self, path: &Path) -> Result<()> {
        let bytes = self.export_wav()?;
        std::fs::write(path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "session exported");
        Ok(())
    }

    /// Stop playback and discard the buffer, selection and live equalizer
    pub fn reset(&mut self) {
        self.stop();
        self.editor.reset();
        self.equalizer.disconnect();
        lock(&self.scheduler).seek(0.0);
        self.source_name = None;
        debug!("session reset");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::playback::ManualClock;
    use crate::engine::{generate_stereo_test_tone, WavDecoder};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn session_with_clock() -> (StudioSession, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let session = StudioSession::with_clock(StudioConfig::default(), clock.clone());
        (session, clock)
    }

    fn loaded() -> (StudioSession, Arc<ManualClock>) {
        let (mut session, clock) = session_with_clock();
        session.load_buffer(generate_stereo_test_tone(440.0, 660.0, 2.0, 8000), "tone.ogg");
        (session, clock)
    }

    #[test]
    fn test_idle_session() {
        let mut session = StudioSession::default();
        assert!(!session.is_loaded());
        assert!(matches!(session.play(), Err(StudioError::NoBufferLoaded)));
        assert!(matches!(session.export_wav(), Err(StudioError::NoBufferLoaded)));
        assert!(session.render_waveform(10, 10).is_err());
        session.stop();
    }

    #[test]
    fn test_load_builds_equalizer() {
        let (session, _) = loaded();
        assert!(session.is_loaded());
        assert!(session.equalizer().is_built());
        assert_eq!(session.selection(), Some(Selection::new(0.0, 2.0)));
    }

    #[test]
    fn test_rejected_input_keeps_previous_state() {
        let (mut session, _) = loaded();
        let input = AudioInput::new("notes.txt", "text/plain", vec![0; 16]);
        let err = session.load(&input, &WavDecoder).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT_TYPE");
        assert_eq!(session.buffer().unwrap().frame_count(), 16_000);
    }

    #[test]
    fn test_trim_rebuilds_equalizer_keeping_gains() {
        let (mut session, _) = loaded();
        session.set_gain(3, 6.0).unwrap();
        let before = session.equalizer().context().unwrap().id();

        session.set_region(0.5, 1.5).unwrap();
        assert_eq!(session.trim().unwrap(), TrimOutcome::Trimmed { frames: 8000 });
        assert_ne!(session.equalizer().context().unwrap().id(), before);
        assert_eq!(session.equalizer().gain(3), Some(6.0));
    }

    #[test]
    fn test_play_poll_stop() {
        let (mut session, clock) = loaded();
        session.set_region(0.5, 1.0).unwrap();
        assert_eq!(session.play().unwrap(), PlaybackState::Playing);

        clock.advance_secs(0.25);
        assert_eq!(session.poll_position(), 0.75);

        session.stop();
        assert_eq!(session.playback_state(), PlaybackState::Stopped);
        let mut out = [1.0_f32; 8];
        assert_eq!(session.render_audio(&mut out), 0);
    }

    #[test]
    fn test_seek_to_selection_bounds() {
        let (mut session, _) = loaded();
        session.set_region(0.25, 1.75).unwrap();
        assert_eq!(session.seek_to_selection_end().unwrap(), 1.75);
        assert_eq!(session.seek_to_selection_start().unwrap(), 0.25);
        assert_eq!(session.render_waveform(8, 4).unwrap().playhead, Some(1));
    }

    #[test]
    fn test_background_ticker_silent_after_stop() {
        let mut config = StudioConfig::default();
        config.playback.background_ticker = true;
        config.playback.report_interval_ms = 1;
        let mut session = StudioSession::with_clock(config, Arc::new(ManualClock::new()));
        session.load_buffer(generate_stereo_test_tone(440.0, 660.0, 2.0, 8000), "tone.wav");

        let reports = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reports);
        session.on_position(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(session.play().unwrap(), PlaybackState::Playing);
        assert!(session.ticker.is_some());

        let deadline = Instant::now() + Duration::from_secs(5);
        while reports.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(reports.load(Ordering::SeqCst) >= 3);

        session.stop();
        let after_stop = reports.load(Ordering::SeqCst);
        assert!(session.ticker.is_none());
        assert_eq!(session.playback_state(), PlaybackState::Stopped);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(reports.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_render_waveform_raster_uses_configured_style() {
        let (mut session, _) = session_with_clock();
        session.load_buffer(SampleBuffer::silent(1, 16_000, 8000).unwrap(), "quiet.wav");
        session.set_region(0.0, 1.0).unwrap();
        let style = session.config().waveform.clone();

        let raster = session.render_waveform_raster(16, 8).unwrap();
        assert_eq!((raster.width(), raster.height()), (16, 8));
        assert_eq!(raster.as_bytes().len(), 16 * 8 * 4);
        // playhead at column 0, selection over columns 0..8, silence on row 4
        assert_eq!(raster.pixel(0, 0), Some(style.playhead));
        assert_eq!(raster.pixel(4, 0).map(|p| p[3]), Some(style.selection[3]));
        assert_eq!(raster.pixel(12, 0), Some(style.background));
        assert_eq!(raster.pixel(12, 4), Some(style.envelope));

        assert!(session.render_waveform_raster(usize::MAX, 8).is_err());
        assert!(matches!(
            StudioSession::default().render_waveform_raster(16, 8),
            Err(StudioError::NoBufferLoaded)
        ));
    }

    #[test]
    fn test_export_names() {
        let (session, _) = loaded();
        assert_eq!(session.export_name(), "edited_audio.wav");

        let mut config = StudioConfig::default();
        config.export.name_from_source = true;
        let mut session = StudioSession::new(config);
        session.load_buffer(generate_stereo_test_tone(440.0, 660.0, 0.1, 8000), "tone.ogg");
        assert_eq!(session.export_name(), "tone.wav");
    }

    #[test]
    fn test_equalized_export_differs() {
        let mut config = StudioConfig::default();
        config.export.apply_equalizer = true;
        let mut session = StudioSession::new(config);
        session.load_buffer(generate_stereo_test_tone(440.0, 660.0, 0.5, 8000), "tone");

        let flat = session.export_wav().unwrap();
        session.set_gain(4, 12.0).unwrap();
        let boosted = session.export_wav().unwrap();
        assert_eq!(flat.len(), boosted.len());
        assert_ne!(flat, boosted);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let (mut session, _) = loaded();
        session.play().unwrap();
        session.reset();
        assert!(!session.is_loaded());
        assert!(!session.equalizer().is_built());
        assert_eq!(session.playback_state(), PlaybackState::Stopped);
        assert_eq!(session.position(), 0.0);
    }
}
