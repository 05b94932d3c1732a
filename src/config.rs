//! Studio configuration
//!
//! All sections have defaults matching the browser studio; a JSON document
//! only needs to name the values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};

/// Default upload limit (10 MiB)
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Default exported file name
pub const DEFAULT_EXPORT_FILE_NAME: &str = "edited_audio.wav";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub input: InputConfig,
    pub playback: PlaybackConfig,
    pub export: ExportConfig,
    pub waveform: WaveformStyle,
}

impl StudioConfig {
    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: StudioConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.input.max_bytes == 0 {
            return Err(StudioError::InvalidParameter {
                param: "input.max_bytes".to_string(),
                value: "0".to_string(),
                expected: "a positive byte count".to_string(),
            });
        }
        if self.playback.report_interval_ms == 0 {
            return Err(StudioError::InvalidParameter {
                param: "playback.report_interval_ms".to_string(),
                value: "0".to_string(),
                expected: "a positive interval".to_string(),
            });
        }
        if self.export.file_name.trim().is_empty() {
            return Err(StudioError::InvalidParameter {
                param: "export.file_name".to_string(),
                value: format!("{:?}", self.export.file_name),
                expected: "a non-empty file name".to_string(),
            });
        }
        Ok(())
    }
}

/// Upload acceptance rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Maximum accepted payload size in bytes
    pub max_bytes: u64,
    /// Substring the MIME type must contain
    pub required_mime_fragment: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_INPUT_BYTES,
            required_mime_fragment: "audio".to_string(),
        }
    }
}

/// Playback position reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Interval between position reports (roughly one animation frame)
    pub report_interval_ms: u64,
    /// Spawn a background ticker on `play()`; hosts with their own render
    /// loop call `poll_position()` instead
    pub background_ticker: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            report_interval_ms: 16,
            background_ticker: false,
        }
    }
}

/// Export behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Fallback file name when the source name is unknown
    pub file_name: String,
    /// Render the equalizer into the exported file
    pub apply_equalizer: bool,
    /// Name the export after the loaded file (`song.mp3` -> `song.wav`)
    pub name_from_source: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
            apply_equalizer: false,
            name_from_source: false,
        }
    }
}

/// RGBA colour
pub type Rgba = [u8; 4];

/// Waveform raster colours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformStyle {
    pub background: Rgba,
    pub selection: Rgba,
    pub envelope: Rgba,
    pub playhead: Rgba,
}

impl Default for WaveformStyle {
    fn default() -> Self {
        Self {
            background: [0, 0, 0, 0],
            // rgba(155, 135, 245, 0.2)
            selection: [155, 135, 245, 51],
            envelope: [0x9b, 0x87, 0xf5, 0xff],
            playhead: [0x1e, 0xae, 0xdb, 0xff],
        }
    }
}
