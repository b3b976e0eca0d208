//! Application settings structs, defaults, validation and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to each
//! component at construction.  Nothing here is mutated after startup.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;
use crate::dsp::steering::{uma8_positions, MicArray, UMA8_RADIUS_M};

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A setting combination the pipeline cannot run with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("frame_size {0} is not a power of two")]
    FrameSizeNotPowerOfTwo(usize),

    #[error("hop_size {hop} must be in 1..={frame}")]
    InvalidHop { hop: usize, frame: usize },

    #[error("sample_rate and channels must be non-zero")]
    EmptyStream,

    #[error(
        "capture buffer of {capacity} samples is too small; at least {required} needed \
         (frame + 2 hops, all channels)"
    )]
    BufferTooSmall { capacity: usize, required: usize },

    #[error("{positions} microphone positions configured for {channels} channels")]
    PositionCountMismatch { positions: usize, channels: usize },

    #[error("no active microphones configured")]
    NoActiveMics,

    #[error("active microphone {index} is outside 0..{channels}")]
    ActiveMicOutOfRange { index: usize, channels: usize },

    #[error("reference channel {index} is outside 0..{channels}")]
    ReferenceOutOfRange { index: usize, channels: usize },

    #[error("voice band {min_hz}-{max_hz} Hz must satisfy 0 < min < max <= {nyquist} Hz")]
    InvalidBand { min_hz: f64, max_hz: f64, nyquist: f64 },

    #[error("angle_count {0} must be non-zero and divide 360")]
    InvalidAngleCount(usize),

    #[error("speed_of_sound must be positive, got {0}")]
    InvalidSpeedOfSound(f64),

    #[error("schedule.poll_interval_ms must be non-zero")]
    ZeroPollInterval,
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Where samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSourceKind {
    /// A cpal input device.
    Device,
    /// A generated plane wave, see [`SyntheticConfig`].
    Synthetic,
}

impl Default for CaptureSourceKind {
    fn default() -> Self {
        Self::Device
    }
}

/// Capture stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample source.
    pub source: CaptureSourceKind,
    /// Substring of the input device name to prefer (e.g. `"UMA-8"`).
    /// `None` means the system default input device.
    pub device_name: Option<String>,
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Ring buffer length in seconds of audio.
    pub buffer_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            source: CaptureSourceKind::default(),
            device_name: Some("UMA-8".into()),
            sample_rate: 48_000,
            channels: 8,
            buffer_secs: 2.0,
        }
    }
}

impl AudioConfig {
    /// Ring buffer capacity in interleaved samples.
    pub fn buffer_capacity(&self) -> usize {
        let frames = (self.sample_rate as f64 * self.buffer_secs as f64).round() as usize;
        frames * self.channels as usize
    }
}

// ---------------------------------------------------------------------------
// ArrayConfig
// ---------------------------------------------------------------------------

/// Microphone geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayConfig {
    /// `(x, y)` of every channel in metres, relative to the array centre.
    pub mic_positions: Vec<(f64, f64)>,
    /// Channels that take part in beamforming.
    pub active_mics: Vec<usize>,
    /// Channel whose RMS drives the energy gate.
    pub reference_channel: usize,
    /// Speed of sound in m/s.
    pub speed_of_sound: f64,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            mic_positions: uma8_positions(UMA8_RADIUS_M),
            active_mics: (1..=6).collect(),
            reference_channel: 0,
            speed_of_sound: 343.0,
        }
    }
}

impl ArrayConfig {
    /// Geometry as a [`MicArray`].
    pub fn mic_array(&self) -> MicArray {
        MicArray::new(self.mic_positions.clone(), self.active_mics.clone())
    }
}

// ---------------------------------------------------------------------------
// FrameConfig
// ---------------------------------------------------------------------------

/// Analysis frame settings, in samples per channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Transform length `F`; must be a power of two.
    pub frame_size: usize,
    /// New samples per processing iteration; also the capture period.
    pub hop_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            hop_size: 512,
        }
    }
}

// ---------------------------------------------------------------------------
// BeamformingConfig
// ---------------------------------------------------------------------------

/// Energy gate, voice band and angle scan settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeamformingConfig {
    /// Candidate directions, evenly spaced over 360°.
    pub angle_count: usize,
    /// Minimum windowed RMS of the reference channel (inclusive).
    pub energy_threshold: f64,
    /// Lower edge of the voice band in Hz.
    pub min_freq_hz: f64,
    /// Upper edge of the voice band in Hz.
    pub max_freq_hz: f64,
    /// Gain applied to in-band bins.
    pub voice_gain: f64,
}

impl Default for BeamformingConfig {
    fn default() -> Self {
        Self {
            angle_count: 360,
            energy_threshold: 0.001,
            min_freq_hz: 300.0,
            max_freq_hz: 3400.0,
            voice_gain: 3.0,
        }
    }
}

// ---------------------------------------------------------------------------
// ScheduleConfig
// ---------------------------------------------------------------------------

/// How the processing loop waits when no hop is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePolicyKind {
    /// Sleep `poll_interval_ms` between polls.
    Interval,
    /// Wake as soon as the capture side has written the next hop, checking
    /// the stop flag at least every `poll_interval_ms`.
    OnData,
}

impl Default for SchedulePolicyKind {
    fn default() -> Self {
        Self::Interval
    }
}

/// Processing loop scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub policy: SchedulePolicyKind,
    pub poll_interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            policy: SchedulePolicyKind::default(),
            poll_interval_ms: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// SyntheticConfig
// ---------------------------------------------------------------------------

/// Plane wave rendered by the synthetic capture source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Arrival direction in degrees.
    pub angle_deg: f64,
    /// Tone frequency in Hz.
    pub frequency_hz: f64,
    /// Peak amplitude in `[0.0, 1.0]`.
    pub amplitude: f32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            angle_deg: 90.0,
            frequency_hz: 1500.0,
            amplitude: 0.1,
        }
    }
}

// ---------------------------------------------------------------------------
// ExportConfig
// ---------------------------------------------------------------------------

/// CSV export of captured frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Write every frame that produced a direction estimate.
    pub on_detection: bool,
    /// Output directory; `None` uses [`AppPaths::captures_dir`].
    pub directory: Option<PathBuf>,
    /// File name prefix, followed by `_<n>.csv`.
    pub prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            on_detection: false,
            directory: None,
            prefix: "capture".into(),
        }
    }
}

impl ExportConfig {
    /// Resolved output directory.
    pub fn resolved_dir(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| AppPaths::new().captures_dir)
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// Missing sections fall back to their defaults, so a settings file only
/// needs the values it changes.
///
/// ```rust,no_run
/// use voice_doa::config::AppConfig;
///
/// let config = AppConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub array: ArrayConfig,
    pub frame: FrameConfig,
    pub beamforming: BeamformingConfig,
    pub schedule: ScheduleConfig,
    pub synthetic: SyntheticConfig,
    pub export: ExportConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every cross-field constraint the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let frame = self.frame.frame_size;
        let hop = self.frame.hop_size;
        let channels = self.audio.channels as usize;

        if !frame.is_power_of_two() {
            return Err(ConfigError::FrameSizeNotPowerOfTwo(frame));
        }
        if hop == 0 || hop > frame {
            return Err(ConfigError::InvalidHop { hop, frame });
        }
        if self.audio.sample_rate == 0 || channels == 0 {
            return Err(ConfigError::EmptyStream);
        }

        // Frame plus one hop of backlog plus one hop the producer may write
        // while the frame is being copied.
        let required = (frame + 2 * hop) * channels;
        let capacity = self.audio.buffer_capacity();
        if capacity < required {
            return Err(ConfigError::BufferTooSmall { capacity, required });
        }

        if self.array.mic_positions.len() != channels {
            return Err(ConfigError::PositionCountMismatch {
                positions: self.array.mic_positions.len(),
                channels,
            });
        }
        if self.array.active_mics.is_empty() {
            return Err(ConfigError::NoActiveMics);
        }
        if let Some(&index) = self.array.active_mics.iter().find(|&&i| i >= channels) {
            return Err(ConfigError::ActiveMicOutOfRange { index, channels });
        }
        if self.array.reference_channel >= channels {
            return Err(ConfigError::ReferenceOutOfRange {
                index: self.array.reference_channel,
                channels,
            });
        }
        if !(self.array.speed_of_sound > 0.0) {
            return Err(ConfigError::InvalidSpeedOfSound(self.array.speed_of_sound));
        }

        let bf = &self.beamforming;
        let nyquist = self.audio.sample_rate as f64 / 2.0;
        if !(bf.min_freq_hz > 0.0 && bf.min_freq_hz < bf.max_freq_hz && bf.max_freq_hz <= nyquist)
        {
            return Err(ConfigError::InvalidBand {
                min_hz: bf.min_freq_hz,
                max_hz: bf.max_freq_hz,
                nyquist,
            });
        }
        if bf.angle_count == 0 || 360 % bf.angle_count != 0 {
            return Err(ConfigError::InvalidAngleCount(bf.angle_count));
        }
        if self.schedule.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
