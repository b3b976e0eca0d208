//! Frequency-domain delay-and-sum direction-of-arrival estimation.
//!
//! # Algorithm
//!
//! For every frame:
//!
//! 1. **Energy gate**: RMS of the windowed reference channel.  Below the
//!    threshold the frame yields no estimate and nothing else is computed;
//!    at or above it (inclusive) processing continues.
//! 2. **Spectra**: each channel goes through the radix-2 transform and is
//!    cut to `F/2 + 1` bins.
//! 3. **Band shaping**: bins outside `[min_bin, max_bin]` are zeroed, bins
//!    inside are multiplied by the voice gain.
//! 4. **Angle scan**: for every candidate angle, each active mic's spectrum
//!    is multiplied by the conjugate steering vector and summed across mics.
//!    When the hypothesis is right the phases line up and the sum is large;
//!    otherwise it interferes destructively.  The power of the sum over the
//!    band is compared against the running maximum with a strict `>`, so the
//!    first angle scanned wins ties.
//!
//! Cost is dominated by step 4: `angles × active mics × band bins` complex
//! multiply-accumulates per frame.

use std::sync::Arc;

use num_complex::Complex64;

use crate::audio::Frame;
use crate::config::AppConfig;

use super::fft::{FftError, Radix2Fft};
use super::steering::SteeringTable;

// ---------------------------------------------------------------------------
// DoaEstimate / HopReport
// ---------------------------------------------------------------------------

/// Best-matching direction for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoaEstimate {
    /// Arrival angle in whole degrees, `0..360`.
    pub angle: u16,
    /// Beamformer output power at that angle (non-negative).
    pub power: f64,
}

/// Everything the presentation side learns about one processed hop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HopReport {
    /// Windowed RMS of the reference channel.
    pub rms_energy: f64,
    /// `None` when the energy gate rejected the frame.
    pub estimate: Option<DoaEstimate>,
}

// ---------------------------------------------------------------------------
// VoiceBand
// ---------------------------------------------------------------------------

/// Inclusive bin range of the voice band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceBand {
    pub min_bin: usize,
    pub max_bin: usize,
}

impl VoiceBand {
    /// Bins covering `min_hz..=max_hz` for an `frame_size`-point transform
    /// at `sample_rate`.  Edges are truncated toward zero; the upper edge is
    /// clamped to the Nyquist bin.
    pub fn from_hz(min_hz: f64, max_hz: f64, sample_rate: u32, frame_size: usize) -> Self {
        let to_bin = |hz: f64| (hz * frame_size as f64 / sample_rate as f64) as usize;
        Self {
            min_bin: to_bin(min_hz),
            max_bin: to_bin(max_hz).min(frame_size / 2),
        }
    }

    /// Whether bin `k` lies inside the band.
    pub fn contains(&self, k: usize) -> bool {
        (self.min_bin..=self.max_bin).contains(&k)
    }
}

// ---------------------------------------------------------------------------
// Free helpers
// ---------------------------------------------------------------------------

/// Root-mean-square of `samples`; `0.0` for an empty slice.
pub fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64).sqrt()
}

/// Zero every bin outside `band` and multiply every bin inside by `gain`.
pub fn shape_band(spectrum: &mut [Complex64], band: VoiceBand, gain: f64) {
    for (k, bin) in spectrum.iter_mut().enumerate() {
        if band.contains(k) {
            *bin *= gain;
        } else {
            *bin = Complex64::new(0.0, 0.0);
        }
    }
}

// ---------------------------------------------------------------------------
// Beamformer
// ---------------------------------------------------------------------------

/// Energy-gated delay-and-sum DOA estimator.
///
/// The steering table is shared read-only; everything else the beamformer
/// touches per frame is private to the processing loop.
pub struct Beamformer {
    table: Arc<SteeringTable>,
    fft: Radix2Fft,
    band: VoiceBand,
    reference_channel: usize,
    energy_threshold: f64,
    voice_gain: f64,
}

impl Beamformer {
    /// Build a beamformer for `config` around a precomputed `table`.
    ///
    /// # Errors
    ///
    /// [`FftError::NotPowerOfTwo`] when the configured frame size cannot be
    /// transformed.
    pub fn new(config: &AppConfig, table: Arc<SteeringTable>) -> Result<Self, FftError> {
        let frame_size = config.frame.frame_size;
        let bf = &config.beamforming;
        Ok(Self {
            table,
            fft: Radix2Fft::new(frame_size)?,
            band: VoiceBand::from_hz(
                bf.min_freq_hz,
                bf.max_freq_hz,
                config.audio.sample_rate,
                frame_size,
            ),
            reference_channel: config.array.reference_channel,
            energy_threshold: bf.energy_threshold,
            voice_gain: bf.voice_gain,
        })
    }

    /// The voice band in bins.
    pub fn band(&self) -> VoiceBand {
        self.band
    }

    /// Whether a frame with reference RMS `rms_energy` is processed further.
    pub fn passes_gate(&self, rms_energy: f64) -> bool {
        rms_energy >= self.energy_threshold
    }

    /// Run the full per-frame pipeline.
    ///
    /// # Errors
    ///
    /// [`FftError`] when the frame length does not match the configured
    /// frame size.
    pub fn process(&self, frame: &Frame) -> Result<HopReport, FftError> {
        let rms_energy = rms(frame.channel(self.reference_channel));
        if !self.passes_gate(rms_energy) {
            return Ok(HopReport {
                rms_energy,
                estimate: None,
            });
        }

        let mut spectra = self.spectra(frame)?;
        for spectrum in &mut spectra {
            shape_band(spectrum, self.band, self.voice_gain);
        }

        Ok(HopReport {
            rms_energy,
            estimate: Some(self.scan(&spectra)),
        })
    }

    /// Transform every channel of `frame` into `F/2 + 1` complex bins.
    pub fn spectra(&self, frame: &Frame) -> Result<Vec<Vec<Complex64>>, FftError> {
        let bins = self.fft.len() / 2 + 1;
        frame
            .channels()
            .iter()
            .map(|samples| -> Result<Vec<Complex64>, FftError> {
                let mut buf: Vec<Complex64> =
                    samples.iter().map(|&s| Complex64::new(s, 0.0)).collect();
                self.fft.process(&mut buf)?;
                buf.truncate(bins);
                Ok(buf)
            })
            .collect()
    }

    /// Scan every candidate angle over already shaped `spectra` (indexed by
    /// channel) and return the strongest one.
    ///
    /// The reported power is never negative, even when every angle scores
    /// NaN (non-finite input); angle 0 is reported in that case.
    pub fn scan(&self, spectra: &[Vec<Complex64>]) -> DoaEstimate {
        let VoiceBand { min_bin, max_bin } = self.band;
        let active = self.table.active_channels();
        let mut summed = vec![Complex64::new(0.0, 0.0); max_bin + 1 - min_bin];

        let mut best_angle = 0;
        let mut max_power = -1.0;

        for angle in 0..self.table.angle_count() {
            summed.fill(Complex64::new(0.0, 0.0));

            for (mic, &channel) in active.iter().enumerate() {
                let steering = &self.table.row(angle, mic)[min_bin..=max_bin];
                let spectrum = &spectra[channel][min_bin..=max_bin];
                for ((acc, x), a) in summed.iter_mut().zip(spectrum).zip(steering) {
                    *acc += *x * a.conj();
                }
            }

            let power: f64 = summed.iter().map(Complex64::norm_sqr).sum();
            if power > max_power {
                max_power = power;
                best_angle = angle;
            }
        }

        DoaEstimate {
            angle: self.table.angle_degrees(best_angle),
            power: max_power.max(0.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
