//! Signal processing: transform, steering vectors and the beamformer.
//!
//! # Pipeline
//!
//! ```text
//! Frame (N × F windowed) → Radix2Fft per channel → F/2+1 bins
//!        → energy gate (reference RMS) → voice-band shaping
//!        → SteeringTable scan over candidate angles → DoaEstimate
//! ```

pub mod beamformer;
pub mod fft;
pub mod steering;

pub use beamformer::{rms, shape_band, Beamformer, DoaEstimate, HopReport, VoiceBand};
pub use fft::{inverse_transform, transform, FftError, Radix2Fft};
pub use steering::{uma8_positions, MicArray, SteeringTable, UMA8_RADIUS_M};
