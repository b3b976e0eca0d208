//! Real-time direction-of-arrival estimation for a circular microphone array.
//!
//! Frequency-domain delay-and-sum beamforming over an eight-channel UMA-8
//! style array: capture → overlapping Hamming frames → FFT → voice-band
//! shaping → steered power scan → dashboard.

pub mod audio;
pub mod config;
pub mod dsp;
pub mod pipeline;
pub mod present;
