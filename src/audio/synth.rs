//! Hardware-free capture source.
//!
//! [`PlaneWave`] renders what an ideal array would record from a single
//! far-field tone; [`SyntheticCapture`] feeds it into a [`CaptureBuffer`] at
//! real-time cadence from a background thread, standing in for the cpal
//! callback.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::dsp::MicArray;

use super::buffer::SharedCaptureBuffer;
use super::capture::{CaptureError, CaptureHandle, CaptureSource};

// ---------------------------------------------------------------------------
// PlaneWave
// ---------------------------------------------------------------------------

/// Sine tone arriving as a plane wave from a fixed direction.
///
/// Channel `m` at sample `n` is `A·sin(2π·f·(n/fs + τ_m))` where `τ_m` is the
/// arrival advance of that channel's position.
#[derive(Debug, Clone)]
pub struct PlaneWave {
    /// Per-channel arrival advance in seconds.
    delays: Vec<f64>,
    frequency_hz: f64,
    amplitude: f64,
    sample_rate: f64,
    /// Next per-channel sample index.
    next: u64,
}

impl PlaneWave {
    pub fn new(
        array: &MicArray,
        angle_deg: f64,
        frequency_hz: f64,
        amplitude: f64,
        sample_rate: u32,
        speed_of_sound: f64,
    ) -> Self {
        let delays = (0..array.channel_count())
            .map(|ch| array.delay_secs(ch, angle_deg, speed_of_sound))
            .collect();
        Self {
            delays,
            frequency_hz,
            amplitude,
            sample_rate: sample_rate as f64,
            next: 0,
        }
    }

    /// Plane wave described by the `[synthetic]` section of `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.array.mic_array(),
            config.synthetic.angle_deg,
            config.synthetic.frequency_hz,
            config.synthetic.amplitude as f64,
            config.audio.sample_rate,
            config.array.speed_of_sound,
        )
    }

    /// Number of interleaved channels rendered.
    pub fn channels(&self) -> usize {
        self.delays.len()
    }

    /// Render the next `frames` samples per channel, interleaved.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(frames * self.delays.len());
        let omega = 2.0 * PI * self.frequency_hz;
        for n in self.next..self.next + frames as u64 {
            let t = n as f64 / self.sample_rate;
            for tau in &self.delays {
                out.push((self.amplitude * (omega * (t + tau)).sin()) as f32);
            }
        }
        self.next += frames as u64;
        out
    }
}

// ---------------------------------------------------------------------------
// SyntheticCapture
// ---------------------------------------------------------------------------

/// [`CaptureSource`] that pushes [`PlaneWave`] blocks of `block_frames`
/// samples per channel, paced like a sound card delivering periods.
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    wave: PlaneWave,
    block_frames: usize,
}

impl SyntheticCapture {
    pub fn new(wave: PlaneWave, block_frames: usize) -> Self {
        Self {
            wave,
            block_frames: block_frames.max(1),
        }
    }

    /// Synthetic source delivering one hop per period.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(PlaneWave::from_config(config), config.frame.hop_size)
    }

    fn period(&self) -> Duration {
        Duration::from_secs_f64(self.block_frames as f64 / self.wave.sample_rate)
    }
}

impl CaptureSource for SyntheticCapture {
    fn start(&self, buffer: SharedCaptureBuffer) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let stop = Arc::new(AtomicBool::new(false));
        let mut wave = self.wave.clone();
        let block_frames = self.block_frames;
        let period = self.period();

        log::info!(
            "synthetic capture: {} channels, {:.0} Hz tone, block of {} frames",
            wave.channels(),
            wave.frequency_hz,
            block_frames
        );

        let thread_stop = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("synthetic-capture".into())
            .spawn(move || {
                let mut deadline = Instant::now();
                while !thread_stop.load(Ordering::Relaxed) {
                    buffer.push_interleaved(&wave.render(block_frames));
                    deadline += period;
                    if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                        thread::sleep(wait);
                    }
                }
            })
            .map_err(CaptureError::Spawn)?;

        Ok(Box::new(SyntheticHandle {
            stop,
            thread: Some(thread),
        }))
    }
}

struct SyntheticHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SyntheticHandle {
    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("synthetic capture thread panicked");
            }
        }
    }
}

impl CaptureHandle for SyntheticHandle {
    fn stop(mut self: Box<Self>) {
        self.shutdown();
    }
}

impl Drop for SyntheticHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CaptureBuffer;

    fn two_mics() -> MicArray {
        MicArray::new(vec![(0.0, 0.0), (0.05, 0.0)], vec![0, 1])
    }

    #[test]
    fn render_is_interleaved_and_continuous() {
        let mut wave = PlaneWave::new(&two_mics(), 0.0, 1000.0, 0.5, 48_000, 343.0);
        let first = wave.render(10);
        let second = wave.render(10);
        assert_eq!(first.len(), 20);

        let mut whole = PlaneWave::new(&two_mics(), 0.0, 1000.0, 0.5, 48_000, 343.0);
        let joined = whole.render(20);
        assert_eq!([first, second].concat(), joined);
    }

    #[test]
    fn centre_channel_is_undelayed_sine() {
        let mut wave = PlaneWave::new(&two_mics(), 0.0, 1000.0, 0.5, 48_000, 343.0);
        let block = wave.render(48);
        for n in 0..48 {
            let expected = 0.5 * (2.0 * PI * 1000.0 * n as f64 / 48_000.0).sin();
            assert!((block[2 * n] as f64 - expected).abs() < 1e-6, "sample {n}");
        }
    }

    #[test]
    fn off_centre_channel_leads_by_projection() {
        // Source at 0°: the mic at x = +5 cm hears the wave 0.05/343 s early.
        let mut wave = PlaneWave::new(&two_mics(), 0.0, 1000.0, 0.5, 48_000, 343.0);
        let block = wave.render(4);
        let tau = 0.05 / 343.0;
        for n in 0..4 {
            let t = n as f64 / 48_000.0 + tau;
            let expected = 0.5 * (2.0 * PI * 1000.0 * t).sin();
            assert!((block[2 * n + 1] as f64 - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn synthetic_capture_fills_buffer_and_stops() {
        let buffer = CaptureBuffer::shared(48_000);
        let wave = PlaneWave::new(&two_mics(), 30.0, 1000.0, 0.1, 48_000, 343.0);
        let source = SyntheticCapture::new(wave, 64);

        let handle = source.start(Arc::clone(&buffer)).unwrap();
        assert!(buffer.wait_for_written(3 * 128, Duration::from_secs(2)));
        handle.stop();

        let after_stop = buffer.written();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(buffer.written(), after_stop);
        assert_eq!(after_stop % 128, 0);
    }

    #[test]
    fn default_config_renders_eight_channels() {
        let mut wave = PlaneWave::from_config(&AppConfig::default());
        assert_eq!(wave.channels(), 8);
        assert_eq!(wave.render(3).len(), 24);
    }
}
