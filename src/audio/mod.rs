//! Audio side of the estimator: capture → ring buffer → overlapping frames.
//!
//! # Pipeline
//!
//! ```text
//! cpal callback / synthetic thread → CaptureBuffer (interleaved, Mutex)
//!           → FrameExtractor (hop cadence, de-interleave, Hamming) → Frame
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use voice_doa::audio::{CaptureBuffer, CaptureSource, FrameExtractor, SyntheticCapture};
//! use voice_doa::config::AppConfig;
//!
//! let config = AppConfig::default();
//! let buffer = CaptureBuffer::shared(config.audio.buffer_capacity());
//! let handle = SyntheticCapture::from_config(&config).start(buffer.clone()).unwrap();
//!
//! let mut frames = FrameExtractor::new(1024, 512, 8);
//! while frames.poll(&buffer).is_none() {
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! handle.stop();
//! ```

pub mod buffer;
pub mod capture;
pub mod frame;
pub mod synth;

pub use buffer::{CaptureBuffer, SharedCaptureBuffer};
pub use capture::{CaptureError, CaptureHandle, CaptureSource, DeviceCapture};
pub use frame::{deinterleave, hamming_window, Frame, FrameExtractor};
pub use synth::{PlaneWave, SyntheticCapture};
