//! Processing loop for live direction-of-arrival estimation.
//!
//! # Architecture
//!
//! ```text
//! capture thread (cpal / synthetic)
//!        │ push_interleaved
//!        ▼
//! SharedCaptureBuffer (Arc<CaptureBuffer>)
//!        │ FrameExtractor::poll, once per hop
//!        ▼
//! ProcessingLoop::run()  ← main thread, until the stop flag is set
//!        ├─ Beamformer::process → HopReport
//!        ├─ DoaSink::present (dashboard)
//!        └─ CsvExporter::export (optional, on detection)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//! use voice_doa::audio::{CaptureBuffer, CaptureSource, SyntheticCapture};
//! use voice_doa::config::AppConfig;
//! use voice_doa::dsp::SteeringTable;
//! use voice_doa::pipeline::ProcessingLoop;
//! use voice_doa::present::Dashboard;
//!
//! let config = AppConfig::default();
//! let buffer = CaptureBuffer::shared(config.audio.buffer_capacity());
//! let table = Arc::new(SteeringTable::build(
//!     config.beamforming.angle_count,
//!     &config.array.mic_array(),
//!     config.array.speed_of_sound,
//!     config.audio.sample_rate,
//!     config.frame.frame_size,
//! ));
//!
//! let handle = SyntheticCapture::from_config(&config).start(buffer.clone()).unwrap();
//! let mut pipeline = ProcessingLoop::new(
//!     &config,
//!     buffer,
//!     table,
//!     Box::new(Dashboard::stdout(&config)),
//! )
//! .unwrap();
//!
//! let stop = AtomicBool::new(false);
//! pipeline.run(&stop).unwrap();
//! handle.stop();
//! ```

pub mod runner;
pub mod schedule;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{LoopStats, PipelineError, ProcessingLoop};
pub use schedule::SchedulePolicy;
