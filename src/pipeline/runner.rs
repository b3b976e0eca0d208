//! Processing loop: drives frames from the capture buffer through the
//! beamformer to the presentation side.
//!
//! # Loop
//!
//! ```text
//! stop flag set? ── yes ──▶ return LoopStats
//!      │ no
//!      ▼
//! FrameExtractor::poll ── None ──▶ SchedulePolicy::wait ──┐
//!      │ Some(frame)                                      │
//!      ▼                                                  │
//! Beamformer::process → DoaSink::present                  │
//!      └─▶ CsvExporter::export (on detection, optional)   │
//!      ◀──────────────────────────────────────────────────┘
//! ```
//!
//! The loop runs on the caller's thread and owns everything except the
//! capture buffer.  Transform errors abort it; export errors are logged.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::audio::{FrameExtractor, SharedCaptureBuffer};
use crate::config::AppConfig;
use crate::dsp::{Beamformer, FftError, HopReport, SteeringTable};
use crate::present::{CsvExporter, DoaSink};

use super::schedule::SchedulePolicy;

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors that stop the processing loop.
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("frame transform failed: {0}")]
    Transform(#[from] FftError),
}

// ---------------------------------------------------------------------------
// LoopStats
// ---------------------------------------------------------------------------

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Frames run through the beamformer.
    pub hops_processed: u64,
    /// Frames that passed the energy gate.
    pub detections: u64,
    /// Hops skipped because the loop fell behind.
    pub dropped_hops: u64,
    /// CSV files written.
    pub exports: u64,
}

// ---------------------------------------------------------------------------
// ProcessingLoop
// ---------------------------------------------------------------------------

pub struct ProcessingLoop {
    buffer: SharedCaptureBuffer,
    extractor: FrameExtractor,
    beamformer: Beamformer,
    schedule: SchedulePolicy,
    sink: Box<dyn DoaSink>,
    exporter: Option<CsvExporter>,
    stats: LoopStats,
}

impl ProcessingLoop {
    /// Wire a loop for `config` reading from `buffer`.
    ///
    /// A [`CsvExporter`] is attached when `config.export.on_detection` is set.
    pub fn new(
        config: &AppConfig,
        buffer: SharedCaptureBuffer,
        table: Arc<SteeringTable>,
        sink: Box<dyn DoaSink>,
    ) -> Result<Self, PipelineError> {
        let exporter = config
            .export
            .on_detection
            .then(|| CsvExporter::from_config(&config.export));
        if let Some(exporter) = &exporter {
            log::info!("pipeline: exporting detections to {}", exporter.dir().display());
        }

        Ok(Self {
            buffer,
            extractor: FrameExtractor::new(
                config.frame.frame_size,
                config.frame.hop_size,
                config.audio.channels as usize,
            ),
            beamformer: Beamformer::new(config, table)?,
            schedule: SchedulePolicy::from_config(&config.schedule),
            sink,
            exporter,
            stats: LoopStats::default(),
        })
    }

    /// Counters so far.
    pub fn stats(&self) -> LoopStats {
        LoopStats {
            dropped_hops: self.extractor.dropped_hops(),
            ..self.stats
        }
    }

    /// Process at most one hop without waiting.
    ///
    /// Returns `Ok(None)` when no new hop is available yet.
    pub fn step(&mut self) -> Result<Option<HopReport>, PipelineError> {
        let Some(frame) = self.extractor.poll(&self.buffer) else {
            return Ok(None);
        };

        let report = self.beamformer.process(&frame)?;
        self.stats.hops_processed += 1;
        self.sink.present(&report);

        if report.estimate.is_some() {
            self.stats.detections += 1;
            if let Some(exporter) = self.exporter.as_mut() {
                match exporter.export(&frame) {
                    Ok(_) => self.stats.exports += 1,
                    Err(e) => log::warn!("pipeline: export failed: {e}"),
                }
            }
        }

        Ok(Some(report))
    }

    /// Run until `stop` is set.  The flag is checked once per iteration.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<LoopStats, PipelineError> {
        log::info!("pipeline: processing loop started ({:?})", self.schedule);

        while !stop.load(Ordering::Relaxed) {
            if self.step()?.is_none() {
                self.schedule.wait(&self.buffer, self.extractor.ready_at());
            }
        }

        let stats = self.stats();
        log::info!(
            "pipeline: stopped after {} hops ({} detections, {} dropped, {} exported)",
            stats.hops_processed,
            stats.detections,
            stats.dropped_hops,
            stats.exports
        );
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{CaptureBuffer, CaptureSource, PlaneWave, SyntheticCapture};
    use crate::config::SchedulePolicyKind;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Sink that keeps every report.
    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<HopReport>>>);

    impl Recorder {
        fn reports(&self) -> Vec<HopReport> {
            self.0.lock().unwrap().clone()
        }
    }

    impl DoaSink for Recorder {
        fn present(&mut self, report: &HopReport) {
            self.0.lock().unwrap().push(*report);
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn table_for(config: &AppConfig) -> Arc<SteeringTable> {
        Arc::new(SteeringTable::build(
            config.beamforming.angle_count,
            &config.array.mic_array(),
            config.array.speed_of_sound,
            config.audio.sample_rate,
            config.frame.frame_size,
        ))
    }

    fn make_loop(config: &AppConfig) -> (ProcessingLoop, SharedCaptureBuffer, Recorder) {
        let buffer = CaptureBuffer::shared(config.audio.buffer_capacity());
        let recorder = Recorder::default();
        let pipeline = ProcessingLoop::new(
            config,
            Arc::clone(&buffer),
            table_for(config),
            Box::new(recorder.clone()),
        )
        .unwrap();
        (pipeline, buffer, recorder)
    }

    fn circular_distance(a: u16, b: u16) -> u16 {
        let d = (a as i32 - b as i32).rem_euclid(360) as u16;
        d.min(360 - d)
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    /// Default UMA-8 setup with a 1.5 kHz tone arriving from 90°.
    #[test]
    fn end_to_end_tone_from_ninety_degrees() {
        let config = AppConfig::default();
        assert_eq!(config.audio.buffer_capacity(), 96_000 * 8);
        let (mut pipeline, buffer, recorder) = make_loop(&config);

        let mut wave = PlaneWave::from_config(&config);
        buffer.push_interleaved(&wave.render(config.frame.frame_size));

        let report = pipeline.step().unwrap().expect("first frame ready");
        let estimate = report.estimate.expect("tone passes the energy gate");
        assert!(
            circular_distance(estimate.angle, 90) <= 1,
            "got {}",
            estimate.angle
        );
        assert!(estimate.power > 0.0);
        assert_eq!(recorder.reports(), vec![report]);

        // The next hop keeps pointing the same way.
        buffer.push_interleaved(&wave.render(config.frame.hop_size));
        let next = pipeline.step().unwrap().unwrap().estimate.unwrap();
        assert!(circular_distance(next.angle, 90) <= 1);
    }

    #[test]
    fn silence_is_reported_without_estimate() {
        let config = AppConfig::default();
        let (mut pipeline, buffer, recorder) = make_loop(&config);

        buffer.push_interleaved(&vec![0.0; 1024 * 8]);
        let report = pipeline.step().unwrap().unwrap();
        assert!(report.estimate.is_none());
        assert_eq!(recorder.reports().len(), 1);
        assert_eq!(pipeline.stats().detections, 0);
    }

    #[test]
    fn step_without_new_hop_returns_none() {
        let config = AppConfig::default();
        let (mut pipeline, buffer, recorder) = make_loop(&config);

        buffer.push_interleaved(&vec![0.0; 1000 * 8]);
        assert_eq!(pipeline.step(), Ok(None));
        assert!(recorder.reports().is_empty());
    }

    #[test]
    fn backlog_is_counted_in_stats() {
        let config = AppConfig::default();
        let (mut pipeline, buffer, _) = make_loop(&config);

        let mut wave = PlaneWave::from_config(&config);
        buffer.push_interleaved(&wave.render(1024 + 4 * 512));

        assert!(pipeline.step().unwrap().is_some());
        assert_eq!(pipeline.step(), Ok(None));
        let stats = pipeline.stats();
        assert_eq!(stats.hops_processed, 1);
        assert_eq!(stats.dropped_hops, 4);
    }

    #[test]
    fn exports_only_detections() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.export.on_detection = true;
        config.export.directory = Some(dir.path().to_path_buf());
        let (mut pipeline, buffer, _) = make_loop(&config);

        buffer.push_interleaved(&vec![0.0; 1024 * 8]);
        pipeline.step().unwrap();
        assert!(!dir.path().join("capture_0.csv").exists());

        let mut wave = PlaneWave::from_config(&config);
        buffer.push_interleaved(&wave.render(512));
        pipeline.step().unwrap();

        let csv = std::fs::read_to_string(dir.path().join("capture_0.csv")).unwrap();
        assert!(csv.starts_with("Mic0,Mic1,Mic2,Mic3,Mic4,Mic5,Mic6,Mic7\n"));
        assert_eq!(csv.lines().count(), 1 + 1024);
        assert_eq!(pipeline.stats().exports, 1);
    }

    #[test]
    fn export_writes_captured_samples_not_windowed_ones() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.export.on_detection = true;
        config.export.directory = Some(dir.path().to_path_buf());
        let (mut pipeline, buffer, _) = make_loop(&config);

        buffer.push_interleaved(&vec![0.5; 1024 * 8]);
        let report = pipeline.step().unwrap().unwrap();
        assert!(report.estimate.is_some());

        let csv = std::fs::read_to_string(dir.path().join("capture_0.csv")).unwrap();
        let mut rows = csv.lines().skip(1);
        let expected = vec!["0.5"; 8].join(",");
        assert_eq!(rows.next(), Some(expected.as_str()));
        assert!(rows.all(|row| row == expected));
    }

    #[test]
    fn stop_flag_set_before_run_returns_immediately() {
        let config = AppConfig::default();
        let (mut pipeline, _, _) = make_loop(&config);
        let stop = AtomicBool::new(true);
        assert_eq!(pipeline.run(&stop), Ok(LoopStats::default()));
    }

    #[test]
    fn runs_against_synthetic_capture_until_stopped() {
        let mut config = AppConfig::default();
        config.schedule.policy = SchedulePolicyKind::OnData;
        let (mut pipeline, buffer, recorder) = make_loop(&config);

        let handle = SyntheticCapture::from_config(&config)
            .start(Arc::clone(&buffer))
            .unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let stopper = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(200));
                stop.store(true, Ordering::Relaxed);
            })
        };

        let stats = pipeline.run(&stop).unwrap();
        stopper.join().unwrap();
        handle.stop();

        assert!(stats.hops_processed > 0);
        assert_eq!(stats.detections, stats.hops_processed);
        for report in recorder.reports() {
            let angle = report.estimate.unwrap().angle;
            assert!(circular_distance(angle, 90) <= 1, "got {angle}");
        }
    }
}
