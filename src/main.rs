//! Application entry point for the voice direction-of-arrival estimator.
//!
//! # Startup sequence (`run`)
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] (defaults on first run) and validate it.
//! 3. Pre-compute the steering table.
//! 4. Start capture (cpal device, or the synthetic plane wave).
//! 5. Spawn the stdin watcher that sets the stop flag on Enter.
//! 6. Run the processing loop on the main thread until stopped.
//! 7. Stop capture (blocking) and report loop statistics.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use voice_doa::{
    audio::{
        deinterleave, CaptureBuffer, CaptureSource, DeviceCapture, SharedCaptureBuffer,
        SyntheticCapture,
    },
    config::{AppConfig, AppPaths, CaptureSourceKind},
    dsp::SteeringTable,
    pipeline::ProcessingLoop,
    present::{CsvExporter, Dashboard},
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "voice-doa")]
#[command(about = "Real-time voice direction-of-arrival estimation for a circular mic array")]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the synthetic plane-wave source instead of a capture device
    #[arg(long, global = true)]
    synthetic: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Estimate directions live until Enter is pressed (default)
    Run,

    /// Capture every channel for a while and save it as one CSV file
    Record {
        /// Capture duration in seconds
        #[arg(long, default_value_t = 10)]
        seconds: u64,

        /// Output directory (defaults to the configured export directory)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Write the default settings file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let settings_file = cli
        .config
        .clone()
        .unwrap_or_else(|| AppPaths::new().settings_file);

    if let Some(Command::InitConfig { force }) = cli.command {
        return init_config(&settings_file, force);
    }

    let mut config = AppConfig::load_from(&settings_file)
        .with_context(|| format!("failed to load {}", settings_file.display()))?;
    if cli.synthetic {
        config.audio.source = CaptureSourceKind::Synthetic;
    }
    config.validate().context("invalid configuration")?;

    match cli.command {
        None | Some(Command::Run) => run(&config),
        Some(Command::Record { seconds, output }) => record(&config, seconds, output),
        Some(Command::InitConfig { .. }) => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn run(config: &AppConfig) -> Result<()> {
    log::info!("voice-doa starting up");

    log::info!("pre-computing steering vectors");
    let table = Arc::new(SteeringTable::build(
        config.beamforming.angle_count,
        &config.array.mic_array(),
        config.array.speed_of_sound,
        config.audio.sample_rate,
        config.frame.frame_size,
    ));

    let buffer = CaptureBuffer::shared(config.audio.buffer_capacity());
    let handle = capture_source(config)?
        .start(Arc::clone(&buffer))
        .context("failed to start capture")?;

    let mut pipeline = ProcessingLoop::new(
        config,
        Arc::clone(&buffer),
        table,
        Box::new(Dashboard::stdout(config)),
    )?;

    let stop = Arc::new(AtomicBool::new(false));
    spawn_stdin_watcher(Arc::clone(&stop))?;

    let result = pipeline.run(&stop);

    log::info!("stopping capture");
    handle.stop();

    let stats = result?;
    log::info!(
        "processed {} hops, {} with a direction estimate",
        stats.hops_processed,
        stats.detections
    );
    Ok(())
}

fn record(config: &AppConfig, seconds: u64, output: Option<PathBuf>) -> Result<()> {
    let channels = config.audio.channels as usize;
    let target = seconds * config.audio.sample_rate as u64 * channels as u64;
    if target == 0 {
        bail!("nothing to record in {seconds} s");
    }

    let buffer = CaptureBuffer::shared(target as usize);
    let handle = capture_source(config)?
        .start(Arc::clone(&buffer))
        .context("failed to start capture")?;

    let stop = Arc::new(AtomicBool::new(false));
    spawn_stdin_watcher(Arc::clone(&stop))?;

    log::info!("recording {seconds} s of {channels} channels (Enter stops early)");
    while !stop.load(Ordering::Relaxed) {
        if buffer.wait_for_written(target, Duration::from_millis(100)) {
            break;
        }
    }
    handle.stop();

    save_recording(config, &buffer, output)
}

fn save_recording(
    config: &AppConfig,
    buffer: &SharedCaptureBuffer,
    output: Option<PathBuf>,
) -> Result<()> {
    let channels = config.audio.channels as usize;
    let available = (buffer.written() as usize).min(buffer.capacity());
    let samples = buffer.latest(available - available % channels);
    if samples.is_empty() {
        bail!("no audio captured");
    }

    let dir = output.unwrap_or_else(|| config.export.resolved_dir());
    let mut exporter = CsvExporter::new(dir, format!("{}_recording", config.export.prefix));
    let path = exporter.export_channels(&deinterleave(&samples, channels))?;
    log::info!(
        "saved {} samples per channel to {}",
        samples.len() / channels,
        path.display()
    );
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    AppConfig::default().save_to(path)?;
    log::info!("wrote default settings to {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn capture_source(config: &AppConfig) -> Result<Box<dyn CaptureSource>> {
    let source: Box<dyn CaptureSource> = match config.audio.source {
        CaptureSourceKind::Device => {
            let capture = DeviceCapture::new(&config.audio, config.frame.hop_size)
                .context("failed to open capture device")?;
            log::info!("capture device: {}", capture.device_name());
            Box::new(capture)
        }
        CaptureSourceKind::Synthetic => Box::new(SyntheticCapture::from_config(config)),
    };
    Ok(source)
}

/// Set `stop` once a line (or EOF) arrives on stdin.
///
/// The thread is left detached: it may stay blocked in `read_line` until the
/// process exits.
fn spawn_stdin_watcher(stop: Arc<AtomicBool>) -> Result<()> {
    thread::Builder::new()
        .name("stdin-watcher".into())
        .spawn(move || wait_for_enter(std::io::stdin().lock(), &stop))
        .context("failed to spawn stdin watcher")?;
    Ok(())
}

/// Block until `reader` yields a line, hits EOF or fails, then set `stop`.
fn wait_for_enter(mut reader: impl BufRead, stop: &AtomicBool) {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => log::warn!("stdin closed, stopping"),
        Ok(_) => {}
        Err(e) => log::warn!("stdin read failed, stopping: {e}"),
    }
    stop.store(true, Ordering::Relaxed);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read};

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn enter_sets_stop() {
        let stop = AtomicBool::new(false);
        wait_for_enter(Cursor::new("\n"), &stop);
        assert!(stop.load(Ordering::Relaxed));
    }

    #[test]
    fn closed_stdin_sets_stop() {
        let stop = AtomicBool::new(false);
        wait_for_enter(Cursor::new(""), &stop);
        assert!(stop.load(Ordering::Relaxed));
    }

    #[test]
    fn read_error_sets_stop() {
        let stop = AtomicBool::new(false);
        wait_for_enter(io::BufReader::new(FailingReader), &stop);
        assert!(stop.load(Ordering::Relaxed));
    }
}
