//! Offline CSV export of captured frames.
//!
//! Each export writes `<prefix>_<n>.csv` with a `Mic0,Mic1,...` header and one
//! row per sample.  `n` starts at 0 and is owned by the exporter, so two
//! exporters never share a sequence.  Exports are off the real-time path;
//! the processing loop logs failures and carries on.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::audio::Frame;
use crate::config::ExportConfig;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no channels to export")]
    Empty,

    #[error("channel {channel} has {actual} samples, expected {expected}")]
    RaggedChannels {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes numbered CSV captures into one directory.
#[derive(Debug)]
pub struct CsvExporter {
    dir: PathBuf,
    prefix: String,
    next_index: u64,
}

impl CsvExporter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            next_index: 0,
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(config.resolved_dir(), config.prefix.clone())
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Export the captured (unwindowed) samples of `frame`.
    pub fn export(&mut self, frame: &Frame) -> Result<PathBuf, ExportError> {
        self.export_channels(frame.raw_channels())
    }

    /// Export per-channel sample vectors as columns.
    ///
    /// The file counter only advances on success.
    pub fn export_channels<T: std::fmt::Display>(
        &mut self,
        channels: &[Vec<T>],
    ) -> Result<PathBuf, ExportError> {
        let first = channels.first().ok_or(ExportError::Empty)?;
        let len = first.len();
        if let Some((channel, ch)) = channels.iter().enumerate().find(|(_, c)| c.len() != len) {
            return Err(ExportError::RaggedChannels {
                channel,
                expected: len,
                actual: ch.len(),
            });
        }

        let path = self
            .dir
            .join(format!("{}_{}.csv", self.prefix, self.next_index));
        write_csv(&path, channels, len).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;

        self.next_index += 1;
        log::info!("export: saved capture to {}", path.display());
        Ok(path)
    }
}

fn write_csv<T: std::fmt::Display>(
    path: &Path,
    channels: &[Vec<T>],
    len: usize,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);

    let header: Vec<String> = (0..channels.len()).map(|i| format!("Mic{i}")).collect();
    writeln!(out, "{}", header.join(","))?;

    for i in 0..len {
        for (c, channel) in channels.iter().enumerate() {
            if c > 0 {
                out.write_all(b",")?;
            }
            write!(out, "{}", channel[i])?;
        }
        out.write_all(b"\n")?;
    }
    out.flush()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
