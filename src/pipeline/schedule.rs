//! How the processing loop waits when no hop is ready.

use std::thread;
use std::time::Duration;

use crate::audio::CaptureBuffer;
use crate::config::{ScheduleConfig, SchedulePolicyKind};

/// Waiting strategy between polls of the frame extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePolicy {
    /// Sleep for a fixed interval and poll again.
    Interval(Duration),
    /// Block on the buffer until the next hop is written, at most `timeout`.
    OnData { timeout: Duration },
}

impl SchedulePolicy {
    pub fn from_config(config: &ScheduleConfig) -> Self {
        let period = Duration::from_millis(config.poll_interval_ms);
        match config.policy {
            SchedulePolicyKind::Interval => Self::Interval(period),
            SchedulePolicyKind::OnData => Self::OnData { timeout: period },
        }
    }

    /// Wait until the buffer has probably reached `ready_at` written samples.
    ///
    /// Returns early on data for [`OnData`](Self::OnData); either way the
    /// caller polls again afterwards, so a spurious return is harmless.
    pub fn wait(&self, buffer: &CaptureBuffer, ready_at: u64) {
        match *self {
            Self::Interval(period) => thread::sleep(period),
            Self::OnData { timeout } => {
                buffer.wait_for_written(ready_at, timeout);
            }
        }
    }
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self::from_config(&ScheduleConfig::default())
    }
}
