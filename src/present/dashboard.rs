//! Terminal dashboard for live estimates.
//!
//! [`DoaSink`] is the seam between the processing loop and whatever shows
//! its results.  [`Dashboard`] redraws a small ANSI text screen after every
//! hop:
//!
//! ```text
//! ===== UMA-8 DOA Real-Time Dashboard =====
//! Listening for human voice (300-3400 Hz)...
//! ------------------------------------------------
//! RMS Energy: 0.0213 (Threshold: 0.0010) [SOUND DETECTED]
//! ------------------------------------------------
//! Estimated Angle: 90 degrees
//! Beamformer Power: 1523.771 (higher is stronger)
//!
//!  0--------------------180--------------------359
//! [           V                                 ]
//!
//! Press Enter to quit.
//! ```

use std::fmt::Write as _;
use std::io::{self, Write};

use crate::config::AppConfig;
use crate::dsp::HopReport;

/// Width of the compass line in columns.
pub const COMPASS_WIDTH: usize = 45;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const RULE: &str = "------------------------------------------------";

/// Receives one report per processed hop.
pub trait DoaSink {
    fn present(&mut self, report: &HopReport);
}

/// Column of the compass marker for `angle` degrees.
pub fn compass_column(angle: u16) -> usize {
    let last = (COMPASS_WIDTH - 1) as f64;
    ((angle as f64 / 360.0) * last).round() as usize
}

/// The `[   V   ]` compass line, blank without an angle.
pub fn compass_line(angle: Option<u16>) -> String {
    let mut line = vec![' '; COMPASS_WIDTH];
    if let Some(angle) = angle {
        line[compass_column(angle).min(COMPASS_WIDTH - 1)] = 'V';
    }
    format!("[{}]", line.into_iter().collect::<String>())
}

/// ANSI text dashboard writing to any [`Write`] target.
pub struct Dashboard<W: Write> {
    out: W,
    energy_threshold: f64,
    min_freq_hz: f64,
    max_freq_hz: f64,
    clear_screen: bool,
}

impl Dashboard<io::Stdout> {
    /// Dashboard on standard output.
    pub fn stdout(config: &AppConfig) -> Self {
        Self::new(io::stdout(), config)
    }
}

impl<W: Write> Dashboard<W> {
    pub fn new(out: W, config: &AppConfig) -> Self {
        Self {
            out,
            energy_threshold: config.beamforming.energy_threshold,
            min_freq_hz: config.beamforming.min_freq_hz,
            max_freq_hz: config.beamforming.max_freq_hz,
            clear_screen: true,
        }
    }

    /// Disable the clear-screen escape, e.g. when output is piped.
    pub fn without_clear(mut self) -> Self {
        self.clear_screen = false;
        self
    }

    /// Consume the dashboard and return its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Full screen text for `report`.
    pub fn render(&self, report: &HopReport) -> String {
        let mut s = String::new();
        if self.clear_screen {
            s.push_str(CLEAR_SCREEN);
        }

        let detected = report.rms_energy >= self.energy_threshold;
        let _ = writeln!(s, "===== UMA-8 DOA Real-Time Dashboard =====");
        let _ = writeln!(
            s,
            "Listening for human voice ({:.0}-{:.0} Hz)...",
            self.min_freq_hz, self.max_freq_hz
        );
        let _ = writeln!(s, "{RULE}");
        let _ = writeln!(
            s,
            "RMS Energy: {:.4} (Threshold: {:.4}) {}",
            report.rms_energy,
            self.energy_threshold,
            if detected { "[SOUND DETECTED]" } else { "[SILENT]" }
        );
        let _ = writeln!(s, "{RULE}");

        match report.estimate {
            Some(est) => {
                let _ = writeln!(s, "Estimated Angle: {} degrees", est.angle);
                let _ = writeln!(s, "Beamformer Power: {:.3} (higher is stronger)", est.power);
            }
            None => {
                let _ = writeln!(s, "Estimated Angle: N/A");
                let _ = writeln!(s, "Beamformer Power: N/A");
            }
        }

        let dashes = "-".repeat(20);
        let _ = writeln!(s, "\n 0{dashes}180{dashes}359");
        let _ = writeln!(s, "{}", compass_line(report.estimate.map(|e| e.angle)));
        let _ = writeln!(s, "\nPress Enter to quit.");
        s
    }
}

impl<W: Write> DoaSink for Dashboard<W> {
    fn present(&mut self, report: &HopReport) {
        let screen = self.render(report);
        if let Err(e) = self
            .out
            .write_all(screen.as_bytes())
            .and_then(|()| self.out.flush())
        {
            log::warn!("dashboard: write failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::DoaEstimate;

    fn dashboard() -> Dashboard<Vec<u8>> {
        Dashboard::new(Vec::new(), &AppConfig::default()).without_clear()
    }

    #[test]
    fn compass_marker_positions() {
        assert_eq!(compass_column(0), 0);
        assert_eq!(compass_column(180), 22);
        assert_eq!(compass_column(90), 11);
        assert_eq!(compass_column(359), 44);
    }

    #[test]
    fn compass_line_width_and_marker() {
        let line = compass_line(Some(180));
        assert_eq!(line.chars().count(), COMPASS_WIDTH + 2);
        assert_eq!(line.find('V'), Some(1 + 22));

        let blank = compass_line(None);
        assert!(!blank.contains('V'));
        assert_eq!(blank.len(), COMPASS_WIDTH + 2);
    }

    #[test]
    fn renders_detection() {
        let report = HopReport {
            rms_energy: 0.0213,
            estimate: Some(DoaEstimate {
                angle: 90,
                power: 12.5,
            }),
        };
        let text = dashboard().render(&report);
        assert!(text.contains("RMS Energy: 0.0213 (Threshold: 0.0010) [SOUND DETECTED]"));
        assert!(text.contains("Estimated Angle: 90 degrees"));
        assert!(text.contains("Beamformer Power: 12.500"));
        assert!(text.contains("(300-3400 Hz)"));
        assert!(!text.starts_with(CLEAR_SCREEN));
    }

    #[test]
    fn renders_silence_as_not_available() {
        let report = HopReport {
            rms_energy: 0.0,
            estimate: None,
        };
        let text = dashboard().render(&report);
        assert!(text.contains("[SILENT]"));
        assert!(text.contains("Estimated Angle: N/A"));
        assert!(text.contains("Beamformer Power: N/A"));
        assert!(!text.contains('V'));
    }

    #[test]
    fn present_writes_screen() {
        let mut dash = Dashboard::new(Vec::new(), &AppConfig::default());
        dash.present(&HopReport {
            rms_energy: 0.5,
            estimate: None,
        });
        let written = String::from_utf8(dash.into_inner()).unwrap();
        assert!(written.starts_with(CLEAR_SCREEN));
        assert!(written.ends_with("Press Enter to quit.\n"));
    }
}
