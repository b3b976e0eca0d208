//! Hop-cadenced frame extraction, de-interleaving and windowing.
//!
//! [`FrameExtractor`] owns the processing cursor.  Each successful
//! [`poll`](FrameExtractor::poll) copies one `F`-sample frame per channel out
//! of the shared [`CaptureBuffer`], ending exactly one hop past the previous
//! frame, so consecutive frames overlap by `F − hop` samples:
//!
//! ```text
//! written ──────────────────────────────────────────────▶
//!            │◀──────── frame n (F) ────────▶│
//!                       │◀──────── frame n+1 (F) ───────▶│
//!                                            │◀── hop ──▶│
//! ```
//!
//! Each channel is multiplied by a Hamming window
//! `w[i] = 0.54 − 0.46·cos(2π·i/(F−1))` to reduce spectral leakage.
//!
//! The readiness check, the copy and the cursor advance all happen inside one
//! `&mut self` call, so a hop can neither be processed twice nor skipped by
//! accident.  Hops *are* skipped on purpose when the loop falls behind: if
//! two or more hops are pending, all but the newest are dropped and counted
//! in [`dropped_hops`](FrameExtractor::dropped_hops).

use std::f64::consts::PI;

use super::buffer::CaptureBuffer;

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// `N` channels × `F` windowed samples taken from one buffer snapshot,
/// plus the captured samples they were computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    channels: Vec<Vec<f64>>,
    raw: Vec<Vec<f32>>,
    /// Absolute interleaved index of the first sample in the frame.
    start: u64,
}

impl Frame {
    /// Build a frame from already windowed per-channel samples.
    ///
    /// The raw channels are the same values narrowed to `f32`.
    pub fn from_channels(channels: Vec<Vec<f64>>, start: u64) -> Self {
        let raw = channels
            .iter()
            .map(|ch| ch.iter().map(|&s| s as f32).collect())
            .collect();
        Self {
            channels,
            raw,
            start,
        }
    }

    /// Samples of `channel`.
    pub fn channel(&self, channel: usize) -> &[f64] {
        &self.channels[channel]
    }

    /// All channels, indexed by channel number.
    pub fn channels(&self) -> &[Vec<f64>] {
        &self.channels
    }

    /// Captured samples before windowing, indexed by channel number.
    pub fn raw_channels(&self) -> &[Vec<f32>] {
        &self.raw
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel (`F`).
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Returns `true` when the frame holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Absolute interleaved index of the first sample.
    pub fn start_sample(&self) -> u64 {
        self.start
    }
}

/// Hamming window of length `len`.
pub fn hamming_window(len: usize) -> Vec<f64> {
    if len <= 1 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f64;
    (0..len)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}

/// Split interleaved samples into one vector per channel.
///
/// A trailing partial sample group is ignored.
pub fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let mut out: Vec<Vec<f32>> = (0..channels)
        .map(|_| Vec::with_capacity(samples.len() / channels.max(1)))
        .collect();
    if channels == 0 {
        return out;
    }
    for group in samples.chunks_exact(channels) {
        for (ch, &s) in out.iter_mut().zip(group) {
            ch.push(s);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// FrameExtractor
// ---------------------------------------------------------------------------

/// Pulls overlapping, windowed frames out of a [`CaptureBuffer`].
pub struct FrameExtractor {
    frame_size: usize,
    hop_size: usize,
    channels: usize,
    window: Vec<f64>,
    /// Absolute interleaved index where the next hop begins.
    cursor: u64,
    scratch: Vec<f32>,
    dropped_hops: u64,
}

impl FrameExtractor {
    /// Create an extractor for `frame_size` samples per channel, advancing
    /// `hop_size` samples per channel, over `channels` interleaved channels.
    ///
    /// The first frame becomes available once `frame_size` samples per
    /// channel have been captured.
    ///
    /// # Panics
    ///
    /// Panics unless `0 < hop_size <= frame_size` and `channels > 0`.
    pub fn new(frame_size: usize, hop_size: usize, channels: usize) -> Self {
        assert!(
            hop_size > 0 && hop_size <= frame_size,
            "hop_size must be in 1..=frame_size"
        );
        assert!(channels > 0, "channels must be > 0");

        Self {
            frame_size,
            hop_size,
            channels,
            window: hamming_window(frame_size),
            cursor: ((frame_size - hop_size) * channels) as u64,
            scratch: vec![0.0; frame_size * channels],
            dropped_hops: 0,
        }
    }

    /// Interleaved samples per hop.
    pub fn hop_samples(&self) -> u64 {
        (self.hop_size * self.channels) as u64
    }

    /// Total written samples the buffer must reach before the next frame is
    /// ready.
    pub fn ready_at(&self) -> u64 {
        self.cursor + self.hop_samples()
    }

    /// Hops skipped so far because the loop fell behind.
    pub fn dropped_hops(&self) -> u64 {
        self.dropped_hops
    }

    /// The analysis window applied to every channel.
    pub fn window(&self) -> &[f64] {
        &self.window
    }

    /// Extract the next frame if at least one new hop has arrived.
    ///
    /// Returns `None` when the caller has to wait.
    pub fn poll(&mut self, buffer: &CaptureBuffer) -> Option<Frame> {
        let written = buffer.written();
        let hop = self.hop_samples();
        if written < self.cursor + hop {
            return None;
        }

        let pending = (written - self.cursor) / hop;
        if pending > 1 {
            let skip = pending - 1;
            self.cursor += skip * hop;
            self.dropped_hops += skip;
            log::debug!("frame extractor behind by {pending} hops, dropped {skip}");
        }

        let end = self.cursor + hop;
        let start = end - (self.frame_size * self.channels) as u64;
        buffer.copy_window(start, &mut self.scratch);
        self.cursor = end;

        let raw = deinterleave(&self.scratch, self.channels);
        let channels = raw
            .iter()
            .map(|ch| {
                ch.iter()
                    .zip(&self.window)
                    .map(|(&s, &w)| s as f64 * w)
                    .collect()
            })
            .collect();

        Some(Frame {
            channels,
            raw,
            start,
        })
    }
}

impl std::fmt::Debug for FrameExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameExtractor")
            .field("frame_size", &self.frame_size)
            .field("hop_size", &self.hop_size)
            .field("channels", &self.channels)
            .field("cursor", &self.cursor)
            .field("dropped_hops", &self.dropped_hops)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Interleaved ramp where channel `c` of sample `i` is `c * 1000 + i`.
    fn interleaved_ramp(samples: usize, channels: usize, offset: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(samples * channels);
        for i in offset..offset + samples {
            for c in 0..channels {
                out.push((c * 1000 + i) as f32);
            }
        }
        out
    }

    /// Undo the window so tests can compare raw sample values.
    fn unwindowed(extractor: &FrameExtractor, frame: &Frame, channel: usize) -> Vec<f64> {
        frame
            .channel(channel)
            .iter()
            .zip(extractor.window())
            .map(|(s, w)| (s / w).round())
            .collect()
    }

    // ---- Window ------------------------------------------------------------

    #[test]
    fn hamming_endpoints_and_centre() {
        let w = hamming_window(1025);
        assert!((w[0] - 0.08).abs() < 1e-12);
        assert!((w[1024] - 0.08).abs() < 1e-12);
        assert!((w[512] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn hamming_is_symmetric() {
        let w = hamming_window(64);
        for i in 0..32 {
            assert!((w[i] - w[63 - i]).abs() < 1e-12);
        }
    }

    #[test]
    fn deinterleave_drops_partial_group() {
        let split = deinterleave(&[0.0, 10.0, 1.0, 11.0, 2.0], 2);
        assert_eq!(split, vec![vec![0.0, 1.0], vec![10.0, 11.0]]);
        assert!(deinterleave(&[1.0], 0).is_empty());
    }

    // ---- Readiness ---------------------------------------------------------

    #[test]
    fn not_ready_until_first_full_frame() {
        let buf = CaptureBuffer::new(1024);
        let mut ex = FrameExtractor::new(16, 8, 2);
        assert_eq!(ex.ready_at(), 32);

        buf.push_interleaved(&interleaved_ramp(15, 2, 0));
        assert!(ex.poll(&buf).is_none());

        buf.push_interleaved(&interleaved_ramp(1, 2, 15));
        let frame = ex.poll(&buf).expect("frame ready");
        assert_eq!(frame.channel_count(), 2);
        assert_eq!(frame.len(), 16);
        assert_eq!(frame.start_sample(), 0);

        // Nothing new yet.
        assert!(ex.poll(&buf).is_none());
    }

    #[test]
    fn deinterleaves_per_channel() {
        let buf = CaptureBuffer::new(1024);
        let mut ex = FrameExtractor::new(8, 4, 3);
        buf.push_interleaved(&interleaved_ramp(8, 3, 0));

        let frame = ex.poll(&buf).unwrap();
        for c in 0..3 {
            let expected: Vec<f64> = (0..8).map(|i| (c * 1000 + i) as f64).collect();
            assert_eq!(unwindowed(&ex, &frame, c), expected, "channel {c}");
        }
    }

    #[test]
    fn raw_channels_keep_captured_values() {
        let buf = CaptureBuffer::new(1024);
        let mut ex = FrameExtractor::new(8, 4, 2);
        buf.push_interleaved(&interleaved_ramp(8, 2, 0));

        let frame = ex.poll(&buf).unwrap();
        let expected: Vec<f32> = (0..8).map(|i| (1000 + i) as f32).collect();
        assert_eq!(frame.raw_channels()[1], expected);
        assert_eq!(frame.channel(1)[0], 1000.0 * ex.window()[0]);
    }

    // ---- Overlap -----------------------------------------------------------

    #[test]
    fn consecutive_frames_overlap_by_frame_minus_hop() {
        let buf = CaptureBuffer::new(1024);
        let mut ex = FrameExtractor::new(8, 2, 1);
        buf.push_interleaved(&interleaved_ramp(8, 1, 0));
        let first = ex.poll(&buf).unwrap();

        buf.push_interleaved(&interleaved_ramp(2, 1, 8));
        let second = ex.poll(&buf).unwrap();

        let a = unwindowed(&ex, &first, 0);
        let b = unwindowed(&ex, &second, 0);
        assert_eq!(a[2..], b[..6]);
        assert_eq!(b, (2..10).map(|i| i as f64).collect::<Vec<_>>());
        assert_eq!(second.start_sample(), 2);
        assert_eq!(ex.dropped_hops(), 0);
    }

    #[test]
    fn every_hop_processed_when_keeping_up() {
        let buf = CaptureBuffer::new(4096);
        let mut ex = FrameExtractor::new(16, 4, 2);
        buf.push_interleaved(&interleaved_ramp(12, 2, 0));

        let mut frames = 0;
        for hop in 0..20 {
            buf.push_interleaved(&interleaved_ramp(4, 2, 12 + hop * 4));
            assert!(ex.poll(&buf).is_some(), "hop {hop}");
            assert!(ex.poll(&buf).is_none(), "hop {hop} processed twice");
            frames += 1;
        }
        assert_eq!(frames, 20);
        assert_eq!(ex.dropped_hops(), 0);
    }

    // ---- Backlog -----------------------------------------------------------

    #[test]
    fn backlog_skips_to_newest_hop() {
        let buf = CaptureBuffer::new(4096);
        let mut ex = FrameExtractor::new(8, 4, 1);

        // 8 samples make the first frame, then five more hops arrive at once.
        buf.push_interleaved(&interleaved_ramp(28, 1, 0));
        let frame = ex.poll(&buf).unwrap();

        assert_eq!(ex.dropped_hops(), 5);
        assert_eq!(
            unwindowed(&ex, &frame, 0),
            (20..28).map(|i| i as f64).collect::<Vec<_>>()
        );
        assert!(ex.poll(&buf).is_none());
    }

    #[test]
    fn reads_across_ring_wrap() {
        // Capacity (F + 2·hop)·N = (8 + 8)·2 = 32 interleaved samples.
        let buf = CaptureBuffer::new(32);
        let mut ex = FrameExtractor::new(8, 4, 2);
        let mut next = 0;
        for _ in 0..10 {
            buf.push_interleaved(&interleaved_ramp(4, 2, next));
            next += 4;
            if let Some(frame) = ex.poll(&buf) {
                let expected: Vec<f64> = (next - 8..next).map(|i| (1000 + i) as f64).collect();
                assert_eq!(unwindowed(&ex, &frame, 1), expected);
            }
        }
        assert!(buf.written() > 32);
    }

    #[test]
    #[should_panic(expected = "hop_size must be in 1..=frame_size")]
    fn hop_larger_than_frame_panics() {
        let _ = FrameExtractor::new(8, 16, 1);
    }
}
