//! Fixed-capacity circular buffer of interleaved multi-channel samples.
//!
//! [`CaptureBuffer`] is the only state shared between the capture callback
//! (producer) and the processing loop (consumer).  Every access goes through
//! one `Mutex`, held only for the raw copy in or out.  A `Condvar` lets the
//! consumer sleep until the producer has written enough new samples.
//!
//! When the buffer is full, new samples **overwrite** the oldest data so the
//! most recent `capacity` samples are always available.  Besides the wrapping
//! write cursor (`head`), the buffer counts every sample ever written
//! (`written`).  Consumers address samples by that absolute count, which
//! makes overruns detectable instead of silently aliasing modulo capacity.
//!
//! # Example
//!
//! ```rust
//! use voice_doa::audio::CaptureBuffer;
//!
//! let buf = CaptureBuffer::new(4);
//! buf.push_interleaved(&[1.0, 2.0, 3.0, 4.0, 5.0]); // oldest sample dropped
//! assert_eq!(buf.latest(4), vec![2.0, 3.0, 4.0, 5.0]);
//! assert_eq!(buf.head(), 1);
//! ```

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Thread-safe capture buffer shared between the capture callback and the
/// processing loop.
pub type SharedCaptureBuffer = Arc<CaptureBuffer>;

// ---------------------------------------------------------------------------
// Ring (lock-protected state)
// ---------------------------------------------------------------------------

struct Ring {
    samples: Vec<f32>,
    /// Index of the *next* write position (wraps around capacity).
    head: usize,
    /// Total samples ever written.
    written: u64,
}

// ---------------------------------------------------------------------------
// CaptureBuffer
// ---------------------------------------------------------------------------

/// A lock-protected interleaved ring buffer.
///
/// ## Overflow behaviour
///
/// Writes never block on space: once `capacity` samples are stored, each new
/// sample replaces the oldest one.  Readers that fall more than
/// `capacity` samples behind lose data; [`crate::audio::FrameExtractor`]
/// prevents that by skipping ahead.
pub struct CaptureBuffer {
    ring: Mutex<Ring>,
    data_ready: Condvar,
    capacity: usize,
}

impl CaptureBuffer {
    /// Create a zero-filled buffer holding `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "CaptureBuffer capacity must be > 0");
        Self {
            ring: Mutex::new(Ring {
                samples: vec![0.0; capacity],
                head: 0,
                written: 0,
            }),
            data_ready: Condvar::new(),
            capacity,
        }
    }

    /// Create a buffer already wrapped for sharing across threads.
    pub fn shared(capacity: usize) -> SharedCaptureBuffer {
        Arc::new(Self::new(capacity))
    }

    // Poisoning is ignored: the ring only holds plain samples.
    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append interleaved samples, wrapping the write cursor.
    ///
    /// Called from the capture callback: no allocation, the lock is held for
    /// at most two slice copies.
    pub fn push_interleaved(&self, data: &[f32]) {
        if data.is_empty() {
            return;
        }

        // Only the newest `capacity` samples can survive anyway.
        let total = data.len();
        let skipped = total.saturating_sub(self.capacity);
        let data = &data[skipped..];

        {
            let mut ring = self.lock();
            let start = (ring.head + skipped) % self.capacity;
            let first = data.len().min(self.capacity - start);
            ring.samples[start..start + first].copy_from_slice(&data[..first]);
            let rest = data.len() - first;
            ring.samples[..rest].copy_from_slice(&data[first..]);
            ring.head = (ring.head + total) % self.capacity;
            ring.written += total as u64;
        }

        self.data_ready.notify_all();
    }

    /// Copy `out.len()` samples starting at absolute sample index `start`.
    ///
    /// Indices map onto the ring modulo capacity; samples that were never
    /// written read as `0.0`.  The caller is responsible for keeping
    /// `start` within the last `capacity` samples written.
    pub fn copy_window(&self, start: u64, out: &mut [f32]) {
        let ring = self.lock();
        let mut pos = (start % self.capacity as u64) as usize;
        let mut copied = 0;
        while copied < out.len() {
            let n = (out.len() - copied).min(self.capacity - pos);
            out[copied..copied + n].copy_from_slice(&ring.samples[pos..pos + n]);
            copied += n;
            pos = 0;
        }
    }

    /// The most recent `count` samples in write order.
    ///
    /// # Panics
    ///
    /// Panics if `count > capacity`.
    pub fn latest(&self, count: usize) -> Vec<f32> {
        assert!(count <= self.capacity, "cannot read more than capacity");
        let mut out = vec![0.0; count];
        let ring = self.lock();
        let start = (ring.head + self.capacity - count) % self.capacity;
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = ring.samples[(start + i) % self.capacity];
        }
        out
    }

    /// Current wrapping write cursor; always `< capacity`.
    pub fn head(&self) -> usize {
        self.lock().head
    }

    /// Total samples written since creation.
    pub fn written(&self) -> u64 {
        self.lock().written
    }

    /// Maximum number of samples the buffer holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Block until at least `target` samples have been written in total, or
    /// `timeout` elapses.  Returns `true` when the target was reached.
    pub fn wait_for_written(&self, target: u64, timeout: Duration) -> bool {
        let ring = self.lock();
        let (ring, _) = self
            .data_ready
            .wait_timeout_while(ring, timeout, |r| r.written < target)
            .unwrap_or_else(PoisonError::into_inner);
        ring.written >= target
    }
}

impl std::fmt::Debug for CaptureBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureBuffer")
            .field("capacity", &self.capacity)
            .field("written", &self.written())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
