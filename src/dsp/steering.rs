//! Microphone geometry and the precomputed steering-vector table.
//!
//! For a planar wavefront arriving from angle `θ`, a microphone at `(x, y)`
//! (metres, relative to the array centre) hears the wave
//! `τ = (x·cosθ + y·sinθ) / c` seconds *earlier* than the centre does.  In the
//! frequency domain that advance is the phase factor `exp(i·2π·f·τ)`.
//!
//! [`SteeringTable::build`] evaluates that factor once at startup for every
//! candidate angle, every *active* microphone and every bin `k` of an
//! `F`-point transform (`f_k = k·fs/F`, `k = 0..=F/2`).  The table is
//! immutable afterwards and shared read-only with the beamformer.

use std::f64::consts::PI;

use num_complex::Complex64;

/// Radius of the UMA-8 outer ring in metres.
pub const UMA8_RADIUS_M: f64 = 0.045;

// ---------------------------------------------------------------------------
// MicArray
// ---------------------------------------------------------------------------

/// Planar microphone positions, one per captured channel, plus the subset of
/// channels that take part in beamforming.
#[derive(Debug, Clone, PartialEq)]
pub struct MicArray {
    /// `(x, y)` in metres, indexed by channel.
    positions: Vec<(f64, f64)>,
    /// Channel indices used by the beamformer, in scan order.
    active: Vec<usize>,
}

impl MicArray {
    /// Build an array from explicit positions and active channel indices.
    ///
    /// # Panics
    ///
    /// Panics if an active index does not refer to a position.
    pub fn new(positions: Vec<(f64, f64)>, active: Vec<usize>) -> Self {
        assert!(
            active.iter().all(|&ch| ch < positions.len()),
            "active microphone index out of range"
        );
        Self { positions, active }
    }

    /// The UMA-8 layout: a centre reference mic on channel 0, six mics on a
    /// circle of `radius` metres every 60° starting at 0° (channels 1-6), and
    /// a spare channel 7 at the origin.  Channels 1-6 are active.
    pub fn uma8(radius: f64) -> Self {
        Self::new(uma8_positions(radius), (1..=6).collect())
    }

    /// Position of `channel`.
    pub fn position(&self, channel: usize) -> (f64, f64) {
        self.positions[channel]
    }

    /// Every channel position, including inactive ones.
    pub fn positions(&self) -> &[(f64, f64)] {
        &self.positions
    }

    /// Channel indices that take part in beamforming.
    pub fn active_channels(&self) -> &[usize] {
        &self.active
    }

    /// Number of captured channels described by this array.
    pub fn channel_count(&self) -> usize {
        self.positions.len()
    }

    /// Arrival advance in seconds of a plane wave from `angle_deg` at
    /// `channel`, relative to the array centre.
    pub fn delay_secs(&self, channel: usize, angle_deg: f64, speed_of_sound: f64) -> f64 {
        let (x, y) = self.positions[channel];
        let theta = angle_deg.to_radians();
        (x * theta.cos() + y * theta.sin()) / speed_of_sound
    }
}

/// Channel positions of the UMA-8 layout described in [`MicArray::uma8`].
pub fn uma8_positions(radius: f64) -> Vec<(f64, f64)> {
    let mut positions = Vec::with_capacity(8);
    positions.push((0.0, 0.0));
    for i in 0..6 {
        let theta = (60.0 * i as f64).to_radians();
        positions.push((radius * theta.cos(), radius * theta.sin()));
    }
    positions.push((0.0, 0.0));
    positions
}

// ---------------------------------------------------------------------------
// SteeringTable
// ---------------------------------------------------------------------------

/// Immutable `(angle, active mic, bin) → exp(i·2π·f_k·τ)` table.
#[derive(Debug, Clone)]
pub struct SteeringTable {
    angle_count: usize,
    active: Vec<usize>,
    bins: usize,
    /// Flattened `[angle][active mic][bin]`.
    values: Vec<Complex64>,
}

impl SteeringTable {
    /// Precompute the table.
    ///
    /// Angles are spaced `360 / angle_count` degrees apart starting at 0°.
    /// Each active mic gets `frame_size / 2 + 1` bins.
    ///
    /// # Panics
    ///
    /// Panics if `angle_count` is zero or does not divide 360, or if
    /// `frame_size` is zero.
    pub fn build(
        angle_count: usize,
        array: &MicArray,
        speed_of_sound: f64,
        sample_rate: u32,
        frame_size: usize,
    ) -> Self {
        assert!(
            angle_count > 0 && 360 % angle_count == 0,
            "angle_count must divide 360"
        );
        assert!(frame_size > 0, "frame_size must be > 0");

        let active = array.active_channels().to_vec();
        let bins = frame_size / 2 + 1;
        let step = 360.0 / angle_count as f64;
        let bin_hz = sample_rate as f64 / frame_size as f64;

        let mut values = Vec::with_capacity(angle_count * active.len() * bins);
        for a in 0..angle_count {
            let angle_deg = a as f64 * step;
            for &ch in &active {
                let tau = array.delay_secs(ch, angle_deg, speed_of_sound);
                for k in 0..bins {
                    let omega = 2.0 * PI * k as f64 * bin_hz;
                    values.push(Complex64::from_polar(1.0, omega * tau));
                }
            }
        }

        log::debug!(
            "steering table: {angle_count} angles x {} mics x {bins} bins",
            active.len()
        );

        Self {
            angle_count,
            active,
            bins,
            values,
        }
    }

    /// Number of candidate angles.
    pub fn angle_count(&self) -> usize {
        self.angle_count
    }

    /// Angle in whole degrees of candidate `index`.
    pub fn angle_degrees(&self, index: usize) -> u16 {
        (index * (360 / self.angle_count)) as u16
    }

    /// Channel indices of the tabulated microphones, in table order.
    pub fn active_channels(&self) -> &[usize] {
        &self.active
    }

    /// Bins per microphone (`F / 2 + 1`).
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Steering values for candidate `angle` and the `mic`-th active
    /// microphone, one per bin.
    pub fn row(&self, angle: usize, mic: usize) -> &[Complex64] {
        let start = (angle * self.active.len() + mic) * self.bins;
        &self.values[start..start + self.bins]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
