//! In-place radix-2 discrete Fourier transform.
//!
//! [`transform`] computes the forward DFT of a power-of-two length buffer
//! using decimation-in-time Cooley–Tukey: a bit-reversal permutation followed
//! by `log2(n)` butterfly stages driven by a table of `n / 2` roots of unity.
//!
//! [`inverse_transform`] is the conjugate → transform → conjugate composition
//! and is **unnormalized**: `inverse_transform(transform(x)) == n · x`.
//! Callers that need a true inverse must divide by `n` themselves.
//!
//! [`Radix2Fft`] caches the root table for one length so the processing loop
//! does not rebuild it on every hop.
//!
//! # Example
//!
//! ```rust
//! use num_complex::Complex64;
//! use voice_doa::dsp::fft::{inverse_transform, transform};
//!
//! let mut buf = vec![Complex64::new(1.0, 0.0); 8];
//! transform(&mut buf).unwrap();
//! assert!((buf[0].re - 8.0).abs() < 1e-12);
//!
//! inverse_transform(&mut buf).unwrap();
//! assert!((buf[3].re - 8.0).abs() < 1e-12); // scaled by n
//! ```

use std::f64::consts::PI;

use num_complex::Complex64;
use thiserror::Error;

// ---------------------------------------------------------------------------
// FftError
// ---------------------------------------------------------------------------

/// Precondition violations of the transform.
///
/// These indicate a misconfigured frame size and are never expected at
/// runtime once [`crate::config::AppConfig::validate`] has passed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FftError {
    #[error("transform length {len} is not a power of two")]
    NotPowerOfTwo { len: usize },

    #[error("transform length mismatch: plan is for {expected} points, buffer has {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

// ---------------------------------------------------------------------------
// Radix2Fft
// ---------------------------------------------------------------------------

/// A forward transform plan for one fixed power-of-two length.
#[derive(Debug, Clone)]
pub struct Radix2Fft {
    len: usize,
    levels: u32,
    /// `exp(-2πi·k/len)` for `k in 0..len/2`.
    roots: Vec<Complex64>,
}

impl Radix2Fft {
    /// Build a plan for `len` points.
    ///
    /// # Errors
    ///
    /// [`FftError::NotPowerOfTwo`] when `len` is zero or not a power of two.
    pub fn new(len: usize) -> Result<Self, FftError> {
        if !len.is_power_of_two() {
            return Err(FftError::NotPowerOfTwo { len });
        }

        let roots = (0..len / 2)
            .map(|k| Complex64::from_polar(1.0, -2.0 * PI * k as f64 / len as f64))
            .collect();

        Ok(Self {
            len,
            levels: len.trailing_zeros(),
            roots,
        })
    }

    /// Number of points this plan transforms.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`; a plan has at least one point.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Forward transform of `buf` in place.
    ///
    /// The buffer is left untouched when its length does not match the plan.
    pub fn process(&self, buf: &mut [Complex64]) -> Result<(), FftError> {
        if buf.len() != self.len {
            return Err(FftError::LengthMismatch {
                expected: self.len,
                actual: buf.len(),
            });
        }

        let n = self.len;

        for i in 0..n {
            let j = reverse_bits(i, self.levels);
            if j > i {
                buf.swap(i, j);
            }
        }

        let mut size = 2;
        while size <= n {
            let half = size / 2;
            let table_step = n / size;
            for start in (0..n).step_by(size) {
                for j in 0..half {
                    let t = buf[start + j + half] * self.roots[j * table_step];
                    buf[start + j + half] = buf[start + j] - t;
                    buf[start + j] += t;
                }
            }
            size *= 2;
        }

        Ok(())
    }

    /// Unnormalized inverse transform of `buf` in place.
    pub fn process_inverse(&self, buf: &mut [Complex64]) -> Result<(), FftError> {
        if buf.len() != self.len {
            return Err(FftError::LengthMismatch {
                expected: self.len,
                actual: buf.len(),
            });
        }
        conjugate_all(buf);
        self.process(buf)?;
        conjugate_all(buf);
        Ok(())
    }
}

fn reverse_bits(mut x: usize, levels: u32) -> usize {
    let mut out = 0;
    for _ in 0..levels {
        out = (out << 1) | (x & 1);
        x >>= 1;
    }
    out
}

fn conjugate_all(buf: &mut [Complex64]) {
    for c in buf.iter_mut() {
        *c = c.conj();
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Forward DFT of `buf` in place.
///
/// # Errors
///
/// [`FftError::NotPowerOfTwo`] when the length is not a power of two. The
/// input is not modified in that case.
pub fn transform(buf: &mut [Complex64]) -> Result<(), FftError> {
    Radix2Fft::new(buf.len())?.process(buf)
}

/// Unnormalized inverse DFT of `buf` in place (result is scaled by the
/// length).
///
/// # Errors
///
/// [`FftError::NotPowerOfTwo`] when the length is not a power of two. The
/// input is not modified in that case.
pub fn inverse_transform(buf: &mut [Complex64]) -> Result<(), FftError> {
    Radix2Fft::new(buf.len())?.process_inverse(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Direct O(n²) DFT used as ground truth.
    fn naive_dft(input: &[Complex64]) -> Vec<Complex64> {
        let n = input.len();
        (0..n)
            .map(|k| {
                input
                    .iter()
                    .enumerate()
                    .map(|(t, x)| {
                        *x * Complex64::from_polar(1.0, -2.0 * PI * (k * t) as f64 / n as f64)
                    })
                    .sum()
            })
            .collect()
    }

    fn test_signal(n: usize) -> Vec<Complex64> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                Complex64::new((0.3 * t).sin() + 0.1 * t, (0.7 * t).cos() - 0.05 * t)
            })
            .collect()
    }

    fn assert_close(a: &[Complex64], b: &[Complex64], tol: f64) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert!((*x - *y).norm() < tol, "index {i}: {x} vs {y}");
        }
    }

    #[test]
    fn matches_naive_dft() {
        for n in [1usize, 2, 4, 8, 16, 64] {
            let input = test_signal(n);
            let expected = naive_dft(&input);
            let mut buf = input.clone();
            transform(&mut buf).unwrap();
            assert_close(&buf, &expected, 1e-9);
        }
    }

    #[test]
    fn impulse_has_flat_spectrum() {
        let mut buf = vec![Complex64::new(0.0, 0.0); 16];
        buf[0] = Complex64::new(1.0, 0.0);
        transform(&mut buf).unwrap();
        for c in &buf {
            assert!((*c - Complex64::new(1.0, 0.0)).norm() < 1e-12);
        }
    }

    #[test]
    fn bin_centered_cosine_lands_in_its_bins() {
        let n = 64;
        let mut buf: Vec<Complex64> = (0..n)
            .map(|i| Complex64::new((2.0 * PI * 5.0 * i as f64 / n as f64).cos(), 0.0))
            .collect();
        transform(&mut buf).unwrap();
        assert!((buf[5].re - 32.0).abs() < 1e-9);
        assert!((buf[59].re - 32.0).abs() < 1e-9);
        assert!(buf[6].norm() < 1e-9);
    }

    #[test]
    fn inverse_is_scaled_by_length() {
        for n in [1usize, 2, 8, 32, 1024] {
            let input = test_signal(n);
            let mut buf = input.clone();
            transform(&mut buf).unwrap();
            inverse_transform(&mut buf).unwrap();

            let scaled: Vec<Complex64> = input.iter().map(|x| *x * n as f64).collect();
            assert_close(&buf, &scaled, 1e-6 * n as f64);
        }
    }

    #[test]
    fn non_power_of_two_is_rejected_untouched() {
        for n in [0usize, 3, 6, 12, 1000] {
            let input = test_signal(n);
            let mut buf = input.clone();
            assert_eq!(transform(&mut buf), Err(FftError::NotPowerOfTwo { len: n }));
            assert_eq!(buf, input);

            assert_eq!(
                inverse_transform(&mut buf),
                Err(FftError::NotPowerOfTwo { len: n })
            );
            assert_eq!(buf, input);
        }
    }

    #[test]
    fn plan_rejects_wrong_length() {
        let plan = Radix2Fft::new(8).unwrap();
        let input = test_signal(16);
        let mut buf = input.clone();
        let err = plan.process(&mut buf).unwrap_err();
        assert_eq!(
            err,
            FftError::LengthMismatch {
                expected: 8,
                actual: 16
            }
        );
        assert_eq!(buf, input);
    }

    #[test]
    fn plan_is_reusable() {
        let plan = Radix2Fft::new(32).unwrap();
        assert_eq!(plan.len(), 32);
        for _ in 0..3 {
            let input = test_signal(32);
            let mut buf = input.clone();
            plan.process(&mut buf).unwrap();
            assert_close(&buf, &naive_dft(&input), 1e-9);
        }
    }

    #[test]
    fn error_display_names_length() {
        let msg = FftError::NotPowerOfTwo { len: 1000 }.to_string();
        assert!(msg.contains("1000"), "message: {msg}");
    }
}
