//! Amplitude and phase extraction from complex subcarrier vectors.

use std::f64::consts::PI;

use num_complex::Complex64;

/// Per-subcarrier modulus `sqrt(re² + im²)`.
pub fn amplitude(spectrum: &[Complex64]) -> Vec<f64> {
    spectrum.iter().map(|c| c.norm()).collect()
}

/// Per-subcarrier argument in radians, within (-π, π].
///
/// `atan2` can return -π for a negative real part with a negative-zero
/// imaginary part; that is folded onto +π. The origin maps to 0.
pub fn phase(spectrum: &[Complex64]) -> Vec<f64> {
    spectrum.iter().map(|&c| phase_of(c)).collect()
}

fn phase_of(c: Complex64) -> f64 {
    if c.re == 0.0 && c.im == 0.0 {
        return 0.0;
    }
    let p = c.arg();
    if p <= -PI {
        PI
    } else {
        p
    }
}
