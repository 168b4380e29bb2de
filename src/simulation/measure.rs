use std::f64::consts::TAU;

use num_complex::{Complex32, Complex64};

/// Mean of a block of samples
pub fn dc_estimate(samples: &[Complex32]) -> Complex64 {
    if samples.is_empty() {
        return Complex64::new(0.0, 0.0);
    }
    let sum: Complex64 = samples
        .iter()
        .map(|s| Complex64::new(s.re as f64, s.im as f64))
        .sum();
    sum / samples.len() as f64
}

/// Complex amplitude of the component at `freq_hz`
///
/// Single-bin DFT, normalized so a unit tone at exactly `freq_hz` gives
/// magnitude 1.
pub fn tone_amplitude(samples: &[Complex32], freq_hz: f64, sample_rate: f64) -> Complex64 {
    if samples.is_empty() {
        return Complex64::new(0.0, 0.0);
    }
    let w = -TAU * freq_hz / sample_rate;
    let sum: Complex64 = samples
        .iter()
        .enumerate()
        .map(|(n, s)| Complex64::new(s.re as f64, s.im as f64) * Complex64::from_polar(1.0, w * n as f64))
        .sum();
    sum / samples.len() as f64
}

/// Ratio of the wanted tone at `+tone_hz` to its image at `-tone_hz`, in dB
pub fn image_rejection_db(samples: &[Complex32], tone_hz: f64, sample_rate: f64) -> f64 {
    let wanted = tone_amplitude(samples, tone_hz, sample_rate).norm();
    let image = tone_amplitude(samples, -tone_hz, sample_rate).norm();
    20.0 * (wanted / image.max(1e-12)).log10()
}
