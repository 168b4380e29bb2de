//! Transmit impairment pre-correction stages.
//!
//! Both stages are stateless per sample: the gain/phase stage multiplies by a
//! complex coefficient `k`, the DC stage adds a complex coefficient `c`. The
//! coefficients live in shared cells owned by the parameter store.

use std::sync::Arc;

use num_complex::{Complex32, Complex64};

use super::Transform;
use crate::params::ComplexCell;

/// Gain/phase correction coefficient `k = (1 + m) + (1i - m)`.
///
/// The magnitude terms are paired first, `m - m` is exactly zero for any
/// finite `m`, so `k` is exactly `1 + i` however large the magnitude is.
pub fn gain_phase_coefficient(magnitude: f64) -> Complex32 {
    let m = Complex64::new(magnitude, 0.0);
    let one = Complex64::new(1.0, 0.0);
    let k = (one + Complex64::i()) + (m - m);
    Complex32::new(k.re as f32, k.im as f32)
}

/// DC offset correction coefficient `c = i_offset + i * q_offset`.
pub fn dc_offset_coefficient(i_offset: f64, q_offset: f64) -> Complex32 {
    Complex32::new(i_offset as f32, q_offset as f32)
}

/// `y = k * x`
pub struct GainPhaseCorrector {
    coefficient: Arc<ComplexCell>,
}

impl GainPhaseCorrector {
    pub fn new(coefficient: Arc<ComplexCell>) -> Self {
        Self { coefficient }
    }
}

impl Transform for GainPhaseCorrector {
    fn process(&mut self, block: &mut [Complex32]) {
        let k = self.coefficient.load();
        for sample in block.iter_mut() {
            *sample *= k;
        }
    }
}

/// `y = x + c`
pub struct DcOffsetCorrector {
    coefficient: Arc<ComplexCell>,
}

impl DcOffsetCorrector {
    pub fn new(coefficient: Arc<ComplexCell>) -> Self {
        Self { coefficient }
    }
}

impl Transform for DcOffsetCorrector {
    fn process(&mut self, block: &mut [Complex32]) {
        let c = self.coefficient.load();
        for sample in block.iter_mut() {
            *sample += c;
        }
    }
}
