pub mod correction;
pub mod oscillator;

pub use correction::{
    DcOffsetCorrector, GainPhaseCorrector, dc_offset_coefficient, gain_phase_coefficient,
};
pub use oscillator::{Oscillator, ToneSource};

use num_complex::Complex32;

use crate::error::Result;

/// Stage that produces samples
///
/// Called once per block; every call continues the stream where the previous
/// one ended.
pub trait Source: Send {
    fn produce(&mut self, block: &mut [Complex32]);
}

/// Stage that rewrites a block in place
///
/// Implementations read any live coefficient once per call, so a parameter
/// change lands on a block boundary.
pub trait Transform: Send {
    fn process(&mut self, block: &mut [Complex32]);
}

/// Stage that consumes the finished stream
pub trait Sink: Send {
    fn consume(&mut self, block: &[Complex32]) -> Result<()>;
}
