//! Lock-free value cells shared between the control thread and the stages.
//!
//! Each cell is a single `AtomicU64`, so a reader always sees a value that
//! some writer stored in one piece. For `ComplexCell` this means the real and
//! imaginary parts can never come from two different writes.

use std::sync::atomic::{AtomicU64, Ordering};

use num_complex::Complex32;

/// `f64` stored as its bit pattern
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// `Complex32` stored as both `f32` bit patterns packed into one word
#[derive(Debug)]
pub struct ComplexCell(AtomicU64);

impl ComplexCell {
    pub fn new(value: Complex32) -> Self {
        Self(AtomicU64::new(pack(value)))
    }

    pub fn load(&self) -> Complex32 {
        unpack(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, value: Complex32) {
        self.0.store(pack(value), Ordering::Release);
    }
}

fn pack(value: Complex32) -> u64 {
    ((value.re.to_bits() as u64) << 32) | value.im.to_bits() as u64
}

fn unpack(bits: u64) -> Complex32 {
    Complex32::new(f32::from_bits((bits >> 32) as u32), f32::from_bits(bits as u32))
}
