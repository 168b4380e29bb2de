use std::time::{Duration, Instant};

use num_complex::Complex32;

use super::TxDevice;
use crate::error::Result;

/// Discards samples
///
/// When throttled, `write` sleeps so that samples leave at the programmed
/// rate, standing in for a real transmitter's back-pressure.
pub struct NullDevice {
    throttle: bool,
    sample_rate: f64,
    started: Option<Instant>,
    samples_since_start: u64,
}

impl NullDevice {
    pub fn new(throttle: bool) -> Self {
        Self {
            throttle,
            sample_rate: 0.0,
            started: None,
            samples_since_start: 0,
        }
    }

    fn pace(&mut self, n: usize) {
        if !self.throttle || !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return;
        }
        let started = *self.started.get_or_insert_with(Instant::now);
        self.samples_since_start += n as u64;

        let due = Duration::from_secs_f64(self.samples_since_start as f64 / self.sample_rate);
        let elapsed = started.elapsed();
        if due > elapsed {
            std::thread::sleep(due - elapsed);
        }
    }
}

impl TxDevice for NullDevice {
    fn name(&self) -> &str {
        "null"
    }

    fn set_sample_rate(&mut self, rate: f64, _channel: usize) -> Result<()> {
        self.sample_rate = rate;
        self.started = None;
        self.samples_since_start = 0;
        Ok(())
    }

    fn write(&mut self, samples: &[Complex32]) -> Result<usize> {
        self.pace(samples.len());
        Ok(samples.len())
    }
}
