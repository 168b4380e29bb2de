use std::sync::{Arc, Mutex, PoisonError};

use num_complex::Complex32;

use super::TxDevice;
use crate::error::{Result, TxError};

/// A call received by a [`CaptureDevice`]
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    SampleRate(f64, usize),
    CenterFrequency(f64, usize),
    FrequencyCorrection(f64, usize),
    Gain(f64, usize),
    IfGain(f64, usize),
    BbGain(f64, usize),
    Antenna(String, usize),
    Bandwidth(f64, usize),
}

#[derive(Default)]
struct Captured {
    samples: Vec<Complex32>,
    commands: Vec<DeviceCommand>,
}

/// In-memory transmit device
///
/// Records every programming call and every sample written. The matching
/// [`CaptureHandle`] reads them back from another thread while the pipeline
/// owns the device.
pub struct CaptureDevice {
    captured: Arc<Mutex<Captured>>,
    fail_on: Option<String>,
    write_limit: Option<usize>,
    stalls: usize,
}

/// Read side of a [`CaptureDevice`]
#[derive(Clone)]
pub struct CaptureHandle {
    captured: Arc<Mutex<Captured>>,
}

impl CaptureDevice {
    pub fn new() -> (Self, CaptureHandle) {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let device = Self {
            captured: Arc::clone(&captured),
            fail_on: None,
            write_limit: None,
            stalls: 0,
        };
        (device, CaptureHandle { captured })
    }

    /// Make one operation fail.
    ///
    /// `op` is one of `"sample rate"`, `"center frequency"`,
    /// `"frequency correction"`, `"RF gain"`, `"IF gain"`, `"BB gain"`,
    /// `"antenna"`, `"bandwidth"` or `"write"`.
    pub fn failing_on(mut self, op: &str) -> Self {
        self.fail_on = Some(op.to_string());
        self
    }

    /// Accept at most `limit` samples per write call.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit.max(1));
        self
    }

    /// Accept nothing on the first `count` write calls, like a device
    /// whose buffer is still full when its write times out.
    pub fn with_stalls(mut self, count: usize) -> Self {
        self.stalls = count;
        self
    }

    fn record(&mut self, op: &str, command: DeviceCommand) -> Result<()> {
        if self.fail_on.as_deref() == Some(op) {
            return Err(TxError::DeviceConfig(format!("{} rejected", op)));
        }
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .commands
            .push(command);
        Ok(())
    }
}

impl TxDevice for CaptureDevice {
    fn name(&self) -> &str {
        "capture"
    }

    fn set_sample_rate(&mut self, rate: f64, channel: usize) -> Result<()> {
        self.record("sample rate", DeviceCommand::SampleRate(rate, channel))
    }

    fn set_center_frequency(&mut self, hz: f64, channel: usize) -> Result<()> {
        self.record("center frequency", DeviceCommand::CenterFrequency(hz, channel))
    }

    fn set_frequency_correction(&mut self, ppm: f64, channel: usize) -> Result<()> {
        self.record(
            "frequency correction",
            DeviceCommand::FrequencyCorrection(ppm, channel),
        )
    }

    fn set_gain(&mut self, db: f64, channel: usize) -> Result<()> {
        self.record("RF gain", DeviceCommand::Gain(db, channel))
    }

    fn set_if_gain(&mut self, db: f64, channel: usize) -> Result<()> {
        self.record("IF gain", DeviceCommand::IfGain(db, channel))
    }

    fn set_bb_gain(&mut self, db: f64, channel: usize) -> Result<()> {
        self.record("BB gain", DeviceCommand::BbGain(db, channel))
    }

    fn set_antenna(&mut self, name: &str, channel: usize) -> Result<()> {
        self.record("antenna", DeviceCommand::Antenna(name.to_string(), channel))
    }

    fn set_bandwidth(&mut self, hz: f64, channel: usize) -> Result<()> {
        self.record("bandwidth", DeviceCommand::Bandwidth(hz, channel))
    }

    fn write(&mut self, samples: &[Complex32]) -> Result<usize> {
        if self.fail_on.as_deref() == Some("write") {
            return Err(TxError::DeviceWrite("capture device write rejected".into()));
        }
        if self.stalls > 0 {
            self.stalls -= 1;
            return Ok(0);
        }
        let n = self.write_limit.map_or(samples.len(), |l| l.min(samples.len()));
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .samples
            .extend_from_slice(&samples[..n]);
        Ok(n)
    }
}

impl CaptureHandle {
    pub fn samples(&self) -> Vec<Complex32> {
        self.lock().samples.clone()
    }

    pub fn sample_count(&self) -> usize {
        self.lock().samples.len()
    }

    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.lock().commands.clone()
    }

    /// Take the samples captured so far, leaving the buffer empty
    pub fn drain_samples(&self) -> Vec<Complex32> {
        std::mem::take(&mut self.lock().samples)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Captured> {
        self.captured.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_samples_and_commands() {
        let (mut device, handle) = CaptureDevice::new();
        device.set_sample_rate(1e6, 0).unwrap();
        device.set_antenna("TX/RX", 0).unwrap();
        assert_eq!(device.write(&[Complex32::new(1.0, 2.0)]).unwrap(), 1);

        assert_eq!(
            handle.commands(),
            vec![
                DeviceCommand::SampleRate(1e6, 0),
                DeviceCommand::Antenna("TX/RX".into(), 0)
            ]
        );
        assert_eq!(handle.samples(), vec![Complex32::new(1.0, 2.0)]);
    }

    #[test]
    fn test_write_limit() {
        let (device, handle) = CaptureDevice::new();
        let mut device = device.with_write_limit(3);
        assert_eq!(device.write(&[Complex32::default(); 10]).unwrap(), 3);
        assert_eq!(handle.sample_count(), 3);
    }

    #[test]
    fn test_drain() {
        let (mut device, handle) = CaptureDevice::new();
        device.write(&[Complex32::default(); 4]).unwrap();
        assert_eq!(handle.drain_samples().len(), 4);
        assert_eq!(handle.sample_count(), 0);
    }
}
