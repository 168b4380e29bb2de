use num_complex::Complex32;
use soapysdr::{Device, Direction, ErrorCode, TxStream};

use super::TxDevice;
use crate::error::{Result, TxError};

/// Write timeout per call, microseconds
const WRITE_TIMEOUT_US: i64 = 1_000_000;

/// SoapySDR transmit channel
pub struct SoapyDevice {
    device: Device,
    channel: usize,
    stream: Option<TxStream<Complex32>>,
}

fn config_err(e: soapysdr::Error) -> TxError {
    TxError::DeviceConfig(e.to_string())
}

impl SoapyDevice {
    pub fn open(args: &str) -> Result<Self> {
        let device = Device::new(args).map_err(|e| TxError::DeviceOpen(e.to_string()))?;
        match device.hardware_key() {
            Ok(key) => log::info!("SoapySDR device: {} ({:?})", key, args),
            Err(_) => log::info!("SoapySDR device: Unknown ({:?})", args),
        }
        Ok(Self {
            device,
            channel: 0,
            stream: None,
        })
    }

    fn stream(&mut self) -> Result<&mut TxStream<Complex32>> {
        if self.stream.is_none() {
            let mut stream = self
                .device
                .tx_stream::<Complex32>(&[self.channel])
                .map_err(|e| TxError::DeviceWrite(e.to_string()))?;
            stream
                .activate(None)
                .map_err(|e| TxError::DeviceWrite(e.to_string()))?;
            log::debug!("SoapySDR TX stream active on channel {}", self.channel);
            self.stream = Some(stream);
        }
        self.stream
            .as_mut()
            .ok_or_else(|| TxError::DeviceWrite("TX stream unavailable".into()))
    }
}

impl TxDevice for SoapyDevice {
    fn name(&self) -> &str {
        "soapy"
    }

    fn set_sample_rate(&mut self, rate: f64, channel: usize) -> Result<()> {
        self.channel = channel;
        self.device
            .set_sample_rate(Direction::Tx, channel, rate)
            .map_err(config_err)
    }

    fn set_center_frequency(&mut self, hz: f64, channel: usize) -> Result<()> {
        self.device
            .set_frequency(Direction::Tx, channel, hz, ())
            .map_err(config_err)
    }

    fn set_frequency_correction(&mut self, ppm: f64, channel: usize) -> Result<()> {
        if ppm == 0.0 {
            return Ok(());
        }
        self.device
            .set_frequency_correction(Direction::Tx, channel, ppm)
            .map_err(config_err)
    }

    fn set_gain(&mut self, db: f64, channel: usize) -> Result<()> {
        self.device
            .set_gain(Direction::Tx, channel, db)
            .map_err(config_err)
    }

    fn set_if_gain(&mut self, db: f64, channel: usize) -> Result<()> {
        self.set_named_gain("IF", db, channel)
    }

    fn set_bb_gain(&mut self, db: f64, channel: usize) -> Result<()> {
        self.set_named_gain("BB", db, channel)
    }

    fn set_antenna(&mut self, name: &str, channel: usize) -> Result<()> {
        if name.is_empty() {
            return Ok(());
        }
        self.device
            .set_antenna(Direction::Tx, channel, name)
            .map_err(config_err)
    }

    fn set_bandwidth(&mut self, hz: f64, channel: usize) -> Result<()> {
        // 0 leaves the driver's automatic filter in place
        if hz == 0.0 {
            return Ok(());
        }
        self.device
            .set_bandwidth(Direction::Tx, channel, hz)
            .map_err(config_err)
    }

    fn write(&mut self, samples: &[Complex32]) -> Result<usize> {
        let stream = self.stream()?;
        accepted(stream.write(&[samples], None, false, WRITE_TIMEOUT_US))
    }
}

/// A timeout means the device buffer stayed full; report nothing accepted
/// so the caller retries.
fn accepted(result: std::result::Result<usize, soapysdr::Error>) -> Result<usize> {
    match result {
        Ok(n) => Ok(n),
        Err(e) if matches!(e.code, ErrorCode::Timeout) => {
            log::trace!("SoapySDR TX buffer full, retrying");
            Ok(0)
        }
        Err(e) => Err(TxError::DeviceWrite(e.to_string())),
    }
}

impl SoapyDevice {
    /// Gain stages without a matching element on this hardware are skipped
    fn set_named_gain(&mut self, element: &str, db: f64, channel: usize) -> Result<()> {
        let elements = self
            .device
            .list_gains(Direction::Tx, channel)
            .map_err(config_err)?;
        if !elements.iter().any(|e| e == element) {
            log::debug!("No {} gain stage on this device; {} dB ignored", element, db);
            return Ok(());
        }
        self.device
            .set_gain_element(Direction::Tx, channel, element, db)
            .map_err(config_err)
    }
}

impl Drop for SoapyDevice {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.deactivate(None) {
                log::warn!("Failed to deactivate TX stream: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soapy_error(code: ErrorCode) -> soapysdr::Error {
        soapysdr::Error {
            code,
            message: String::new(),
        }
    }

    #[test]
    fn test_timeout_is_backpressure() {
        assert_eq!(accepted(Err(soapy_error(ErrorCode::Timeout))).unwrap(), 0);
        assert_eq!(accepted(Ok(512)).unwrap(), 512);
    }

    #[test]
    fn test_stream_error_is_fatal() {
        assert!(matches!(
            accepted(Err(soapy_error(ErrorCode::StreamError))),
            Err(TxError::DeviceWrite(_))
        ));
    }
}
