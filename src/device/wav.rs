use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use hound::{WavSpec, WavWriter};
use num_complex::Complex32;

use super::TxDevice;
use crate::error::{Result, TxError};

/// Records the transmit stream to a stereo float WAV file
///
/// I goes to the left channel and Q to the right. The file is created on the
/// first write, at the rate programmed by then; the header cannot change
/// afterwards, so later rate changes are only logged.
pub struct WavFileDevice {
    path: PathBuf,
    sample_rate: f64,
    writer: Option<WavWriter<BufWriter<File>>>,
    header_rate: u32,
}

impl WavFileDevice {
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sample_rate: 0.0,
            writer: None,
            header_rate: 0,
        }
    }

    fn wav_rate(rate: f64) -> Option<u32> {
        let rounded = rate.round();
        (rounded >= 1.0 && rounded <= u32::MAX as f64).then_some(rounded as u32)
    }

    fn writer(&mut self) -> Result<&mut WavWriter<BufWriter<File>>> {
        if self.writer.is_none() {
            let sample_rate = Self::wav_rate(self.sample_rate).ok_or_else(|| {
                TxError::DeviceWrite(format!(
                    "cannot record at {} sps to {}",
                    self.sample_rate,
                    self.path.display()
                ))
            })?;
            let spec = WavSpec {
                channels: 2,
                sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            };
            log::info!("Recording I/Q to {} at {} sps", self.path.display(), sample_rate);
            self.writer = Some(WavWriter::create(&self.path, spec)?);
            self.header_rate = sample_rate;
        }
        self.writer
            .as_mut()
            .ok_or_else(|| TxError::DeviceWrite("WAV writer unavailable".into()))
    }
}

impl TxDevice for WavFileDevice {
    fn name(&self) -> &str {
        "file"
    }

    fn set_sample_rate(&mut self, rate: f64, _channel: usize) -> Result<()> {
        if self.writer.is_some() && Self::wav_rate(rate) != Some(self.header_rate) {
            log::warn!(
                "{}: header already written at {} sps; ignoring new rate {}",
                self.path.display(),
                self.header_rate,
                rate
            );
        }
        self.sample_rate = rate;
        Ok(())
    }

    fn write(&mut self, samples: &[Complex32]) -> Result<usize> {
        let writer = self.writer()?;
        for s in samples {
            writer.write_sample(s.re)?;
            writer.write_sample(s.im)?;
        }
        Ok(samples.len())
    }
}

impl Drop for WavFileDevice {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                log::error!("Failed to finalize {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("iqtrim_{}_{}.wav", name, std::process::id()))
    }

    #[test]
    fn test_records_iq_as_stereo() {
        let path = temp_path("stereo");
        {
            let mut device = WavFileDevice::create(&path);
            device.set_sample_rate(48_000.0, 0).unwrap();
            device
                .write(&[Complex32::new(0.25, -0.5), Complex32::new(1.0, 0.0)])
                .unwrap();
        }

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 48_000);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.25, -0.5, 1.0, 0.0]);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_invalid_rate_fails_on_write() {
        let path = temp_path("badrate");
        let mut device = WavFileDevice::create(&path);
        device.set_sample_rate(0.0, 0).unwrap();
        assert!(matches!(
            device.write(&[Complex32::default()]),
            Err(TxError::DeviceWrite(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_rate_change_after_start_keeps_header() {
        let path = temp_path("ratechange");
        {
            let mut device = WavFileDevice::create(&path);
            device.set_sample_rate(8_000.0, 0).unwrap();
            device.write(&[Complex32::default(); 4]).unwrap();
            device.set_sample_rate(16_000.0, 0).unwrap();
            device.write(&[Complex32::default(); 4]).unwrap();
        }
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8_000);
        assert_eq!(reader.len(), 16);
        std::fs::remove_file(&path).ok();
    }
}
