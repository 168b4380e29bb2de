//! Transmit devices and the sink adapter that drives them.

pub mod adapter;
pub mod args;
pub mod audio;
pub mod capture;
pub mod null;
#[cfg(feature = "soapy")]
pub mod soapy;
pub mod wav;

pub use adapter::SinkAdapter;
pub use args::{Backend, DeviceArgs};
pub use audio::AudioDevice;
pub use capture::{CaptureDevice, CaptureHandle, DeviceCommand};
pub use null::NullDevice;
pub use wav::WavFileDevice;

use num_complex::Complex32;

use crate::error::{Result, TxError};

/// Hardware transmit interface
///
/// Mirrors the calls a transmit front-end exposes: clock and RF programming
/// plus a blocking sample write. Back-ends without an RF stage accept the RF
/// calls and ignore them.
pub trait TxDevice: Send {
    fn name(&self) -> &str;

    fn set_sample_rate(&mut self, rate: f64, channel: usize) -> Result<()>;

    fn set_center_frequency(&mut self, hz: f64, channel: usize) -> Result<()> {
        log::debug!("{}: no RF stage, center frequency {} Hz on channel {} ignored", self.name(), hz, channel);
        Ok(())
    }

    fn set_frequency_correction(&mut self, ppm: f64, channel: usize) -> Result<()> {
        log::debug!("{}: frequency correction {} ppm on channel {} ignored", self.name(), ppm, channel);
        Ok(())
    }

    fn set_gain(&mut self, db: f64, channel: usize) -> Result<()> {
        log::debug!("{}: RF gain {} dB on channel {} ignored", self.name(), db, channel);
        Ok(())
    }

    fn set_if_gain(&mut self, db: f64, channel: usize) -> Result<()> {
        log::debug!("{}: IF gain {} dB on channel {} ignored", self.name(), db, channel);
        Ok(())
    }

    fn set_bb_gain(&mut self, db: f64, channel: usize) -> Result<()> {
        log::debug!("{}: BB gain {} dB on channel {} ignored", self.name(), db, channel);
        Ok(())
    }

    fn set_antenna(&mut self, name: &str, channel: usize) -> Result<()> {
        log::debug!("{}: antenna {:?} on channel {} ignored", self.name(), name, channel);
        Ok(())
    }

    fn set_bandwidth(&mut self, hz: f64, channel: usize) -> Result<()> {
        log::debug!("{}: bandwidth {} Hz on channel {} ignored", self.name(), hz, channel);
        Ok(())
    }

    /// Queue samples for transmission.
    ///
    /// Blocks while the device's outbound buffer is full. Returns how many
    /// samples were accepted, which may be fewer than offered.
    fn write(&mut self, samples: &[Complex32]) -> Result<usize>;
}

/// Open the back-end selected by `args`.
///
/// Without an explicit back-end key this opens SoapySDR when it is compiled
/// in, and otherwise falls back to a paced null device.
pub fn open_device(args: &DeviceArgs) -> Result<Box<dyn TxDevice>> {
    let backend = match args.backend()? {
        Some(backend) => backend,
        None if cfg!(feature = "soapy") => Backend::Soapy(args.soapy_args()),
        None => {
            log::warn!("No transmit back-end in {:?}; using the null device", args.to_string());
            Backend::Null { throttle: true }
        }
    };

    log::info!("Opening transmit device: {:?}", backend);

    match backend {
        Backend::Null { throttle } => Ok(Box::new(NullDevice::new(throttle))),
        Backend::File(path) => Ok(Box::new(WavFileDevice::create(path))),
        Backend::Audio => Ok(Box::new(AudioDevice::open()?)),
        Backend::Soapy(soapy_args) => open_soapy(&soapy_args),
        Backend::Simulated => open_simulated(args),
    }
}

#[cfg(feature = "soapy")]
fn open_soapy(soapy_args: &str) -> Result<Box<dyn TxDevice>> {
    Ok(Box::new(soapy::SoapyDevice::open(soapy_args)?))
}

#[cfg(not(feature = "soapy"))]
fn open_soapy(_soapy_args: &str) -> Result<Box<dyn TxDevice>> {
    Err(TxError::DeviceOpen(
        "SoapySDR support not compiled in (enable feature \"soapy\")".into(),
    ))
}

#[cfg(feature = "simulation")]
fn open_simulated(args: &DeviceArgs) -> Result<Box<dyn TxDevice>> {
    let impairment = crate::simulation::TxImpairment::from_args(args)?;
    Ok(Box::new(crate::simulation::SimulatedDevice::new(impairment)?))
}

#[cfg(not(feature = "simulation"))]
fn open_simulated(_args: &DeviceArgs) -> Result<Box<dyn TxDevice>> {
    Err(TxError::DeviceOpen(
        "simulated transmitter not compiled in (enable feature \"simulation\")".into(),
    ))
}
