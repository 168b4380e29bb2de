use std::sync::Arc;

use num_complex::Complex32;

use super::{DeviceArgs, TxDevice, open_device};
use crate::config::SinkHardwareConfig;
use crate::dsp::Sink;
use crate::error::{Result, TxError};
use crate::params::ParameterStore;

/// Final stage of the transmit chain
///
/// Owns the transmit device, programs it once from the hardware config, and
/// then writes every block it is handed. The center frequency is fixed here;
/// only the sample rate follows the parameter store.
pub struct SinkAdapter {
    device: Box<dyn TxDevice>,
    params: Arc<ParameterStore>,
    channel: usize,
    programmed_rate: Option<f64>,
    samples_written: u64,
}

impl SinkAdapter {
    pub fn new(device: Box<dyn TxDevice>, params: Arc<ParameterStore>) -> Self {
        Self {
            device,
            params,
            channel: 0,
            programmed_rate: None,
            samples_written: 0,
        }
    }

    /// Open the device named by `config.device_args` and program it.
    pub fn open(config: &SinkHardwareConfig, params: Arc<ParameterStore>) -> Result<Self> {
        let args: DeviceArgs = config.device_args.parse()?;
        let device = open_device(&args)?;
        let mut adapter = Self::new(device, params);
        adapter.configure(config)?;
        Ok(adapter)
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Program the device: rate, carrier, correction, the three gain stages,
    /// antenna, bandwidth. Stops at the first failure.
    pub fn configure(&mut self, config: &SinkHardwareConfig) -> Result<()> {
        let args: DeviceArgs = config.device_args.parse()?;
        let num_channels = args.num_channels()?;
        if config.channel >= num_channels {
            return Err(TxError::DeviceConfig(format!(
                "channel {} out of range (numchan={})",
                config.channel, num_channels
            )));
        }
        self.channel = config.channel;
        let ch = self.channel;

        let rate = self.params.sample_rate();
        log::info!(
            "Programming {} channel {}: {} sps, {} Hz, {} ppm",
            self.device.name(),
            ch,
            rate,
            config.center_frequency,
            config.frequency_correction_ppm
        );
        log::info!(
            "Gains RF/IF/BB: {}/{}/{} dB, antenna {:?}, bandwidth {} Hz",
            config.rf_gain,
            config.if_gain,
            config.baseband_gain,
            config.antenna,
            config.bandwidth
        );

        step("sample rate", self.device.set_sample_rate(rate, ch))?;
        self.programmed_rate = Some(rate);
        step(
            "center frequency",
            self.device.set_center_frequency(config.center_frequency, ch),
        )?;
        step(
            "frequency correction",
            self.device
                .set_frequency_correction(config.frequency_correction_ppm, ch),
        )?;
        step("RF gain", self.device.set_gain(config.rf_gain, ch))?;
        step("IF gain", self.device.set_if_gain(config.if_gain, ch))?;
        step("BB gain", self.device.set_bb_gain(config.baseband_gain, ch))?;
        step("antenna", self.device.set_antenna(&config.antenna, ch))?;
        step("bandwidth", self.device.set_bandwidth(config.bandwidth, ch))?;

        Ok(())
    }

    /// Reprogram the device clock.
    pub fn set_sample_rate(&mut self, rate: f64) -> Result<()> {
        log::info!(
            "{}: sample rate -> {} sps on channel {}",
            self.device.name(),
            rate,
            self.channel
        );
        step(
            "sample rate",
            self.device.set_sample_rate(rate, self.channel),
        )?;
        self.programmed_rate = Some(rate);
        Ok(())
    }

    fn sync_sample_rate(&mut self) -> Result<()> {
        let rate = self.params.sample_rate();
        let changed = match self.programmed_rate {
            Some(current) => current.to_bits() != rate.to_bits(),
            None => true,
        };
        if changed {
            self.set_sample_rate(rate)?;
        }
        Ok(())
    }
}

fn step(name: &str, result: Result<()>) -> Result<()> {
    result.map_err(|e| match e {
        TxError::DeviceConfig(msg) => TxError::DeviceConfig(format!("{}: {}", name, msg)),
        other => TxError::DeviceConfig(format!("{}: {}", name, other)),
    })
}

impl Sink for SinkAdapter {
    fn consume(&mut self, block: &[Complex32]) -> Result<()> {
        self.sync_sample_rate()?;

        let mut offset = 0;
        while offset < block.len() {
            let accepted = self.device.write(&block[offset..])?;
            if accepted == 0 {
                // Device buffer full; write() normally blocks instead
                std::thread::yield_now();
            }
            offset += accepted.min(block.len() - offset);
        }
        self.samples_written += block.len() as u64;
        Ok(())
    }
}
