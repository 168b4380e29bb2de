use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use audio_thread_priority::RtPriorityHandle;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use num_complex::Complex32;

use super::TxDevice;
use crate::error::{Result, TxError};

/// Interleaved buffers queued ahead of the sound card
const QUEUE_DEPTH: usize = 8;

/// Plays the transmit stream on the default sound card
///
/// I drives the left channel and Q the right, which makes a cheap baseband
/// monitor at audio rates. The stream is rebuilt whenever the rate changes.
pub struct AudioDevice {
    device: cpal::Device,
    stream: Option<cpal::Stream>,
    tx: Option<Sender<Vec<f32>>>,
    sample_rate: u32,
    underruns: Arc<AtomicU64>,
    rt_handle: Option<RtPriorityHandle>,
    rt_attempted: bool,
}

impl AudioDevice {
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| TxError::DeviceOpen("No output device found".into()))?;

        match device.description() {
            Ok(desc) => log::info!("Output device: {:?}", desc),
            Err(_) => log::info!("Output device: Unknown"),
        }

        Ok(Self {
            device,
            stream: None,
            tx: None,
            sample_rate: 0,
            underruns: Arc::new(AtomicU64::new(0)),
            rt_handle: None,
            rt_attempted: false,
        })
    }

    /// Callbacks that found no queued samples and played silence
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    fn build_stream(&mut self, sample_rate: u32) -> Result<()> {
        self.stream = None;
        self.tx = None;

        let (tx, rx) = crossbeam_channel::bounded(QUEUE_DEPTH);
        let stream_config = cpal::StreamConfig {
            channels: 2,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let mut feeder = Feeder::new(rx, Arc::clone(&self.underruns));
        let stream = self
            .device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| feeder.fill(data),
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| TxError::DeviceConfig(format!("{}", e)))?;

        stream
            .play()
            .map_err(|e| TxError::DeviceConfig(format!("{}", e)))?;

        self.stream = Some(stream);
        self.tx = Some(tx);
        self.sample_rate = sample_rate;
        Ok(())
    }

    fn promote_writer(&mut self, frames: usize) {
        if self.rt_attempted {
            return;
        }
        self.rt_attempted = true;

        // Attempt to promote the writing thread to real-time priority
        match audio_thread_priority::promote_current_thread_to_real_time(
            frames as u32,
            self.sample_rate,
        ) {
            Ok(handle) => self.rt_handle = Some(handle),
            Err(e) => log::warn!("Could not set real-time priority: {}", e),
        }
    }
}

impl TxDevice for AudioDevice {
    fn name(&self) -> &str {
        "audio"
    }

    fn set_sample_rate(&mut self, rate: f64, _channel: usize) -> Result<()> {
        let rounded = rate.round();
        if !(rounded >= 1.0 && rounded <= u32::MAX as f64) {
            return Err(TxError::DeviceConfig(format!(
                "sound card cannot run at {} sps",
                rate
            )));
        }
        self.build_stream(rounded as u32)
    }

    fn write(&mut self, samples: &[Complex32]) -> Result<usize> {
        self.promote_writer(samples.len());

        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| TxError::DeviceWrite("sample rate not programmed".into()))?;

        let mut interleaved = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            interleaved.push(s.re);
            interleaved.push(s.im);
        }

        tx.send(interleaved)
            .map_err(|_| TxError::DeviceWrite("audio stream closed".into()))?;
        Ok(samples.len())
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
        }
        log::debug!("Audio output: {} underruns", self.underruns());
    }
}

/// Callback side: copies queued interleaved buffers into the device buffer
struct Feeder {
    rx: Receiver<Vec<f32>>,
    pending: Vec<f32>,
    position: usize,
    underruns: Arc<AtomicU64>,
}

impl Feeder {
    fn new(rx: Receiver<Vec<f32>>, underruns: Arc<AtomicU64>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            position: 0,
            underruns,
        }
    }

    fn fill(&mut self, data: &mut [f32]) {
        let mut filled = 0;
        while filled < data.len() {
            if self.position >= self.pending.len() {
                match self.rx.try_recv() {
                    Ok(buffer) => {
                        self.pending = buffer;
                        self.position = 0;
                        continue;
                    }
                    Err(_) => {
                        data[filled..].fill(0.0);
                        self.underruns.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                }
            }
            let n = (self.pending.len() - self.position).min(data.len() - filled);
            data[filled..filled + n]
                .copy_from_slice(&self.pending[self.position..self.position + n]);
            filled += n;
            self.position += n;
        }
    }
}
