//! The streaming transmit graph.
//!
//! ```text
//! tone-source ──┬──> gain-phase ──> dc-offset ──> tx-sink
//!               └──> monitor tap (drops when full)
//! ```
//!
//! Every stage runs on its own thread and hands `Vec<Complex32>` blocks to
//! the next over a bounded channel, so a slow device throttles the source.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded};
use num_complex::Complex32;

use crate::config::PipelineConfig;
use crate::dsp::{DcOffsetCorrector, GainPhaseCorrector, Sink, Source, ToneSource, Transform};
use crate::error::{Result, TxError};
use crate::monitor::{MonitorFeed, MonitorTap, monitor_channel};
use crate::params::ParameterStore;

type Block = Vec<Complex32>;

/// The transmit path without threads
///
/// Runs oscillator, gain/phase and DC stages back to back on the caller's
/// thread. Produces exactly what the threaded pipeline hands its sink.
pub struct TransmitChain {
    source: ToneSource,
    gain_phase: GainPhaseCorrector,
    dc_offset: DcOffsetCorrector,
}

impl TransmitChain {
    pub fn new(params: Arc<ParameterStore>) -> Self {
        Self {
            gain_phase: GainPhaseCorrector::new(params.gain_phase_cell()),
            dc_offset: DcOffsetCorrector::new(params.dc_offset_cell()),
            source: ToneSource::new(params),
        }
    }

    /// Fill `block` with the next corrected samples.
    pub fn fill(&mut self, block: &mut [Complex32]) {
        self.source.produce(block);
        self.gain_phase.process(block);
        self.dc_offset.process(block);
    }

    /// Generate `n` corrected samples in blocks of `block_size`
    pub fn generate(&mut self, n: usize, block_size: usize) -> Vec<Complex32> {
        let mut out = vec![Complex32::default(); n];
        for chunk in out.chunks_mut(block_size.max(1)) {
            self.fill(chunk);
        }
        out
    }
}

/// Running transmit graph
///
/// Started once and stopped once. Dropping a running pipeline stops it.
pub struct Pipeline {
    stop: Arc<AtomicBool>,
    handles: Vec<(String, JoinHandle<Result<()>>)>,
    monitor: Option<MonitorFeed>,
    samples_sent: Arc<AtomicU64>,
}

impl Pipeline {
    /// Spawn the stage threads and start streaming into `sink`.
    pub fn start<S>(params: Arc<ParameterStore>, sink: S, config: &PipelineConfig) -> Result<Self>
    where
        S: Sink + 'static,
    {
        config.validate()?;

        let stop = Arc::new(AtomicBool::new(false));
        let samples_sent = Arc::new(AtomicU64::new(0));

        let (source_tx, gain_phase_rx) = bounded::<Block>(config.channel_depth);
        let (gain_phase_tx, dc_rx) = bounded::<Block>(config.channel_depth);
        let (dc_tx, sink_rx) = bounded::<Block>(config.channel_depth);
        let (tap, feed) = monitor_channel(config.monitor_depth, Arc::clone(&params));

        let mut pipeline = Self {
            stop: Arc::clone(&stop),
            handles: Vec::with_capacity(4),
            monitor: Some(feed),
            samples_sent: Arc::clone(&samples_sent),
        };

        log::info!(
            "Starting pipeline: {} samples/block, depth {}, monitor depth {}",
            config.block_size,
            config.channel_depth,
            config.monitor_depth
        );

        let source = ToneSource::new(Arc::clone(&params));
        let block_size = config.block_size;
        let max_samples = config.max_samples;
        let flag = Arc::clone(&stop);
        pipeline.spawn("tone-source", move || {
            run_source(source, tap, source_tx, block_size, max_samples, flag)
        })?;

        let stage = GainPhaseCorrector::new(params.gain_phase_cell());
        let flag = Arc::clone(&stop);
        pipeline.spawn("gain-phase", move || {
            run_transform(stage, gain_phase_rx, gain_phase_tx, flag)
        })?;

        let stage = DcOffsetCorrector::new(params.dc_offset_cell());
        let flag = Arc::clone(&stop);
        pipeline.spawn("dc-offset", move || run_transform(stage, dc_rx, dc_tx, flag))?;

        let flag = Arc::clone(&stop);
        pipeline.spawn("tx-sink", move || run_sink(sink, sink_rx, flag, samples_sent))?;

        Ok(pipeline)
    }

    fn spawn<F>(&mut self, name: &str, body: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let thread_name = name.to_string();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            log::debug!("{} started", thread_name);
            let result = body();
            match &result {
                Ok(()) => log::debug!("{} stopped", thread_name),
                Err(e) => log::error!("{} failed: {}", thread_name, e),
            }
            result
        });
        match handle {
            Ok(handle) => {
                self.handles.push((name.to_string(), handle));
                Ok(())
            }
            Err(e) => {
                // Unwind whatever already started
                self.stop.store(true, Ordering::Release);
                Err(TxError::Io(e))
            }
        }
    }

    /// Hand out the spectral monitor feed. Only the first call gets it.
    pub fn take_monitor(&mut self) -> Option<MonitorFeed> {
        self.monitor.take()
    }

    /// Samples the sink has written so far
    pub fn samples_sent(&self) -> u64 {
        self.samples_sent.load(Ordering::Relaxed)
    }

    /// True once every stage thread has exited
    pub fn is_finished(&self) -> bool {
        self.handles.iter().all(|(_, h)| h.is_finished())
    }

    /// Block until every stage has exited; returns the first stage error.
    pub fn wait(mut self) -> Result<()> {
        self.join_all()
    }

    /// Raise the stop flag and join every stage.
    pub fn stop(mut self) -> Result<()> {
        log::info!("Stopping pipeline");
        self.stop.store(true, Ordering::Release);
        self.join_all()
    }

    fn join_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for (name, handle) in self.handles.drain(..) {
            let result = match handle.join() {
                Ok(result) => result,
                Err(_) => Err(TxError::Pipeline(format!("{} thread panicked", name))),
            };
            if let Err(e) = result {
                self.stop.store(true, Ordering::Release);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.stop.store(true, Ordering::Release);
            if let Err(e) = self.join_all() {
                log::warn!("Pipeline stopped with error: {}", e);
            }
        }
    }
}

fn run_source(
    mut source: ToneSource,
    tap: MonitorTap,
    tx: Sender<Block>,
    block_size: usize,
    max_samples: Option<u64>,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    let mut remaining = max_samples;
    while !stop.load(Ordering::Acquire) {
        let n = match remaining {
            Some(0) => break,
            Some(r) => r.min(block_size as u64) as usize,
            None => block_size,
        };

        let mut block = vec![Complex32::default(); n];
        source.produce(&mut block);
        // The tap runs at transmit pace: a stalled device stalls the display too
        tap.offer(&block);
        if tx.send(block).is_err() {
            break;
        }

        if let Some(r) = remaining.as_mut() {
            *r -= n as u64;
        }
    }
    if tap.dropped_blocks() > 0 {
        log::debug!("Monitor dropped {} blocks", tap.dropped_blocks());
    }
    Ok(())
}

fn run_transform<T: Transform>(
    mut stage: T,
    rx: Receiver<Block>,
    tx: Sender<Block>,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    for mut block in rx.iter() {
        if stop.load(Ordering::Acquire) {
            break;
        }
        stage.process(&mut block);
        if tx.send(block).is_err() {
            break;
        }
    }
    Ok(())
}

fn run_sink<S: Sink>(
    mut sink: S,
    rx: Receiver<Block>,
    stop: Arc<AtomicBool>,
    samples_sent: Arc<AtomicU64>,
) -> Result<()> {
    for block in rx.iter() {
        if stop.load(Ordering::Acquire) {
            break;
        }
        if let Err(e) = sink.consume(&block) {
            stop.store(true, Ordering::Release);
            return Err(e);
        }
        samples_sent.fetch_add(block.len() as u64, Ordering::Relaxed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CaptureDevice, SinkAdapter};
    use std::time::{Duration, Instant};

    fn bounded_config(max_samples: u64) -> PipelineConfig {
        PipelineConfig {
            block_size: 256,
            max_samples: Some(max_samples),
            ..Default::default()
        }
    }

    #[test]
    fn test_chain_default_output() {
        let params = Arc::new(ParameterStore::default());
        let mut chain = TransmitChain::new(params);
        let out = chain.generate(400, 64);

        let k = Complex32::new(1.0, 1.0);
        let c = Complex32::new(0.002, -0.005);
        let osc = crate::dsp::Oscillator::new(100_000.0, 20_000_000.0);
        for (y, x) in out.iter().zip(osc) {
            assert_eq!(*y, k * x + c);
        }
    }

    #[test]
    fn test_bounded_run_delivers_everything() {
        let params = Arc::new(ParameterStore::default());
        let (device, handle) = CaptureDevice::new();
        let sink = SinkAdapter::new(Box::new(device), Arc::clone(&params));

        let pipeline = Pipeline::start(params, sink, &bounded_config(1000)).unwrap();
        pipeline.wait().unwrap();
        assert_eq!(handle.sample_count(), 1000);
    }

    #[test]
    fn test_stop_unbounded() {
        let params = Arc::new(ParameterStore::default());
        let (device, handle) = CaptureDevice::new();
        let sink = SinkAdapter::new(Box::new(device), Arc::clone(&params));
        let config = PipelineConfig {
            block_size: 64,
            ..Default::default()
        };

        let pipeline = Pipeline::start(params, sink, &config).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.sample_count() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        pipeline.stop().unwrap();
        assert!(handle.sample_count() > 0);
        assert_eq!(handle.sample_count() % 64, 0);
    }

    #[test]
    fn test_write_error_stops_pipeline() {
        let params = Arc::new(ParameterStore::default());
        let (device, _handle) = CaptureDevice::new();
        let sink = SinkAdapter::new(Box::new(device.failing_on("write")), Arc::clone(&params));
        let config = PipelineConfig {
            block_size: 64,
            ..Default::default()
        };

        let pipeline = Pipeline::start(params, sink, &config).unwrap();
        assert!(matches!(pipeline.wait(), Err(TxError::DeviceWrite(_))));
    }

    /// Holds every block until the gate sender is dropped
    struct GatedSink {
        gate: Receiver<()>,
    }

    impl Sink for GatedSink {
        fn consume(&mut self, _block: &[Complex32]) -> Result<()> {
            let _ = self.gate.recv();
            Ok(())
        }
    }

    #[test]
    fn test_monitor_paced_by_transmit() {
        let params = Arc::new(ParameterStore::default());
        let (gate_tx, gate) = bounded::<()>(0);
        let config = PipelineConfig {
            block_size: 16,
            channel_depth: 1,
            monitor_depth: 64,
            ..Default::default()
        };
        let mut pipeline = Pipeline::start(params, GatedSink { gate }, &config).unwrap();
        let feed = pipeline.take_monitor().unwrap();

        assert!(feed.recv().is_some());
        thread::sleep(Duration::from_millis(100));
        // One block held by each stage plus one queued in each channel
        let seen = 1 + feed.try_iter().count();
        assert!(seen <= 7, "monitor ran {} blocks ahead of a stalled sink", seen);
        assert_eq!(feed.dropped_blocks(), 0);

        drop(gate_tx);
        pipeline.stop().unwrap();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let params = Arc::new(ParameterStore::default());
        let (device, _handle) = CaptureDevice::new();
        let sink = SinkAdapter::new(Box::new(device), Arc::clone(&params));
        let config = PipelineConfig {
            block_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            Pipeline::start(params, sink, &config),
            Err(TxError::Config(_))
        ));
    }

    #[test]
    fn test_monitor_taken_once() {
        let params = Arc::new(ParameterStore::default());
        let (device, _handle) = CaptureDevice::new();
        let sink = SinkAdapter::new(Box::new(device), Arc::clone(&params));
        let mut pipeline = Pipeline::start(params, sink, &bounded_config(10)).unwrap();
        assert!(pipeline.take_monitor().is_some());
        assert!(pipeline.take_monitor().is_none());
        pipeline.wait().unwrap();
    }
}
