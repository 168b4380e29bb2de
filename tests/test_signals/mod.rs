#![allow(dead_code)]

use std::f64::consts::TAU;
use std::sync::Arc;

use num_complex::Complex32;

use iqtrim::config::PipelineConfig;
use iqtrim::device::{CaptureDevice, CaptureHandle, SinkAdapter};
use iqtrim::{ParameterStore, Pipeline};

/// `exp(i * 2pi * freq * n / rate)` computed directly from the sample index
pub fn reference_tone(num_samples: usize, freq_hz: f64, sample_rate: f64) -> Vec<Complex32> {
    (0..num_samples)
        .map(|n| {
            let phi = TAU * freq_hz * n as f64 / sample_rate;
            Complex32::new(phi.cos() as f32, phi.sin() as f32)
        })
        .collect()
}

/// `k * x + c` for every sample
pub fn corrected(x: &[Complex32], k: Complex32, c: Complex32) -> Vec<Complex32> {
    x.iter().map(|&s| k * s + c).collect()
}

/// Start a pipeline that stops after `max_samples`, writing into a capture device
pub fn capture_pipeline(
    params: &Arc<ParameterStore>,
    max_samples: u64,
    block_size: usize,
) -> (Pipeline, CaptureHandle) {
    let (device, handle) = CaptureDevice::new();
    let sink = SinkAdapter::new(Box::new(device), Arc::clone(params));
    let config = PipelineConfig {
        block_size,
        max_samples: Some(max_samples),
        ..Default::default()
    };
    let pipeline = Pipeline::start(Arc::clone(params), sink, &config).unwrap();
    (pipeline, handle)
}

pub fn max_error(a: &[Complex32], b: &[Complex32]) -> f32 {
    assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).norm())
        .fold(0.0, f32::max)
}
