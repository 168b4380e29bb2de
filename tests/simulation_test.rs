use std::sync::Arc;

use num_complex::Complex32;

use iqtrim::config::SinkHardwareConfig;
use iqtrim::device::SinkAdapter;
use iqtrim::dsp::Sink;
use iqtrim::simulation::{SimulatedDevice, SimulationHandle, TxImpairment};
use iqtrim::{ParameterStore, TransmitChain};

const BLOCK: usize = 1000;

fn simulated_chain(
    params: &Arc<ParameterStore>,
    impairment: TxImpairment,
) -> (TransmitChain, SinkAdapter, SimulationHandle) {
    let device = SimulatedDevice::new(impairment).unwrap();
    let handle = device.handle();
    let mut sink = SinkAdapter::new(Box::new(device), Arc::clone(params));
    sink.configure(&SinkHardwareConfig::default()).unwrap();
    (TransmitChain::new(Arc::clone(params)), sink, handle)
}

fn transmit(chain: &mut TransmitChain, sink: &mut SinkAdapter, num_samples: usize) {
    let mut block = vec![Complex32::default(); BLOCK];
    for _ in 0..num_samples / BLOCK {
        chain.fill(&mut block);
        sink.consume(&block).unwrap();
    }
}

#[test]
fn test_dc_correction_cancels_carrier_leak() {
    let params = Arc::new(ParameterStore::default());
    let impairment = TxImpairment::default()
        .with_dc(-0.01, 0.02)
        .with_noise(0.01)
        .with_seed(1234);
    let (mut chain, mut sink, handle) = simulated_chain(&params, impairment);

    // 100 whole tone periods, so the tone itself averages out
    transmit(&mut chain, &mut sink, 20_000);
    let before = handle.dc_residual();
    assert!((before.re + 0.008).abs() < 1e-3, "I residual {}", before.re);
    assert!((before.im - 0.015).abs() < 1e-3, "Q residual {}", before.im);
    assert!(before.norm() > 0.01);

    params.set_i_offset(0.01);
    params.set_q_offset(-0.02);
    handle.reset();

    transmit(&mut chain, &mut sink, 20_000);
    let after = handle.dc_residual();
    assert!(after.norm() < 1e-3, "residual after correction {}", after);
    assert_eq!(handle.samples_seen(), 20_000);

    let (i_std, q_std) = handle.rail_std_dev();
    // Tone power dominates: each rail of (1+i)x swings with amplitude sqrt(2)
    assert!((i_std - 1.0).abs() < 0.05);
    assert!((q_std - 1.0).abs() < 0.05);
}

#[test]
fn test_gain_imbalance_shows_up_as_image() {
    let clean = {
        let params = Arc::new(ParameterStore::default());
        let (mut chain, mut sink, handle) = simulated_chain(&params, TxImpairment::default());
        transmit(&mut chain, &mut sink, 20_000);
        handle.image_rejection_db(params.tone_offset_hz()).unwrap()
    };

    let impaired = {
        let params = Arc::new(ParameterStore::default());
        let impairment = TxImpairment::default().with_iq_imbalance(0.1, 0.0);
        let (mut chain, mut sink, handle) = simulated_chain(&params, impairment);
        transmit(&mut chain, &mut sink, 20_000);
        handle.image_rejection_db(params.tone_offset_hz()).unwrap()
    };

    // A 10% gain error leaves the image about 26 dB down
    assert!(clean > 60.0, "clean rejection {} dB", clean);
    assert!(impaired > 20.0 && impaired < 32.0, "impaired rejection {} dB", impaired);
}

#[test]
fn test_sample_rate_reaches_simulated_device() {
    let params = Arc::new(ParameterStore::default());
    let (mut chain, mut sink, handle) = simulated_chain(&params, TxImpairment::default());
    assert_eq!(handle.sample_rate(), 20_000_000.0);

    params.set_sample_rate(10_000_000.0);
    transmit(&mut chain, &mut sink, BLOCK);
    assert_eq!(handle.sample_rate(), 10_000_000.0);
    assert!(handle.image_rejection_db(100_000.0).is_some());
}

#[test]
fn test_open_simulated_device_from_args() {
    let params = Arc::new(ParameterStore::default());
    let config = SinkHardwareConfig {
        device_args: "numchan=1 sim sim_seed=1 sim_noise=0.001".into(),
        ..Default::default()
    };
    let mut sink = SinkAdapter::open(&config, Arc::clone(&params)).unwrap();
    assert_eq!(sink.device_name(), "sim");

    let block = TransmitChain::new(params).generate(BLOCK, BLOCK);
    sink.consume(&block).unwrap();
    assert_eq!(sink.samples_written(), BLOCK as u64);
}
