use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use num_complex::{Complex32, Complex64};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rolling_stats::Stats;

use super::measure::image_rejection_db;
use crate::device::{DeviceArgs, TxDevice};
use crate::error::{Result, TxError};

/// Samples kept for image-rejection measurement
const HISTORY_LEN: usize = 1 << 16;

/// Analog front-end imperfections of a direct-conversion transmitter
///
/// ```text
/// I' = (1 + gain_imbalance) * I                         + dc_i
/// Q' = Q * cos(phase_skew) + I * sin(phase_skew)        + dc_q
/// ```
///
/// plus optional white Gaussian noise on both rails. The default DC bias is
/// exactly what the default correction offsets cancel.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct TxImpairment {
    pub gain_imbalance: f64,
    pub phase_skew: f64,
    pub dc_i: f64,
    pub dc_q: f64,
    /// Noise standard deviation per rail
    pub noise_std: f64,
    pub seed: Option<u64>,
}

impl Default for TxImpairment {
    fn default() -> Self {
        Self {
            gain_imbalance: 0.0,
            phase_skew: 0.0,
            dc_i: -crate::constants::DEFAULT_I_OFFSET,
            dc_q: -crate::constants::DEFAULT_Q_OFFSET,
            noise_std: 0.0,
            seed: None,
        }
    }
}

impl TxImpairment {
    pub fn with_dc(mut self, dc_i: f64, dc_q: f64) -> Self {
        self.dc_i = dc_i;
        self.dc_q = dc_q;
        self
    }

    pub fn with_iq_imbalance(mut self, gain_imbalance: f64, phase_skew: f64) -> Self {
        self.gain_imbalance = gain_imbalance;
        self.phase_skew = phase_skew;
        self
    }

    pub fn with_noise(mut self, noise_std: f64) -> Self {
        self.noise_std = noise_std;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Read `sim_gain`, `sim_phase`, `sim_dc_i`, `sim_dc_q`, `sim_noise` and
    /// `sim_seed` from device arguments; absent keys keep their defaults.
    pub fn from_args(args: &DeviceArgs) -> Result<Self> {
        let mut impairment = Self::default();
        let fields: [(&str, &mut f64); 5] = [
            ("sim_gain", &mut impairment.gain_imbalance),
            ("sim_phase", &mut impairment.phase_skew),
            ("sim_dc_i", &mut impairment.dc_i),
            ("sim_dc_q", &mut impairment.dc_q),
            ("sim_noise", &mut impairment.noise_std),
        ];
        for (key, field) in fields {
            if let Some(text) = args.get(key) {
                *field = text
                    .parse()
                    .map_err(|_| TxError::InvalidDeviceArgs(format!("{}={}", key, text)))?;
            }
        }
        if let Some(text) = args.get("sim_seed") {
            impairment.seed = Some(
                text.parse()
                    .map_err(|_| TxError::InvalidDeviceArgs(format!("sim_seed={}", text)))?,
            );
        }
        Ok(impairment)
    }

    fn apply(&self, x: Complex32) -> Complex64 {
        let (sin, cos) = self.phase_skew.sin_cos();
        let i = x.re as f64;
        let q = x.im as f64;
        Complex64::new(
            (1.0 + self.gain_imbalance) * i + self.dc_i,
            q * cos + i * sin + self.dc_q,
        )
    }
}

struct SimState {
    sample_rate: f64,
    i_stats: Stats<f64>,
    q_stats: Stats<f64>,
    history: Vec<Complex32>,
    next: usize,
}

impl SimState {
    fn new() -> Self {
        Self {
            sample_rate: 0.0,
            i_stats: Stats::new(),
            q_stats: Stats::new(),
            history: Vec::with_capacity(HISTORY_LEN),
            next: 0,
        }
    }

    fn record(&mut self, y: Complex32) {
        self.i_stats.update(y.re as f64);
        self.q_stats.update(y.im as f64);
        if self.history.len() < HISTORY_LEN {
            self.history.push(y);
        } else {
            self.history[self.next] = y;
            self.next = (self.next + 1) % HISTORY_LEN;
        }
    }

    fn ordered_history(&self) -> Vec<Complex32> {
        let mut out = Vec::with_capacity(self.history.len());
        out.extend_from_slice(&self.history[self.next..]);
        out.extend_from_slice(&self.history[..self.next]);
        out
    }
}

/// Simulated transmitter with an impaired analog front end
///
/// Measures what would leave the antenna: the running DC estimate and, given
/// the tone frequency, how far the image is suppressed.
pub struct SimulatedDevice {
    impairment: TxImpairment,
    noise: Option<Normal<f64>>,
    rng: ChaCha8Rng,
    state: Arc<Mutex<SimState>>,
}

/// Measurement side of a [`SimulatedDevice`]
#[derive(Clone)]
pub struct SimulationHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedDevice {
    pub fn new(impairment: TxImpairment) -> Result<Self> {
        let noise = if impairment.noise_std > 0.0 {
            Some(Normal::new(0.0, impairment.noise_std).map_err(|e| {
                TxError::InvalidDeviceArgs(format!("sim_noise={}: {}", impairment.noise_std, e))
            })?)
        } else {
            None
        };
        let rng = match impairment.seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => rand::make_rng(),
        };
        log::info!("Simulated transmitter: {:?}", impairment);
        Ok(Self {
            impairment,
            noise,
            rng,
            state: Arc::new(Mutex::new(SimState::new())),
        })
    }

    pub fn handle(&self) -> SimulationHandle {
        SimulationHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl TxDevice for SimulatedDevice {
    fn name(&self) -> &str {
        "sim"
    }

    fn set_sample_rate(&mut self, rate: f64, _channel: usize) -> Result<()> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sample_rate = rate;
        Ok(())
    }

    fn write(&mut self, samples: &[Complex32]) -> Result<usize> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for &x in samples {
            let mut y = self.impairment.apply(x);
            if let Some(noise) = &self.noise {
                y.re += noise.sample(&mut self.rng);
                y.im += noise.sample(&mut self.rng);
            }
            state.record(Complex32::new(y.re as f32, y.im as f32));
        }
        Ok(samples.len())
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.i_stats.count > 0 {
            log::info!(
                "Simulated transmitter: {} samples, DC residual {:.6} {:+.6}i",
                state.i_stats.count,
                state.i_stats.mean,
                state.q_stats.mean
            );
        }
    }
}

impl SimulationHandle {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mean of everything transmitted since the last reset
    pub fn dc_residual(&self) -> Complex64 {
        let state = self.lock();
        if state.i_stats.count == 0 {
            return Complex64::new(0.0, 0.0);
        }
        Complex64::new(state.i_stats.mean, state.q_stats.mean)
    }

    /// Standard deviation of each rail since the last reset
    pub fn rail_std_dev(&self) -> (f64, f64) {
        let state = self.lock();
        (state.i_stats.std_dev, state.q_stats.std_dev)
    }

    pub fn samples_seen(&self) -> usize {
        self.lock().i_stats.count
    }

    pub fn sample_rate(&self) -> f64 {
        self.lock().sample_rate
    }

    /// Most recent transmitted samples, oldest first
    pub fn recent_samples(&self) -> Vec<Complex32> {
        self.lock().ordered_history()
    }

    /// Wanted-tone to image ratio in dB over the recent samples
    pub fn image_rejection_db(&self, tone_hz: f64) -> Option<f64> {
        let state = self.lock();
        if state.history.is_empty() {
            return None;
        }
        Some(image_rejection_db(
            &state.ordered_history(),
            tone_hz,
            state.sample_rate,
        ))
    }

    /// Forget statistics and history, e.g. after retuning a correction
    pub fn reset(&self) {
        let mut state = self.lock();
        let sample_rate = state.sample_rate;
        *state = SimState::new();
        state.sample_rate = sample_rate;
    }
}
