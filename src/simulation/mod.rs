//! Simulated transmit hardware for tests and bench work without a radio.

mod impairment;
mod measure;

pub use impairment::{SimulatedDevice, SimulationHandle, TxImpairment};
pub use measure::{dc_estimate, image_rejection_db, tone_amplitude};
