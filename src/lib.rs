pub mod config;
pub mod constants;
pub mod control;
pub mod device;
pub mod dsp;
pub mod error;
pub mod monitor;
pub mod params;
pub mod pipeline;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use config::AppConfig;
pub use error::{Result, TxError};
pub use params::{Parameter, ParameterStore};
pub use pipeline::{Pipeline, TransmitChain};
