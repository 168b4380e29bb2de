//! Flow-graph constants
//!
//! Default values for the tone, the correction controls and the transmit
//! hardware. These are the values the pipeline starts with when no
//! configuration file or command-line override is given.

/// Sample rate shared by the oscillator, the monitor and the device (S/s).
pub const DEFAULT_SAMPLE_RATE: f64 = 20_000_000.0;

/// Test tone offset from the carrier in Hz.
pub const DEFAULT_TONE_OFFSET_HZ: f64 = 100_000.0;

pub const DEFAULT_MAGNITUDE_CORRECTION: f64 = 0.032;
pub const DEFAULT_PHASE_CORRECTION: f64 = -0.045;
pub const DEFAULT_I_OFFSET: f64 = 0.002;
pub const DEFAULT_Q_OFFSET: f64 = -0.005;

/// Value shown on the "LO Tuning" control. Never reaches the device.
pub const DEFAULT_TUNING_HZ: f64 = 450_000_000.0;

/// Value shown on the squelch control. Never applied to the stream.
pub const DEFAULT_SQUELCH_DB: f64 = -50.0;

/// Carrier frequency programmed into the device at construction.
pub const DEFAULT_CENTER_FREQUENCY_HZ: f64 = 441_000_000.0;
pub const DEFAULT_RF_GAIN_DB: f64 = 10.0;
pub const DEFAULT_IF_GAIN_DB: f64 = 20.0;
pub const DEFAULT_BB_GAIN_DB: f64 = 20.0;
pub const DEFAULT_DEVICE_ARGS: &str = "numchan=1";

/// Samples per block moved between pipeline stages.
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// Blocks buffered between two transmit stages before the upstream stage blocks.
pub const DEFAULT_CHANNEL_DEPTH: usize = 8;

/// Blocks buffered for the spectral monitor before new blocks are dropped.
pub const DEFAULT_MONITOR_DEPTH: usize = 4;
