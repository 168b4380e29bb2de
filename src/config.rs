//! Configuration for the iqtrim transmit chain.
//!
//! Everything has a default taken from the original flow graph, so an empty
//! (or missing) configuration file describes a working transmitter:
//!
//! ```toml
//! [parameters]
//! i_offset = 0.002
//! q_offset = -0.005
//!
//! [hardware]
//! device_args = "numchan=1 file=/tmp/tx.wav"
//! center_frequency = 441e6
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::constants::*;
use crate::error::{Result, TxError};

/// Frequency or rate specification
///
/// Accepts plain numbers as well as engineering suffixes, so large rates can
/// be written the way they are read off a datasheet.
///
/// # Parsing formats
/// - `20000000` or `2e7` - plain value in Hz
/// - `100k`, `20M`, `2.4G` - scaled by 1e3, 1e6, 1e9
/// - `441MHz`, `100kHz`, `20Msps` - unit suffix is ignored after the scale
///
/// # Example
/// ```
/// use iqtrim::config::Frequency;
///
/// let rate: Frequency = "20M".parse().unwrap();
/// assert_eq!(rate.as_hz(), 20_000_000.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frequency(f64);

impl Frequency {
    pub fn from_hz(hz: f64) -> Self {
        Self(hz)
    }

    pub fn as_hz(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = self.0;
        if hz.abs() >= 1e9 {
            write!(f, "{}G", hz / 1e9)
        } else if hz.abs() >= 1e6 {
            write!(f, "{}M", hz / 1e6)
        } else if hz.abs() >= 1e3 {
            write!(f, "{}k", hz / 1e3)
        } else {
            write!(f, "{}", hz)
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();

        // Drop a trailing unit so "441MHz" and "20Msps" parse like "441M" and "20M"
        let body = lower
            .strip_suffix("hz")
            .or_else(|| lower.strip_suffix("sps"))
            .unwrap_or(&lower);

        // "m" is mega here, never milli
        let (num, scale) = match body.chars().last() {
            Some('k') => (&body[..body.len() - 1], 1e3),
            Some('m') => (&body[..body.len() - 1], 1e6),
            Some('g') => (&body[..body.len() - 1], 1e9),
            _ => (body, 1.0),
        };

        let value: f64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid frequency: {}", s))?;
        if !value.is_finite() {
            return Err(format!("frequency must be finite: {}", s));
        }
        Ok(Self(value * scale))
    }
}

/// Top-level configuration
///
/// Use `AppConfig::default()` for the flow-graph defaults, or
/// `AppConfig::load()` to overlay a TOML file on top of them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Initial values of the live-tunable parameters
    pub parameters: ParameterDefaults,
    /// Transmit device programming
    pub hardware: SinkHardwareConfig,
    /// Block and buffer sizing of the streaming stages
    pub pipeline: PipelineConfig,
}

/// Initial values of every parameter held by the parameter store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParameterDefaults {
    /// Tone offset from the carrier in Hz
    pub tone_offset_hz: f64,
    /// Sample rate in samples per second
    pub sample_rate: f64,
    /// Gain/phase correction magnitude input
    pub magnitude_correction: f64,
    /// Phase correction input (stored and displayed only)
    pub phase_correction: f64,
    /// In-phase DC offset correction
    pub i_offset: f64,
    /// Quadrature DC offset correction
    pub q_offset: f64,
    /// "LO Tuning" display value in Hz (stored and displayed only)
    pub tuning: f64,
    /// Squelch display value in dB (stored and displayed only)
    pub squelch_db: f64,
}

impl Default for ParameterDefaults {
    fn default() -> Self {
        Self {
            tone_offset_hz: DEFAULT_TONE_OFFSET_HZ,
            sample_rate: DEFAULT_SAMPLE_RATE,
            magnitude_correction: DEFAULT_MAGNITUDE_CORRECTION,
            phase_correction: DEFAULT_PHASE_CORRECTION,
            i_offset: DEFAULT_I_OFFSET,
            q_offset: DEFAULT_Q_OFFSET,
            tuning: DEFAULT_TUNING_HZ,
            squelch_db: DEFAULT_SQUELCH_DB,
        }
    }
}

/// Transmit device configuration
///
/// Handed to the sink adapter once at construction. Only the sample rate is
/// reprogrammed afterwards, and that value comes from the parameter store,
/// not from here.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkHardwareConfig {
    /// osmosdr-style device argument string, e.g. `"numchan=1 file=tx.wav"`
    pub device_args: String,
    /// Channel index used for every per-channel call
    pub channel: usize,
    /// Carrier frequency in Hz
    pub center_frequency: f64,
    /// Frequency correction in ppm
    pub frequency_correction_ppm: f64,
    /// RF gain in dB
    pub rf_gain: f64,
    /// IF gain in dB
    pub if_gain: f64,
    /// Baseband gain in dB
    pub baseband_gain: f64,
    /// Antenna name, empty for the device default
    pub antenna: String,
    /// Analog bandwidth in Hz, 0 for automatic
    pub bandwidth: f64,
}

impl Default for SinkHardwareConfig {
    fn default() -> Self {
        Self {
            device_args: DEFAULT_DEVICE_ARGS.to_string(),
            channel: 0,
            center_frequency: DEFAULT_CENTER_FREQUENCY_HZ,
            frequency_correction_ppm: 0.0,
            rf_gain: DEFAULT_RF_GAIN_DB,
            if_gain: DEFAULT_IF_GAIN_DB,
            baseband_gain: DEFAULT_BB_GAIN_DB,
            antenna: String::new(),
            bandwidth: 0.0,
        }
    }
}

/// Streaming stage sizing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Samples per block
    pub block_size: usize,
    /// Blocks buffered between transmit stages
    pub channel_depth: usize,
    /// Blocks buffered for the spectral monitor
    pub monitor_depth: usize,
    /// Stop the source after this many samples (None = run until stopped)
    pub max_samples: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            channel_depth: DEFAULT_CHANNEL_DEPTH,
            monitor_depth: DEFAULT_MONITOR_DEPTH,
            max_samples: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(TxError::Config("block_size must be non-zero".into()));
        }
        if self.channel_depth == 0 {
            return Err(TxError::Config("channel_depth must be non-zero".into()));
        }
        if self.monitor_depth == 0 {
            return Err(TxError::Config("monitor_depth must be non-zero".into()));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Parse a TOML document; missing sections and keys keep their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| TxError::Config(format!("{}", e)))?;
        config.pipeline.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_plain() {
        let f: Frequency = "20000000".parse().unwrap();
        assert_eq!(f.as_hz(), 20_000_000.0);

        let f: Frequency = "2e7".parse().unwrap();
        assert_eq!(f.as_hz(), 20_000_000.0);
    }

    #[test]
    fn test_frequency_suffixes() {
        let f: Frequency = "100k".parse().unwrap();
        assert_eq!(f.as_hz(), 100_000.0);

        let f: Frequency = "441MHz".parse().unwrap();
        assert_eq!(f.as_hz(), 441_000_000.0);

        let f: Frequency = "20Msps".parse().unwrap();
        assert_eq!(f.as_hz(), 20_000_000.0);

        let f: Frequency = "2.4G".parse().unwrap();
        assert!((f.as_hz() - 2.4e9).abs() < 1.0);
    }

    #[test]
    fn test_frequency_negative_allowed() {
        // Tone offsets below the carrier are legitimate
        let f: Frequency = "-100k".parse().unwrap();
        assert_eq!(f.as_hz(), -100_000.0);
    }

    #[test]
    fn test_frequency_invalid() {
        assert!("abc".parse::<Frequency>().is_err());
        assert!("".parse::<Frequency>().is_err());
        assert!("inf".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_frequency_display() {
        assert_eq!(Frequency::from_hz(20e6).to_string(), "20M");
        assert_eq!(Frequency::from_hz(100e3).to_string(), "100k");
        assert_eq!(Frequency::from_hz(50.0).to_string(), "50");
    }

    #[test]
    fn test_defaults_match_flow_graph() {
        let config = AppConfig::default();
        assert_eq!(config.parameters.sample_rate, 20_000_000.0);
        assert_eq!(config.parameters.tone_offset_hz, 100_000.0);
        assert_eq!(config.parameters.magnitude_correction, 0.032);
        assert_eq!(config.parameters.phase_correction, -0.045);
        assert_eq!(config.parameters.i_offset, 0.002);
        assert_eq!(config.parameters.q_offset, -0.005);
        assert_eq!(config.parameters.tuning, 450_000_000.0);
        assert_eq!(config.parameters.squelch_db, -50.0);
        assert_eq!(config.hardware.center_frequency, 441_000_000.0);
        assert_eq!(config.hardware.rf_gain, 10.0);
        assert_eq!(config.hardware.if_gain, 20.0);
        assert_eq!(config.hardware.baseband_gain, 20.0);
        assert_eq!(config.hardware.device_args, "numchan=1");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [parameters]
            i_offset = 0.01

            [hardware]
            rf_gain = 0.0
            antenna = "TX/RX"
            "#,
        )
        .unwrap();

        assert_eq!(config.parameters.i_offset, 0.01);
        assert_eq!(config.parameters.q_offset, DEFAULT_Q_OFFSET);
        assert_eq!(config.hardware.rf_gain, 0.0);
        assert_eq!(config.hardware.antenna, "TX/RX");
        assert_eq!(config.hardware.if_gain, DEFAULT_IF_GAIN_DB);
        assert_eq!(config.pipeline.block_size, DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_empty_toml() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.parameters.sample_rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn test_invalid_pipeline_rejected() {
        let result = AppConfig::from_toml("[pipeline]\nblock_size = 0\n");
        assert!(matches!(result, Err(TxError::Config(_))));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(AppConfig::from_toml("[parameters\n").is_err());
    }
}
