use std::fmt;
use std::str::FromStr;

use crate::error::TxError;

/// Every value held by the parameter store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Parameter {
    /// Oscillator tone offset in Hz
    ToneOffset,
    /// Sample rate shared by oscillator, monitor and device
    SampleRate,
    /// Gain/phase correction magnitude input
    Magnitude,
    /// Phase correction input (no effect on the stream)
    Phase,
    /// DC offset, in-phase
    IOffset,
    /// DC offset, quadrature
    QOffset,
    /// "LO Tuning" display value (no effect on the device)
    Tuning,
    /// Squelch display value (no effect on the stream)
    Squelch,
}

/// How a control surface should parse and format a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Float,
    Integer,
}

impl Parameter {
    pub const ALL: [Parameter; 8] = [
        Parameter::ToneOffset,
        Parameter::SampleRate,
        Parameter::Magnitude,
        Parameter::Phase,
        Parameter::IOffset,
        Parameter::QOffset,
        Parameter::Tuning,
        Parameter::Squelch,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Parameter::ToneOffset => "tone_offset",
            Parameter::SampleRate => "sample_rate",
            Parameter::Magnitude => "magnitude",
            Parameter::Phase => "phase",
            Parameter::IOffset => "i_offset",
            Parameter::QOffset => "q_offset",
            Parameter::Tuning => "tuning",
            Parameter::Squelch => "squelch",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Parameter::SampleRate | Parameter::Tuning => ValueKind::Integer,
            _ => ValueKind::Float,
        }
    }

    /// True for values that some streaming stage actually reads
    pub fn affects_stream(&self) -> bool {
        !matches!(
            self,
            Parameter::Phase | Parameter::Tuning | Parameter::Squelch
        )
    }

    /// Parse a value typed by the operator according to `kind()`.
    ///
    /// Integer parameters accept a float literal and round it, mirroring a
    /// text box that converts whatever it is given.
    pub fn parse_value(&self, text: &str) -> Result<f64, TxError> {
        let invalid = || TxError::InvalidValue {
            parameter: self.name().to_string(),
            value: text.to_string(),
        };
        let value: f64 = text.trim().parse().map_err(|_| invalid())?;
        if !value.is_finite() {
            return Err(invalid());
        }
        Ok(match self.kind() {
            ValueKind::Integer => value.round(),
            ValueKind::Float => value,
        })
    }

    pub fn format_value(&self, value: f64) -> String {
        match self.kind() {
            ValueKind::Integer => format!("{:.0}", value),
            ValueKind::Float => format!("{}", value),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        let parameter = match key.as_str() {
            "tone_offset" | "tone" | "tone_offset_hz" => Parameter::ToneOffset,
            "sample_rate" | "samp_rate" | "rate" => Parameter::SampleRate,
            "magnitude" | "magnitude_correction" => Parameter::Magnitude,
            "phase" | "phase_correction" => Parameter::Phase,
            "i_offset" | "i" => Parameter::IOffset,
            "q_offset" | "q" => Parameter::QOffset,
            "tuning" | "center_frequency" => Parameter::Tuning,
            "squelch" | "squelch_db" => Parameter::Squelch,
            _ => return Err(TxError::UnknownParameter(s.to_string())),
        };
        Ok(parameter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_roundtrip() {
        for p in Parameter::ALL {
            assert_eq!(p.name().parse::<Parameter>().unwrap(), p);
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("samp_rate".parse::<Parameter>().unwrap(), Parameter::SampleRate);
        assert_eq!("Q-Offset".parse::<Parameter>().unwrap(), Parameter::QOffset);
        assert_eq!("squelch_db".parse::<Parameter>().unwrap(), Parameter::Squelch);
        assert!(matches!(
            "volume".parse::<Parameter>(),
            Err(TxError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_dead_parameters() {
        assert!(!Parameter::Tuning.affects_stream());
        assert!(!Parameter::Squelch.affects_stream());
        assert!(!Parameter::Phase.affects_stream());
        assert!(Parameter::IOffset.affects_stream());
        assert!(Parameter::SampleRate.affects_stream());
    }

    #[test]
    fn test_parse_integer_rounds() {
        assert_eq!(Parameter::Tuning.parse_value("433920000.4").unwrap(), 433_920_000.0);
        assert_eq!(Parameter::IOffset.parse_value("0.0125").unwrap(), 0.0125);
        assert!(Parameter::IOffset.parse_value("abc").is_err());
        assert!(Parameter::IOffset.parse_value("NaN").is_err());
    }

    #[test]
    fn test_format() {
        assert_eq!(Parameter::Tuning.format_value(450e6), "450000000");
        assert_eq!(Parameter::QOffset.format_value(-0.005), "-0.005");
    }
}
