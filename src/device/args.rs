use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TxError};

/// Which transmit back-end a device argument string selects
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    /// Discard samples, optionally paced to the sample rate
    Null { throttle: bool },
    /// Record I/Q to a stereo WAV file
    File(PathBuf),
    /// Play I/Q on the default sound card (I = left, Q = right)
    Audio,
    /// SoapySDR device; the string holds the SoapySDR arguments
    Soapy(String),
    /// Simulated impaired transmitter
    Simulated,
}

const BACKEND_KEYS: [&str; 5] = ["null", "file", "audio", "soapy", "sim"];

/// osmosdr-style device arguments
///
/// A list of `key=value` (or bare `key`) tokens separated by spaces or
/// commas, e.g. `"numchan=1 file=/tmp/tx.wav"` or
/// `"numchan=1 soapy=0,driver=hackrf"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceArgs {
    pairs: Vec<(String, String)>,
}

impl DeviceArgs {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Number of channels requested with `numchan`, 1 when absent
    pub fn num_channels(&self) -> Result<usize> {
        match self.get("numchan") {
            None => Ok(1),
            Some(v) => match v.parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(TxError::InvalidDeviceArgs(format!("numchan={}", v))),
            },
        }
    }

    /// The explicitly selected back-end, if any
    pub fn backend(&self) -> Result<Option<Backend>> {
        let selected: Vec<&str> = BACKEND_KEYS
            .iter()
            .copied()
            .filter(|key| self.contains(key))
            .collect();

        let key = match selected.as_slice() {
            [] => return Ok(None),
            [key] => *key,
            _ => {
                return Err(TxError::InvalidDeviceArgs(format!(
                    "more than one back-end selected: {}",
                    selected.join(", ")
                )));
            }
        };

        let backend = match key {
            "null" => Backend::Null {
                throttle: self.get("throttle") != Some("0"),
            },
            "file" => {
                let path = self.get("file").unwrap_or_default();
                if path.is_empty() {
                    return Err(TxError::InvalidDeviceArgs("file= needs a path".into()));
                }
                Backend::File(PathBuf::from(path))
            }
            "audio" => Backend::Audio,
            "soapy" => Backend::Soapy(self.soapy_args()),
            _ => Backend::Simulated,
        };
        Ok(Some(backend))
    }

    /// Arguments forwarded to SoapySDR: everything except our own keys
    pub fn soapy_args(&self) -> String {
        self.pairs
            .iter()
            .filter(|(k, _)| k != "numchan" && k != "throttle" && !BACKEND_KEYS.contains(&k.as_str()))
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromStr for DeviceArgs {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self> {
        let mut pairs = Vec::new();
        for token in s.split(|c: char| c.is_whitespace() || c == ',') {
            if token.is_empty() {
                continue;
            }
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (token, ""),
            };
            if key.is_empty() {
                return Err(TxError::InvalidDeviceArgs(format!("empty key in {:?}", token)));
            }
            pairs.push((key.to_string(), value.to_string()));
        }
        Ok(Self { pairs })
    }
}

impl fmt::Display for DeviceArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self
            .pairs
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect();
        f.write_str(&tokens.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flow_graph_args() {
        // The flow graph builds "numchan=1 " with a trailing space
        let args: DeviceArgs = "numchan=1 ".parse().unwrap();
        assert_eq!(args.num_channels().unwrap(), 1);
        assert_eq!(args.backend().unwrap(), None);
    }

    #[test]
    fn test_file_backend() {
        let args: DeviceArgs = "numchan=1 file=/tmp/tx.wav".parse().unwrap();
        assert_eq!(
            args.backend().unwrap(),
            Some(Backend::File(PathBuf::from("/tmp/tx.wav")))
        );
    }

    #[test]
    fn test_null_throttle() {
        let args: DeviceArgs = "null".parse().unwrap();
        assert_eq!(args.backend().unwrap(), Some(Backend::Null { throttle: true }));

        let args: DeviceArgs = "null,throttle=0".parse().unwrap();
        assert_eq!(args.backend().unwrap(), Some(Backend::Null { throttle: false }));
    }

    #[test]
    fn test_soapy_args_forwarded() {
        let args: DeviceArgs = "numchan=1 soapy=0,driver=hackrf,serial=abc".parse().unwrap();
        assert_eq!(
            args.backend().unwrap(),
            Some(Backend::Soapy("driver=hackrf,serial=abc".into()))
        );
    }

    #[test]
    fn test_conflicting_backends() {
        let args: DeviceArgs = "audio file=x.wav".parse().unwrap();
        assert!(matches!(args.backend(), Err(TxError::InvalidDeviceArgs(_))));
    }

    #[test]
    fn test_bad_numchan() {
        let args: DeviceArgs = "numchan=zero".parse().unwrap();
        assert!(args.num_channels().is_err());
        let args: DeviceArgs = "numchan=0".parse().unwrap();
        assert!(args.num_channels().is_err());
    }

    #[test]
    fn test_empty_file_path() {
        let args: DeviceArgs = "file=".parse().unwrap();
        assert!(args.backend().is_err());
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!("=1".parse::<DeviceArgs>().is_err());
    }

    #[test]
    fn test_display() {
        let args: DeviceArgs = "numchan=2,  audio".parse().unwrap();
        assert_eq!(args.to_string(), "numchan=2 audio");
    }
}
