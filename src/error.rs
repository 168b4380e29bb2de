use thiserror::Error;

#[derive(Error, Debug)]
pub enum TxError {
    #[error("Device open failed: {0}")]
    DeviceOpen(String),

    #[error("Device configuration failed: {0}")]
    DeviceConfig(String),

    #[error("Device write failed: {0}")]
    DeviceWrite(String),

    #[error("Invalid device arguments: {0}")]
    InvalidDeviceArgs(String),

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid value for {parameter}: {value:?}")]
    InvalidValue { parameter: String, value: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TxError>;
