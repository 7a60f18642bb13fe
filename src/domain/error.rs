use thiserror::Error;

/// RawCom unified error type
#[derive(Error, Debug)]
pub enum RawComError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Connection timeout")]
    Timeout,

    #[error("Device not connected")]
    DeviceNotConnected,

    #[error("Communication error: {message}")]
    Communication { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl RawComError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

pub type RawComResult<T> = Result<T, RawComError>;
