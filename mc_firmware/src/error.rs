//! Firmware Link error type, folding into the coordinator-wide taxonomy.

use thiserror::Error;

use mc_common::error::CoreError;

#[derive(Debug, Error)]
pub enum FirmwareError {
    #[error("serial transport error: {0}")]
    Serial(#[from] std::io::Error),

    #[error("i2c transport error: {0}")]
    I2c(String),

    #[error("malformed telemetry line: {0}")]
    MalformedLine(String),

    #[error("handshake payload rejected: {0}")]
    Handshake(String),
}

impl From<FirmwareError> for CoreError {
    fn from(e: FirmwareError) -> Self {
        match e {
            FirmwareError::Serial(err) => CoreError::transport(err.to_string()),
            FirmwareError::I2c(msg) => CoreError::transport(msg),
            FirmwareError::MalformedLine(msg) => CoreError::protocol(msg),
            FirmwareError::Handshake(msg) => CoreError::handshake(msg),
        }
    }
}
