//! The coordinator binary's top-level error type.
//!
//! Everything below the command surface already speaks [`mc_common::error::CoreError`]
//! or converts into it at its own boundary; this type exists only for the
//! failures that originate at the binary edge (config loading, transport
//! setup) and for a uniform `Result` type on the command surface.

use thiserror::Error;

use mc_common::error::CoreError;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Config(#[from] mc_common::config::ConfigError),

    #[error(transparent)]
    Firmware(#[from] mc_firmware::FirmwareError),

    #[error("failed to open serial port {path}: {source}")]
    SerialOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
