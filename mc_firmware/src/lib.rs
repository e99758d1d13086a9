//! The Firmware Link: a byte-streaming command pipeline to the motion
//! firmware, interleaving a priority command queue with on-demand planned
//! motion blocks, plus an I²C side-band for latency-sensitive control
//! (SPEC_FULL.md §4.C).

pub mod error;
pub mod handshake;
pub mod i2c;
pub mod link;

pub use error::FirmwareError;
pub use handshake::{parse_handshake, HandshakePayload};
pub use i2c::{send as i2c_send, I2cBus, LinuxI2cSideband, Payload as I2cPayload, SidebandOp};
pub use link::{FirmwareEvent, FirmwareLink, PlanSource};
