//! Firmware wire protocol encoder/decoder.
//!
//! Translates between the coordinator's in-memory command representation
//! and the ASCII-leading-byte serial protocol spoken by the AVR firmware
//! (SPEC_FULL.md §4.B). Stateless: every function here is a pure
//! transformation, with no knowledge of the serial transport or the
//! firmware's handshake.

pub mod decode;
pub mod encode;
pub mod float6;
pub mod types;

pub use decode::{decode_command, DecodedCommand};
pub use float6::{decode_float6, encode_float6, Float6Error};
pub use types::{CodecError, LineBlock, Port, SCurveTimes, SwitchId};
