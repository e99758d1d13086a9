//! The machine state store: a reactive key/value map with change
//! coalescing, axis<->motor name resolution, and listener fan-out
//! (SPEC_FULL.md §4.A).

pub mod motor;
pub mod store;

pub use motor::{find_motor, home_direction, home_position, homing_mode, resolve_name, HomingMode};
pub use store::{
    Callback, FirmwareConfigSink, Listener, ListenerError, NoFirmware, StateStore, VariableSpec,
};
