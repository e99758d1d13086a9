//! Types shared between the encoder and decoder.

use thiserror::Error;

/// Limit-switch identifier for the `seek` command (§4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchId {
    Probe,
    XMin,
    XMax,
    YMin,
    YMax,
    ZMin,
    ZMax,
    AMin,
    AMax,
}

impl SwitchId {
    pub const fn to_hex_digit(self) -> u8 {
        match self {
            SwitchId::Probe => 1,
            SwitchId::XMin => 2,
            SwitchId::XMax => 3,
            SwitchId::YMin => 4,
            SwitchId::YMax => 5,
            SwitchId::ZMin => 6,
            SwitchId::ZMax => 7,
            SwitchId::AMin => 8,
            SwitchId::AMax => 9,
        }
    }

    pub const fn from_value(v: u8) -> Option<Self> {
        match v {
            1 => Some(SwitchId::Probe),
            2 => Some(SwitchId::XMin),
            3 => Some(SwitchId::XMax),
            4 => Some(SwitchId::YMin),
            5 => Some(SwitchId::YMax),
            6 => Some(SwitchId::ZMin),
            7 => Some(SwitchId::ZMax),
            8 => Some(SwitchId::AMin),
            9 => Some(SwitchId::AMax),
            _ => None,
        }
    }

    /// Parse the switch-name spellings the Planner Adapter passes
    /// (`"x-min"`, `"probe"`, ...).
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        Ok(match name {
            "probe" => SwitchId::Probe,
            "x-min" => SwitchId::XMin,
            "x-max" => SwitchId::XMax,
            "y-min" => SwitchId::YMin,
            "y-max" => SwitchId::YMax,
            "z-min" => SwitchId::ZMin,
            "z-max" => SwitchId::ZMax,
            "a-min" => SwitchId::AMin,
            "a-max" => SwitchId::AMax,
            other => return Err(CodecError::UnsupportedSwitch(other.to_string())),
        })
    }
}

/// Output port for the `output` block (§4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Mist,
    Flood,
}

impl Port {
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name {
            "mist" => Ok(Port::Mist),
            "flood" => Ok(Port::Flood),
            other => Err(CodecError::UnsupportedPort(other.to_string())),
        }
    }
}

/// A fully-decoded `line` block's s-curve time segments, in milliseconds
/// (index 0..7, only non-zero segments are transmitted on the wire).
pub type SCurveTimes = [f64; 7];

/// A decoded line block (§4.B / §8 scenario 1).
#[derive(Debug, Clone, PartialEq)]
pub struct LineBlock {
    pub exit_vel: f32,
    pub max_accel: f32,
    pub max_jerk: f32,
    /// Per-axis target position, keyed by axis letter (`x`..`c`, plus
    /// `u`/`v`/`w` on the decode side per the original protocol).
    pub target: Vec<(char, f32)>,
    pub times: SCurveTimes,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    #[error("unsupported switch name: {0}")]
    UnsupportedSwitch(String),

    #[error("unsupported output port: {0}")]
    UnsupportedPort(String),

    #[error("empty command")]
    Empty,

    #[error("unrecognized command byte: {0:?}")]
    UnknownOp(char),

    #[error("malformed command: {0}")]
    Malformed(String),

    #[error(transparent)]
    Float6(#[from] crate::float6::Float6Error),
}
