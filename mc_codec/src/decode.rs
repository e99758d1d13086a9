//! Command decoder (§4.B).
//!
//! Used in both directions: the Firmware Link never needs to decode its own
//! outgoing wire commands in production, but the codec must support it for
//! the round-trip property tests in §8 and for tooling built on this crate.

use crate::float6::decode_float6;
use crate::types::{CodecError, LineBlock};
use mc_common::value::Value;

/// The decoded shape of one command, mirroring `Cmd.decode_command`'s
/// `data['type']` dispatch in `original_source/Cmd.py`.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedCommand {
    Set {
        name: String,
        value: Value,
        sync: bool,
    },
    Seek {
        switch: u8,
        active: bool,
        error: bool,
    },
    Line(LineBlock),
    Report,
    Pause,
    Unpause,
    Estop,
    Clear,
    Flush,
    Step,
    Resume,
}

/// Decode a single command line (already split on `\n` and trimmed).
pub fn decode_command(cmd: &str) -> Result<DecodedCommand, CodecError> {
    let mut chars = cmd.chars();
    let op = chars.next().ok_or(CodecError::Empty)?;

    match op {
        '$' | '#' => decode_set(cmd, op == '#'),
        's' => decode_seek(cmd),
        'l' => decode_line(cmd),
        'r' => Ok(DecodedCommand::Report),
        'P' => Ok(DecodedCommand::Pause),
        'U' => Ok(DecodedCommand::Unpause),
        'E' => Ok(DecodedCommand::Estop),
        'C' => Ok(DecodedCommand::Clear),
        'F' => Ok(DecodedCommand::Flush),
        'S' => Ok(DecodedCommand::Step),
        'c' => Ok(DecodedCommand::Resume),
        other => Err(CodecError::UnknownOp(other)),
    }
}

fn decode_set(cmd: &str, sync: bool) -> Result<DecodedCommand, CodecError> {
    let rest = &cmd[1..];
    let eq = rest
        .find('=')
        .ok_or_else(|| CodecError::Malformed(format!("set command missing '=': {cmd}")))?;
    let name = rest[..eq].to_string();
    let raw_value = &rest[eq + 1..];

    let value = if let Some(float_part) = raw_value.strip_prefix(':') {
        Value::Float(decode_float6(float_part)? as f64)
    } else if raw_value.eq_ignore_ascii_case("true") {
        Value::Bool(true)
    } else if raw_value.eq_ignore_ascii_case("false") {
        Value::Bool(false)
    } else if !raw_value.contains('.') {
        raw_value
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| CodecError::Malformed(format!("bad int in set: {e}")))?
    } else {
        raw_value
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| CodecError::Malformed(format!("bad float in set: {e}")))?
    };

    Ok(DecodedCommand::Set { name, value, sync })
}

fn decode_seek(cmd: &str) -> Result<DecodedCommand, CodecError> {
    let bytes: Vec<char> = cmd.chars().collect();
    if bytes.len() < 3 {
        return Err(CodecError::Malformed(format!("seek command too short: {cmd}")));
    }

    let switch = bytes[1]
        .to_digit(16)
        .ok_or_else(|| CodecError::Malformed(format!("bad switch digit in seek: {cmd}")))?
        as u8;

    let flags = (bytes[2] as u8).wrapping_sub(b'0');
    let active = flags & 0b01 != 0;
    let error = flags & 0b10 != 0;

    Ok(DecodedCommand::Seek {
        switch,
        active,
        error,
    })
}

fn decode_line(cmd: &str) -> Result<DecodedCommand, CodecError> {
    let body = &cmd[1..];
    if body.len() < 18 {
        return Err(CodecError::Malformed(format!("line command too short: {cmd}")));
    }

    let exit_vel = decode_float6(&body[0..6])?;
    let max_accel = decode_float6(&body[6..12])?;
    let max_jerk = decode_float6(&body[12..18])?;

    let mut target = Vec::new();
    let mut times = [0.0f64; 7];

    let mut rest = &body[18..];
    while !rest.is_empty() {
        let name = rest.chars().next().unwrap();
        if rest.len() < 7 {
            return Err(CodecError::Malformed(format!(
                "truncated line segment in: {cmd}"
            )));
        }
        let value = decode_float6(&rest[1..7])?;
        rest = &rest[7..];

        if "xyzabcuvw".contains(name) {
            target.push((name, value));
        } else if let Some(idx) = name.to_digit(10) {
            if (idx as usize) < times.len() {
                times[idx as usize] = value as f64;
            }
        }
    }

    Ok(DecodedCommand::Line(LineBlock {
        exit_vel,
        max_accel,
        max_jerk,
        target,
        times,
    }))
}
