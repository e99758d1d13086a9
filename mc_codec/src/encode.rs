//! Command encoders (§4.B).

use std::collections::BTreeMap;

use crate::float6::encode_float6;
use crate::types::{CodecError, Port, SwitchId};
use mc_common::consts::AXES;

const SEEK_ACTIVE: u8 = 1 << 0;
const SEEK_ERROR: u8 = 1 << 1;

/// Encode a per-axis float map in fixed axis order (`xyzabc`), each entry
/// `<axis><float6>`, omitting axes not present in `axes`.
fn encode_axes(axes: &BTreeMap<char, f32>) -> String {
    let mut out = String::new();
    for axis in AXES.chars() {
        if let Some(v) = axes.get(&axis) {
            out.push(axis);
            out.push_str(&encode_float6(*v));
        }
    }
    out
}

/// `$name=value\n` — asynchronous set.
pub fn set_async(name: &str, value: &str) -> String {
    format!("${name}={value}\n")
}

/// `#name=value` — synchronous, plan-ordered set of a plain value.
pub fn set_sync(name: &str, value: &str) -> String {
    format!("#{name}={value}")
}

/// `#name=:<float6>` — synchronous set of a binary float value.
pub fn set_sync_float(name: &str, value: f32) -> String {
    format!("#{name}=:{}", encode_float6(value))
}

/// `#ln=<n>` — synchronous line-number marker.
pub fn line_number(line: u64) -> String {
    format!("#ln={line}")
}

/// `#id=<u>\n` — synchronous id assignment preceding a planned line block.
pub fn id_assignment(id: u64) -> String {
    format!("#id={id}\n")
}

/// `s<hex><flags>` — seek command. `flags` bit 0 = active-level sought,
/// bit 1 = treat miss as error.
pub fn seek(switch: SwitchId, active: bool, error: bool) -> String {
    let mut flags = 0u8;
    if active {
        flags |= SEEK_ACTIVE;
    }
    if error {
        flags |= SEEK_ERROR;
    }
    format!(
        "s{:x}{}",
        switch.to_hex_digit(),
        (b'0' + flags) as char
    )
}

/// `l...` — a planned motion line, preceded by its synchronous id
/// assignment. `times` are in milliseconds; only non-zero segments are
/// emitted, each prefixed with its segment index digit.
pub fn line(
    id: u64,
    target: &BTreeMap<char, f32>,
    exit_vel: f32,
    max_accel: f32,
    max_jerk: f32,
    times_ms: &[f64; 7],
) -> String {
    let mut cmd = id_assignment(id);
    cmd.push('l');
    cmd.push_str(&encode_float6(exit_vel));
    cmd.push_str(&encode_float6(max_accel));
    cmd.push_str(&encode_float6(max_jerk));
    cmd.push_str(&encode_axes(target));

    for (i, &t) in times_ms.iter().enumerate() {
        if t != 0.0 {
            cmd.push_str(&i.to_string());
            cmd.push_str(&encode_float6((t / 60_000.0) as f32));
        }
    }

    cmd
}

/// `#t=<i>` — tool select.
pub fn tool(tool: i64) -> String {
    format!("#t={tool}")
}

/// `#s=:<float6>` — spindle speed.
pub fn speed(speed: f32) -> String {
    set_sync_float("s", speed)
}

/// `#<axis>p=:<float6>` — set an axis's absolute position.
pub fn set_position(axis: char, value: f32) -> String {
    set_sync_float(&format!("{axis}p"), value)
}

/// `#1oa=0|1` (mist) / `#2oa=0|1` (flood).
pub fn output(port: Port, value: bool) -> String {
    let bit = if value { '1' } else { '0' };
    match port {
        Port::Mist => format!("#1oa={bit}"),
        Port::Flood => format!("#2oa={bit}"),
    }
}

/// `d<float6>` — dwell for `seconds`.
pub fn dwell(seconds: f32) -> String {
    format!("d{}", encode_float6(seconds))
}

/// `P0`/`P1` — pause, required (`optional = false`) or optional.
pub fn pause(optional: bool) -> String {
    format!("P{}", if optional { 1 } else { 0 })
}

pub fn unpause() -> &'static str {
    "U"
}
pub fn estop() -> &'static str {
    "E"
}
pub fn clear() -> &'static str {
    "C"
}
pub fn flush() -> &'static str {
    "F"
}
pub fn step() -> &'static str {
    "S"
}
pub fn resume() -> &'static str {
    "c"
}
pub fn report() -> &'static str {
    "r"
}

/// `j...` — jog velocities, per-axis.
pub fn jog(axes: &BTreeMap<char, f32>) -> String {
    format!("j{}", encode_axes(axes))
}

/// Encode a block-level `output` command by port name, as the Planner
/// Adapter receives it from the engine.
pub fn output_by_name(port: &str, value: bool) -> Result<String, CodecError> {
    Ok(output(Port::from_name(port)?, value))
}

/// Encode a block-level `seek` command by switch name.
pub fn seek_by_name(switch: &str, active: bool, error: bool) -> Result<String, CodecError> {
    Ok(seek(SwitchId::from_name(switch)?, active, error))
}
