//! Axis ↔ motor name resolution (§3, §9 "Axis↔motor resolution").
//!
//! Implemented as pure functions over a state snapshot rather than a cached
//! index: the mapping is small (six motors) and must be observed
//! immediately when `<m>an`/`<m>pm` change, per the scenario in §8
//! "Axis resolution across remapping".

use std::collections::HashMap;

use mc_common::consts::{AXES, MOTOR_COUNT};
use mc_common::value::Value;

/// Homing mode derived from `<m>ho` (§3 "Homing mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingMode {
    Manual,
    SwitchMin,
    SwitchMax,
}

impl HomingMode {
    fn from_code(code: i64) -> HomingMode {
        match code {
            1 => HomingMode::SwitchMin,
            2 => HomingMode::SwitchMax,
            _ => HomingMode::Manual,
        }
    }

    /// -1, +1, or 0 (disabled).
    pub fn direction(self) -> i64 {
        match self {
            HomingMode::Manual => 0,
            HomingMode::SwitchMin => -1,
            HomingMode::SwitchMax => 1,
        }
    }
}

fn get_raw<'a>(vars: &'a HashMap<String, Value>, name: &str) -> Option<&'a Value> {
    vars.get(name)
}

/// The lowest motor index `m` in `0..MOTOR_COUNT` with `<m>an == axis_index`
/// and `<m>pm` truthy, where `axis_index` is `axis`'s position in `AXES`.
pub fn find_motor(vars: &HashMap<String, Value>, axis: char) -> Option<usize> {
    let axis_index = AXES.find(axis)? as i64;

    (0..MOTOR_COUNT).find(|&m| {
        let an = get_raw(vars, &format!("{m}an")).and_then(Value::as_i64);
        let pm = get_raw(vars, &format!("{m}pm")).map(Value::as_bool).unwrap_or(false);
        an == Some(axis_index) && pm
    })
}

/// The axis letter a motor is currently mapped to, regardless of whether it
/// is enabled.
pub fn motor_axis(vars: &HashMap<String, Value>, motor: usize) -> Option<char> {
    let an = get_raw(vars, &format!("{motor}an")).and_then(Value::as_i64)?;
    AXES.chars().nth(an as usize)
}

pub fn homing_mode(vars: &HashMap<String, Value>, motor: usize) -> HomingMode {
    let code = get_raw(vars, &format!("{motor}ho"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    HomingMode::from_code(code)
}

pub fn home_direction(vars: &HashMap<String, Value>, motor: usize) -> i64 {
    homing_mode(vars, motor).direction()
}

/// Home position: `<m>tn` for switch-min, `<m>tm` for switch-max, 0 otherwise.
pub fn home_position(vars: &HashMap<String, Value>, motor: usize) -> f64 {
    match homing_mode(vars, motor) {
        HomingMode::SwitchMin => get_raw(vars, &format!("{motor}tn"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        HomingMode::SwitchMax => get_raw(vars, &format!("{motor}tm"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        HomingMode::Manual => 0.0,
    }
}

/// Resolve an axis-prefixed name `<axis>_<suffix>` to its motor-indexed
/// counterpart `<motor><suffix>`, consulting the current mapping. Returns
/// `None` if the name is not axis-prefixed or the axis has no enabled
/// motor — callers fall back to treating the name literally in that case.
pub fn resolve_name(vars: &HashMap<String, Value>, name: &str) -> Option<String> {
    let mut chars = name.chars();
    let axis = chars.next()?;
    if !AXES.contains(axis) {
        return None;
    }
    let rest = chars.as_str();
    let suffix = rest.strip_prefix('_')?;
    let motor = find_motor(vars, axis)?;
    Some(format!("{motor}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn find_motor_requires_enabled() {
        let v = vars(&[("0an", Value::Int(0)), ("0pm", Value::Bool(false))]);
        assert_eq!(find_motor(&v, 'x'), None);

        let v = vars(&[("0an", Value::Int(0)), ("0pm", Value::Bool(true))]);
        assert_eq!(find_motor(&v, 'x'), Some(0));
    }

    #[test]
    fn find_motor_picks_lowest_index() {
        let v = vars(&[
            ("0an", Value::Int(1)),
            ("0pm", Value::Bool(true)),
            ("1an", Value::Int(1)),
            ("1pm", Value::Bool(true)),
        ]);
        assert_eq!(find_motor(&v, 'y'), Some(0));
    }

    #[test]
    fn resolve_name_maps_axis_prefix_to_motor() {
        let v = vars(&[("0an", Value::Int(0)), ("0pm", Value::Bool(true))]);
        assert_eq!(resolve_name(&v, "x_hd").as_deref(), Some("0hd"));
        assert_eq!(resolve_name(&v, "notaxis"), None);
    }

    #[test]
    fn remapping_is_observed_immediately() {
        let mut v = vars(&[("0an", Value::Int(0)), ("0pm", Value::Bool(true))]);
        assert_eq!(resolve_name(&v, "x_hd").as_deref(), Some("0hd"));

        v.insert("0an".into(), Value::Int(1));
        assert_eq!(resolve_name(&v, "y_hd").as_deref(), Some("0hd"));
        assert_eq!(resolve_name(&v, "x_hd"), None);
    }

    #[test]
    fn homing_mode_and_position() {
        let v = vars(&[
            ("0ho", Value::Int(1)),
            ("0tn", Value::Float(-5.0)),
            ("0tm", Value::Float(5.0)),
        ]);
        assert_eq!(homing_mode(&v, 0), HomingMode::SwitchMin);
        assert_eq!(home_direction(&v, 0), -1);
        assert_eq!(home_position(&v, 0), -5.0);

        let v = vars(&[("0ho", Value::Int(2)), ("0tm", Value::Float(5.0))]);
        assert_eq!(home_direction(&v, 0), 1);
        assert_eq!(home_position(&v, 0), 5.0);

        let v = vars(&[]);
        assert_eq!(homing_mode(&v, 0), HomingMode::Manual);
        assert_eq!(home_direction(&v, 0), 0);
    }
}
