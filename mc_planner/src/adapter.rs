//! Planner Adapter (§4.D): bridges the opaque [`PlannerEngine`] into the
//! coordinator's wire-encoded block stream.

use std::collections::{BTreeMap, HashMap};

use mc_codec::encode;
use mc_common::consts::AXES;
use mc_common::error::CoreError;
use mc_common::value::Value;
use mc_state::{motor, StateStore};

use crate::engine::{AxisLimits, EngineConfig, PlannerEngine, VariableResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Mdi,
    Gcode,
}

/// Resolves G-code variable references against a point-in-time snapshot of
/// the state store, per §4.D "Variable resolver" / §4.F "Simulation
/// rules". A fresh resolver is installed on the engine every time the
/// config is (re)pushed so later reads see the current mapping.
pub struct StoreResolver {
    vars: HashMap<String, Value>,
}

impl StoreResolver {
    pub fn new(vars: HashMap<String, Value>) -> Self {
        StoreResolver { vars }
    }
}

impl VariableResolver for StoreResolver {
    fn resolve(&self, name: &str) -> f64 {
        let stripped = name.strip_prefix('_').unwrap_or(name);
        let resolved = motor::resolve_name(&self.vars, stripped).unwrap_or_else(|| stripped.to_string());
        self.vars
            .get(&resolved)
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }
}

/// Build the per-axis limits config pushed to the engine before it starts
/// emitting blocks (§4.D "Config snapshot").
pub fn config_snapshot(vars: &HashMap<String, Value>, with_units: bool, with_defaults: bool) -> EngineConfig {
    let mut axes = BTreeMap::new();
    for axis in AXES.chars() {
        let Some(m) = motor::find_motor(vars, axis) else {
            continue;
        };
        let max_vel = vars.get(&format!("{m}vm")).and_then(Value::as_f64).unwrap_or(0.0) * 1000.0;
        let max_accel = vars.get(&format!("{m}am")).and_then(Value::as_f64).unwrap_or(0.0) * 1000.0;
        let max_jerk = vars.get(&format!("{m}jm")).and_then(Value::as_f64).unwrap_or(0.0) * 1_000_000.0;
        let start = vars.get(&format!("{axis}p")).and_then(Value::as_f64).unwrap_or(0.0);
        axes.insert(
            axis,
            AxisLimits {
                max_vel,
                max_accel,
                max_jerk,
                start,
            },
        );
    }
    EngineConfig {
        axes,
        with_units,
        with_defaults,
    }
}

pub struct PlannerAdapter {
    mode: Mode,
    last_id: u64,
    config_pushed: bool,
}

impl Default for PlannerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlannerAdapter {
    pub fn new() -> Self {
        PlannerAdapter {
            mode: Mode::Idle,
            last_id: 0,
            config_pushed: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    /// Reset to idle, e.g. on `x=ESTOPPED` (§4.A "Special update hook").
    pub fn reset(&mut self) {
        self.mode = Mode::Idle;
        self.config_pushed = false;
    }

    /// Load a file program; only legal from `idle` (§3 "Planner Adapter
    /// state").
    pub fn load(&mut self, engine: &mut dyn PlannerEngine, path: &std::path::Path) -> Result<(), CoreError> {
        if self.mode != Mode::Idle {
            return Err(CoreError::semantic("load requires idle mode"));
        }
        engine
            .load(path)
            .map_err(|e| CoreError::semantic(e.to_string()))?;
        self.mode = Mode::Gcode;
        self.config_pushed = false;
        Ok(())
    }

    /// Load an MDI fragment; legal from `idle` or `mdi`, never from
    /// `gcode` (§4.E `mdi`).
    pub fn load_string(&mut self, engine: &mut dyn PlannerEngine, gcode: &str) -> Result<(), CoreError> {
        if self.mode == Mode::Gcode {
            return Err(CoreError::semantic("cannot MDI while gcode program is running"));
        }
        engine
            .load_string(gcode)
            .map_err(|e| CoreError::semantic(e.to_string()))?;
        self.mode = Mode::Mdi;
        self.config_pushed = false;
        Ok(())
    }

    fn ensure_config_pushed(&mut self, engine: &mut dyn PlannerEngine, store: &StateStore) {
        if !self.config_pushed {
            let vars = store.snapshot();
            let config = config_snapshot(&vars, false, true);
            engine.set_resolver(Box::new(StoreResolver::new(vars)));
            engine.set_config(&config);
            self.config_pushed = true;
        }
    }

    /// Draw blocks from the engine until one encodes to a non-empty wire
    /// command, applying any state-store side effects along the way
    /// (§4.D "Block emission" / "Block -> wire encoding").
    pub fn next(&mut self, engine: &mut dyn PlannerEngine, store: &mut StateStore) -> Option<String> {
        if !engine.is_running() {
            self.ensure_config_pushed(engine, store);
        }

        loop {
            let block = engine.next()?;
            self.last_id = block.id;
            let encoded = encode_block(&block, store);
            if !encoded.is_empty() {
                return Some(encoded);
            }
            if !engine.has_more() {
                self.mode = Mode::Idle;
                return None;
            }
        }
    }

    /// `set_active(id)` on every incoming state update that carries an
    /// `id` key (§4.D "Synchronization hook").
    pub fn on_state_update(&self, engine: &mut dyn PlannerEngine, changes: &HashMap<String, Value>) {
        if let Some(id) = changes.get("id").and_then(Value::as_i64) {
            engine.set_active(id as u64);
        }
    }

    /// Restart the engine from the position snapshot and the last known
    /// active id (§4.D "Restart").
    pub fn restart(&mut self, engine: &mut dyn PlannerEngine, store: &StateStore) {
        let mut position = BTreeMap::new();
        for axis in AXES.chars() {
            if let Some(p) = store.get(&format!("{axis}p"), Value::Float(0.0)).as_f64() {
                position.insert(axis, p as f32);
            }
        }
        let id = store.get("id", Value::Int(self.last_id as i64)).as_i64().unwrap_or(0) as u64;
        engine.restart(id, &position);
    }
}

/// Dispatch one block to its wire encoding, applying any state-store
/// reflection side effects (§4.D "Block -> wire encoding").
pub fn encode_block(block: &crate::block::Block, store: &mut StateStore) -> String {
    use crate::block::BlockKind;

    match &block.kind {
        BlockKind::Line(data) => encode::line(
            block.id,
            &data.target,
            data.exit_vel,
            data.max_accel,
            data.max_jerk,
            &data.times,
        ),
        BlockKind::Set { name, value } => encode_set(name, value, store),
        BlockKind::Output { port, value } => encode::output_by_name(port, *value).unwrap_or_default(),
        BlockKind::Dwell { seconds } => encode::dwell(*seconds as f32),
        BlockKind::Pause { optional } => encode::pause(*optional),
        BlockKind::Seek { switch, active, error } => {
            encode::seek_by_name(switch, *active, *error).unwrap_or_default()
        }
    }
}

fn encode_set(name: &str, value: &Value, store: &mut StateStore) -> String {
    match name {
        "line" => encode::line_number(value.as_i64().unwrap_or(0) as u64),
        "tool" => encode::tool(value.as_i64().unwrap_or(0)),
        "speed" => encode::speed(value.as_f64().unwrap_or(0.0) as f32),
        other => {
            if let Some(rest) = other.strip_prefix('_') {
                if let Some(axis) = rest.strip_suffix("_home").and_then(|a| a.chars().next()) {
                    return encode::set_position(axis, value.as_f64().unwrap_or(0.0) as f32);
                }
                store.set(rest, value.clone());
                String::new()
            } else {
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn config_snapshot_scales_limits() {
        let v = vars(&[
            ("0an", Value::Int(0)),
            ("0pm", Value::Bool(true)),
            ("0vm", Value::Float(2.0)),
            ("0am", Value::Float(3.0)),
            ("0jm", Value::Float(0.05)),
            ("xp", Value::Float(12.5)),
        ]);
        let config = config_snapshot(&v, false, true);
        let x = config.axes.get(&'x').unwrap();
        assert_eq!(x.max_vel, 2000.0);
        assert_eq!(x.max_accel, 3000.0);
        assert_eq!(x.max_jerk, 50_000.0);
        assert_eq!(x.start, 12.5);
    }

    #[test]
    fn resolver_strips_underscore_and_resolves_axis_prefix() {
        let v = vars(&[
            ("0an", Value::Int(0)),
            ("0pm", Value::Bool(true)),
            ("0hd", Value::Int(-1)),
        ]);
        let resolver = StoreResolver::new(v);
        assert_eq!(resolver.resolve("_x_hd"), -1.0);
        assert_eq!(resolver.resolve("_missing"), 0.0);
    }

    #[test]
    fn encode_set_other_underscore_reflects_into_store() {
        let mut store = StateStore::new();
        let out = encode_set("_foo", &Value::Int(7), &mut store);
        assert_eq!(out, "");
        assert_eq!(store.get("foo", Value::Int(0)), Value::Int(7));
    }

    #[test]
    fn encode_set_home_position_uses_set_position() {
        let mut store = StateStore::new();
        let out = encode_set("_x_home", &Value::Float(3.0), &mut store);
        assert!(out.starts_with("#xp=:"));
    }

    #[test]
    fn load_string_rejected_while_gcode_running() {
        struct NullEngine;
        impl PlannerEngine for NullEngine {
            fn set_config(&mut self, _c: &EngineConfig) {}
            fn set_resolver(&mut self, _r: Box<dyn VariableResolver>) {}
            fn set_logger(&mut self, _l: Box<dyn Fn(&str) + Send>) {}
            fn load(&mut self, _p: &std::path::Path) -> Result<(), crate::engine::PlannerError> {
                Ok(())
            }
            fn load_string(&mut self, _g: &str) -> Result<(), crate::engine::PlannerError> {
                Ok(())
            }
            fn has_more(&self) -> bool {
                false
            }
            fn next(&mut self) -> Option<crate::block::Block> {
                None
            }
            fn set_active(&mut self, _id: u64) {}
            fn is_running(&self) -> bool {
                false
            }
            fn is_synchronizing(&self) -> bool {
                false
            }
            fn synchronize(&mut self, _v: f64) {}
            fn restart(&mut self, _id: u64, _p: &BTreeMap<char, f32>) {}
        }

        let mut adapter = PlannerAdapter::new();
        let mut engine = NullEngine;
        adapter.load(&mut engine, std::path::Path::new("a.gcode")).unwrap();
        assert_eq!(adapter.mode(), Mode::Gcode);
        assert!(adapter.load_string(&mut engine, "G0 X1").is_err());
    }
}
