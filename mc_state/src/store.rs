//! The reactive machine state store (§4.A).
//!
//! Not `Sync`: owned exclusively by the single-threaded control loop (§5).
//! The 250 ms debounce timer itself is not modeled here — `set`/`update`
//! only arm a flag; the event loop polls [`StateStore::debounce_armed`] and
//! is responsible for scheduling the actual timer and calling
//! [`StateStore::notify_listeners`] when it fires, per §9 "Debounce timer:
//! modeled as a one-shot scheduled task; re-arming is idempotent".

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::warn;

use mc_common::consts::AXES;
use mc_common::value::Value;

use crate::motor;

pub type Callback = Box<dyn Fn() -> Value>;
pub type Listener = Box<dyn FnMut(&HashMap<String, Value>) -> Result<(), ListenerError>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ListenerError(pub String);

/// Where `config()` forwards a set for a name in the machine-variables set
/// (§4.A: "forwards to Motion Coordinator as a firmware set"). Kept as a
/// narrow trait so the store never depends on the coordinator or the
/// firmware link directly — mirrors the opaque-engine boundary pattern used
/// for the planner (§9 "do not leak its types into the core").
pub trait FirmwareConfigSink {
    fn send_firmware_set(&mut self, code: &str, value: &Value);
}

/// A sink that just does a plain `set`, used by callers (e.g. the
/// Preplanner's snapshot consumers) that have no live firmware link.
pub struct NoFirmware;

impl FirmwareConfigSink for NoFirmware {
    fn send_firmware_set(&mut self, _code: &str, _value: &Value) {}
}

pub struct StateStore {
    vars: HashMap<String, Value>,
    callbacks: HashMap<String, Callback>,
    machine_var_set: HashSet<String>,
    listeners: Vec<Listener>,
    changes: HashMap<String, Value>,
    debounce_armed: bool,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let mut store = StateStore {
            vars: HashMap::new(),
            callbacks: HashMap::new(),
            machine_var_set: HashSet::new(),
            listeners: Vec::new(),
            changes: HashMap::new(),
            debounce_armed: false,
        };

        // Home direction/position are deliberately not wired here as
        // callbacks: they depend on the live axis->motor mapping and are
        // exposed instead as the pure functions in `motor`, evaluated
        // against a snapshot at call time (a `Fn` closure stored in this
        // map cannot itself borrow `self.vars`).
        store.reset();
        store.changes.clear();
        store.debounce_armed = false;
        store
    }

    fn resolve(&self, name: &str) -> String {
        motor::resolve_name(&self.vars, name).unwrap_or_else(|| name.to_string())
    }

    pub fn has(&self, name: &str) -> bool {
        self.vars.contains_key(&self.resolve(name))
    }

    pub fn set(&mut self, name: &str, value: Value) {
        let resolved = self.resolve(name);
        let changed = match self.vars.get(&resolved) {
            Some(existing) => *existing != value,
            None => true,
        };
        if changed {
            self.vars.insert(resolved.clone(), value.clone());
            self.changes.insert(resolved, value);
            if !self.debounce_armed {
                self.debounce_armed = true;
            }
        }
    }

    pub fn update(&mut self, values: impl IntoIterator<Item = (String, Value)>) {
        for (name, value) in values {
            self.set(&name, value);
        }
    }

    pub fn get(&self, name: &str, default: Value) -> Value {
        let resolved = self.resolve(name);
        if let Some(v) = self.vars.get(&resolved) {
            return v.clone();
        }
        if let Some(cb) = self.callbacks.get(&resolved) {
            return cb();
        }
        default
    }

    pub fn set_callback(&mut self, name: &str, cb: impl Fn() -> Value + 'static) {
        let resolved = self.resolve(name);
        self.callbacks.insert(resolved, Box::new(cb));
    }

    /// Registers a listener, immediately invoking it once with the full
    /// current mapping (§4.A invariant: "listeners registered after
    /// initialization receive the entire current mapping once").
    pub fn add_listener(&mut self, mut listener: Listener) {
        if !self.vars.is_empty() {
            if let Err(e) = listener(&self.vars) {
                warn!("state listener failed on registration: {}", e.0);
            }
        }
        self.listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// `true` once a change has been recorded and the event loop should
    /// arm (or has already armed) the debounce timer. Calling this does
    /// not itself clear the flag; [`notify_listeners`] does.
    pub fn debounce_armed(&self) -> bool {
        self.debounce_armed
    }

    /// Fires the debounce cycle: invokes every listener with the
    /// accumulated change set, isolating listener failures so one
    /// listener's error never prevents the others from running nor drops
    /// changes (§4.A "Change notification"). A no-op if no changes are
    /// pending.
    pub fn notify_listeners(&mut self) {
        if self.changes.is_empty() {
            self.debounce_armed = false;
            return;
        }

        for listener in self.listeners.iter_mut() {
            if let Err(e) = listener(&self.changes) {
                warn!("state listener error: {}", e.0);
            }
        }

        self.changes.clear();
        self.debounce_armed = false;
    }

    /// `config(code, value)`: machine-variable codes are forwarded to the
    /// firmware via `sink`; everything else is a plain `set` (§4.A).
    pub fn config(&mut self, code: &str, value: Value, sink: &mut dyn FirmwareConfigSink) {
        if self.machine_var_set.contains(code) {
            sink.send_firmware_set(code, &value);
        } else {
            self.set(code, value);
        }
    }

    /// Ingests the firmware handshake payload: `variables` (and, per
    /// `original_source/State.py`, `commands`) from the parsed JSON
    /// object. Indexed variable entries expand to the Cartesian product
    /// of their `index` characters and the key.
    pub fn machine_cmds_and_vars(&mut self, variables: &HashMap<String, VariableSpec>) {
        self.machine_var_set.clear();
        for (code, spec) in variables {
            match &spec.index {
                Some(index) => {
                    for idx in index.chars() {
                        self.machine_var_set.insert(format!("{idx}{code}"));
                    }
                }
                None => {
                    self.machine_var_set.insert(code.clone());
                }
            }
        }
    }

    pub fn is_machine_var(&self, code: &str) -> bool {
        self.machine_var_set.contains(code)
    }

    /// Motors 0..3 unhomed; all six axes' positions and offsets zeroed
    /// (§4.A "Reset semantics").
    pub fn reset(&mut self) {
        for m in 0..4 {
            self.set(&format!("{m}homed"), Value::Bool(false));
        }
        for axis in AXES.chars() {
            self.set(&format!("{axis}p"), Value::Float(0.0));
            self.set(&format!("offset_{axis}"), Value::Float(0.0));
        }
    }

    /// Deep copy for use by the Preplanner worker pool, which must never
    /// touch the live store (§5 "Concurrency boundary for the
    /// Preplanner").
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.vars.clone()
    }
}

/// The handshake's per-variable metadata (§6.3, §9 glossary "Firmware
/// handshake").
#[derive(Debug, Clone, serde::Deserialize)]
pub struct VariableSpec {
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}
