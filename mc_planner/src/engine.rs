//! The opaque planner engine contract (§6.3, §9 "Planner engine binding").
//!
//! The trajectory planner is a separate native component; this crate never
//! assumes anything about its internals beyond this trait. If the engine is
//! replaced, only an implementation of [`PlannerEngine`] changes — the
//! adapter and coordinator are untouched, mirroring the `HalDriver`
//! boundary pattern the rest of this workspace uses for its own external
//! collaborators.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::block::Block;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("planner engine rejected program: {0}")]
    LoadFailed(String),

    #[error("planner engine error: {0}")]
    Engine(String),
}

/// Per-axis motion limits and starting position pushed to the engine
/// before it begins emitting blocks (§4.D "Config snapshot").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLimits {
    pub max_vel: f64,
    pub max_accel: f64,
    pub max_jerk: f64,
    pub start: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub axes: BTreeMap<char, AxisLimits>,
    /// Drop `default-units` from the snapshot when `false` (§9 Open
    /// Question: `get_config(false, false)`).
    pub with_units: bool,
    pub with_defaults: bool,
}

/// Resolves `#<name>`-style G-code variable references against the live
/// (or snapshotted) machine state (§4.D "Variable resolver").
pub trait VariableResolver {
    fn resolve(&self, name: &str) -> f64;
}

/// The external trajectory planner, as seen through the narrow interface
/// the coordinator needs (§6.3).
pub trait PlannerEngine {
    fn set_config(&mut self, config: &EngineConfig);
    fn set_resolver(&mut self, resolver: Box<dyn VariableResolver>);
    fn set_logger(&mut self, logger: Box<dyn Fn(&str) + Send>);

    fn load(&mut self, path: &Path) -> Result<(), PlannerError>;
    fn load_string(&mut self, gcode: &str) -> Result<(), PlannerError>;

    fn has_more(&self) -> bool;
    /// Draw the next block, or `None` if the program has drained.
    fn next(&mut self) -> Option<Block>;

    /// Release back-pressure up to `id` (§4.D "Synchronization hook").
    fn set_active(&mut self, id: u64);

    fn is_running(&self) -> bool;
    fn is_synchronizing(&self) -> bool;
    /// Resolve a pending synchronization point.
    fn synchronize(&mut self, value: f64);

    fn restart(&mut self, id: u64, position: &BTreeMap<char, f32>);
}
