//! Integration seam for the external trajectory planner (§6.3, §9 "Planner
//! engine binding").
//!
//! Trajectory computation is explicitly out of scope for this workspace —
//! the real engine is a separate native component built elsewhere and
//! linked in here behind [`mc_planner::PlannerEngine`]. This stub never
//! produces a block; it exists only so the binary has a concrete type to
//! construct a [`mc_coordinator::MotionCoordinator`] around until the real
//! engine is wired in, the same way a driver falls back to a simulated
//! backend when nothing more specific is configured.

use std::collections::BTreeMap;
use std::path::Path;

use mc_planner::{Block, EngineConfig, PlannerError, VariableResolver};

pub struct StubEngine {
    running: bool,
}

impl StubEngine {
    pub fn new() -> Self {
        StubEngine { running: false }
    }
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl mc_planner::PlannerEngine for StubEngine {
    fn set_config(&mut self, _config: &EngineConfig) {}
    fn set_resolver(&mut self, _resolver: Box<dyn VariableResolver>) {}
    fn set_logger(&mut self, _logger: Box<dyn Fn(&str) + Send>) {}

    fn load(&mut self, _path: &Path) -> Result<(), PlannerError> {
        self.running = true;
        Ok(())
    }

    fn load_string(&mut self, _gcode: &str) -> Result<(), PlannerError> {
        self.running = true;
        Ok(())
    }

    fn has_more(&self) -> bool {
        false
    }

    fn next(&mut self) -> Option<Block> {
        self.running = false;
        None
    }

    fn set_active(&mut self, _id: u64) {}

    fn is_running(&self) -> bool {
        self.running
    }

    fn is_synchronizing(&self) -> bool {
        false
    }

    fn synchronize(&mut self, _value: f64) {}

    fn restart(&mut self, _id: u64, _position: &BTreeMap<char, f32>) {}
}
