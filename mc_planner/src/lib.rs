//! Planner Adapter: bridges the opaque trajectory planner engine into the
//! coordinator's wire-encoded block stream (SPEC_FULL.md §4.D).

pub mod adapter;
pub mod block;
pub mod engine;

pub use adapter::{config_snapshot, encode_block, Mode, PlannerAdapter, StoreResolver};
pub use block::{Block, BlockKind, LineData, SpeedPoint};
pub use engine::{AxisLimits, EngineConfig, PlannerEngine, PlannerError, VariableResolver};
