//! Preplanner: runs uploaded programs through the planner engine in
//! simulation off the critical path, producing compressed path previews
//! and bounds with a persistent content-addressed cache (SPEC_FULL.md
//! §4.F).

pub mod cache;
pub mod exec;
pub mod json_fmt;
pub mod types;
pub mod worker;

pub use cache::{plan_key, CacheError, PlanCache};
pub use exec::{PreplanLimits, PreplanOutcome};
pub use json_fmt::{format_float, render, Json};
pub use types::{Bounds, PreplanMeta, PreviewData};
pub use worker::Preplanner;
