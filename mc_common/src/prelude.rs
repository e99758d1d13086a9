//! Convenience re-exports.
//!
//! ```rust
//! use mc_common::prelude::*;
//! ```

pub use crate::config::{ConfigError, LogLevel, SharedConfig};
pub use crate::consts::*;
pub use crate::error::CoreError;
pub use crate::homing::homing_template;
pub use crate::value::Value;
