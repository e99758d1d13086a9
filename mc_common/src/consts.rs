//! Shared constants for the motion control coordinator workspace.
//!
//! Single source of truth for the values every crate needs — imported
//! instead of duplicated.

/// Axis letters in motor-index order.
pub const AXES: &str = "xyzabc";

/// Number of motors the firmware addresses.
pub const MOTOR_COUNT: usize = 6;

/// Change-notification debounce window (§4.A).
pub const DEBOUNCE_MS: u64 = 250;

/// Reconnect retry delay after a failed handshake or connect (§4.C).
pub const RECONNECT_MS: u64 = 1000;

/// I2C side-band retry count before propagating a transport error (§4.C).
pub const I2C_RETRIES: u32 = 5;

/// I2C side-band retry spacing (§4.C).
pub const I2C_RETRY_SPACING_MS: u64 = 100;

/// Default axis homing order when none is requested (§4.E `home`).
pub const DEFAULT_HOMING_ORDER: &str = "zxyabc";

/// Default preplanner worker pool size (§4.F).
pub const DEFAULT_PREPLAN_THREADS: usize = 4;

/// Default preplan wall-clock bound in seconds (§4.F).
pub const DEFAULT_MAX_PREPLAN_TIME_S: f64 = 600.0;

/// Default preplan stall bound (time since last progress advance) in seconds (§4.F).
pub const DEFAULT_MAX_LOOP_TIME_S: f64 = 30.0;

/// Number of most-recent cached plans retained per filename (§4.F).
pub const MAX_CACHED_PLANS_PER_FILE: usize = 2;

/// Number of planner blocks processed between cooperative yields (§5).
pub const PREPLAN_YIELD_INTERVAL: u64 = 50;
