//! The coordinator's error taxonomy (SPEC_FULL.md §7).
//!
//! Five kinds of failure, each with a distinct propagation policy. Per-crate
//! error types convert into this one at the boundary where that policy is
//! actually enforced (retry, log-and-skip, reconnect, surface-to-caller,
//! capture-into-messages).

use thiserror::Error;

/// Coordinator-wide error taxonomy.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// Serial read/write or I2C I/O failure. Retried with bounded backoff;
    /// fatal only after retries are exhausted.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed JSON line or unknown field. Logged and skipped, never fatal.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// `machine_cmds_and_vars` failed to apply the firmware handshake.
    /// Schedules a reconnect in 1s.
    #[error("handshake error: {0}")]
    Handshake(String),

    /// Caller-triggered precondition failure (jog while busy, MDI while
    /// gcode running, unsupported output port, unknown block type).
    /// Surfaced to the caller; never mutates state.
    #[error("semantic error: {0}")]
    Semantic(String),

    /// An error raised by the planner engine during preplanning. Captured
    /// into the preplan's `messages` array rather than propagated.
    #[error("planner error: {0}")]
    PlannerError(String),
}

impl CoreError {
    pub fn semantic(msg: impl Into<String>) -> Self {
        CoreError::Semantic(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        CoreError::Transport(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        CoreError::Protocol(msg.into())
    }

    pub fn handshake(msg: impl Into<String>) -> Self {
        CoreError::Handshake(msg.into())
    }

    pub fn planner(msg: impl Into<String>) -> Self {
        CoreError::PlannerError(msg.into())
    }

    /// True for errors whose policy is "retry with backoff", i.e. the
    /// caller should schedule a reconnect rather than give up.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transport(_) | CoreError::Handshake(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(CoreError::transport("x").is_retryable());
        assert!(CoreError::handshake("x").is_retryable());
        assert!(!CoreError::semantic("x").is_retryable());
        assert!(!CoreError::protocol("x").is_retryable());
        assert!(!CoreError::planner("x").is_retryable());
    }
}
