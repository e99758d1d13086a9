//! Parsing of the firmware handshake payload (§4.C, §6.3, glossary
//! "Firmware handshake").

use std::collections::HashMap;

use serde::Deserialize;

use mc_state::VariableSpec;

use crate::error::FirmwareError;

/// The decoded handshake object: `variables` drives the machine-variables
/// set (`StateStore::machine_cmds_and_vars`); `commands` is recorded
/// alongside per `original_source/State.py` but otherwise unused by the
/// core (it exists for tooling/introspection, not dispatch — the command
/// alphabet itself is fixed, see §4.B).
#[derive(Debug, Clone, Deserialize)]
pub struct HandshakePayload {
    pub variables: HashMap<String, VariableSpec>,
    #[serde(default)]
    pub commands: HashMap<String, serde_json::Value>,
}

/// `true` if the parsed telemetry line is a handshake rather than a plain
/// state delta.
pub fn is_handshake(value: &serde_json::Value) -> bool {
    value.get("variables").is_some()
}

pub fn parse_handshake(value: serde_json::Value) -> Result<HandshakePayload, FirmwareError> {
    serde_json::from_value(value).map_err(|e| FirmwareError::Handshake(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_handshake_by_variables_key() {
        assert!(is_handshake(&json!({"variables": {}})));
        assert!(!is_handshake(&json!({"x": "READY"})));
    }

    #[test]
    fn parses_indexed_and_plain_variables() {
        let payload = json!({
            "variables": {
                "vm": {"index": "01"},
                "units": {}
            },
            "commands": {"h": {}}
        });
        let parsed = parse_handshake(payload).unwrap();
        assert!(parsed.variables.contains_key("vm"));
        assert_eq!(parsed.variables["vm"].index.as_deref(), Some("01"));
        assert!(parsed.variables["units"].index.is_none());
        assert!(parsed.commands.contains_key("h"));
    }
}
