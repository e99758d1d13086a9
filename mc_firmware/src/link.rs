//! The serial command pipeline (§4.C "Write path" / "Read path").
//!
//! `FirmwareLink` itself performs no I/O — it owns the priority queue, the
//! partially-sent current command, and the read accumulator, and exposes
//! poll-style operations that the event loop drives against the actual
//! `tokio_serial` stream (see `mc_coordinator`). This keeps the scheduling
//! logic exercised by plain unit tests, matching the "single-threaded
//! cooperative" model of §5: the transport is a dumb byte pipe, the
//! interesting logic here is synchronous state.

use std::collections::VecDeque;

use tracing::{debug, warn};

use mc_common::value::Value;
use mc_state::StateStore;

use crate::handshake::{is_handshake, parse_handshake};

/// Supplies planned motion blocks to the link once the priority queue is
/// drained, without `mc_firmware` depending on the planner adapter crate
/// directly (§9 "do not leak its types into the core").
pub trait PlanSource {
    fn is_running(&self) -> bool;
    fn next_encoded_block(&mut self) -> Option<String>;
}

/// Side effects of processing incoming bytes that the caller (the
/// coordinator's event loop) must react to beyond the state merge this
/// module already performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirmwareEvent {
    /// A handshake was received and applied; `D` has already been queued.
    HandshakeApplied,
    /// Telemetry indicated the firmware rebooted (`firmware` key present).
    /// The caller must re-run its connect procedure (§4.C "Connect
    /// procedure"); this link has already queued `h`.
    FirmwareRebooted,
    /// A handshake line was received but failed to parse/apply. The
    /// connect procedure raised an exception partway through; §4.C says
    /// to retry the whole connect after 1 s, so the caller must wait then
    /// re-run it.
    HandshakeFailed,
}

pub struct FirmwareLink {
    queue: VecDeque<String>,
    current: Option<Vec<u8>>,
    write_enabled: bool,
    read_buf: Vec<u8>,
}

impl Default for FirmwareLink {
    fn default() -> Self {
        Self::new()
    }
}

impl FirmwareLink {
    pub fn new() -> Self {
        FirmwareLink {
            queue: VecDeque::new(),
            current: None,
            write_enabled: false,
            read_buf: Vec::new(),
        }
    }

    pub fn write_enabled(&self) -> bool {
        self.write_enabled
    }

    /// Enqueue an opaque command string onto the priority queue. Sets
    /// write-enable within the same turn (§8 "Boundary behaviors").
    pub fn enqueue(&mut self, cmd: impl Into<String>) {
        self.queue.push_back(cmd.into());
        self.write_enabled = true;
    }

    /// Queue the handshake request (`h`), used both on initial connect and
    /// on reboot recovery.
    pub fn request_handshake(&mut self) {
        self.enqueue("h");
    }

    fn install(&mut self, mut cmd: String) {
        if !cmd.ends_with('\n') {
            cmd.push('\n');
        }
        self.current = Some(cmd.into_bytes());
    }

    /// Returns the bytes the caller should attempt to write next,
    /// installing a new current command from the queue or the plan source
    /// if none is already pending. Returns `None` once there is nothing
    /// left to send, at which point write-enable has been cleared.
    pub fn poll_write(&mut self, source: &mut dyn PlanSource) -> Option<&[u8]> {
        if self.current.is_none() {
            if let Some(cmd) = self.queue.pop_front() {
                self.install(cmd);
            } else if source.is_running() {
                match source.next_encoded_block() {
                    Some(cmd) => self.install(cmd),
                    None => {
                        self.write_enabled = false;
                        return None;
                    }
                }
            } else {
                self.write_enabled = false;
                return None;
            }
        }
        self.current.as_deref()
    }

    /// Record that `n` bytes of the current command were actually written
    /// (a short write keeps the remainder for the next opportunity).
    pub fn advance_write(&mut self, n: usize) {
        let Some(buf) = &mut self.current else {
            return;
        };
        if n >= buf.len() {
            self.current = None;
        } else {
            buf.drain(0..n);
        }
    }

    /// Feed newly-read bytes, splitting on `\n`, applying complete lines to
    /// `store`, and returning any events the caller must act on. Blank
    /// lines are ignored; malformed JSON lines are logged and skipped
    /// (§4.C "Read path", §7 "Protocol" errors are never fatal).
    pub fn feed_read_bytes(&mut self, bytes: &[u8], store: &mut StateStore) -> Vec<FirmwareEvent> {
        self.read_buf.extend_from_slice(bytes);

        let mut events = Vec::new();
        let mut rebooted = false;

        loop {
            let Some(pos) = self.read_buf.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.read_buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<serde_json::Value>(trimmed) {
                Ok(value) => {
                    if is_handshake(&value) {
                        match parse_handshake(value) {
                            Ok(payload) => {
                                store.machine_cmds_and_vars(&payload.variables);
                                self.enqueue("D");
                                events.push(FirmwareEvent::HandshakeApplied);
                            }
                            Err(e) => {
                                warn!("handshake application failed: {e}");
                                events.push(FirmwareEvent::HandshakeFailed);
                            }
                        }
                    } else {
                        let delta = json_object_to_values(&value);
                        if delta.contains_key("firmware") {
                            rebooted = true;
                        }
                        store.update(delta);
                    }
                }
                Err(e) => {
                    debug!("skipping malformed telemetry line {trimmed:?}: {e}");
                }
            }
        }

        if rebooted {
            self.request_handshake();
            events.push(FirmwareEvent::FirmwareRebooted);
        }

        events
    }
}

fn json_object_to_values(value: &serde_json::Value) -> std::collections::HashMap<String, Value> {
    let mut out = std::collections::HashMap::new();
    let Some(map) = value.as_object() else {
        return out;
    };
    for (k, v) in map {
        let value = match v {
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            other => Value::Str(other.to_string()),
        };
        out.insert(k.clone(), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSource {
        running: bool,
        blocks: VecDeque<String>,
    }

    impl PlanSource for FakeSource {
        fn is_running(&self) -> bool {
            self.running
        }
        fn next_encoded_block(&mut self) -> Option<String> {
            self.blocks.pop_front()
        }
    }

    #[test]
    fn enqueue_sets_write_enable() {
        let mut link = FirmwareLink::new();
        assert!(!link.write_enabled());
        link.enqueue("r");
        assert!(link.write_enabled());
    }

    #[test]
    fn priority_queue_drains_before_plan_blocks() {
        let mut link = FirmwareLink::new();
        link.enqueue("C");
        let mut source = FakeSource {
            running: true,
            blocks: VecDeque::from(["l1".to_string()]),
        };

        let chunk = link.poll_write(&mut source).unwrap().to_vec();
        assert_eq!(chunk, b"C\n");
        link.advance_write(chunk.len());

        let chunk = link.poll_write(&mut source).unwrap().to_vec();
        assert_eq!(chunk, b"l1\n");
    }

    #[test]
    fn short_write_keeps_remainder() {
        let mut link = FirmwareLink::new();
        link.enqueue("hello");
        let mut source = FakeSource {
            running: false,
            blocks: VecDeque::new(),
        };

        let first = link.poll_write(&mut source).unwrap().to_vec();
        assert_eq!(first, b"hello\n");
        link.advance_write(3);

        let remaining = link.poll_write(&mut source).unwrap().to_vec();
        assert_eq!(remaining, b"lo\n");
    }

    #[test]
    fn write_enable_clears_when_idle() {
        let mut link = FirmwareLink::new();
        link.enqueue("r");
        let mut source = FakeSource {
            running: false,
            blocks: VecDeque::new(),
        };
        let chunk = link.poll_write(&mut source).unwrap().to_vec();
        link.advance_write(chunk.len());
        assert!(link.poll_write(&mut source).is_none());
        assert!(!link.write_enabled());
    }

    #[test]
    fn handshake_line_queues_dump_and_applies_vars() {
        let mut link = FirmwareLink::new();
        let mut store = StateStore::new();

        let line = b"{\"variables\":{\"vm\":{\"index\":\"01\"}},\"commands\":{}}\n";
        let events = link.feed_read_bytes(line, &mut store);
        assert_eq!(events, vec![FirmwareEvent::HandshakeApplied]);
        assert!(store.is_machine_var("0vm"));

        let mut source = FakeSource {
            running: false,
            blocks: VecDeque::new(),
        };
        let chunk = link.poll_write(&mut source).unwrap().to_vec();
        assert_eq!(chunk, b"D\n");
    }

    #[test]
    fn telemetry_delta_is_merged_into_store() {
        let mut link = FirmwareLink::new();
        let mut store = StateStore::new();
        let events = link.feed_read_bytes(b"{\"tool\":3}\n", &mut store);
        assert!(events.is_empty());
        assert_eq!(store.get("tool", Value::Int(0)), Value::Int(3));
    }

    #[test]
    fn reboot_marker_requeues_handshake_and_emits_event() {
        let mut link = FirmwareLink::new();
        let mut store = StateStore::new();
        let events = link.feed_read_bytes(b"{\"firmware\":\"1.2.3\"}\n", &mut store);
        assert_eq!(events, vec![FirmwareEvent::FirmwareRebooted]);

        let mut source = FakeSource {
            running: false,
            blocks: VecDeque::new(),
        };
        let chunk = link.poll_write(&mut source).unwrap().to_vec();
        assert_eq!(chunk, b"h\n");
    }

    #[test]
    fn malformed_handshake_emits_failed_event() {
        let mut link = FirmwareLink::new();
        let mut store = StateStore::new();
        let events = link.feed_read_bytes(b"{\"variables\":\"not-an-object\"}\n", &mut store);
        assert_eq!(events, vec![FirmwareEvent::HandshakeFailed]);
    }

    #[test]
    fn blank_and_malformed_lines_are_skipped() {
        let mut link = FirmwareLink::new();
        let mut store = StateStore::new();
        let events = link.feed_read_bytes(b"\n   \nnot json\n{\"tool\":1}\n", &mut store);
        assert!(events.is_empty());
        assert_eq!(store.get("tool", Value::Int(0)), Value::Int(1));
    }
}
