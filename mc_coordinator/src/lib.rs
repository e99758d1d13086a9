//! Motion Coordinator: composes the State Store, Firmware Link, and
//! Planner Adapter into the user-visible control surface (SPEC_FULL.md
//! §4.E).

pub mod config;
pub mod error;

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::rc::Rc;

use mc_common::consts::DEFAULT_HOMING_ORDER;
use mc_common::error::CoreError;
use mc_common::homing::homing_template;
use mc_common::value::Value;
use mc_firmware::{i2c, FirmwareEvent, FirmwareLink, I2cBus, PlanSource};
use mc_planner::{Mode, PlannerAdapter, PlannerEngine};
use mc_state::{FirmwareConfigSink, StateStore};

pub use error::CoordinatorError;

/// Adapts a [`FirmwareLink`] as a [`FirmwareConfigSink`]: a machine-variable
/// `config()` write is forwarded as an asynchronous `$code=value` set
/// rather than applied to local state directly (§4.A "forwards to Motion
/// Coordinator as a firmware set").
struct LinkSink<'a> {
    link: &'a mut FirmwareLink,
}

impl FirmwareConfigSink for LinkSink<'_> {
    fn send_firmware_set(&mut self, code: &str, value: &Value) {
        self.link
            .enqueue(mc_codec::encode::set_async(code, &value.as_str_lossy()));
    }
}

/// Bridges the Planner Adapter + engine pair into [`PlanSource`] for the
/// Firmware Link's write path, without the link ever naming either type
/// directly (§9 "do not leak its types into the core").
struct EngineSource<'a, E: PlannerEngine> {
    adapter: &'a mut PlannerAdapter,
    engine: &'a mut E,
    store: &'a mut StateStore,
}

impl<E: PlannerEngine> PlanSource for EngineSource<'_, E> {
    fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    fn next_encoded_block(&mut self) -> Option<String> {
        self.adapter.next(self.engine, self.store)
    }
}

/// Composes the State Store, Firmware Link, and Planner Adapter around a
/// concrete planner engine and I²C bus into the nine-operation control
/// surface of §4.E.
pub struct MotionCoordinator<E: PlannerEngine, I: I2cBus> {
    store: StateStore,
    link: FirmwareLink,
    adapter: PlannerAdapter,
    engine: E,
    i2c: I,
    /// Set by `start`/`stop` to distinguish "no plan active" from the link's
    /// own "nothing currently queued" — the Firmware Link only flips its own
    /// `write_enabled` on an explicit enqueue, so the coordinator tracks
    /// whether the write path should keep pulling blocks from the planner.
    writing_enabled: bool,
    /// Change batches captured by a state-store listener for the next
    /// `process_state_changes` call. A shared cell rather than a listener
    /// closure borrowing `self` directly, since a listener stored inside
    /// `StateStore` cannot itself hold a reference back into the struct
    /// that owns the store.
    pending_changes: Rc<RefCell<VecDeque<HashMap<String, Value>>>>,
}

impl<E: PlannerEngine, I: I2cBus> MotionCoordinator<E, I> {
    pub fn new(engine: E, i2c: I) -> Self {
        let mut store = StateStore::new();
        let pending_changes: Rc<RefCell<VecDeque<HashMap<String, Value>>>> =
            Rc::new(RefCell::new(VecDeque::new()));
        let sink = pending_changes.clone();
        store.add_listener(Box::new(move |changes| {
            sink.borrow_mut().push_back(changes.clone());
            Ok(())
        }));

        MotionCoordinator {
            store,
            link: FirmwareLink::new(),
            adapter: PlannerAdapter::new(),
            engine,
            i2c,
            writing_enabled: false,
            pending_changes,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    fn busy(&self) -> bool {
        self.adapter.mode() != Mode::Idle || self.engine.is_running()
    }

    fn machine_state(&self) -> String {
        self.store.get("x", Value::Str(String::new())).as_str_lossy()
    }

    fn axis_homed(&self, axis: char) -> bool {
        let vars = self.store.snapshot();
        let Some(motor) = mc_state::find_motor(&vars, axis) else {
            return false;
        };
        self.store
            .get(&format!("{motor}homed"), Value::Bool(false))
            .as_bool()
    }

    /// §4.E `mdi`.
    pub fn mdi(&mut self, cmd: &str) -> Result<(), CoordinatorError> {
        if let Some(rest) = cmd.strip_prefix('$') {
            let (name, raw_value) = rest
                .split_once('=')
                .ok_or_else(|| CoreError::semantic("malformed $ command"))?;
            let value = Value::parse_literal(raw_value);
            let mut sink = LinkSink { link: &mut self.link };
            self.store.config(name, value, &mut sink);
            Ok(())
        } else if let Some(rest) = cmd.strip_prefix('\\') {
            self.link.enqueue(rest.to_string());
            Ok(())
        } else {
            self.adapter.load_string(&mut self.engine, cmd)?;
            self.writing_enabled = true;
            Ok(())
        }
    }

    /// §4.E `jog`.
    pub fn jog(&mut self, axes: std::collections::BTreeMap<char, f32>) -> Result<(), CoordinatorError> {
        if self.busy() {
            return Err(CoreError::semantic("busy").into());
        }
        self.link.enqueue(mc_codec::encode::jog(&axes));
        Ok(())
    }

    /// §4.E `home`.
    pub fn home(&mut self, axis: Option<char>, position: Option<f64>) -> Result<(), CoordinatorError> {
        if self.busy() {
            return Err(CoreError::semantic("busy").into());
        }

        if let Some(pos) = position {
            let axis = axis.ok_or_else(|| CoreError::semantic("home position requires an axis"))?;
            let cmd = format!("G28.3 {axis}{pos}");
            self.adapter.load_string(&mut self.engine, &cmd)?;
            self.writing_enabled = true;
            return Ok(());
        }

        let order: Vec<char> = match axis {
            Some(a) => vec![a],
            None => DEFAULT_HOMING_ORDER.chars().collect(),
        };
        let vars = self.store.snapshot();
        for a in order {
            let Some(motor) = mc_state::find_motor(&vars, a) else {
                continue;
            };
            if mc_state::home_direction(&vars, motor) == 0 {
                continue;
            }
            let gcode = homing_template(a);
            self.adapter.load_string(&mut self.engine, &gcode)?;
            self.writing_enabled = true;
        }
        Ok(())
    }

    /// §4.E `set_position`.
    pub fn set_position(&mut self, axis: char, pos: f64) -> Result<(), CoordinatorError> {
        if self.busy() {
            return Err(CoreError::semantic("busy").into());
        }
        if self.axis_homed(axis) {
            let cmd = format!("G92 {axis}{pos}");
            self.adapter.load_string(&mut self.engine, &cmd)?;
            self.writing_enabled = true;
        } else {
            self.link
                .enqueue(mc_codec::encode::set_async(&format!("{axis}p"), &pos.to_string()));
        }
        Ok(())
    }

    /// §4.E `start`.
    pub fn start(&mut self, path: Option<&Path>) -> Result<(), CoordinatorError> {
        if let Some(path) = path {
            self.adapter.reset();
            self.adapter.load(&mut self.engine, path)?;
            self.writing_enabled = true;
        }
        Ok(())
    }

    /// §4.E `step`.
    pub async fn step(&mut self, path: Option<&Path>) -> Result<(), CoordinatorError> {
        i2c::step(&mut self.i2c).await?;
        if !self.busy() {
            if let Some(path) = path {
                if self.machine_state() == "READY" {
                    self.start(Some(path))?;
                }
            }
        }
        Ok(())
    }

    /// §4.E `stop`.
    pub async fn stop(&mut self) -> Result<(), CoordinatorError> {
        i2c::flush(&mut self.i2c).await?;
        self.adapter.reset();
        self.writing_enabled = false;
        self.link.enqueue(mc_codec::encode::resume());
        Ok(())
    }

    /// §4.E `pause`.
    pub async fn pause(&mut self) -> Result<(), CoordinatorError> {
        i2c::pause(&mut self.i2c, false).await.map_err(Into::into)
    }

    /// §4.E `optional_pause`.
    pub async fn optional_pause(&mut self) -> Result<(), CoordinatorError> {
        i2c::pause(&mut self.i2c, true).await.map_err(Into::into)
    }

    /// §4.E `unpause`.
    pub async fn unpause(&mut self) -> Result<(), CoordinatorError> {
        if self.machine_state() != "HOLDING" || !self.engine.is_running() {
            return Ok(());
        }
        i2c::flush(&mut self.i2c).await?;
        self.link.enqueue(mc_codec::encode::resume());
        self.adapter.restart(&mut self.engine, &self.store);
        self.writing_enabled = true;
        i2c::unpause(&mut self.i2c).await?;
        Ok(())
    }

    /// §4.E `estop`.
    pub async fn estop(&mut self) -> Result<(), CoordinatorError> {
        i2c::estop(&mut self.i2c).await.map_err(Into::into)
    }

    /// §4.E `clear`.
    pub async fn clear(&mut self) -> Result<(), CoordinatorError> {
        i2c::clear(&mut self.i2c).await.map_err(Into::into)
    }

    /// §4.C connect procedure: stop semantics, then queue the handshake
    /// request.
    pub async fn connect(&mut self) -> Result<(), CoordinatorError> {
        self.stop().await?;
        self.link.request_handshake();
        Ok(())
    }

    /// Feeds freshly-read serial bytes through the Firmware Link, reacting
    /// to a detected reboot by re-running the connect procedure. A failed
    /// handshake application is itself an exception raised partway through
    /// connect, so it gets the same "retry the whole connect after 1 s"
    /// treatment (§4.C "Connect procedure").
    pub async fn feed_read_bytes(&mut self, bytes: &[u8]) -> Result<(), CoordinatorError> {
        let events = self.link.feed_read_bytes(bytes, &mut self.store);
        for event in events {
            match event {
                FirmwareEvent::FirmwareRebooted => self.connect().await?,
                FirmwareEvent::HandshakeFailed => {
                    tokio::time::sleep(std::time::Duration::from_millis(mc_common::consts::RECONNECT_MS)).await;
                    self.connect().await?;
                }
                FirmwareEvent::HandshakeApplied => {}
            }
        }
        Ok(())
    }

    /// Draws the next chunk of bytes to write, if the write path is armed
    /// either by a queued command or an active plan.
    pub fn poll_write(&mut self) -> Option<&[u8]> {
        if !self.link.write_enabled() && !(self.writing_enabled && self.engine.is_running()) {
            return None;
        }
        let mut source = EngineSource {
            adapter: &mut self.adapter,
            engine: &mut self.engine,
            store: &mut self.store,
        };
        self.link.poll_write(&mut source)
    }

    pub fn advance_write(&mut self, n: usize) {
        self.link.advance_write(n);
    }

    pub fn debounce_armed(&self) -> bool {
        self.store.debounce_armed()
    }

    /// Fires the debounce cycle and then applies the special update hooks
    /// (§4.A "x=ESTOPPED", §4.D "Synchronization hook").
    pub async fn notify_and_process(&mut self) -> Result<(), CoordinatorError> {
        self.store.notify_listeners();

        let batches: Vec<HashMap<String, Value>> = self.pending_changes.borrow_mut().drain(..).collect();
        for changes in batches {
            if matches!(changes.get("x"), Some(Value::Str(s)) if s == "ESTOPPED") {
                self.adapter.reset();
            }
            self.adapter.on_state_update(&mut self.engine, &changes);

            let holding = matches!(changes.get("x"), Some(Value::Str(s)) if s == "HOLDING");
            let probe_found = matches!(changes.get("pr"), Some(Value::Str(s)) if s == "Switch found");
            if holding && probe_found && self.engine.is_synchronizing() {
                self.unpause().await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    struct NullEngine {
        running: bool,
    }
    impl PlannerEngine for NullEngine {
        fn set_config(&mut self, _c: &mc_planner::EngineConfig) {}
        fn set_resolver(&mut self, _r: Box<dyn mc_planner::VariableResolver>) {}
        fn set_logger(&mut self, _l: Box<dyn Fn(&str) + Send>) {}
        fn load(&mut self, _p: &Path) -> Result<(), mc_planner::PlannerError> {
            Ok(())
        }
        fn load_string(&mut self, _g: &str) -> Result<(), mc_planner::PlannerError> {
            self.running = true;
            Ok(())
        }
        fn has_more(&self) -> bool {
            self.running
        }
        fn next(&mut self) -> Option<mc_planner::Block> {
            None
        }
        fn set_active(&mut self, _id: u64) {}
        fn is_running(&self) -> bool {
            self.running
        }
        fn is_synchronizing(&self) -> bool {
            false
        }
        fn synchronize(&mut self, _v: f64) {}
        fn restart(&mut self, _id: u64, _p: &BTreeMap<char, f32>) {}
    }

    struct RecordingBus {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
    }
    impl I2cBus for RecordingBus {
        fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
            self.writes.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
        fn reopen(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn coordinator() -> (MotionCoordinator<NullEngine, RecordingBus>, Arc<Mutex<Vec<Vec<u8>>>>) {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let bus = RecordingBus { writes: writes.clone() };
        let engine = NullEngine { running: false };
        (MotionCoordinator::new(engine, bus), writes)
    }

    #[test]
    fn mdi_dollar_routes_through_config() {
        let (mut coord, _) = coordinator();
        coord.mdi("$tool=5").unwrap();
        assert_eq!(coord.store().get("tool", Value::Int(0)), Value::Float(5.0));
    }

    #[test]
    fn mdi_backslash_is_literal_passthrough() {
        let (mut coord, _) = coordinator();
        coord.mdi("\\r").unwrap();
        assert!(coord.link.write_enabled());
    }

    #[test]
    fn jog_rejected_when_busy() {
        let (mut coord, _) = coordinator();
        coord.mdi("G0 X1").unwrap();
        let mut axes = BTreeMap::new();
        axes.insert('x', 1.0f32);
        assert!(coord.jog(axes).is_err());
    }

    #[tokio::test]
    async fn stop_flushes_and_queues_resume() {
        let (mut coord, writes) = coordinator();
        coord.stop().await.unwrap();
        assert_eq!(writes.lock().unwrap()[0], vec![b'F']);
        assert!(coord.link.write_enabled());
    }

    #[tokio::test]
    async fn unpause_is_noop_outside_holding() {
        let (mut coord, writes) = coordinator();
        coord.unpause().await.unwrap();
        assert!(writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_handshake_retries_connect_after_delay() {
        let (mut coord, writes) = coordinator();
        coord
            .feed_read_bytes(b"{\"variables\":\"not-an-object\"}\n")
            .await
            .unwrap();
        // connect() re-issues stop semantics (an `F` flush) before queuing
        // a fresh handshake request, so a retry is observable as another
        // flush hitting the side-band.
        assert_eq!(writes.lock().unwrap()[0], vec![b'F']);
    }

    #[test]
    fn home_rejected_when_busy() {
        let (mut coord, _) = coordinator();
        coord.mdi("G0 X1").unwrap();
        assert!(coord.home(None, None).is_err());
    }

    #[test]
    fn home_skips_axes_configured_for_manual_homing() {
        let (mut coord, _) = coordinator();
        // Motor 0 is mapped to the x axis but configured for manual homing
        // (`0ho` unset / 0) — `find_motor` still maps it, so it must be
        // skipped on `home_direction` rather than the mapping check alone.
        coord.store.set("0an", Value::Int(0));
        coord.store.set("0pm", Value::Bool(true));
        coord.store.set("0ho", Value::Int(0));

        coord.home(Some('x'), None).unwrap();
        assert!(!coord.engine.running);
    }

    #[test]
    fn home_expands_template_for_homeable_axis() {
        let (mut coord, _) = coordinator();
        coord.store.set("0an", Value::Int(0));
        coord.store.set("0pm", Value::Bool(true));
        coord.store.set("0ho", Value::Int(1));

        coord.home(Some('x'), None).unwrap();
        assert!(coord.engine.running);
    }
}
