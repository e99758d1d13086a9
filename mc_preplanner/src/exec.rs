//! Simulation executor: drives a [`PlannerEngine`] instance to completion
//! off the critical path, producing a path preview and bounds (§4.F
//! "Execution" / "Simulation rules" / "Cancellation & limits").
//!
//! Runs entirely synchronously so it can be handed to
//! `tokio::task::spawn_blocking`; it never touches the live state store,
//! live planner adapter, or firmware link (§5 "Concurrency boundary for
//! the Preplanner").

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;
use std::time::{Duration, Instant};

use mc_common::consts::PREPLAN_YIELD_INTERVAL;
use mc_common::value::Value;
use mc_planner::block::BlockKind;
use mc_planner::{EngineConfig, PlannerEngine, StoreResolver, VariableResolver};

use crate::types::{Bounds, PreplanMeta, PreviewData};

pub struct PreplanLimits {
    pub max_preplan_time: Duration,
    pub max_loop_time: Duration,
}

impl Default for PreplanLimits {
    fn default() -> Self {
        PreplanLimits {
            max_preplan_time: Duration::from_secs_f64(mc_common::consts::DEFAULT_MAX_PREPLAN_TIME_S),
            max_loop_time: Duration::from_secs_f64(mc_common::consts::DEFAULT_MAX_LOOP_TIME_S),
        }
    }
}

pub struct PreplanOutcome {
    pub preview: PreviewData,
    pub meta: PreplanMeta,
}

/// Divides resolved lengths by 25.4 when the snapshot's active units are
/// imperial (§4.F "Simulation rules").
struct ScaledResolver {
    inner: StoreResolver,
    scale: f64,
}

impl VariableResolver for ScaledResolver {
    fn resolve(&self, name: &str) -> f64 {
        self.inner.resolve(name) / self.scale
    }
}

fn unit_scale(vars: &std::collections::HashMap<String, Value>) -> f64 {
    match vars.get("units") {
        Some(Value::Str(s)) if s.eq_ignore_ascii_case("IMPERIAL") => 25.4,
        _ => 1.0,
    }
}

/// Counts the lines in the uploaded program at `path` (§4.F "Output":
/// `preview.lines` is the total line count of the uploaded file, not the
/// highest line number the engine emits during simulation).
pub fn count_lines(path: &Path) -> std::io::Result<u64> {
    let file = std::fs::File::open(path)?;
    Ok(std::io::BufReader::new(file).lines().count() as u64)
}

/// Run `engine` to completion against `config`/`vars`, respecting
/// `limits`, and reporting fractional progress via `report_progress`
/// (called at most once every [`PREPLAN_YIELD_INTERVAL`] blocks plus once
/// at 1.0 on success) as `maxLine / total_lines`. `total_lines` is the
/// uploaded file's total line count, used both for progress and reported
/// verbatim as `preview.lines` — it is a distinct quantity from the
/// highest line number the engine actually emits. `should_cancel` is
/// polled at the same cadence; returning `true` aborts the run with no
/// cache write expected from the caller (§4.F "Cancellation & limits").
///
/// The engine contract's "wait for the system started signal" step
/// (§4.F "Execution") has no analogue here: preplanning runs against a
/// private engine instance with no physical machine to wait on, so
/// simulation begins immediately.
pub fn run(
    mut engine: impl PlannerEngine,
    config: EngineConfig,
    vars: std::collections::HashMap<String, Value>,
    total_lines: u64,
    limits: &PreplanLimits,
    mut report_progress: impl FnMut(f64),
    mut should_cancel: impl FnMut() -> bool,
) -> Option<PreplanOutcome> {
    let scale = unit_scale(&vars);
    engine.set_resolver(Box::new(ScaledResolver {
        inner: StoreResolver::new(vars),
        scale,
    }));
    engine.set_config(&config);

    let mut position: BTreeMap<char, f64> = BTreeMap::new();
    let mut bounds = Bounds::default();
    let mut path: Vec<(BTreeMap<char, f64>, f64)> = Vec::new();
    let mut total_time = 0.0f64;
    let mut max_speed = 0.0f64;
    let mut max_line = 0i64;
    let mut messages = Vec::new();

    // Pretend synchronization always succeeds instantly (§4.F).
    engine.synchronize(0.0);

    let started_at = Instant::now();
    let mut last_progress_at = Instant::now();
    let mut block_count = 0u64;

    while engine.has_more() {
        if should_cancel() {
            return None;
        }
        if started_at.elapsed() > limits.max_preplan_time {
            messages.push("preplan exceeded maximum wall-clock time".to_string());
            break;
        }
        if last_progress_at.elapsed() > limits.max_loop_time {
            messages.push("preplan stalled: no progress within max_loop_time".to_string());
            break;
        }

        let Some(block) = engine.next() else {
            break;
        };

        match &block.kind {
            BlockKind::Line(data) => {
                if !data.first && !data.seeking {
                    total_time += data.times.iter().sum::<f64>() / 1000.0;
                }

                let prev = position.clone();
                let mut delta = BTreeMap::new();
                for (&axis, &target) in &data.target {
                    let p = prev.get(&axis).copied().unwrap_or(0.0);
                    delta.insert(axis, target as f64 - p);
                }
                let norm = delta.values().map(|d| d * d).sum::<f64>().sqrt();

                if norm > 0.0 {
                    for sp in &data.speeds {
                        let mut point = prev.clone();
                        for (&axis, &d) in &delta {
                            let unit = d / norm;
                            let base = prev.get(&axis).copied().unwrap_or(0.0);
                            point.insert(axis, base + unit * sp.distance);
                        }
                        max_speed = max_speed.max(sp.speed);
                        path.push((point, sp.speed));
                    }
                }

                for (&axis, &target) in &data.target {
                    position.insert(axis, target as f64);
                }
                for (&axis, &p) in &position {
                    bounds.extend(axis, p);
                }
                path.push((position.clone(), data.exit_vel as f64));
            }
            BlockKind::Set { name, value } if name == "line" => {
                if let Some(n) = value.as_i64() {
                    if n > max_line {
                        max_line = n;
                        last_progress_at = Instant::now();
                    }
                }
            }
            BlockKind::Set { name, value } if name == "speed" => {
                if let Some(s) = value.as_f64() {
                    max_speed = max_speed.max(s);
                    path.push((position.clone(), s));
                }
            }
            BlockKind::Dwell { seconds } => total_time += seconds,
            _ => {}
        }

        block_count += 1;
        if block_count % PREPLAN_YIELD_INTERVAL == 0 {
            std::thread::yield_now();
            report_progress(max_line as f64 / total_lines.max(1) as f64);
        }
    }

    if !engine.has_more() {
        report_progress(1.0);
    }

    Some(PreplanOutcome {
        preview: PreviewData {
            time: total_time,
            lines: total_lines,
            path,
            max_speed,
            messages,
        },
        meta: PreplanMeta { bounds },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_planner::block::{Block, LineData, SpeedPoint};
    use mc_planner::engine::PlannerError;
    use std::collections::VecDeque;

    struct ScriptedEngine {
        blocks: VecDeque<Block>,
    }

    impl PlannerEngine for ScriptedEngine {
        fn set_config(&mut self, _c: &EngineConfig) {}
        fn set_resolver(&mut self, _r: Box<dyn VariableResolver>) {}
        fn set_logger(&mut self, _l: Box<dyn Fn(&str) + Send>) {}
        fn load(&mut self, _p: &std::path::Path) -> Result<(), PlannerError> {
            Ok(())
        }
        fn load_string(&mut self, _g: &str) -> Result<(), PlannerError> {
            Ok(())
        }
        fn has_more(&self) -> bool {
            !self.blocks.is_empty()
        }
        fn next(&mut self) -> Option<Block> {
            self.blocks.pop_front()
        }
        fn set_active(&mut self, _id: u64) {}
        fn is_running(&self) -> bool {
            true
        }
        fn is_synchronizing(&self) -> bool {
            false
        }
        fn synchronize(&mut self, _v: f64) {}
        fn restart(&mut self, _id: u64, _p: &BTreeMap<char, f32>) {}
    }

    #[test]
    fn accumulates_time_and_bounds_from_line_blocks() {
        let mut target = BTreeMap::new();
        target.insert('x', 10.0f32);
        let line = LineData {
            target,
            exit_vel: 5.0,
            max_accel: 100.0,
            max_jerk: 1000.0,
            times: [0.0, 6000.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            first: false,
            seeking: false,
            speeds: vec![SpeedPoint {
                distance: 5.0,
                speed: 2.0,
            }],
        };
        let engine = ScriptedEngine {
            blocks: VecDeque::from([Block::line(1, line)]),
        };

        let outcome = run(
            engine,
            EngineConfig::default(),
            std::collections::HashMap::new(),
            42,
            &PreplanLimits::default(),
            |_| {},
            || false,
        )
        .unwrap();

        assert_eq!(outcome.preview.time, 6.0);
        assert_eq!(outcome.meta.bounds.max.get(&'x'), Some(&10.0));
        assert_eq!(outcome.meta.bounds.min.get(&'x'), Some(&10.0));
        assert_eq!(outcome.preview.path.len(), 2);
        assert_eq!(outcome.preview.lines, 42);
    }

    #[test]
    fn cancellation_returns_none() {
        let engine = ScriptedEngine {
            blocks: VecDeque::from([Block::line(
                1,
                LineData {
                    target: BTreeMap::new(),
                    exit_vel: 0.0,
                    max_accel: 0.0,
                    max_jerk: 0.0,
                    times: [0.0; 7],
                    first: false,
                    seeking: false,
                    speeds: vec![],
                },
            )]),
        };
        let outcome = run(
            engine,
            EngineConfig::default(),
            std::collections::HashMap::new(),
            10,
            &PreplanLimits::default(),
            |_| {},
            || true,
        );
        assert!(outcome.is_none());
    }

    #[test]
    fn dwell_adds_seconds_to_total_time() {
        let engine = ScriptedEngine {
            blocks: VecDeque::from([Block {
                id: 1,
                kind: BlockKind::Dwell { seconds: 2.5 },
            }]),
        };
        let outcome = run(
            engine,
            EngineConfig::default(),
            std::collections::HashMap::new(),
            1,
            &PreplanLimits::default(),
            |_| {},
            || false,
        )
        .unwrap();
        assert_eq!(outcome.preview.time, 2.5);
    }

    #[test]
    fn progress_is_max_line_over_total_lines() {
        let mut blocks = VecDeque::new();
        blocks.push_back(Block {
            id: 1,
            kind: BlockKind::Set {
                name: "line".to_string(),
                value: Value::Int(5),
            },
        });
        let engine = ScriptedEngine { blocks };

        let reported = std::cell::RefCell::new(Vec::new());
        run(
            engine,
            EngineConfig::default(),
            std::collections::HashMap::new(),
            20,
            &PreplanLimits::default(),
            |p| reported.borrow_mut().push(p),
            || false,
        )
        .unwrap();

        // Only the terminal report fires here since PREPLAN_YIELD_INTERVAL
        // exceeds the single block in this run; it always reports 1.0.
        assert_eq!(reported.borrow().last(), Some(&1.0));
    }

    #[test]
    fn stall_timer_only_resets_when_max_line_advances() {
        // A block stream that never carries a `line` update must trip
        // max_loop_time even though blocks keep arriving.
        let mut blocks = VecDeque::new();
        for _ in 0..5 {
            blocks.push_back(Block {
                id: 1,
                kind: BlockKind::Dwell { seconds: 0.0 },
            });
        }
        let engine = ScriptedEngine { blocks };

        let outcome = run(
            engine,
            EngineConfig::default(),
            std::collections::HashMap::new(),
            10,
            &PreplanLimits {
                max_preplan_time: Duration::from_secs(600),
                max_loop_time: Duration::from_secs(0),
            },
            |_| {},
            || false,
        )
        .unwrap();

        assert!(outcome.preview.messages.iter().any(|m| m.contains("stalled")));
    }
}
