//! Preplanner worker pool (§4.F "Execution", §5 "Concurrency boundary for
//! the Preplanner").
//!
//! Each submitted job runs on a `spawn_blocking` thread gated by a
//! semaphore sized to the configured worker count (default
//! [`mc_common::consts::DEFAULT_PREPLAN_THREADS`]) — the bounded thread
//! pool §4.F calls for, built on tokio's blocking pool rather than a
//! dedicated threadpool crate since tokio is already this workspace's
//! async runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use mc_common::value::Value;
use mc_planner::{EngineConfig, PlannerEngine};

use crate::cache::PlanCache;
use crate::exec::{self, PreplanLimits};
use crate::json_fmt::render;

struct PreplanJob {
    handle: tokio::task::JoinHandle<()>,
    progress: Arc<Mutex<f64>>,
}

pub struct Preplanner {
    jobs: HashMap<String, PreplanJob>,
    semaphore: Arc<tokio::sync::Semaphore>,
    cache: Arc<PlanCache>,
}

impl Preplanner {
    pub fn new(cache: PlanCache, worker_threads: usize) -> Self {
        Preplanner {
            jobs: HashMap::new(),
            semaphore: Arc::new(tokio::sync::Semaphore::new(worker_threads.max(1))),
            cache: Arc::new(cache),
        }
    }

    /// Cancels any in-flight job for `filename` and forgets its progress
    /// (§3 "entries can be invalidated; in-flight work is cancelled on
    /// invalidation").
    pub fn invalidate(&mut self, filename: &str) {
        if let Some(job) = self.jobs.remove(filename) {
            job.handle.abort();
        }
    }

    pub fn get_plan_progress(&self, filename: &str) -> Option<f64> {
        self.jobs
            .get(filename)
            .map(|j| *j.progress.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Returns the cached (preview, meta) JSON immediately without
    /// spawning a job, if present (§8 "a second call with the same
    /// inputs returns byte-identical cache files").
    pub fn cached(&self, name: &str, key: &str) -> Option<(String, String)> {
        self.cache.get(name, key)
    }

    /// Submit a preplan job. `filename` is the uploaded program's
    /// filesystem path — it doubles as the job key and is read once more
    /// on the worker thread to count its total lines for `preview.lines`
    /// and progress reporting (§4.F "Output"). `engine` must be a fresh,
    /// private instance — never the coordinator's live planner engine
    /// (§5). On completion the result is written to the cache; on
    /// cancellation (via [`Preplanner::invalidate`]) nothing is written.
    pub fn submit(
        &mut self,
        filename: String,
        name: String,
        key: String,
        engine: impl PlannerEngine + Send + 'static,
        config: EngineConfig,
        vars: HashMap<String, Value>,
        limits: PreplanLimits,
    ) {
        let progress = Arc::new(Mutex::new(0.0));
        let progress_for_task = progress.clone();
        let semaphore = self.semaphore.clone();
        let cache = self.cache.clone();
        let source_path = filename.clone();

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };

            let progress_for_blocking = progress_for_task.clone();
            let result = tokio::task::spawn_blocking(move || {
                let total_lines = exec::count_lines(std::path::Path::new(&source_path)).unwrap_or(0);
                exec::run(
                    engine,
                    config,
                    vars,
                    total_lines,
                    &limits,
                    move |p| {
                        if let Ok(mut guard) = progress_for_blocking.lock() {
                            *guard = p;
                        }
                    },
                    || false,
                )
            })
            .await;

            match result {
                Ok(Some(outcome)) => {
                    let preview_json = render(&outcome.preview.to_json());
                    let meta_json = render(&outcome.meta.to_json());
                    if let Err(e) = cache.put(&name, &key, &preview_json, &meta_json) {
                        warn!("failed to write preplan cache for {name}: {e}");
                    }
                    if let Ok(mut guard) = progress_for_task.lock() {
                        *guard = 1.0;
                    }
                }
                Ok(None) => {
                    // Cancelled from within exec::run's own cancellation
                    // check; nothing to persist.
                }
                Err(e) => {
                    warn!("preplan worker thread panicked for {name}: {e}");
                }
            }
        });

        self.jobs.insert(filename, PreplanJob { handle, progress });
    }
}
