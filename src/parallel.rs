//! Parallel coordinator: fans encounter runs out over a worker pool.
//!
//! Workers pull the next pending request from a shared cursor, so a slow
//! encounter never holds up the rest of the batch. Finished results stream
//! back to the caller's thread over a channel as they complete.

use crate::cancel::CancellationToken;
use crate::config::BuildConfig;
use crate::error::SimError;
use crate::ruleset::{EncounterTarget, Ruleset};
use crate::runner::{run_trials, EncounterKey, SimulationRequest};
use crate::simulation::FastRng;
use crate::stats::{RunOutcome, SimulationResult};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for a batch of encounter runs.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Worker threads. Defaults to the number of logical CPUs.
    pub workers: usize,
    /// Trials requested per encounter.
    pub trials: u32,
    /// Tick budget per encounter.
    pub tick_budget: u64,
    /// Base seed; encounter `i` uses `seed + i`. Random when unset.
    pub seed: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            trials: 10_000,
            tick_budget: 1_000_000,
            seed: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn new(trials: u32, tick_budget: u64) -> Self {
        Self {
            trials,
            tick_budget,
            ..Default::default()
        }
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the base seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Every result of a batch, keyed by encounter
#[derive(Debug)]
pub struct BatchReport {
    pub results: HashMap<EncounterKey, SimulationResult>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn get(&self, key: &EncounterKey) -> Option<&SimulationResult> {
        self.results.get(key)
    }

    pub fn count(&self, outcome: RunOutcome) -> usize {
        self.results.values().filter(|r| r.outcome == outcome).count()
    }
}

/// Encounters a target expands to. Dungeons repeat monsters in their
/// sequence but each distinct monster is simulated once.
pub fn expand_target(target: &EncounterTarget, ruleset: &Ruleset) -> Vec<EncounterKey> {
    match target {
        EncounterTarget::Monster(id) => vec![EncounterKey::standalone(id)],
        EncounterTarget::Dungeon(id) => ruleset
            .dungeon(id)
            .map(|d| d.monsters.iter().map(|m| EncounterKey::in_dungeon(m, id)).collect())
            .unwrap_or_default(),
        EncounterTarget::SlayerTask(id) => ruleset
            .slayer_task(id)
            .map(|t| t.monsters.iter().map(|m| EncounterKey::on_task(&m.monster, id)).collect())
            .unwrap_or_default(),
    }
}

pub struct Coordinator {
    config: CoordinatorConfig,
    pool: ThreadPool,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Result<Self, SimError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("sim-worker-{}", i))
            .build()?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Deduplicated requests for a set of targets, in first-seen order
    pub fn requests_for(&self, targets: &[EncounterTarget], ruleset: &Ruleset) -> Vec<SimulationRequest> {
        let mut seen = HashSet::new();
        targets
            .iter()
            .flat_map(|t| expand_target(t, ruleset))
            .filter(|key| seen.insert(key.clone()))
            .map(|key| SimulationRequest::new(key, self.config.trials, self.config.tick_budget))
            .collect()
    }

    /// Run every encounter behind `targets`.
    ///
    /// `on_result` is called on the calling thread as each encounter finishes.
    /// After cancellation, encounters that never finished are reported as
    /// cancelled rather than left out.
    pub fn run_batch<F>(
        &self,
        targets: &[EncounterTarget],
        build: &BuildConfig,
        ruleset: &Ruleset,
        cancel: &CancellationToken,
        mut on_result: F,
    ) -> BatchReport
    where
        F: FnMut(&SimulationResult),
    {
        let start = Instant::now();
        let requests = self.requests_for(targets, ruleset);
        let workers = self.config.workers.max(1).min(requests.len().max(1));
        let seed = self.config.seed;
        let cursor = AtomicUsize::new(0);
        let mut results = HashMap::with_capacity(requests.len());

        info!(encounters = requests.len(), workers, trials = self.config.trials, "starting batch");

        let (tx, rx) = mpsc::channel::<SimulationResult>();
        let pending = &requests;
        let cursor = &cursor;
        // The scope body stays on this thread and drains the channel while pool threads run
        self.pool.in_place_scope(|pool| {
            for worker in 0..workers {
                let tx = tx.clone();
                pool.spawn(move |_| worker_loop(worker, pending, cursor, build, ruleset, cancel, seed, tx));
            }
            drop(tx);

            for result in rx {
                on_result(&result);
                results.insert(result.key.clone(), result);
            }
        });

        let cancelled = cancel.is_cancelled();
        for request in &requests {
            if results.contains_key(&request.key) {
                continue;
            }
            let (outcome, reason) = if cancelled {
                (RunOutcome::Cancelled, "cancelled before the run started".to_string())
            } else {
                (RunOutcome::Failed, "worker did not report a result".to_string())
            };
            let result = SimulationResult::not_run(request.key.clone(), request.trials, outcome, reason);
            on_result(&result);
            results.insert(request.key.clone(), result);
        }

        let elapsed = start.elapsed();
        if cancelled {
            info!(elapsed_ms = elapsed.as_millis() as u64, "batch cancelled, all workers stopped");
        } else {
            info!(elapsed_ms = elapsed.as_millis() as u64, encounters = results.len(), "batch finished");
        }
        BatchReport { results, cancelled, elapsed }
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    worker: usize,
    requests: &[SimulationRequest],
    cursor: &AtomicUsize,
    build: &BuildConfig,
    ruleset: &Ruleset,
    cancel: &CancellationToken,
    seed: Option<u64>,
    tx: Sender<SimulationResult>,
) {
    loop {
        if cancel.is_cancelled() {
            debug!(worker, "cancellation observed, worker exiting");
            return;
        }
        let index = cursor.fetch_add(1, Ordering::Relaxed);
        let Some(request) = requests.get(index) else {
            return;
        };
        let rng = match seed {
            Some(seed) => FastRng::new(seed.wrapping_add(index as u64)),
            None => FastRng::from_entropy(),
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| run_trials(request, build, ruleset, cancel, rng)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                warn!(worker, encounter = %request.key, %message, "encounter run panicked");
                SimulationResult::not_run(
                    request.key.clone(),
                    request.trials,
                    RunOutcome::Failed,
                    format!("worker error: {}", message),
                )
            });

        debug!(worker, encounter = %request.key, outcome = ?result.outcome, "encounter finished");
        if tx.send(result).is_err() {
            return;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULESET: &str = r#"
monsters:
  a: {name: A, hitpoints: 1, attack_type: melee, stats: {melee_defence: -64}}
  b: {name: B, hitpoints: 1, attack_type: melee, stats: {melee_defence: -64}}
dungeons:
  pair:
    name: Pair
    monsters: [a, b, a]
"#;

    fn ruleset() -> Ruleset {
        Ruleset::from_yaml_str(RULESET).unwrap()
    }

    #[test]
    fn test_requests_are_deduplicated() {
        let ruleset = ruleset();
        let coordinator = Coordinator::new(CoordinatorConfig::new(5, 10_000).with_workers(2)).unwrap();
        let targets = vec![
            EncounterTarget::Monster("a".into()),
            EncounterTarget::Monster("a".into()),
            EncounterTarget::Dungeon("pair".into()),
        ];
        let keys: Vec<_> = coordinator.requests_for(&targets, &ruleset).into_iter().map(|r| r.key).collect();
        assert_eq!(
            keys,
            vec![
                EncounterKey::standalone("a"),
                EncounterKey::in_dungeon("a", "pair"),
                EncounterKey::in_dungeon("b", "pair"),
            ]
        );
    }

    #[test]
    fn test_batch_reports_every_encounter() {
        let ruleset = ruleset();
        let coordinator = Coordinator::new(CoordinatorConfig::new(5, 10_000).with_workers(3).with_seed(9)).unwrap();
        let targets = ruleset.all_targets();
        let mut streamed = 0;
        let report = coordinator.run_batch(&targets, &BuildConfig::default(), &ruleset, &CancellationToken::new(), |_| {
            streamed += 1
        });
        assert_eq!(report.results.len(), 4);
        assert_eq!(streamed, 4);
        assert!(!report.cancelled);
        assert_eq!(report.count(RunOutcome::Completed), 4);
    }

    #[test]
    fn test_results_stream_on_calling_thread() {
        let ruleset = ruleset();
        let coordinator = Coordinator::new(CoordinatorConfig::new(5, 10_000).with_workers(2).with_seed(4)).unwrap();
        let caller = std::thread::current().id();
        let targets = ruleset.all_targets();
        let mut threads = Vec::new();
        coordinator.run_batch(&targets, &BuildConfig::default(), &ruleset, &CancellationToken::new(), |_| {
            threads.push(std::thread::current().id())
        });
        assert_eq!(threads.len(), 4);
        assert!(threads.iter().all(|id| *id == caller));
    }

    #[test]
    fn test_seeded_batches_repeat() {
        let ruleset = ruleset();
        let config = CoordinatorConfig::new(20, 100_000).with_workers(2).with_seed(42);
        let targets = vec![EncounterTarget::Monster("a".into())];
        let run = || {
            Coordinator::new(config.clone())
                .unwrap()
                .run_batch(&targets, &BuildConfig::default(), &ruleset, &CancellationToken::new(), |_| {})
        };
        let key = EncounterKey::standalone("a");
        assert_eq!(run().get(&key).unwrap().tick_count, run().get(&key).unwrap().tick_count);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
