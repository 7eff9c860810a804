//! Runs repeated trials of one encounter under a tick budget

use crate::cancel::CancellationToken;
use crate::config::BuildConfig;
use crate::player::Player;
use crate::ruleset::{Requirement, Ruleset};
use crate::simulation::{CombatSim, FastRng};
use crate::stats::{RunOutcome, RunTotals, SimulationResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace, warn};

/// Ticks between cancellation checks inside a run
pub const YIELD_INTERVAL_TICKS: u64 = 1_000;

/// Where a monster is being fought
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EncounterContext {
    Standalone,
    Dungeon(String),
    SlayerTask(String),
}

/// Identity of one simulated encounter. The same monster fought in two
/// contexts is two encounters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EncounterKey {
    pub monster: String,
    pub context: EncounterContext,
}

impl EncounterKey {
    pub fn standalone(monster: &str) -> Self {
        Self { monster: monster.to_string(), context: EncounterContext::Standalone }
    }

    pub fn in_dungeon(monster: &str, dungeon: &str) -> Self {
        Self { monster: monster.to_string(), context: EncounterContext::Dungeon(dungeon.to_string()) }
    }

    pub fn on_task(monster: &str, task: &str) -> Self {
        Self { monster: monster.to_string(), context: EncounterContext::SlayerTask(task.to_string()) }
    }
}

impl fmt::Display for EncounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            EncounterContext::Standalone => write!(f, "{}", self.monster),
            EncounterContext::Dungeon(id) => write!(f, "{}@dungeon:{}", self.monster, id),
            EncounterContext::SlayerTask(id) => write!(f, "{}@task:{}", self.monster, id),
        }
    }
}

/// One unit of work for the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRequest {
    pub key: EncounterKey,
    pub trials: u32,
    pub tick_budget: u64,
}

impl SimulationRequest {
    pub fn new(key: EncounterKey, trials: u32, tick_budget: u64) -> Self {
        Self { key, trials: trials.max(1), tick_budget: tick_budget.max(1) }
    }
}

/// First unmet requirement of the monster or its context, as a readable reason
pub fn check_eligibility(key: &EncounterKey, build: &BuildConfig, ruleset: &Ruleset) -> Result<(), String> {
    let unmet = |reqs: &[Requirement], what: &str| -> Result<(), String> {
        match reqs.iter().find(|r| !r.is_met(build)) {
            Some(req) => Err(format!("{} requires {}", what, req)),
            None => Ok(()),
        }
    };

    let monster = ruleset
        .monster(&key.monster)
        .ok_or_else(|| format!("unknown monster '{}'", key.monster))?;
    match &key.context {
        EncounterContext::Standalone => {}
        EncounterContext::Dungeon(id) => {
            let dungeon = ruleset.dungeon(id).ok_or_else(|| format!("unknown dungeon '{}'", id))?;
            unmet(&dungeon.requirements, &dungeon.name)?;
        }
        EncounterContext::SlayerTask(id) => {
            let task = ruleset.slayer_task(id).ok_or_else(|| format!("unknown slayer task '{}'", id))?;
            unmet(&task.requirements, &task.name)?;
        }
    }
    unmet(&monster.requirements, &monster.name)
}

/// Simulate `request.trials` trials of one encounter.
///
/// Stops at whichever comes first: the trial count, the tick budget or
/// cancellation. Never more than one trial finishes per tick, so the run can
/// never overshoot the requested count.
pub fn run_trials(
    request: &SimulationRequest,
    build: &BuildConfig,
    ruleset: &Ruleset,
    cancel: &CancellationToken,
    rng: FastRng,
) -> SimulationResult {
    let key = request.key.clone();
    let trials = request.trials.max(1);
    let budget = request.tick_budget.max(1);

    let Some(monster) = ruleset.monster(&key.monster) else {
        warn!(encounter = %key, "monster missing from catalog");
        return SimulationResult::not_run(
            key.clone(),
            trials,
            RunOutcome::Failed,
            format!("unknown monster '{}'", request.key.monster),
        );
    };
    if let Err(reason) = check_eligibility(&key, build, ruleset) {
        debug!(encounter = %key, %reason, "encounter not eligible");
        return SimulationResult::not_run(key, trials, RunOutcome::Ineligible, reason);
    }
    let player = match Player::from_config(build, ruleset) {
        Ok(p) => p,
        Err(e) => return SimulationResult::not_run(key, trials, RunOutcome::Failed, e.to_string()),
    };

    let on_task = match &key.context {
        EncounterContext::SlayerTask(_) => true,
        EncounterContext::Standalone => build.assume_slayer_task,
        EncounterContext::Dungeon(_) => false,
    };

    let mut sim = CombatSim::new(&ruleset.constants, monster, player, on_task, rng);
    let mut ticks: u64 = 0;
    let mut cancelled = false;

    while sim.kills() + sim.deaths() < trials && ticks < budget {
        if ticks % YIELD_INTERVAL_TICKS == 0 {
            if cancel.is_cancelled() {
                sim.stop();
                cancelled = true;
                break;
            }
            trace!(encounter = %key, ticks, kills = sim.kills(), deaths = sim.deaths(), "yield point");
        }
        if !sim.is_engaged() {
            sim.begin_spawn();
        }
        sim.tick();
        ticks += 1;
    }

    let (kills, deaths) = (sim.kills(), sim.deaths());
    debug!(encounter = %key, kills, deaths, ticks, cancelled, "run finished");
    SimulationResult::from_run(
        key,
        RunTotals {
            trials_requested: trials,
            tick_budget: budget,
            kills,
            deaths,
            ticks,
            ticks_per_second: ruleset.constants.ticks_per_second(),
            cancelled,
            gains: sim.into_gains(),
        },
    )
}
