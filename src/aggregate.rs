//! Result aggregation: turns per-encounter results into comparable summaries.
//!
//! A summary covers one requested target. Single monsters map to one result,
//! dungeons and slayer tasks combine the results of their constituents. Loot
//! is valued here, after the runs, so a policy change only needs a new
//! [`LootValuer`] and another call to [`ResultAggregator::summarize_all`].

use crate::config::{BuildConfig, LootPolicy};
use crate::loot::{LootValuer, Valuation};
use crate::modifiers::Modifiers;
use crate::parallel::expand_target;
use crate::player::Player;
use crate::ruleset::{EncounterTarget, MonsterDef, Ruleset};
use crate::runner::EncounterKey;
use crate::stats::{Rates, RunOutcome, SimulationResult, LOW_CONFIDENCE_RATIO};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// P(at least one drop within `duration` seconds) for a per-kill chance `p`
pub fn chance_within(p: f64, duration: f64, kill_time: f64) -> f64 {
    if p <= 0.0 || duration <= 0.0 || kill_time <= 0.0 {
        return 0.0;
    }
    1.0 - (1.0 - p.min(1.0)).powf(duration / kill_time)
}

/// P(at least one success) across independent chances
pub fn combine_chances(chances: impl IntoIterator<Item = f64>) -> f64 {
    1.0 - chances.into_iter().map(|p| 1.0 - p.clamp(0.0, 1.0)).product::<f64>()
}

/// Gold per second once alchemy time is added to each kill
pub fn alch_adjusted_gp(gp_excluding_alch_time: f64, kill_time: f64, alch_time: f64) -> f64 {
    if kill_time + alch_time <= 0.0 {
        return 0.0;
    }
    gp_excluding_alch_time * kill_time / (kill_time + alch_time)
}

#[derive(Debug, Clone)]
pub struct AggregateSettings {
    /// Duration the signet and pet chances are computed for
    pub signet_hours: f64,
    /// Item whose drop rate is reported per second
    pub selected_item: Option<String>,
}

impl Default for AggregateSettings {
    fn default() -> Self {
        Self { signet_hours: 1.0, selected_item: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LootRates {
    /// Expected drop value per kill, or per completion for dungeons
    pub value_per_kill: f64,
    /// Gold drops plus valued loot, per second
    pub gp_per_second: f64,
    /// `gp_per_second` after consumable cost and alchemy time
    pub adjusted_gp_per_second: f64,
    pub alch_seconds_per_kill: f64,
    pub selected_item_per_second: Option<f64>,
}

/// Final statistics for one requested target
#[derive(Debug, Clone, Serialize)]
pub struct EncounterSummary {
    pub target: EncounterTarget,
    pub name: String,
    pub outcome: RunOutcome,
    pub success: bool,
    pub reason: Option<String>,
    pub tick_count: u64,
    pub kill_time_seconds: Option<f64>,
    pub death_rate: f64,
    pub cost_factor: f64,
    pub rates: Rates,
    pub adjusted_rates: Rates,
    pub loot: LootRates,
    pub signet_chance: f64,
    pub pet_chance: f64,
    pub confidence: f64,
    pub low_confidence: bool,
}

impl EncounterSummary {
    fn unavailable(target: &EncounterTarget, name: String, outcome: RunOutcome, reason: String) -> Self {
        Self {
            target: target.clone(),
            name,
            outcome,
            success: false,
            reason: Some(reason),
            tick_count: 0,
            kill_time_seconds: None,
            death_rate: 0.0,
            cost_factor: 1.0,
            rates: Rates::default(),
            adjusted_rates: Rates::default(),
            loot: LootRates::default(),
            signet_chance: 0.0,
            pet_chance: 0.0,
            confidence: 0.0,
            low_confidence: false,
        }
    }
}

/// How constituents combine
#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
    Single,
    /// Fought in sequence; one completion kills every constituent once
    Sequence,
    /// Cycled through by weight; one "kill" is one weighted-average kill
    Weighted,
}

/// One constituent monster with everything valued for one kill
struct Part<'r> {
    monster: &'r MonsterDef,
    result: &'r SimulationResult,
    kill_time: f64,
    weight: f64,
    value: Valuation,
    selected: f64,
}

pub struct ResultAggregator<'a> {
    ruleset: &'a Ruleset,
    build: &'a BuildConfig,
    modifiers: Modifiers,
    settings: AggregateSettings,
}

impl<'a> ResultAggregator<'a> {
    pub fn new(ruleset: &'a Ruleset, build: &'a BuildConfig, settings: AggregateSettings) -> Self {
        let modifiers = match Player::from_config(build, ruleset) {
            Ok(player) => player.modifiers,
            Err(e) => {
                warn!(error = %e, "build does not resolve, valuing loot with build modifiers only");
                build.modifiers
            }
        };
        Self { ruleset, build, modifiers, settings }
    }

    /// Loot valuer for one refresh cycle
    pub fn valuer(&self, policy: LootPolicy) -> LootValuer<'a> {
        LootValuer::new(self.ruleset, policy, &self.modifiers)
    }

    /// True once every encounter behind `target` has a result
    pub fn is_ready(&self, target: &EncounterTarget, results: &HashMap<EncounterKey, SimulationResult>) -> bool {
        let keys = expand_target(target, self.ruleset);
        !keys.is_empty() && keys.iter().all(|k| results.contains_key(k))
    }

    /// Summaries for every target under `policy`. Never re-runs combat.
    pub fn summarize_all(
        &self,
        targets: &[EncounterTarget],
        results: &HashMap<EncounterKey, SimulationResult>,
        policy: LootPolicy,
    ) -> Vec<EncounterSummary> {
        let valuer = self.valuer(policy);
        targets.iter().map(|t| self.summarize(t, results, &valuer)).collect()
    }

    pub fn summarize(
        &self,
        target: &EncounterTarget,
        results: &HashMap<EncounterKey, SimulationResult>,
        valuer: &LootValuer,
    ) -> EncounterSummary {
        let name = self.ruleset.target_name(target);
        let item = self.settings.selected_item.as_deref();

        // (key, weight) per constituent, plus per-completion extras for dungeons
        let (shape, constituents, completion) = match target {
            EncounterTarget::Monster(id) => (Shape::Single, vec![(EncounterKey::standalone(id), 1.0)], None),
            EncounterTarget::Dungeon(id) => {
                let Some(dungeon) = self.ruleset.dungeon(id) else {
                    let reason = format!("unknown dungeon '{}'", id);
                    return EncounterSummary::unavailable(target, name, RunOutcome::Failed, reason);
                };
                let keys: Vec<(EncounterKey, f64)> =
                    dungeon.monsters.iter().map(|m| (EncounterKey::in_dungeon(m, id), 1.0)).collect();
                let extra = (
                    valuer.dungeon_completion_value(dungeon),
                    item.map_or(0.0, |i| valuer.item_per_completion(dungeon, i)),
                    dungeon.pet_chance,
                );
                (Shape::Sequence, keys, Some(extra))
            }
            EncounterTarget::SlayerTask(id) => {
                let Some(task) = self.ruleset.slayer_task(id) else {
                    return EncounterSummary::unavailable(
                        target,
                        name,
                        RunOutcome::Failed,
                        format!("unknown slayer task '{}'", id),
                    );
                };
                let keys: Vec<(EncounterKey, f64)> = task
                    .monsters
                    .iter()
                    .map(|m| (EncounterKey::on_task(&m.monster, id), m.weight.max(0.0)))
                    .collect();
                (Shape::Weighted, keys, None)
            }
        };
        if constituents.is_empty() {
            return EncounterSummary::unavailable(target, name, RunOutcome::Failed, "no monsters to fight".to_string());
        }

        let mut parts = Vec::with_capacity(constituents.len());
        for (key, weight) in &constituents {
            let Some(result) = results.get(key) else {
                return EncounterSummary::unavailable(
                    target,
                    name,
                    RunOutcome::Failed,
                    format!("no result for {}", key),
                );
            };
            let Some(monster) = self.ruleset.monster(&key.monster) else {
                return EncounterSummary::unavailable(target, name, result.outcome, result_reason(key, result));
            };
            let Some(kill_time) = result.kill_time_seconds.filter(|_| result.success) else {
                if shape == Shape::Single {
                    return self.without_kills(target, name, result);
                }
                return EncounterSummary::unavailable(target, name, result.outcome, result_reason(key, result));
            };
            let in_dungeon = shape == Shape::Sequence;
            parts.push(Part {
                monster,
                result,
                kill_time,
                weight: *weight,
                value: valuer.monster_kill_value(monster, in_dungeon),
                selected: item.map_or(0.0, |i| valuer.item_per_kill(monster, i, in_dungeon)),
            });
        }

        self.combine(target, name, shape, &parts, completion)
    }

    /// A single monster that ran but never killed anything
    fn without_kills(&self, target: &EncounterTarget, name: String, result: &SimulationResult) -> EncounterSummary {
        let cost_factor = result.rates.cost_factor(&self.build.costs);
        EncounterSummary {
            target: target.clone(),
            name,
            outcome: result.outcome,
            success: result.success,
            reason: result.reason.clone(),
            tick_count: result.tick_count,
            kill_time_seconds: None,
            death_rate: result.death_rate,
            cost_factor,
            rates: result.rates.clone(),
            adjusted_rates: result.rates.cost_adjusted(&self.build.costs),
            loot: LootRates::default(),
            signet_chance: 0.0,
            pet_chance: 0.0,
            confidence: result.confidence(),
            low_confidence: result.low_confidence(),
        }
    }

    fn combine(
        &self,
        target: &EncounterTarget,
        name: String,
        shape: Shape,
        parts: &[Part],
        completion: Option<(Valuation, f64, f64)>,
    ) -> EncounterSummary {
        // Share of simulated time each constituent accounts for
        let time_weights: Vec<f64> = parts.iter().map(|p| p.weight * p.kill_time).collect();
        let total_time_weight: f64 = time_weights.iter().sum();
        let total_weight: f64 = parts.iter().map(|p| p.weight).sum();

        let weighted = |f: &dyn Fn(&Part) -> f64| -> f64 {
            if total_weight <= 0.0 {
                return 0.0;
            }
            parts.iter().map(|p| p.weight * f(p)).sum::<f64>() / total_weight
        };

        let kill_time = match shape {
            Shape::Single | Shape::Sequence => parts.iter().map(|p| p.kill_time).sum(),
            Shape::Weighted => weighted(&|p| p.kill_time),
        };
        let death_rate = match shape {
            Shape::Single => parts[0].result.death_rate,
            Shape::Sequence => combine_chances(parts.iter().map(|p| p.result.death_rate)),
            Shape::Weighted => weighted(&|p| p.result.death_rate),
        };

        let rate_parts: Vec<(&Rates, f64)> =
            parts.iter().zip(&time_weights).map(|(p, w)| (&p.result.rates, *w)).collect();
        let rates = Rates::weighted_average(&rate_parts);

        let (mut value, mut selected) = match shape {
            Shape::Single | Shape::Sequence => (
                parts.iter().fold(Valuation::ZERO, |acc, p| acc + p.value),
                parts.iter().map(|p| p.selected).sum(),
            ),
            Shape::Weighted => (
                Valuation {
                    gold: weighted(&|p| p.value.gold),
                    alch_seconds: weighted(&|p| p.value.alch_seconds),
                },
                weighted(&|p| p.selected),
            ),
        };
        let mut pet_chance = combine_chances(parts.iter().zip(&time_weights).map(|(p, w)| {
            self.part_chance(p.monster.pet_chance, p.kill_time, *w, total_time_weight)
        }));
        if let Some((completion_value, completion_selected, dungeon_pet)) = completion {
            value += completion_value;
            selected += completion_selected;
            // Monsters inside a dungeon drop nothing themselves
            pet_chance = chance_within(dungeon_pet, self.duration(), kill_time);
        }
        let signet_chance = combine_chances(parts.iter().zip(&time_weights).map(|(p, w)| {
            self.part_chance(p.monster.signet_chance, p.kill_time, *w, total_time_weight)
        }));

        let cost_factor = rates.cost_factor(&self.build.costs);
        let gp_per_kill = rates.gp_per_second * kill_time + value.gold;
        let gp_per_second = if kill_time > 0.0 { gp_per_kill / kill_time } else { 0.0 };
        let adjusted_kill_time = kill_time * cost_factor;
        let gp_excluding_alch_time = if adjusted_kill_time > 0.0 { gp_per_kill / adjusted_kill_time } else { 0.0 };
        let loot = LootRates {
            value_per_kill: value.gold,
            gp_per_second,
            adjusted_gp_per_second: alch_adjusted_gp(gp_excluding_alch_time, adjusted_kill_time, value.alch_seconds),
            alch_seconds_per_kill: value.alch_seconds,
            selected_item_per_second: self
                .settings
                .selected_item
                .as_ref()
                .map(|_| if kill_time > 0.0 { selected / kill_time } else { 0.0 }),
        };

        // Distinct results only; a dungeon may repeat a monster
        let mut seen = HashSet::new();
        let distinct: Vec<&SimulationResult> =
            parts.iter().map(|p| p.result).filter(|r| seen.insert(&r.key)).collect();
        let confidence = distinct.iter().map(|r| r.confidence()).fold(1.0, f64::min);
        let outcome = if distinct.iter().any(|r| r.outcome == RunOutcome::BudgetExhausted) {
            RunOutcome::BudgetExhausted
        } else {
            RunOutcome::Completed
        };
        let reason = distinct.iter().find_map(|r| r.reason.as_ref().map(|why| format!("{}: {}", r.key, why)));

        EncounterSummary {
            target: target.clone(),
            name,
            outcome,
            success: true,
            reason: if shape == Shape::Single { parts[0].result.reason.clone() } else { reason },
            tick_count: distinct.iter().map(|r| r.tick_count).sum(),
            kill_time_seconds: Some(kill_time),
            death_rate,
            cost_factor,
            adjusted_rates: rates.cost_adjusted(&self.build.costs),
            rates,
            loot,
            signet_chance,
            pet_chance,
            confidence,
            low_confidence: confidence < LOW_CONFIDENCE_RATIO,
        }
    }

    fn duration(&self) -> f64 {
        self.settings.signet_hours.max(0.0) * 3600.0
    }

    /// Chance within this constituent's share of the total duration
    fn part_chance(&self, p: f64, kill_time: f64, time_weight: f64, total_time_weight: f64) -> f64 {
        if total_time_weight <= 0.0 {
            return 0.0;
        }
        chance_within(p, self.duration() * time_weight / total_time_weight, kill_time)
    }
}

fn result_reason(key: &EncounterKey, result: &SimulationResult) -> String {
    match &result.reason {
        Some(reason) => format!("{}: {}", key, reason),
        None => format!("{}: no kills recorded", key),
    }
}
