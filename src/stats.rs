//! Gain accumulation, per-second rates and per-encounter simulation results

use crate::config::{ConsumableCosts, Skill};
use crate::runner::EncounterKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Below this completed/requested ratio a result is flagged as low confidence
pub const LOW_CONFIDENCE_RATIO: f64 = 0.10;

/// Resources the attacker must re-supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consumable {
    PrayerPoints,
    Potions,
    Food,
    Runes,
    CombinationRunes,
    Ammo,
    SummoningCharges,
}

impl Consumable {
    pub const ALL: [Consumable; 7] = [
        Consumable::PrayerPoints,
        Consumable::Potions,
        Consumable::Food,
        Consumable::Runes,
        Consumable::CombinationRunes,
        Consumable::Ammo,
        Consumable::SummoningCharges,
    ];
}

/// Cumulative counters for one encounter's run.
///
/// Every counter only grows, except `lowest_hitpoints` which only shrinks.
/// Fields are private so the only way in is through the recording methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GainAccumulator {
    xp: BTreeMap<Skill, f64>,
    consumed: BTreeMap<Consumable, f64>,
    gp: f64,
    slayer_coins: f64,
    damage_dealt: f64,
    damage_taken: f64,
    prayer_points_gained: f64,
    highest_hit_taken: f64,
    lowest_hitpoints: Option<f64>,
    attacks_made: u64,
    hits_landed: u64,
}

impl GainAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_xp(&mut self, skill: Skill, amount: f64) {
        if amount > 0.0 {
            *self.xp.entry(skill).or_insert(0.0) += amount;
        }
    }

    pub fn consume(&mut self, consumable: Consumable, amount: f64) {
        if amount > 0.0 {
            *self.consumed.entry(consumable).or_insert(0.0) += amount;
        }
    }

    pub fn add_gp(&mut self, amount: f64) {
        self.gp += amount.max(0.0);
    }

    pub fn add_slayer_coins(&mut self, amount: f64) {
        self.slayer_coins += amount.max(0.0);
    }

    pub fn add_prayer_points(&mut self, amount: f64) {
        self.prayer_points_gained += amount.max(0.0);
    }

    pub fn record_attack(&mut self, landed: bool, damage: f64) {
        self.attacks_made += 1;
        if landed {
            self.hits_landed += 1;
            self.damage_dealt += damage.max(0.0);
        }
    }

    /// Damage dealt outside a regular attack (damage over time)
    pub fn record_damage_dealt(&mut self, damage: f64) {
        self.damage_dealt += damage.max(0.0);
    }

    pub fn record_hit_taken(&mut self, damage: f64) {
        let damage = damage.max(0.0);
        self.damage_taken += damage;
        self.highest_hit_taken = self.highest_hit_taken.max(damage);
    }

    pub fn record_hitpoints(&mut self, hitpoints: f64) {
        let hp = hitpoints.max(0.0);
        self.lowest_hitpoints = Some(self.lowest_hitpoints.map_or(hp, |low| low.min(hp)));
    }

    pub fn xp(&self, skill: Skill) -> f64 {
        self.xp.get(&skill).copied().unwrap_or(0.0)
    }

    pub fn consumed(&self, consumable: Consumable) -> f64 {
        self.consumed.get(&consumable).copied().unwrap_or(0.0)
    }

    pub fn gp(&self) -> f64 {
        self.gp
    }

    pub fn slayer_coins(&self) -> f64 {
        self.slayer_coins
    }

    pub fn damage_dealt(&self) -> f64 {
        self.damage_dealt
    }

    pub fn damage_taken(&self) -> f64 {
        self.damage_taken
    }

    pub fn prayer_points_gained(&self) -> f64 {
        self.prayer_points_gained
    }

    pub fn highest_hit_taken(&self) -> f64 {
        self.highest_hit_taken
    }

    pub fn lowest_hitpoints(&self) -> Option<f64> {
        self.lowest_hitpoints
    }

    pub fn attacks_made(&self) -> u64 {
        self.attacks_made
    }

    pub fn hits_landed(&self) -> u64 {
        self.hits_landed
    }

    pub fn hit_rate(&self) -> f64 {
        if self.attacks_made == 0 {
            0.0
        } else {
            self.hits_landed as f64 / self.attacks_made as f64
        }
    }
}

/// Per-second rates derived from a [`GainAccumulator`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rates {
    pub xp_per_second: BTreeMap<Skill, f64>,
    pub consumed_per_second: BTreeMap<Consumable, f64>,
    pub gp_per_second: f64,
    pub slayer_coins_per_second: f64,
    pub damage_per_second: f64,
    pub damage_taken_per_second: f64,
    pub prayer_points_gained_per_second: f64,
    pub attacks_per_second: f64,
    /// Share of player attacks that landed
    pub hit_rate: f64,
    pub highest_hit_taken: f64,
    pub lowest_hitpoints: Option<f64>,
}

impl Rates {
    /// Divide every total by the simulated duration. Pure in its inputs.
    pub fn from_totals(gains: &GainAccumulator, seconds: f64) -> Rates {
        let per = |total: f64| if seconds > 0.0 { total / seconds } else { 0.0 };
        Rates {
            xp_per_second: Skill::ALL
                .iter()
                .filter(|s| gains.xp(**s) > 0.0)
                .map(|s| (*s, per(gains.xp(*s))))
                .collect(),
            consumed_per_second: Consumable::ALL
                .iter()
                .filter(|c| gains.consumed(**c) > 0.0)
                .map(|c| (*c, per(gains.consumed(*c))))
                .collect(),
            gp_per_second: per(gains.gp()),
            slayer_coins_per_second: per(gains.slayer_coins()),
            damage_per_second: per(gains.damage_dealt()),
            damage_taken_per_second: per(gains.damage_taken()),
            prayer_points_gained_per_second: per(gains.prayer_points_gained()),
            attacks_per_second: per(gains.attacks_made() as f64),
            hit_rate: gains.hit_rate(),
            highest_hit_taken: gains.highest_hit_taken(),
            lowest_hitpoints: gains.lowest_hitpoints(),
        }
    }

    pub fn xp(&self, skill: Skill) -> f64 {
        self.xp_per_second.get(&skill).copied().unwrap_or(0.0)
    }

    pub fn consumed(&self, consumable: Consumable) -> f64 {
        self.consumed_per_second.get(&consumable).copied().unwrap_or(0.0)
    }

    /// `1 + Σ consumption_rate × seconds_per_unit` over every consumable
    pub fn cost_factor(&self, costs: &ConsumableCosts) -> f64 {
        1.0 + Consumable::ALL
            .iter()
            .map(|c| self.consumed(*c) * costs.seconds_per_unit(*c))
            .sum::<f64>()
    }

    /// Rates with the re-supply time of consumables folded into the duration
    pub fn cost_adjusted(&self, costs: &ConsumableCosts) -> Rates {
        self.scaled(1.0 / self.cost_factor(costs))
    }

    /// Multiply every rate by `k`; hit rate and extremal values are left unchanged
    pub fn scaled(&self, k: f64) -> Rates {
        Rates {
            xp_per_second: self.xp_per_second.iter().map(|(s, v)| (*s, v * k)).collect(),
            consumed_per_second: self.consumed_per_second.iter().map(|(c, v)| (*c, v * k)).collect(),
            gp_per_second: self.gp_per_second * k,
            slayer_coins_per_second: self.slayer_coins_per_second * k,
            damage_per_second: self.damage_per_second * k,
            damage_taken_per_second: self.damage_taken_per_second * k,
            prayer_points_gained_per_second: self.prayer_points_gained_per_second * k,
            attacks_per_second: self.attacks_per_second * k,
            hit_rate: self.hit_rate,
            highest_hit_taken: self.highest_hit_taken,
            lowest_hitpoints: self.lowest_hitpoints,
        }
    }

    /// Weighted average of several rate sets. Extremal values take the worst
    /// case across parts.
    pub fn weighted_average(parts: &[(&Rates, f64)]) -> Rates {
        let total: f64 = parts.iter().map(|(_, w)| w.max(0.0)).sum();
        let mut out = Rates::default();
        if total <= 0.0 {
            return out;
        }
        for (rates, weight) in parts {
            let share = weight.max(0.0) / total;
            for (skill, v) in &rates.xp_per_second {
                *out.xp_per_second.entry(*skill).or_insert(0.0) += v * share;
            }
            for (c, v) in &rates.consumed_per_second {
                *out.consumed_per_second.entry(*c).or_insert(0.0) += v * share;
            }
            out.gp_per_second += rates.gp_per_second * share;
            out.slayer_coins_per_second += rates.slayer_coins_per_second * share;
            out.damage_per_second += rates.damage_per_second * share;
            out.damage_taken_per_second += rates.damage_taken_per_second * share;
            out.prayer_points_gained_per_second += rates.prayer_points_gained_per_second * share;
            out.attacks_per_second += rates.attacks_per_second * share;
            out.hit_rate += rates.hit_rate * share;
            out.highest_hit_taken = out.highest_hit_taken.max(rates.highest_hit_taken);
            out.lowest_hitpoints = match (out.lowest_hitpoints, rates.lowest_hitpoints) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        out
    }
}

/// How a trial run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every requested trial finished
    Completed,
    /// The tick budget ran out first; rates are valid but less precise
    BudgetExhausted,
    /// Entry requirements unmet, no ticks run
    Ineligible,
    /// Stopped by the caller
    Cancelled,
    /// No usable result (no kills, unknown monster, worker error)
    Failed,
}

/// Immutable result of simulating one monster in one context
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub key: EncounterKey,
    pub outcome: RunOutcome,
    pub success: bool,
    pub reason: Option<String>,
    pub trials_requested: u32,
    pub kills: u32,
    pub deaths: u32,
    pub tick_count: u64,
    pub simulated_seconds: f64,
    pub kill_time_seconds: Option<f64>,
    pub death_rate: f64,
    pub rates: Rates,
    pub gains: GainAccumulator,
}

/// Raw totals of a finished run
#[derive(Debug, Clone)]
pub struct RunTotals {
    pub trials_requested: u32,
    pub tick_budget: u64,
    pub kills: u32,
    pub deaths: u32,
    pub ticks: u64,
    pub ticks_per_second: f64,
    pub cancelled: bool,
    pub gains: GainAccumulator,
}

impl SimulationResult {
    /// Classify a run and derive its rates
    pub fn from_run(key: EncounterKey, totals: RunTotals) -> Self {
        let RunTotals { trials_requested, tick_budget, kills, deaths, ticks, ticks_per_second, cancelled, gains } =
            totals;
        let completed = kills + deaths;
        let simulated_seconds = if ticks_per_second > 0.0 { ticks as f64 / ticks_per_second } else { 0.0 };
        let kill_time_seconds = (kills > 0).then(|| simulated_seconds / kills as f64);

        let (outcome, success, reason) = if cancelled {
            (
                RunOutcome::Cancelled,
                false,
                Some(format!("cancelled after {} of {} trials", completed, trials_requested)),
            )
        } else if completed >= trials_requested {
            if kills == 0 {
                (
                    RunOutcome::Failed,
                    false,
                    Some(format!("no kills in {} trials; the player died every time", completed)),
                )
            } else {
                (RunOutcome::Completed, true, None)
            }
        } else {
            let mut reason = format!(
                "completed {} of {} requested trials before the {} tick budget ran out",
                completed, trials_requested, tick_budget
            );
            if kills == 0 {
                reason.push_str("; no kills recorded, kill time unavailable");
            }
            (RunOutcome::BudgetExhausted, true, Some(reason))
        };

        Self {
            key,
            outcome,
            success,
            reason,
            trials_requested,
            kills,
            deaths,
            tick_count: ticks,
            simulated_seconds,
            kill_time_seconds,
            death_rate: if completed > 0 { deaths as f64 / completed as f64 } else { 0.0 },
            rates: Rates::from_totals(&gains, simulated_seconds),
            gains,
        }
    }

    /// A result for a run that never ticked
    pub fn not_run(key: EncounterKey, trials_requested: u32, outcome: RunOutcome, reason: String) -> Self {
        Self {
            key,
            outcome,
            success: false,
            reason: Some(reason),
            trials_requested,
            kills: 0,
            deaths: 0,
            tick_count: 0,
            simulated_seconds: 0.0,
            kill_time_seconds: None,
            death_rate: 0.0,
            rates: Rates::default(),
            gains: GainAccumulator::default(),
        }
    }

    pub fn trials_completed(&self) -> u32 {
        self.kills + self.deaths
    }

    /// Fraction of requested trials that finished
    pub fn confidence(&self) -> f64 {
        if self.trials_requested == 0 {
            return 0.0;
        }
        (self.trials_completed() as f64 / self.trials_requested as f64).min(1.0)
    }

    pub fn low_confidence(&self) -> bool {
        self.success && self.confidence() < LOW_CONFIDENCE_RATIO
    }

    /// Recompute rates from the stored totals
    pub fn rederive_rates(&self) -> Rates {
        Rates::from_totals(&self.gains, self.simulated_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::EncounterContext;

    fn key() -> EncounterKey {
        EncounterKey { monster: "chicken".into(), context: EncounterContext::Standalone }
    }

    fn totals(kills: u32, deaths: u32, ticks: u64, trials: u32) -> RunTotals {
        RunTotals {
            trials_requested: trials,
            tick_budget: 1000,
            kills,
            deaths,
            ticks,
            ticks_per_second: 20.0,
            cancelled: false,
            gains: GainAccumulator::new(),
        }
    }

    #[test]
    fn test_extremes_are_monotonic() {
        let mut g = GainAccumulator::new();
        g.record_hit_taken(50.0);
        g.record_hit_taken(20.0);
        assert_eq!(g.highest_hit_taken(), 50.0);
        g.record_hitpoints(300.0);
        g.record_hitpoints(500.0);
        g.record_hitpoints(-10.0);
        assert_eq!(g.lowest_hitpoints(), Some(0.0));
        g.add_xp(Skill::Attack, -5.0);
        assert_eq!(g.xp(Skill::Attack), 0.0);
    }

    #[test]
    fn test_rates_divide_by_seconds() {
        let mut g = GainAccumulator::new();
        g.add_xp(Skill::Attack, 100.0);
        g.consume(Consumable::Food, 10.0);
        g.add_gp(50.0);
        let r = Rates::from_totals(&g, 10.0);
        assert_eq!(r.xp(Skill::Attack), 10.0);
        assert_eq!(r.consumed(Consumable::Food), 1.0);
        assert_eq!(r.gp_per_second, 5.0);
        assert_eq!(Rates::from_totals(&g, 0.0).gp_per_second, 0.0);
    }

    #[test]
    fn test_hit_rate_survives_adjustment() {
        let mut g = GainAccumulator::new();
        assert_eq!(g.hit_rate(), 0.0);
        g.record_attack(true, 10.0);
        g.record_attack(false, 0.0);
        g.record_attack(true, 5.0);
        g.record_attack(false, 0.0);
        assert_eq!(g.hits_landed(), 2);
        assert_eq!(g.damage_dealt(), 15.0);

        let costs = ConsumableCosts { food_seconds: 1.0, ..Default::default() };
        g.consume(Consumable::Food, 4.0);
        let r = Rates::from_totals(&g, 4.0);
        assert_eq!(r.hit_rate, 0.5);
        assert_eq!(r.attacks_per_second, 1.0);
        assert_eq!(r.cost_adjusted(&costs).hit_rate, 0.5);
    }

    #[test]
    fn test_cost_factor_adjustment() {
        let mut g = GainAccumulator::new();
        g.add_xp(Skill::Magic, 100.0);
        g.consume(Consumable::Runes, 2.0);
        g.consume(Consumable::CombinationRunes, 1.0);
        let r = Rates::from_totals(&g, 1.0);
        let costs = ConsumableCosts { rune_seconds: 0.25, ..Default::default() };
        // 1 + 2*0.25 + 1*0.25
        assert!((r.cost_factor(&costs) - 1.75).abs() < 1e-12);
        let adjusted = r.cost_adjusted(&costs);
        assert!((adjusted.xp(Skill::Magic) - 100.0 / 1.75).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_average() {
        let a = Rates { gp_per_second: 10.0, highest_hit_taken: 5.0, ..Default::default() };
        let b =
            Rates { gp_per_second: 40.0, highest_hit_taken: 9.0, lowest_hitpoints: Some(3.0), ..Default::default() };
        let avg = Rates::weighted_average(&[(&a, 3.0), (&b, 1.0)]);
        assert!((avg.gp_per_second - 17.5).abs() < 1e-12);
        assert_eq!(avg.highest_hit_taken, 9.0);
        assert_eq!(avg.lowest_hitpoints, Some(3.0));
    }

    #[test]
    fn test_classification() {
        let done = SimulationResult::from_run(key(), totals(9, 1, 2000, 10));
        assert_eq!(done.outcome, RunOutcome::Completed);
        assert_eq!(done.kill_time_seconds, Some(100.0 / 9.0));
        assert!((done.death_rate - 0.1).abs() < 1e-12);

        let short = SimulationResult::from_run(key(), totals(0, 0, 1000, 10));
        assert_eq!(short.outcome, RunOutcome::BudgetExhausted);
        assert!(short.success);
        assert_eq!(short.kill_time_seconds, None);
        assert!(short.low_confidence());

        let dead = SimulationResult::from_run(key(), totals(0, 10, 500, 10));
        assert_eq!(dead.outcome, RunOutcome::Failed);
        assert!(!dead.success);
    }

    #[test]
    fn test_rederive_is_identical() {
        let mut t = totals(5, 0, 400, 5);
        t.gains.add_xp(Skill::Ranged, 123.456);
        t.gains.add_gp(78.9);
        let result = SimulationResult::from_run(key(), t);
        assert_eq!(result.rederive_rates(), result.rates);
        assert_eq!(result.rederive_rates(), result.rederive_rates());
    }
}
