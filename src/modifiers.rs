//! Additive stat modifiers carried by items, prayers, potions and the build itself

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Flat record of every modifier the simulator understands.
///
/// Values named `*_pct` are percentages (`5.0` means +5%). Sources are summed
/// together before use, so a missing field simply contributes zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub accuracy_pct: f64,
    pub max_hit_pct: f64,
    pub min_hit_fraction: f64,
    pub evasion_pct: f64,
    pub damage_reduction: f64,
    pub attack_interval_pct: f64,
    pub lifesteal_pct: f64,
    pub hitpoint_regen_pct: f64,
    pub ammo_preservation_pct: f64,
    pub rune_preservation_pct: f64,
    pub potion_preservation_pct: f64,
    pub summoning_preservation_pct: f64,
    pub prayer_cost_reduction_pct: f64,
    pub prayer_points_per_hit: f64,
    pub food_healing_pct: f64,
    pub xp_pct: f64,
    pub gp_pct: f64,
    pub slayer_xp_pct: f64,
    pub slayer_coins_pct: f64,
    pub loot_doubling_pct: f64,
    pub reduced_loot_chance_pct: f64,
    pub spawn_interval_pct: f64,
}

impl Modifiers {
    /// Chance in `[0, 1]` derived from a percentage modifier
    pub fn chance(pct: f64) -> f64 {
        (pct / 100.0).clamp(0.0, 1.0)
    }

    /// Multiplier `1 + pct/100`, never below zero
    pub fn factor(pct: f64) -> f64 {
        (1.0 + pct / 100.0).max(0.0)
    }
}

impl AddAssign for Modifiers {
    fn add_assign(&mut self, o: Self) {
        self.accuracy_pct += o.accuracy_pct;
        self.max_hit_pct += o.max_hit_pct;
        self.min_hit_fraction += o.min_hit_fraction;
        self.evasion_pct += o.evasion_pct;
        self.damage_reduction += o.damage_reduction;
        self.attack_interval_pct += o.attack_interval_pct;
        self.lifesteal_pct += o.lifesteal_pct;
        self.hitpoint_regen_pct += o.hitpoint_regen_pct;
        self.ammo_preservation_pct += o.ammo_preservation_pct;
        self.rune_preservation_pct += o.rune_preservation_pct;
        self.potion_preservation_pct += o.potion_preservation_pct;
        self.summoning_preservation_pct += o.summoning_preservation_pct;
        self.prayer_cost_reduction_pct += o.prayer_cost_reduction_pct;
        self.prayer_points_per_hit += o.prayer_points_per_hit;
        self.food_healing_pct += o.food_healing_pct;
        self.xp_pct += o.xp_pct;
        self.gp_pct += o.gp_pct;
        self.slayer_xp_pct += o.slayer_xp_pct;
        self.slayer_coins_pct += o.slayer_coins_pct;
        self.loot_doubling_pct += o.loot_doubling_pct;
        self.reduced_loot_chance_pct += o.reduced_loot_chance_pct;
        self.spawn_interval_pct += o.spawn_interval_pct;
    }
}

impl Add for Modifiers {
    type Output = Modifiers;

    fn add(mut self, o: Self) -> Self {
        self += o;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifiers_sum_fieldwise() {
        let a = Modifiers { accuracy_pct: 5.0, gp_pct: 10.0, ..Default::default() };
        let b = Modifiers { accuracy_pct: 2.5, loot_doubling_pct: 3.0, ..Default::default() };
        let sum = a + b;
        assert_eq!(sum.accuracy_pct, 7.5);
        assert_eq!(sum.gp_pct, 10.0);
        assert_eq!(sum.loot_doubling_pct, 3.0);
    }

    #[test]
    fn test_chance_is_clamped() {
        assert_eq!(Modifiers::chance(150.0), 1.0);
        assert_eq!(Modifiers::chance(-5.0), 0.0);
        assert_eq!(Modifiers::factor(-250.0), 0.0);
    }
}
