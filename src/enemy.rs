//! Monster combat stats derived from a catalog definition

use crate::config::AttackType;
use crate::effects::EffectSet;
use crate::modifiers::Modifiers;
use crate::player::{accuracy_rating, strength_max_hit, Evasion};
use crate::ruleset::{Constants, MonsterDef, SpecialAttackDef};
use crate::simulation::FastRng;

/// A monster in combat
#[derive(Debug, Clone)]
pub struct Enemy {
    pub name: String,
    pub attack_type: AttackType,
    pub hp: f64,
    pub max_hp: f64,
    pub accuracy: f64,
    pub max_hit: f64,
    pub evasion: Evasion,
    pub damage_reduction: f64,
    pub attack_interval_ticks: u32,
    pub special_attacks: Vec<SpecialAttackDef>,
    pub regen_amount: f64,
    pub regen_interval_ticks: u32,
    // Run state
    pub attack_timer: u32,
    pub regen_timer: u32,
    pub effects: EffectSet,
}

impl Enemy {
    pub fn new(def: &MonsterDef, constants: &Constants) -> Self {
        let levels = &def.levels;
        let eff = |level: u32| level as f64 + 9.0;

        let (offence, strength, strength_bonus) = match def.attack_type {
            AttackType::Melee => (levels.attack, levels.strength, def.stats.melee_strength),
            AttackType::Ranged => (levels.ranged, levels.ranged, def.stats.ranged_strength),
            AttackType::Magic => (levels.magic, levels.magic, def.stats.magic_damage_pct),
        };
        let max_hp = def.hitpoints.max(1.0);
        let interval_ticks = constants.ms_to_ticks(def.attack_speed_ms as f64);

        Self {
            name: def.name.clone(),
            attack_type: def.attack_type,
            hp: max_hp,
            max_hp,
            accuracy: accuracy_rating(eff(offence), def.stats.attack_bonus(def.attack_type)),
            max_hit: strength_max_hit(constants.number_multiplier, eff(strength), strength_bonus).max(1.0),
            evasion: Evasion::from_levels(eff(levels.defence), eff(levels.magic), &def.stats),
            damage_reduction: def.stats.damage_reduction.clamp(0.0, 95.0),
            attack_interval_ticks: interval_ticks,
            special_attacks: def.special_attacks.clone(),
            regen_amount: max_hp * def.passive_regen_fraction.max(0.0),
            regen_interval_ticks: constants.ms_to_ticks(constants.regen_interval_ms as f64),
            attack_timer: interval_ticks,
            regen_timer: 0,
            effects: EffectSet::new(),
        }
        .spawned()
    }

    fn spawned(mut self) -> Self {
        self.respawn();
        self
    }

    /// Fresh monster: full hitpoints, no effects, attack timer at a full interval
    pub fn respawn(&mut self) {
        self.hp = self.max_hp;
        self.attack_timer = self.attack_interval_ticks;
        self.regen_timer = self.regen_interval_ticks;
        self.effects.clear();
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0.0
    }

    /// Apply damage, returns the part that reduced hitpoints
    pub fn take_damage(&mut self, damage: f64) -> f64 {
        let dealt = damage.min(self.hp.max(0.0));
        self.hp -= damage;
        dealt
    }

    pub fn effective_accuracy(&self) -> f64 {
        self.accuracy * Modifiers::factor(self.effects.accuracy_pct())
    }

    pub fn effective_evasion(&self, attack_type: AttackType) -> f64 {
        self.evasion.against(attack_type) * Modifiers::factor(self.effects.evasion_pct())
    }

    pub fn effective_damage_reduction(&self) -> f64 {
        (self.damage_reduction + self.effects.damage_reduction()).clamp(0.0, 95.0)
    }

    /// Pick a special attack for this swing; chances are cumulative
    pub fn roll_special(&self, rng: &mut FastRng) -> Option<&SpecialAttackDef> {
        if self.special_attacks.is_empty() {
            return None;
        }
        let roll = rng.f64();
        let mut cumulative = 0.0;
        for special in &self.special_attacks {
            cumulative += special.chance.max(0.0);
            if roll < cumulative {
                return Some(special);
            }
        }
        None
    }

    pub fn regen_tick(&mut self) {
        if self.regen_amount <= 0.0 {
            return;
        }
        self.regen_timer = self.regen_timer.saturating_sub(1);
        if self.regen_timer == 0 {
            self.regen_timer = self.regen_interval_ticks;
            if !self.is_dead() {
                self.hp = (self.hp + self.regen_amount).min(self.max_hp);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monster(yaml: &str) -> MonsterDef {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_stats_from_levels() {
        let def = monster(
            "
name: Cow
hitpoints: 80
attack_type: melee
attack_speed_ms: 3000
levels: {attack: 1, strength: 1, defence: 1}
",
        );
        let e = Enemy::new(&def, &Constants::default());
        assert_eq!(e.max_hp, 80.0);
        assert_eq!(e.accuracy, 10.0 * 64.0);
        // 10 * (1.3 + 1.0) = 23
        assert_eq!(e.max_hit, 23.0);
        assert_eq!(e.attack_interval_ticks, 60);
        assert_eq!(e.attack_timer, 60);
        assert_eq!(e.evasion.melee, 640.0);
        assert!((e.evasion.magic - 640.0).abs() < 1e-9);
    }

    #[test]
    fn test_take_damage_reports_overkill_trimmed() {
        let def = monster("name: Chicken\nhitpoints: 30\nattack_type: melee\n");
        let mut e = Enemy::new(&def, &Constants::default());
        assert_eq!(e.take_damage(50.0), 30.0);
        assert!(e.is_dead());
        e.respawn();
        assert_eq!(e.hp, 30.0);
    }

    #[test]
    fn test_special_roll_respects_chance() {
        let def = monster(
            "name: Golem\nhitpoints: 10\nattack_type: magic\nspecial_attacks:\n  - {name: Slam, chance: 1.0}\n",
        );
        let e = Enemy::new(&def, &Constants::default());
        let mut rng = FastRng::new(7);
        assert_eq!(e.roll_special(&mut rng).map(|s| s.name.as_str()), Some("Slam"));
    }
}
