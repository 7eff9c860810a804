//! Attacker stat calculation from a build and the combat state that changes during a run

use crate::config::{AttackType, AutoEat, BuildConfig, DeathPolicy, EquipSlot, Skill};
use crate::effects::{EffectDef, EffectSet};
use crate::error::ConfigError;
use crate::modifiers::Modifiers;
use crate::ruleset::{Constants, EquipmentStats, Holiness, ItemCategory, Ruleset, SpecialAttackDef};
use crate::stats::{Consumable, GainAccumulator};
use tracing::warn;

/// Safety cap on food eaten in one auto-eat pass
const MAX_EATS_PER_PASS: u32 = 1_000;

/// Accuracy rating from an effective level and an attack bonus
pub fn accuracy_rating(effective_level: f64, attack_bonus: f64) -> f64 {
    effective_level * (attack_bonus + 64.0)
}

/// Maximum hit of the strength-scaled styles, in hitpoint units
pub fn strength_max_hit(number_multiplier: f64, effective_level: f64, strength_bonus: f64) -> f64 {
    (number_multiplier
        * (1.3 + effective_level / 10.0 + strength_bonus / 80.0 + effective_level * strength_bonus / 640.0))
        .floor()
}

/// Evasion ratings against each attack type
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Evasion {
    pub melee: f64,
    pub ranged: f64,
    pub magic: f64,
}

impl Evasion {
    /// Ratings from effective defence and magic levels.
    /// Magic evasion mixes 70% magic with 30% defence.
    pub fn from_levels(effective_defence: f64, effective_magic: f64, stats: &EquipmentStats) -> Self {
        Self {
            melee: accuracy_rating(effective_defence, stats.melee_defence),
            ranged: accuracy_rating(effective_defence, stats.ranged_defence),
            magic: accuracy_rating(0.7 * effective_magic + 0.3 * effective_defence, stats.magic_defence),
        }
    }

    pub fn against(&self, attack_type: AttackType) -> f64 {
        match attack_type {
            AttackType::Melee => self.melee,
            AttackType::Ranged => self.ranged,
            AttackType::Magic => self.magic,
        }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self {
            melee: self.melee * factor,
            ranged: self.ranged * factor,
            magic: self.magic * factor,
        }
    }
}

/// Rune drawn per cast
#[derive(Debug, Clone, PartialEq)]
pub struct RuneCost {
    pub item: String,
    pub quantity: f64,
    pub combination: bool,
}

/// Attacker ready for combat: derived stats plus mutable run state
#[derive(Debug, Clone)]
pub struct Player {
    pub attack_type: AttackType,
    pub max_hp: f64,
    pub hp: f64,
    pub accuracy: f64,
    pub max_hit: f64,
    pub min_hit: f64,
    pub evasion: Evasion,
    pub damage_reduction: f64,
    pub attack_interval_ticks: u32,
    pub regen_interval_ticks: u32,
    pub regen_amount: f64,
    pub lifesteal: f64,

    pub special_attack: Option<SpecialAttackDef>,
    pub spell_effect: Option<EffectDef>,
    pub runes: Vec<RuneCost>,
    pub uses_ammo: bool,

    // Prayers
    pub protect_from: Option<AttackType>,
    pub prayer_cost_per_attack: f64,
    pub prayer_xp_per_damage: f64,

    pub potion_charges: Option<u32>,
    pub food_heal: Option<f64>,
    pub auto_eat: Option<AutoEat>,
    pub death: DeathPolicy,
    pub familiar_xp: Vec<f64>,
    pub xp_split: &'static [(Skill, f64)],
    pub modifiers: Modifiers,

    // Run state
    pub attack_timer: u32,
    pub regen_timer: u32,
    pub effects: EffectSet,
}

impl Player {
    /// Resolve a build against the catalog.
    ///
    /// Unknown prayers, potions or spells are configuration errors. Unknown
    /// equipment and food are data gaps: they are logged and ignored.
    pub fn from_config(build: &BuildConfig, ruleset: &Ruleset) -> Result<Self, ConfigError> {
        build.validate()?;
        let constants = &ruleset.constants;

        let mut stats = EquipmentStats::default();
        let mut modifiers = build.modifiers;
        let mut familiar_xp = Vec::new();
        for (slot, item_id) in &build.equipment {
            let Some(item) = ruleset.item(item_id) else {
                warn!(item = %item_id, slot = ?slot, "equipped item missing from catalog, ignoring");
                continue;
            };
            stats += item.stats;
            modifiers += item.modifiers;
            if slot.is_familiar() || item.category == ItemCategory::Familiar {
                familiar_xp.push(item.summoning_xp);
            }
        }

        let weapon = build.equipped(EquipSlot::Weapon).and_then(|id| ruleset.item(id));
        let attack_type = weapon.and_then(|w| w.attack_type).unwrap_or(AttackType::Melee);
        let uses_ammo = attack_type == AttackType::Ranged && build.equipped(EquipSlot::Quiver).is_some();

        let spell = match build.spells.active() {
            Some(id) => Some(ruleset.spells.get(id).ok_or_else(|| ConfigError::Unknown {
                kind: "spell",
                id: id.to_string(),
            })?),
            None => None,
        };
        if attack_type == AttackType::Magic && spell.is_none() {
            return Err(ConfigError::MissingSpell);
        }

        // Prayers
        let mut protect_from = None;
        let mut prayer_cost = 0.0;
        let mut prayer_xp_per_damage = 0.0;
        let mut holiness: Option<(&str, Holiness)> = None;
        for id in &build.prayers {
            let prayer = ruleset.prayers.get(id).ok_or_else(|| ConfigError::Unknown {
                kind: "prayer",
                id: id.clone(),
            })?;
            match holiness {
                Some((first, h)) if h != prayer.holiness => {
                    return Err(ConfigError::MixedHoliness { first: first.to_string(), second: id.clone() });
                }
                _ => holiness = Some((id.as_str(), prayer.holiness)),
            }
            if prayer.applies_to.map_or(true, |t| t == attack_type) {
                modifiers += prayer.modifiers;
            }
            protect_from = protect_from.or(prayer.protect_from);
            prayer_cost += prayer.cost;
            prayer_xp_per_damage += prayer.xp_per_damage;
        }

        let mut potion_charges = None;
        if let Some(id) = &build.potion {
            let potion = ruleset.potions.get(id).ok_or_else(|| ConfigError::Unknown {
                kind: "potion",
                id: id.clone(),
            })?;
            if potion.applies_to.map_or(true, |t| t == attack_type) {
                modifiers += potion.modifiers;
            }
            potion_charges = Some(potion.charges.max(1));
        }

        let food_heal = match &build.food {
            Some(id) => match ruleset.item(id) {
                Some(food) if food.heals_for > 0.0 => {
                    Some(food.heals_for * constants.number_multiplier * Modifiers::factor(modifiers.food_healing_pct))
                }
                _ => {
                    warn!(item = %id, "food missing from catalog or heals for nothing, auto-eat disabled");
                    None
                }
            },
            None => None,
        };

        let style = build.styles.bonus(attack_type);
        let level = |skill: Skill| build.get_level(skill) as f64;
        let eff_defence = level(Skill::Defence) + 9.0 + style.defence;
        let eff_magic = level(Skill::Magic) + 9.0;

        let (offence_skill, strength_skill) = match attack_type {
            AttackType::Melee => (Skill::Attack, Skill::Strength),
            AttackType::Ranged => (Skill::Ranged, Skill::Ranged),
            AttackType::Magic => (Skill::Magic, Skill::Magic),
        };
        let eff_attack = level(offence_skill) + 9.0 + style.accuracy;
        let accuracy = accuracy_rating(eff_attack, stats.attack_bonus(attack_type))
            * Modifiers::factor(modifiers.accuracy_pct);

        let base_max_hit = match (attack_type, spell) {
            (AttackType::Magic, Some(spell)) => {
                spell.max_hit * constants.number_multiplier * Modifiers::factor(stats.magic_damage_pct)
            }
            (AttackType::Melee, _) => strength_max_hit(
                constants.number_multiplier,
                level(strength_skill) + 9.0 + style.strength,
                stats.melee_strength,
            ),
            _ => strength_max_hit(
                constants.number_multiplier,
                level(strength_skill) + 9.0 + style.strength,
                stats.ranged_strength,
            ),
        };
        let max_hit = (base_max_hit * Modifiers::factor(modifiers.max_hit_pct)).floor().max(1.0);
        let min_hit = (max_hit * modifiers.min_hit_fraction.clamp(0.0, 1.0)).floor().max(1.0);

        let evasion =
            Evasion::from_levels(eff_defence, eff_magic, &stats).scaled(Modifiers::factor(modifiers.evasion_pct));
        let damage_reduction = (stats.damage_reduction + modifiers.damage_reduction).clamp(0.0, 95.0);

        let weapon_speed = weapon
            .and_then(|w| w.attack_speed_ms)
            .unwrap_or(constants.unarmed_attack_speed_ms) as f64;
        let interval_ms = (weapon_speed + style.interval_ms).max(constants.tick_ms as f64)
            * Modifiers::factor(modifiers.attack_interval_pct);

        let max_hp = level(Skill::Hitpoints) * constants.number_multiplier;
        let regen_amount = max_hp * constants.regen_fraction * Modifiers::factor(modifiers.hitpoint_regen_pct);

        let runes = spell
            .filter(|_| attack_type == AttackType::Magic)
            .map(|spell| {
                spell
                    .runes
                    .iter()
                    .map(|r| RuneCost {
                        item: r.item.clone(),
                        quantity: r.quantity,
                        combination: ruleset.item(&r.item).map_or(false, |i| i.combination_rune),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            attack_type,
            max_hp,
            hp: max_hp,
            accuracy,
            max_hit,
            min_hit: min_hit.min(max_hit),
            evasion,
            damage_reduction,
            attack_interval_ticks: constants.ms_to_ticks(interval_ms),
            regen_interval_ticks: constants.ms_to_ticks(constants.regen_interval_ms as f64),
            regen_amount,
            lifesteal: Modifiers::chance(modifiers.lifesteal_pct),
            special_attack: weapon.and_then(|w| w.special_attack.clone()),
            spell_effect: spell.filter(|_| attack_type == AttackType::Magic).and_then(|s| s.effect.clone()),
            runes,
            uses_ammo,
            protect_from,
            prayer_cost_per_attack: prayer_cost * (1.0 - Modifiers::chance(modifiers.prayer_cost_reduction_pct)),
            prayer_xp_per_damage,
            potion_charges,
            food_heal,
            auto_eat: build.auto_eat.params(),
            death: build.death,
            familiar_xp,
            xp_split: build.styles.xp_split(attack_type),
            modifiers,
            attack_timer: 1,
            regen_timer: 0,
            effects: EffectSet::new(),
        }
        .with_timers_reset())
    }

    fn with_timers_reset(mut self) -> Self {
        self.reset_timers();
        self
    }

    /// First attack lands on the first tick of combat
    pub fn reset_timers(&mut self) {
        self.attack_timer = 1;
        self.regen_timer = self.regen_interval_ticks;
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0.0
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

    /// Heal up to max hitpoints, returns the amount actually healed
    pub fn heal(&mut self, amount: f64) -> f64 {
        let before = self.hp;
        self.hp = (self.hp + amount.max(0.0)).min(self.max_hp);
        self.hp - before
    }

    /// Apply incoming damage, then auto-eat if still standing
    pub fn take_damage(&mut self, damage: f64, gains: &mut GainAccumulator) {
        self.hp -= damage;
        gains.record_hit_taken(damage);
        gains.record_hitpoints(self.hp.max(0.0));
        if !self.is_dead() {
            self.auto_eat(gains);
        }
    }

    /// Eat while below the auto-eat threshold, stopping at the eat-to level
    pub fn auto_eat(&mut self, gains: &mut GainAccumulator) -> u32 {
        let (Some(eat), Some(heal)) = (self.auto_eat, self.food_heal) else {
            return 0;
        };
        if self.hp >= self.max_hp * eat.threshold {
            return 0;
        }
        self.eat_until(self.max_hp * eat.eat_to, heal * eat.efficiency, gains)
    }

    fn eat_until(&mut self, target: f64, heal: f64, gains: &mut GainAccumulator) -> u32 {
        let mut eaten = 0;
        while self.hp < target && eaten < MAX_EATS_PER_PASS {
            self.heal(heal);
            eaten += 1;
        }
        gains.consume(Consumable::Food, eaten as f64);
        eaten
    }

    /// Bring the attacker back after a death according to the death policy
    pub fn revive(&mut self, gains: &mut GainAccumulator) {
        let restore = self.death.restore_fraction.clamp(0.0, 1.0);
        let target = (self.max_hp * restore).max(1.0);
        self.effects.clear();
        match self.food_heal {
            Some(heal) if self.death.eat_to_restore => {
                self.hp = 0.0;
                self.eat_until(target, heal, gains);
            }
            _ => self.hp = target,
        }
        self.reset_timers();
    }

    /// Passive regeneration, one call per tick
    pub fn regen_tick(&mut self) {
        self.regen_timer = self.regen_timer.saturating_sub(1);
        if self.regen_timer == 0 {
            self.regen_timer = self.regen_interval_ticks;
            if !self.is_dead() {
                self.heal(self.regen_amount);
            }
        }
    }

    /// Draw the supplies spent on one attack.
    ///
    /// `chance` supplies the preservation rolls so the caller owns the RNG.
    pub fn consume_attack_supplies(
        &self,
        mut chance: impl FnMut(f64) -> bool,
        gains: &mut GainAccumulator,
        xp_factor: f64,
    ) {
        let m = &self.modifiers;
        if self.uses_ammo && !chance(Modifiers::chance(m.ammo_preservation_pct)) {
            gains.consume(Consumable::Ammo, 1.0);
        }
        if !self.runes.is_empty() && !chance(Modifiers::chance(m.rune_preservation_pct)) {
            for rune in &self.runes {
                let kind = if rune.combination { Consumable::CombinationRunes } else { Consumable::Runes };
                gains.consume(kind, rune.quantity);
            }
        }
        gains.consume(Consumable::PrayerPoints, self.prayer_cost_per_attack);
        if let Some(charges) = self.potion_charges {
            if !chance(Modifiers::chance(m.potion_preservation_pct)) {
                gains.consume(Consumable::Potions, 1.0 / charges as f64);
            }
        }
        for &xp in &self.familiar_xp {
            if !chance(Modifiers::chance(m.summoning_preservation_pct)) {
                gains.consume(Consumable::SummoningCharges, 1.0);
                gains.add_xp(Skill::Summoning, xp * xp_factor);
            }
        }
    }

    /// Combat, hitpoints and prayer experience for damage dealt
    pub fn award_damage_xp(&self, damage: f64, constants: &Constants, gains: &mut GainAccumulator, xp_factor: f64) {
        for &(skill, share) in self.xp_split {
            gains.add_xp(skill, damage * constants.combat_xp_per_damage * share * xp_factor);
        }
        gains.add_xp(Skill::Hitpoints, damage * constants.hitpoints_xp_per_damage * xp_factor);
        gains.add_xp(Skill::Prayer, damage * self.prayer_xp_per_damage * xp_factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutoEatTier;
    use crate::ruleset::{ItemDef, ItemQuantity, PotionDef, PrayerDef, SpellDef, Spellbook};

    fn ruleset() -> Ruleset {
        let mut r = Ruleset::default();
        r.items.insert(
            "bronze_sword".into(),
            ItemDef {
                name: "Bronze Sword".into(),
                attack_type: Some(AttackType::Melee),
                attack_speed_ms: Some(2400),
                stats: EquipmentStats { melee_attack: 10.0, melee_strength: 8.0, ..Default::default() },
                ..Default::default()
            },
        );
        r.items.insert(
            "shrimp".into(),
            ItemDef { name: "Shrimp".into(), heals_for: 3.0, category: ItemCategory::Food, ..Default::default() },
        );
        r.items.insert(
            "staff".into(),
            ItemDef { name: "Staff".into(), attack_type: Some(AttackType::Magic), ..Default::default() },
        );
        r.prayers.insert(
            "thick_skin".into(),
            PrayerDef { name: "Thick Skin".into(), cost: 1.0, ..Default::default() },
        );
        r.prayers.insert(
            "unholy_mark".into(),
            PrayerDef { name: "Unholy Mark".into(), cost: 2.0, holiness: Holiness::Unholy, ..Default::default() },
        );
        r.potions.insert(
            "melee_potion".into(),
            PotionDef {
                name: "Melee Potion".into(),
                charges: 4,
                applies_to: Some(AttackType::Ranged),
                modifiers: Modifiers { accuracy_pct: 50.0, ..Default::default() },
            },
        );
        r.items.insert(
            "shortbow".into(),
            ItemDef { name: "Shortbow".into(), attack_type: Some(AttackType::Ranged), ..Default::default() },
        );
        r.items.insert(
            "arrows".into(),
            ItemDef { name: "Arrows".into(), category: ItemCategory::Ammo, ..Default::default() },
        );
        r.items.insert("air_rune".into(), ItemDef { name: "Air Rune".into(), ..Default::default() });
        r.items.insert(
            "mist_rune".into(),
            ItemDef { name: "Mist Rune".into(), combination_rune: true, ..Default::default() },
        );
        r.items.insert(
            "wolf_pouch".into(),
            ItemDef {
                name: "Wolf Pouch".into(),
                category: ItemCategory::Familiar,
                summoning_xp: 5.0,
                ..Default::default()
            },
        );
        r.spells.insert(
            "strike".into(),
            SpellDef {
                name: "Strike".into(),
                spellbook: Spellbook::Standard,
                max_hit: 3.0,
                runes: vec![
                    ItemQuantity { item: "air_rune".into(), quantity: 2.0 },
                    ItemQuantity { item: "mist_rune".into(), quantity: 1.0 },
                ],
                effect: None,
            },
        );
        r.spells.insert(
            "wind_strike".into(),
            SpellDef {
                name: "Wind Strike".into(),
                spellbook: Spellbook::Standard,
                max_hit: 2.0,
                runes: Vec::new(),
                effect: None,
            },
        );
        r
    }

    fn build() -> BuildConfig {
        let mut b = BuildConfig::default();
        b.levels.insert(Skill::Attack, 10);
        b.levels.insert(Skill::Strength, 10);
        b.levels.insert(Skill::Hitpoints, 20);
        b.equipment.insert(EquipSlot::Weapon, "bronze_sword".into());
        b
    }

    #[test]
    fn test_melee_stats() {
        let p = Player::from_config(&build(), &ruleset()).unwrap();
        assert_eq!(p.attack_type, AttackType::Melee);
        assert_eq!(p.max_hp, 200.0);
        // stab: +3 accuracy
        assert_eq!(p.accuracy, (10.0 + 9.0 + 3.0) * (10.0 + 64.0));
        // eff strength 19, bonus 8: 10 * (1.3 + 1.9 + 0.1 + 0.2375) = 35.375
        assert_eq!(p.max_hit, 35.0);
        assert_eq!(p.attack_interval_ticks, 48);
        assert_eq!(p.attack_timer, 1);
    }

    #[test]
    fn test_missing_equipment_is_ignored() {
        let mut b = build();
        b.equipment.insert(EquipSlot::Helmet, "no_such_helmet".into());
        assert!(Player::from_config(&b, &ruleset()).is_ok());
    }

    #[test]
    fn test_unknown_prayer_is_error() {
        let mut b = build();
        b.prayers.push("nope".into());
        assert!(matches!(Player::from_config(&b, &ruleset()), Err(ConfigError::Unknown { kind: "prayer", .. })));
    }

    #[test]
    fn test_mixed_holiness_rejected() {
        let mut b = build();
        b.prayers = vec!["thick_skin".into(), "unholy_mark".into()];
        assert!(matches!(Player::from_config(&b, &ruleset()), Err(ConfigError::MixedHoliness { .. })));
    }

    #[test]
    fn test_potion_only_applies_to_its_style() {
        let mut b = build();
        let base = Player::from_config(&b, &ruleset()).unwrap();
        b.potion = Some("melee_potion".into());
        let with_potion = Player::from_config(&b, &ruleset()).unwrap();
        assert_eq!(base.accuracy, with_potion.accuracy);
        assert_eq!(with_potion.potion_charges, Some(4));
    }

    #[test]
    fn test_magic_requires_spell() {
        let mut b = build();
        b.equipment.insert(EquipSlot::Weapon, "staff".into());
        assert!(matches!(Player::from_config(&b, &ruleset()), Err(ConfigError::MissingSpell)));
        b.spells.standard = Some("wind_strike".into());
        let p = Player::from_config(&b, &ruleset()).unwrap();
        assert_eq!(p.attack_type, AttackType::Magic);
        assert_eq!(p.max_hit, 20.0);
    }

    #[test]
    fn test_auto_eat_and_revive() {
        let mut b = build();
        b.food = Some("shrimp".into());
        b.auto_eat = AutoEatTier::Tier1;
        let mut p = Player::from_config(&b, &ruleset()).unwrap();
        let mut gains = GainAccumulator::new();

        p.take_damage(170.0, &mut gains);
        // 30 hp < 40 threshold, eat 30 at a time up to 160
        assert_eq!(p.hp, 180.0);
        assert_eq!(gains.consumed(Consumable::Food), 5.0);

        p.take_damage(500.0, &mut gains);
        assert!(p.is_dead());
        p.revive(&mut gains);
        assert_eq!(p.hp, p.max_hp);
    }

    #[test]
    fn test_regen_on_interval() {
        let mut p = Player::from_config(&build(), &ruleset()).unwrap();
        p.hp = 100.0;
        for _ in 0..p.regen_interval_ticks - 1 {
            p.regen_tick();
        }
        assert_eq!(p.hp, 100.0);
        p.regen_tick();
        assert_eq!(p.hp, 102.0);
    }

    #[test]
    fn test_ammo_drawn_from_quiver() {
        let mut b = build();
        b.equipment.insert(EquipSlot::Weapon, "shortbow".into());
        let bare = Player::from_config(&b, &ruleset()).unwrap();
        assert!(!bare.uses_ammo);

        b.equipment.insert(EquipSlot::Quiver, "arrows".into());
        let p = Player::from_config(&b, &ruleset()).unwrap();
        assert!(p.uses_ammo);
        let mut gains = GainAccumulator::new();
        for _ in 0..10 {
            p.consume_attack_supplies(|_| false, &mut gains, 1.0);
        }
        assert_eq!(gains.consumed(Consumable::Ammo), 10.0);
        assert_eq!(gains.consumed(Consumable::Runes), 0.0);
    }

    #[test]
    fn test_full_preservation_saves_every_arrow() {
        let mut b = build();
        b.equipment.insert(EquipSlot::Weapon, "shortbow".into());
        b.equipment.insert(EquipSlot::Quiver, "arrows".into());
        b.modifiers.ammo_preservation_pct = 100.0;
        let p = Player::from_config(&b, &ruleset()).unwrap();
        let mut gains = GainAccumulator::new();
        let mut rolls = Vec::new();
        for _ in 0..10 {
            p.consume_attack_supplies(
                |chance| {
                    rolls.push(chance);
                    chance >= 1.0
                },
                &mut gains,
                1.0,
            );
        }
        assert_eq!(gains.consumed(Consumable::Ammo), 0.0);
        assert_eq!(rolls, vec![1.0; 10]);
    }

    #[test]
    fn test_runes_split_by_kind() {
        let mut b = build();
        b.equipment.insert(EquipSlot::Weapon, "staff".into());
        b.spells.standard = Some("strike".into());
        let p = Player::from_config(&b, &ruleset()).unwrap();
        assert_eq!(p.max_hit, 30.0);
        let mut gains = GainAccumulator::new();
        for _ in 0..10 {
            p.consume_attack_supplies(|_| false, &mut gains, 1.0);
        }
        assert_eq!(gains.consumed(Consumable::Runes), 20.0);
        assert_eq!(gains.consumed(Consumable::CombinationRunes), 10.0);
        assert_eq!(gains.consumed(Consumable::Ammo), 0.0);
    }

    #[test]
    fn test_spell_on_melee_weapon_casts_nothing() {
        let mut b = build();
        b.spells.standard = Some("strike".into());
        let p = Player::from_config(&b, &ruleset()).unwrap();
        assert_eq!(p.attack_type, AttackType::Melee);
        assert!(p.runes.is_empty());
    }

    #[test]
    fn test_potion_and_prayer_drain_per_attack() {
        let mut b = build();
        b.potion = Some("melee_potion".into());
        b.prayers = vec!["thick_skin".into()];
        let p = Player::from_config(&b, &ruleset()).unwrap();
        let mut gains = GainAccumulator::new();
        for _ in 0..8 {
            p.consume_attack_supplies(|_| false, &mut gains, 1.0);
        }
        // four charges per potion
        assert_eq!(gains.consumed(Consumable::Potions), 2.0);
        assert_eq!(gains.consumed(Consumable::PrayerPoints), 8.0);
    }

    #[test]
    fn test_familiar_charges_grant_summoning_xp() {
        let mut b = build();
        b.equipment.insert(EquipSlot::Summon1, "wolf_pouch".into());
        let p = Player::from_config(&b, &ruleset()).unwrap();
        assert_eq!(p.familiar_xp, vec![5.0]);

        let mut gains = GainAccumulator::new();
        for _ in 0..3 {
            p.consume_attack_supplies(|_| false, &mut gains, 2.0);
        }
        assert_eq!(gains.consumed(Consumable::SummoningCharges), 3.0);
        assert_eq!(gains.xp(Skill::Summoning), 30.0);

        // A preserved charge grants no experience either
        let mut preserved = GainAccumulator::new();
        p.consume_attack_supplies(|_| true, &mut preserved, 1.0);
        assert_eq!(preserved.consumed(Consumable::SummoningCharges), 0.0);
        assert_eq!(preserved.xp(Skill::Summoning), 0.0);
    }
}
