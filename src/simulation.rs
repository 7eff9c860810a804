//! Tick-based combat engine: one attacker against one monster, respawning on kill

use crate::config::{AttackType, Skill};
use crate::enemy::Enemy;
use crate::modifiers::Modifiers;
use crate::player::Player;
use crate::ruleset::{Constants, MonsterDef, SpecialAttackDef};
use crate::stats::GainAccumulator;
use tracing::trace;

/// Fast RNG wrapper for better performance
#[derive(Clone)]
pub struct FastRng {
    inner: fastrand::Rng,
}

impl FastRng {
    #[inline(always)]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: fastrand::Rng::with_seed(seed),
        }
    }

    /// Seeded from the thread-local generator
    pub fn from_entropy() -> Self {
        Self::new(rand::random::<u64>())
    }

    #[inline(always)]
    pub fn f64(&mut self) -> f64 {
        self.inner.f64()
    }

    /// True with probability `p`
    #[inline(always)]
    pub fn chance(&mut self, p: f64) -> bool {
        p >= 1.0 || (p > 0.0 && self.inner.f64() < p)
    }

    /// Uniform whole number in `[min, max]`
    #[inline(always)]
    pub fn roll_inclusive(&mut self, min: f64, max: f64) -> f64 {
        let low = min.max(0.0) as u32;
        let high = max.max(0.0) as u32;
        if high <= low {
            return low as f64;
        }
        self.inner.u32(low..=high) as f64
    }
}

/// Chance for an attack with `accuracy` to land against `evasion`
pub fn hit_chance(accuracy: f64, evasion: f64) -> f64 {
    if evasion <= 0.0 {
        1.0
    } else if accuracy <= 0.0 {
        0.0
    } else if accuracy < evasion {
        0.5 * accuracy / evasion
    } else {
        1.0 - 0.5 * evasion / accuracy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combatant {
    Player,
    Monster,
}

/// Where the encounter stands between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatPhase {
    Idle,
    Spawning { ticks_left: u32 },
    InCombat,
    Dead(Combatant),
    StoppedByCaller,
}

/// What a single tick produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    Idle,
    Spawning,
    Spawned,
    Exchanged,
    MonsterKilled,
    PlayerDied,
}

/// One encounter's combat loop.
///
/// Each trial ends in exactly one kill or one death; after either the phase
/// is `Dead` until the caller starts the next spawn.
pub struct CombatSim<'a> {
    constants: &'a Constants,
    monster: &'a MonsterDef,
    player: Player,
    enemy: Enemy,
    phase: CombatPhase,
    spawn_ticks: u32,
    on_task: bool,
    xp_factor: f64,
    gains: GainAccumulator,
    kills: u32,
    deaths: u32,
    rng: FastRng,
}

impl<'a> CombatSim<'a> {
    pub fn new(constants: &'a Constants, monster: &'a MonsterDef, player: Player, on_task: bool, rng: FastRng) -> Self {
        let spawn_ms = constants.spawn_interval_ms as f64 * Modifiers::factor(player.modifiers.spawn_interval_pct);
        let xp_factor = Modifiers::factor(player.modifiers.xp_pct);
        Self {
            constants,
            monster,
            enemy: Enemy::new(monster, constants),
            player,
            phase: CombatPhase::Idle,
            spawn_ticks: constants.ms_to_ticks(spawn_ms),
            on_task,
            xp_factor,
            gains: GainAccumulator::new(),
            kills: 0,
            deaths: 0,
            rng,
        }
    }

    pub fn phase(&self) -> CombatPhase {
        self.phase
    }

    /// Spawning or fighting
    pub fn is_engaged(&self) -> bool {
        matches!(self.phase, CombatPhase::Spawning { .. } | CombatPhase::InCombat)
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn deaths(&self) -> u32 {
        self.deaths
    }

    pub fn gains(&self) -> &GainAccumulator {
        &self.gains
    }

    pub fn into_gains(self) -> GainAccumulator {
        self.gains
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn enemy(&self) -> &Enemy {
        &self.enemy
    }

    /// Start the next trial's spawn wait. No-op while engaged or stopped.
    pub fn begin_spawn(&mut self) {
        if matches!(self.phase, CombatPhase::Idle | CombatPhase::Dead(_)) {
            self.phase = CombatPhase::Spawning { ticks_left: self.spawn_ticks };
        }
    }

    /// Halt the encounter; further ticks do nothing
    pub fn stop(&mut self) {
        self.phase = CombatPhase::StoppedByCaller;
    }

    /// Advance one tick
    pub fn tick(&mut self) -> TickEvent {
        match self.phase {
            CombatPhase::Idle | CombatPhase::Dead(_) | CombatPhase::StoppedByCaller => TickEvent::Idle,
            CombatPhase::Spawning { ticks_left } => {
                // Only regeneration runs while waiting for a spawn
                self.player.regen_tick();
                if ticks_left > 1 {
                    self.phase = CombatPhase::Spawning { ticks_left: ticks_left - 1 };
                    TickEvent::Spawning
                } else {
                    self.enemy.respawn();
                    self.player.attack_timer = 1;
                    self.phase = CombatPhase::InCombat;
                    TickEvent::Spawned
                }
            }
            CombatPhase::InCombat => self.combat_tick(),
        }
    }

    fn combat_tick(&mut self) -> TickEvent {
        // Player action
        self.player.attack_timer = self.player.attack_timer.saturating_sub(1);
        if self.player.attack_timer == 0 {
            self.player.attack_timer = self.player.attack_interval_ticks;
            if !self.player.effects.is_stunned() {
                player_attack(
                    &mut self.player,
                    &mut self.enemy,
                    &mut self.rng,
                    &mut self.gains,
                    self.constants,
                    self.xp_factor,
                );
                if self.enemy.is_dead() {
                    return self.on_kill();
                }
            }
        }

        // Monster action
        self.enemy.attack_timer = self.enemy.attack_timer.saturating_sub(1);
        if self.enemy.attack_timer == 0 {
            self.enemy.attack_timer = self.enemy.attack_interval_ticks;
            if !self.enemy.effects.is_stunned() {
                enemy_attack(&mut self.player, &mut self.enemy, &mut self.rng, &mut self.gains, self.constants);
                if self.player.is_dead() {
                    return self.on_death();
                }
            }
        }

        // Damage over time
        let dot = self.enemy.effects.tick();
        if dot > 0.0 {
            let dealt = self.enemy.take_damage(dot);
            self.gains.record_damage_dealt(dealt);
            if self.enemy.is_dead() {
                return self.on_kill();
            }
        }
        let dot = self.player.effects.tick();
        if dot > 0.0 {
            self.player.take_damage(dot, &mut self.gains);
            if self.player.is_dead() {
                return self.on_death();
            }
        }

        self.player.regen_tick();
        self.enemy.regen_tick();
        TickEvent::Exchanged
    }

    fn on_kill(&mut self) -> TickEvent {
        self.kills += 1;
        let m = self.player.modifiers;

        let gp = self.monster.gp.min + self.rng.f64() * (self.monster.gp.max - self.monster.gp.min).max(0.0);
        self.gains.add_gp(gp * Modifiers::factor(m.gp_pct));

        if self.on_task {
            let slayer_xp = self.monster.slayer_xp(self.constants) * Modifiers::factor(m.xp_pct + m.slayer_xp_pct);
            self.gains.add_xp(Skill::Slayer, slayer_xp);
            self.gains
                .add_slayer_coins(self.monster.slayer_coins * Modifiers::factor(m.slayer_coins_pct));
        }

        self.player.effects.clear();
        self.enemy.effects.clear();
        self.phase = CombatPhase::Dead(Combatant::Monster);
        trace!(monster = %self.enemy.name, kills = self.kills, "monster killed");
        TickEvent::MonsterKilled
    }

    fn on_death(&mut self) -> TickEvent {
        self.deaths += 1;
        self.player.revive(&mut self.gains);
        self.enemy.effects.clear();
        self.phase = CombatPhase::Dead(Combatant::Player);
        trace!(monster = %self.enemy.name, deaths = self.deaths, "player died");
        TickEvent::PlayerDied
    }
}

/// Apply the damage pipeline shared by both sides: triangle, then damage reduction
fn resolve_damage(
    roll: f64,
    special: Option<&SpecialAttackDef>,
    attacker: AttackType,
    defender: AttackType,
    dr: f64,
) -> f64 {
    let multiplier = special.map_or(1.0, |s| s.damage_multiplier);
    let reduction = (dr * attacker.triangle_reduction(defender)).clamp(0.0, 95.0);
    (roll * multiplier * attacker.triangle_damage(defender) * (1.0 - reduction / 100.0))
        .floor()
        .max(1.0)
}

fn player_attack(
    player: &mut Player,
    enemy: &mut Enemy,
    rng: &mut FastRng,
    gains: &mut GainAccumulator,
    constants: &Constants,
    xp_factor: f64,
) {
    player.consume_attack_supplies(|p| rng.chance(p), gains, xp_factor);
    gains.add_prayer_points(player.modifiers.prayer_points_per_hit);

    let special = player.special_attack.as_ref().filter(|s| rng.chance(s.chance));
    let always_hits = special.map_or(false, |s| s.always_hits);
    let landed = always_hits
        || rng.chance(hit_chance(
            player.effective_accuracy(),
            enemy.effective_evasion(player.attack_type),
        ));
    if !landed {
        gains.record_attack(false, 0.0);
        return;
    }

    let roll = rng.roll_inclusive(player.min_hit, player.max_hit);
    let damage = resolve_damage(
        roll,
        special,
        player.attack_type,
        enemy.attack_type,
        enemy.effective_damage_reduction(),
    );
    let dealt = enemy.take_damage(damage);
    gains.record_attack(true, dealt);
    player.award_damage_xp(dealt, constants, gains, xp_factor);

    if let Some(effect) = special.and_then(|s| s.effect.as_ref()) {
        enemy.effects.apply(effect);
    }
    if let Some(effect) = &player.spell_effect {
        enemy.effects.apply(effect);
    }
    if player.lifesteal > 0.0 {
        let healed = dealt * player.lifesteal;
        player.heal(healed);
    }
}

fn enemy_attack(
    player: &mut Player,
    enemy: &mut Enemy,
    rng: &mut FastRng,
    gains: &mut GainAccumulator,
    constants: &Constants,
) {
    let special = enemy.roll_special(rng).cloned();

    if player.protect_from == Some(enemy.attack_type) && rng.chance(constants.protection_prayer_chance) {
        return;
    }
    let always_hits = special.as_ref().map_or(false, |s| s.always_hits);
    let landed = always_hits
        || rng.chance(hit_chance(
            enemy.effective_accuracy(),
            player.effective_evasion(enemy.attack_type),
        ));
    if !landed {
        return;
    }

    let roll = rng.roll_inclusive(1.0, enemy.max_hit);
    let damage = resolve_damage(
        roll,
        special.as_ref(),
        enemy.attack_type,
        player.attack_type,
        player.effective_damage_reduction(),
    );
    player.take_damage(damage, gains);
    if player.is_dead() {
        return;
    }
    if let Some(effect) = special.as_ref().and_then(|s| s.effect.as_ref()) {
        player.effects.apply(effect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildConfig, EquipSlot};
    use crate::ruleset::Ruleset;

    const RULESET: &str = r#"
items:
  sword:
    name: Sword
    attack_type: melee
    attack_speed_ms: 2400
    stats: {melee_attack: 20, melee_strength: 20}
  great_axe:
    name: Great Axe
    attack_type: melee
    attack_speed_ms: 3000
    special_attack:
      name: Cleave
      chance: 1.0
      damage_multiplier: 2.0
      always_hits: true
      effect: {type: stun, ticks: 5}
  staff:
    name: Staff
    attack_type: magic
spells:
  fire_strike:
    name: Fire Strike
    spellbook: standard
    max_hit: 2
    effect: {type: damage_over_time, kind: burn, damage_per_proc: 7, procs: 3, interval_ticks: 1}
prayers:
  protect_from_melee:
    name: Protect from Melee
    cost: 1
    protect_from: melee
monsters:
  dummy:
    name: Training Dummy
    hitpoints: 1
    attack_type: melee
    attack_speed_ms: 3000
    stats: {melee_defence: -64, ranged_defence: -64, magic_defence: -64}
    gp: {min: 10, max: 10}
    slayer_coins: 5
  brute:
    name: Brute
    hitpoints: 100000
    attack_type: melee
    attack_speed_ms: 600
    levels: {attack: 200, strength: 200, defence: 200}
    stats: {melee_attack: 500}
  post:
    name: Training Post
    hitpoints: 100000
    attack_type: melee
    attack_speed_ms: 3600000000
    stats: {melee_defence: -64}
  ward:
    name: Ward
    hitpoints: 100000
    attack_type: magic
    attack_speed_ms: 3600000000
    stats: {magic_defence: -64}
  fortress:
    name: Fortress
    hitpoints: 100000
    attack_type: melee
    attack_speed_ms: 3600000000
    levels: {defence: 1000}
"#;

    fn setup() -> (Ruleset, BuildConfig) {
        let ruleset = Ruleset::from_yaml_str(RULESET).unwrap();
        let build = BuildConfig::from_yaml_str("equipment:\n  weapon: sword\nlevels:\n  hitpoints: 10\n").unwrap();
        (ruleset, build)
    }

    /// Tick through the spawn wait and return once combat has started
    fn engage(sim: &mut CombatSim<'_>) {
        sim.begin_spawn();
        while sim.tick() != TickEvent::Spawned {}
    }

    #[test]
    fn test_hit_chance_curve() {
        assert_eq!(hit_chance(100.0, 0.0), 1.0);
        assert_eq!(hit_chance(0.0, 100.0), 0.0);
        assert_eq!(hit_chance(50.0, 100.0), 0.25);
        assert_eq!(hit_chance(100.0, 100.0), 0.5);
        assert_eq!(hit_chance(200.0, 100.0), 0.75);
    }

    #[test]
    fn test_roll_inclusive_bounds() {
        let mut rng = FastRng::new(1);
        for _ in 0..1000 {
            let r = rng.roll_inclusive(3.0, 5.0);
            assert!((3.0..=5.0).contains(&r));
        }
        assert_eq!(rng.roll_inclusive(4.0, 4.0), 4.0);
    }

    #[test]
    fn test_phase_transitions() {
        let (ruleset, build) = setup();
        let player = Player::from_config(&build, &ruleset).unwrap();
        let monster = ruleset.monster("dummy").unwrap();
        let mut sim = CombatSim::new(&ruleset.constants, monster, player, false, FastRng::new(3));

        assert_eq!(sim.phase(), CombatPhase::Idle);
        assert_eq!(sim.tick(), TickEvent::Idle);

        sim.begin_spawn();
        assert_eq!(sim.phase(), CombatPhase::Spawning { ticks_left: 60 });
        for _ in 0..59 {
            assert_eq!(sim.tick(), TickEvent::Spawning);
        }
        assert_eq!(sim.tick(), TickEvent::Spawned);
        assert_eq!(sim.phase(), CombatPhase::InCombat);

        // Zero evasion always hits, a 1 hp monster always dies
        assert_eq!(sim.tick(), TickEvent::MonsterKilled);
        assert_eq!(sim.phase(), CombatPhase::Dead(Combatant::Monster));
        assert_eq!(sim.kills(), 1);
        assert_eq!(sim.gains().gp(), 10.0);
        assert_eq!(sim.gains().slayer_coins(), 0.0);
        assert_eq!(sim.gains().damage_dealt(), 1.0);
    }

    #[test]
    fn test_slayer_rewards_on_task() {
        let (ruleset, build) = setup();
        let player = Player::from_config(&build, &ruleset).unwrap();
        let monster = ruleset.monster("dummy").unwrap();
        let mut sim = CombatSim::new(&ruleset.constants, monster, player, true, FastRng::new(3));
        sim.begin_spawn();
        while sim.kills() == 0 {
            sim.tick();
        }
        assert_eq!(sim.gains().slayer_coins(), 5.0);
        assert_eq!(sim.gains().xp(Skill::Slayer), 0.1);
    }

    #[test]
    fn test_overpowered_monster_kills_player() {
        let (ruleset, build) = setup();
        let player = Player::from_config(&build, &ruleset).unwrap();
        let monster = ruleset.monster("brute").unwrap();
        let mut sim = CombatSim::new(&ruleset.constants, monster, player, false, FastRng::new(11));
        sim.begin_spawn();
        let mut ticks = 0;
        while sim.deaths() == 0 && ticks < 100_000 {
            sim.tick();
            ticks += 1;
        }
        assert_eq!(sim.deaths(), 1);
        assert_eq!(sim.kills(), 0);
        assert_eq!(sim.phase(), CombatPhase::Dead(Combatant::Player));
        // Default death policy restores full hitpoints
        assert_eq!(sim.player().hp, sim.player().max_hp);
        assert!(sim.gains().highest_hit_taken() > 0.0);
    }

    #[test]
    fn test_stop_freezes_encounter() {
        let (ruleset, build) = setup();
        let player = Player::from_config(&build, &ruleset).unwrap();
        let monster = ruleset.monster("dummy").unwrap();
        let mut sim = CombatSim::new(&ruleset.constants, monster, player, false, FastRng::new(3));
        sim.begin_spawn();
        sim.stop();
        assert_eq!(sim.tick(), TickEvent::Idle);
        sim.begin_spawn();
        assert_eq!(sim.phase(), CombatPhase::StoppedByCaller);
    }

    #[test]
    fn test_protection_prayer_blocks_matching_attacks() {
        let (mut ruleset, mut build) = setup();
        ruleset.constants.protection_prayer_chance = 1.0;
        build.prayers.push("protect_from_melee".into());
        let player = Player::from_config(&build, &ruleset).unwrap();
        assert_eq!(player.protect_from, Some(AttackType::Melee));

        let monster = ruleset.monster("brute").unwrap();
        let mut sim = CombatSim::new(&ruleset.constants, monster, player, false, FastRng::new(11));
        sim.begin_spawn();
        for _ in 0..2_000 {
            sim.tick();
        }
        assert_eq!(sim.deaths(), 0);
        assert_eq!(sim.gains().damage_taken(), 0.0);
        assert_eq!(sim.player().hp, sim.player().max_hp);
    }

    #[test]
    fn test_lifesteal_heals_share_of_damage() {
        let (ruleset, mut build) = setup();
        build.modifiers.lifesteal_pct = 50.0;
        let mut player = Player::from_config(&build, &ruleset).unwrap();
        player.hp = 40.0;

        let monster = ruleset.monster("post").unwrap();
        let mut sim = CombatSim::new(&ruleset.constants, monster, player, false, FastRng::new(5));
        engage(&mut sim);
        assert_eq!(sim.tick(), TickEvent::Exchanged);

        let dealt = sim.gains().damage_dealt();
        assert!(dealt >= 1.0);
        assert_eq!(sim.player().hp, 40.0 + dealt * 0.5);
    }

    #[test]
    fn test_weapon_special_always_hits_for_double() {
        let (ruleset, mut build) = setup();
        build.equipment.insert(EquipSlot::Weapon, "great_axe".into());
        build.modifiers.min_hit_fraction = 1.0;
        let player = Player::from_config(&build, &ruleset).unwrap();
        let max_hit = player.max_hit;
        let interval = player.attack_interval_ticks;

        let monster = ruleset.monster("fortress").unwrap();
        let enemy = Enemy::new(monster, &ruleset.constants);
        assert!(hit_chance(player.accuracy, enemy.evasion.melee) < 0.01);

        let mut sim = CombatSim::new(&ruleset.constants, monster, player, false, FastRng::new(9));
        engage(&mut sim);
        sim.tick();
        assert_eq!(sim.gains().damage_dealt(), 2.0 * max_hit);
        assert!(sim.enemy().effects.is_stunned());

        for _ in 0..interval * 4 {
            sim.tick();
        }
        assert_eq!(sim.gains().attacks_made(), 5);
        assert_eq!(sim.gains().hits_landed(), 5);
        assert_eq!(sim.gains().damage_dealt(), 10.0 * max_hit);
    }

    #[test]
    fn test_spell_effect_burns_through_combat_ticks() {
        let (ruleset, mut build) = setup();
        build.equipment.insert(EquipSlot::Weapon, "staff".into());
        build.spells.standard = Some("fire_strike".into());
        build.modifiers.min_hit_fraction = 1.0;
        let player = Player::from_config(&build, &ruleset).unwrap();
        assert_eq!(player.max_hit, 20.0);

        let monster = ruleset.monster("ward").unwrap();
        let mut sim = CombatSim::new(&ruleset.constants, monster, player, false, FastRng::new(2));
        engage(&mut sim);

        // The burn lands with the hit and procs on the same tick
        sim.tick();
        assert_eq!(sim.gains().damage_dealt(), 27.0);
        sim.tick();
        sim.tick();
        assert_eq!(sim.gains().damage_dealt(), 41.0);
        sim.tick();
        assert_eq!(sim.gains().damage_dealt(), 41.0);
        assert_eq!(sim.enemy().hp, 100_000.0 - 41.0);
    }
}
