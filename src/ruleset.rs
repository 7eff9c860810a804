//! Read-only game data snapshot handed to every simulation call.
//!
//! Bundles the global constants and lookup tables (items, monsters, dungeons,
//! slayer tasks, spells, prayers, potions) so a worker never reaches for
//! ambient state.

use crate::config::{load_document, AttackType, BuildConfig, Skill};
use crate::effects::EffectDef;
use crate::error::ConfigError;
use crate::loot::DropTable;
use crate::modifiers::Modifiers;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Global numeric rules of the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constants {
    pub tick_ms: u32,
    /// Game units per displayed hitpoint
    pub number_multiplier: f64,
    pub spawn_interval_ms: u32,
    pub regen_interval_ms: u32,
    pub regen_fraction: f64,
    pub unarmed_attack_speed_ms: u32,
    pub combat_xp_per_damage: f64,
    pub hitpoints_xp_per_damage: f64,
    /// Chance a protection prayer blocks an attack of its type outright
    pub protection_prayer_chance: f64,
    pub alchemy: AlchemyRules,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            number_multiplier: 10.0,
            spawn_interval_ms: 3000,
            regen_interval_ms: 10_000,
            regen_fraction: 0.01,
            unarmed_attack_speed_ms: 2400,
            combat_xp_per_damage: 0.4,
            hitpoints_xp_per_damage: 0.133,
            protection_prayer_chance: 0.85,
            alchemy: AlchemyRules::default(),
        }
    }
}

impl Constants {
    pub fn ticks_per_second(&self) -> f64 {
        1000.0 / self.tick_ms.max(1) as f64
    }

    /// Convert a duration in milliseconds to whole ticks, never below one
    pub fn ms_to_ticks(&self, ms: f64) -> u32 {
        (ms / self.tick_ms.max(1) as f64).round().max(1.0) as u32
    }
}

/// Gold yield and timing of the alchemy action used for auto-alchemizing loot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlchemyRules {
    pub gold_multiplier: f64,
    pub seconds_per_cast: f64,
    pub items_per_cast: f64,
}

impl Default for AlchemyRules {
    fn default() -> Self {
        Self { gold_multiplier: 1.0, seconds_per_cast: 2.0, items_per_cast: 1.0 }
    }
}

/// Offensive and defensive equipment bonuses
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipmentStats {
    pub melee_attack: f64,
    pub melee_strength: f64,
    pub ranged_attack: f64,
    pub ranged_strength: f64,
    pub magic_attack: f64,
    pub magic_damage_pct: f64,
    pub melee_defence: f64,
    pub ranged_defence: f64,
    pub magic_defence: f64,
    pub damage_reduction: f64,
}

impl std::ops::AddAssign for EquipmentStats {
    fn add_assign(&mut self, o: Self) {
        self.melee_attack += o.melee_attack;
        self.melee_strength += o.melee_strength;
        self.ranged_attack += o.ranged_attack;
        self.ranged_strength += o.ranged_strength;
        self.magic_attack += o.magic_attack;
        self.magic_damage_pct += o.magic_damage_pct;
        self.melee_defence += o.melee_defence;
        self.ranged_defence += o.ranged_defence;
        self.magic_defence += o.magic_defence;
        self.damage_reduction += o.damage_reduction;
    }
}

impl EquipmentStats {
    pub fn attack_bonus(&self, attack_type: AttackType) -> f64 {
        match attack_type {
            AttackType::Melee => self.melee_attack,
            AttackType::Ranged => self.ranged_attack,
            AttackType::Magic => self.magic_attack,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Bones,
    Shard,
    Container,
    Food,
    Ammo,
    Rune,
    Equipment,
    Familiar,
    #[default]
    Misc,
}

/// Scripted special attack of a weapon or monster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialAttackDef {
    pub name: String,
    /// Chance in `[0, 1]` to replace a normal attack
    pub chance: f64,
    #[serde(default = "one")]
    pub damage_multiplier: f64,
    #[serde(default)]
    pub always_hits: bool,
    #[serde(default)]
    pub effect: Option<EffectDef>,
}

/// Bulk conversion of shards into a container item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardConversion {
    pub container: String,
    pub required: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    pub name: String,
    #[serde(default)]
    pub sell_price: f64,
    #[serde(default)]
    pub category: ItemCategory,
    #[serde(default)]
    pub attack_type: Option<AttackType>,
    #[serde(default)]
    pub attack_speed_ms: Option<u32>,
    #[serde(default)]
    pub stats: EquipmentStats,
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Hitpoints healed when eaten, in displayed units (scaled by `number_multiplier`)
    #[serde(default)]
    pub heals_for: f64,
    #[serde(default)]
    pub special_attack: Option<SpecialAttackDef>,
    /// Contents of a container item
    #[serde(default)]
    pub opens: Option<DropTable>,
    #[serde(default)]
    pub conversion: Option<ShardConversion>,
    #[serde(default)]
    pub combination_rune: bool,
    /// Summoning experience per familiar charge used
    #[serde(default)]
    pub summoning_xp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonsterLevels {
    pub attack: u32,
    pub strength: u32,
    pub defence: u32,
    pub ranged: u32,
    pub magic: u32,
}

impl Default for MonsterLevels {
    fn default() -> Self {
        Self { attack: 1, strength: 1, defence: 1, ranged: 1, magic: 1 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemQuantity {
    pub item: String,
    #[serde(default = "one")]
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterDef {
    pub name: String,
    /// Max hitpoints in game units
    pub hitpoints: f64,
    pub attack_type: AttackType,
    #[serde(default = "default_attack_speed")]
    pub attack_speed_ms: u32,
    #[serde(default)]
    pub levels: MonsterLevels,
    #[serde(default)]
    pub stats: EquipmentStats,
    #[serde(default)]
    pub special_attacks: Vec<SpecialAttackDef>,
    #[serde(default)]
    pub gp: GpRange,
    /// Chance in `[0, 1]` that the drop table is rolled at all
    #[serde(default = "one")]
    pub loot_chance: f64,
    #[serde(default)]
    pub drop_table: Option<DropTable>,
    #[serde(default)]
    pub bones: Option<ItemQuantity>,
    #[serde(default)]
    pub slayer_coins: f64,
    #[serde(default)]
    pub signet_chance: f64,
    #[serde(default)]
    pub pet_chance: f64,
    #[serde(default)]
    pub passive_regen_fraction: f64,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

impl MonsterDef {
    /// Slayer experience for one kill on task
    pub fn slayer_xp(&self, constants: &Constants) -> f64 {
        self.hitpoints / constants.number_multiplier
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DungeonDef {
    pub name: String,
    /// Fought in order, repeats allowed
    pub monsters: Vec<String>,
    #[serde(default)]
    pub rewards: Vec<ItemQuantity>,
    #[serde(default)]
    pub reward_table: Option<DropTable>,
    #[serde(default)]
    pub pet_chance: f64,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMonster {
    pub monster: String,
    #[serde(default = "one")]
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlayerTaskDef {
    pub name: String,
    pub monsters: Vec<TaskMonster>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Spellbook {
    Standard,
    Ancient,
    Archaic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellDef {
    pub name: String,
    pub spellbook: Spellbook,
    /// Base max hit in displayed units (scaled by `number_multiplier`)
    pub max_hit: f64,
    #[serde(default)]
    pub runes: Vec<ItemQuantity>,
    #[serde(default)]
    pub effect: Option<EffectDef>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Holiness {
    #[default]
    Normal,
    Unholy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrayerDef {
    pub name: String,
    /// Prayer points drained per player attack
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub holiness: Holiness,
    /// Bonuses only apply while attacking with this type; `None` applies always
    #[serde(default)]
    pub applies_to: Option<AttackType>,
    #[serde(default)]
    pub protect_from: Option<AttackType>,
    #[serde(default)]
    pub xp_per_damage: f64,
    #[serde(default)]
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotionDef {
    pub name: String,
    #[serde(default = "one_u32")]
    pub charges: u32,
    #[serde(default)]
    pub applies_to: Option<AttackType>,
    #[serde(default)]
    pub modifiers: Modifiers,
}

/// Entry requirement of a monster, dungeon or slayer task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Requirement {
    SkillLevel { skill: Skill, level: u32 },
    ItemEquipped { item: String },
}

impl Requirement {
    pub fn is_met(&self, build: &BuildConfig) -> bool {
        match self {
            Requirement::SkillLevel { skill, level } => build.get_level(*skill) >= *level,
            Requirement::ItemEquipped { item } => build.has_equipped(item),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::SkillLevel { skill, level } => write!(f, "{:?} level {}", skill, level),
            Requirement::ItemEquipped { item } => write!(f, "{} equipped", item),
        }
    }
}

/// What the caller asked to evaluate
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EncounterTarget {
    Monster(String),
    Dungeon(String),
    SlayerTask(String),
}

impl fmt::Display for EncounterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncounterTarget::Monster(id) => write!(f, "monster:{}", id),
            EncounterTarget::Dungeon(id) => write!(f, "dungeon:{}", id),
            EncounterTarget::SlayerTask(id) => write!(f, "task:{}", id),
        }
    }
}

impl FromStr for EncounterTarget {
    type Err = String;

    /// Parses `monster:<id>`, `dungeon:<id>` or `task:<id>`; a bare id is a monster
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("monster", id)) => Ok(EncounterTarget::Monster(id.to_string())),
            Some(("dungeon", id)) => Ok(EncounterTarget::Dungeon(id.to_string())),
            Some(("task", id)) | Some(("slayer_task", id)) => Ok(EncounterTarget::SlayerTask(id.to_string())),
            Some((kind, _)) => Err(format!("unknown encounter kind '{}'", kind)),
            None if !s.is_empty() => Ok(EncounterTarget::Monster(s.to_string())),
            None => Err("empty encounter id".to_string()),
        }
    }
}

/// The complete data snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Ruleset {
    pub constants: Constants,
    pub items: BTreeMap<String, ItemDef>,
    pub monsters: BTreeMap<String, MonsterDef>,
    pub dungeons: BTreeMap<String, DungeonDef>,
    pub slayer_tasks: BTreeMap<String, SlayerTaskDef>,
    pub spells: BTreeMap<String, SpellDef>,
    pub prayers: BTreeMap<String, PrayerDef>,
    pub potions: BTreeMap<String, PotionDef>,
}

impl Ruleset {
    /// Load a ruleset from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_document(path)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    pub fn monster(&self, id: &str) -> Option<&MonsterDef> {
        self.monsters.get(id)
    }

    pub fn dungeon(&self, id: &str) -> Option<&DungeonDef> {
        self.dungeons.get(id)
    }

    pub fn slayer_task(&self, id: &str) -> Option<&SlayerTaskDef> {
        self.slayer_tasks.get(id)
    }

    /// Every monster, dungeon and slayer task in the catalog
    pub fn all_targets(&self) -> Vec<EncounterTarget> {
        self.monsters
            .keys()
            .map(|id| EncounterTarget::Monster(id.clone()))
            .chain(self.dungeons.keys().map(|id| EncounterTarget::Dungeon(id.clone())))
            .chain(self.slayer_tasks.keys().map(|id| EncounterTarget::SlayerTask(id.clone())))
            .collect()
    }

    /// Display name of a target, falling back to its id
    pub fn target_name(&self, target: &EncounterTarget) -> String {
        let name = match target {
            EncounterTarget::Monster(id) => self.monster(id).map(|m| m.name.clone()),
            EncounterTarget::Dungeon(id) => self.dungeon(id).map(|d| d.name.clone()),
            EncounterTarget::SlayerTask(id) => self.slayer_task(id).map(|t| t.name.clone()),
        };
        name.unwrap_or_else(|| target.to_string())
    }
}

fn one() -> f64 {
    1.0
}

fn one_u32() -> u32 {
    1
}

fn default_attack_speed() -> u32 {
    2400
}
