//! Configuration structures for loading build YAML/JSON files

use crate::error::ConfigError;
use crate::modifiers::Modifiers;
use crate::stats::Consumable;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Maximum number of simultaneously active prayers
pub const MAX_PRAYERS: usize = 2;

/// The damage type of an attack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AttackType {
    Melee,
    Ranged,
    Magic,
}

// Custom deserializer for case-insensitive matching
impl<'de> Deserialize<'de> for AttackType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_lowercase().as_str() {
            "melee" => Ok(AttackType::Melee),
            "ranged" => Ok(AttackType::Ranged),
            "magic" => Ok(AttackType::Magic),
            _ => Err(serde::de::Error::unknown_variant(
                &s,
                &["melee", "ranged", "magic", "Melee", "Ranged", "Magic"],
            )),
        }
    }
}

impl AttackType {
    /// True if `self` has the combat triangle advantage over `other`
    /// (melee > ranged > magic > melee)
    pub fn beats(self, other: AttackType) -> bool {
        matches!(
            (self, other),
            (AttackType::Melee, AttackType::Ranged)
                | (AttackType::Ranged, AttackType::Magic)
                | (AttackType::Magic, AttackType::Melee)
        )
    }

    /// Damage multiplier when an attacker of this type hits a defender of `defender` type
    pub fn triangle_damage(self, defender: AttackType) -> f64 {
        if self.beats(defender) {
            1.10
        } else if defender.beats(self) {
            0.85
        } else {
            1.0
        }
    }

    /// Multiplier on the defender's damage reduction against this attacker
    pub fn triangle_reduction(self, defender: AttackType) -> f64 {
        if self.beats(defender) {
            0.75
        } else if defender.beats(self) {
            1.25
        } else {
            1.0
        }
    }
}

/// Skills that gain experience or gate requirements in combat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Attack,
    Strength,
    Defence,
    Hitpoints,
    Ranged,
    Magic,
    Prayer,
    Slayer,
    Summoning,
}

impl Skill {
    pub const ALL: [Skill; 9] = [
        Skill::Attack,
        Skill::Strength,
        Skill::Defence,
        Skill::Hitpoints,
        Skill::Ranged,
        Skill::Magic,
        Skill::Prayer,
        Skill::Slayer,
        Skill::Summoning,
    ];
}

/// Equipment slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    Helmet,
    Platebody,
    Platelegs,
    Boots,
    Gloves,
    Cape,
    Amulet,
    Ring,
    Weapon,
    Shield,
    Quiver,
    Summon1,
    Summon2,
}

impl EquipSlot {
    pub fn is_familiar(self) -> bool {
        matches!(self, EquipSlot::Summon1 | EquipSlot::Summon2)
    }
}

/// Hidden bonuses granted by a combat style
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StyleBonus {
    pub accuracy: f64,
    pub strength: f64,
    pub defence: f64,
    pub interval_ms: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeleeStyle {
    #[default]
    Stab,
    Slash,
    Block,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangedStyle {
    #[default]
    Accurate,
    Rapid,
    Longrange,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagicStyle {
    #[default]
    Magic,
    Defensive,
}

/// Selected combat style for each damage type
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatStyles {
    pub melee: MeleeStyle,
    pub ranged: RangedStyle,
    pub magic: MagicStyle,
}

impl CombatStyles {
    /// Style bonus for the style used with `attack_type`
    pub fn bonus(&self, attack_type: AttackType) -> StyleBonus {
        match attack_type {
            AttackType::Melee => match self.melee {
                MeleeStyle::Stab => StyleBonus { accuracy: 3.0, ..Default::default() },
                MeleeStyle::Slash => StyleBonus { strength: 3.0, ..Default::default() },
                MeleeStyle::Block => StyleBonus { defence: 3.0, ..Default::default() },
            },
            AttackType::Ranged => match self.ranged {
                RangedStyle::Accurate => StyleBonus { accuracy: 3.0, strength: 3.0, ..Default::default() },
                RangedStyle::Rapid => StyleBonus { interval_ms: -400.0, ..Default::default() },
                RangedStyle::Longrange => StyleBonus { defence: 3.0, ..Default::default() },
            },
            AttackType::Magic => match self.magic {
                MagicStyle::Magic => StyleBonus::default(),
                MagicStyle::Defensive => StyleBonus { defence: 3.0, ..Default::default() },
            },
        }
    }

    /// Share of combat experience each skill receives for `attack_type`
    pub fn xp_split(&self, attack_type: AttackType) -> &'static [(Skill, f64)] {
        match attack_type {
            AttackType::Melee => match self.melee {
                MeleeStyle::Stab => &[(Skill::Attack, 1.0)],
                MeleeStyle::Slash => &[(Skill::Strength, 1.0)],
                MeleeStyle::Block => &[(Skill::Defence, 1.0)],
            },
            AttackType::Ranged => match self.ranged {
                RangedStyle::Accurate | RangedStyle::Rapid => &[(Skill::Ranged, 1.0)],
                RangedStyle::Longrange => &[(Skill::Ranged, 0.5), (Skill::Defence, 0.5)],
            },
            AttackType::Magic => match self.magic {
                MagicStyle::Magic => &[(Skill::Magic, 1.0)],
                MagicStyle::Defensive => &[(Skill::Magic, 0.5), (Skill::Defence, 0.5)],
            },
        }
    }
}

/// One active spell per spellbook slot; at most one slot may be filled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpellSelection {
    pub standard: Option<String>,
    pub ancient: Option<String>,
    pub archaic: Option<String>,
}

impl SpellSelection {
    /// The single selected spell, if any
    pub fn active(&self) -> Option<&str> {
        self.standard
            .as_deref()
            .or(self.ancient.as_deref())
            .or(self.archaic.as_deref())
    }

    fn filled(&self) -> Vec<String> {
        [("standard", &self.standard), ("ancient", &self.ancient), ("archaic", &self.archaic)]
            .into_iter()
            .filter(|(_, s)| s.is_some())
            .map(|(book, _)| book.to_string())
            .collect()
    }
}

/// Auto-eat upgrade tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoEatTier {
    #[default]
    None,
    Tier1,
    Tier2,
    Tier3,
}

/// Resolved auto-eat behaviour: eat when below `threshold`, healing at
/// `efficiency`, until at least `eat_to` of max hitpoints
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoEat {
    pub threshold: f64,
    pub efficiency: f64,
    pub eat_to: f64,
}

impl AutoEatTier {
    pub fn params(self) -> Option<AutoEat> {
        match self {
            AutoEatTier::None => None,
            AutoEatTier::Tier1 => Some(AutoEat { threshold: 0.20, efficiency: 1.00, eat_to: 0.80 }),
            AutoEatTier::Tier2 => Some(AutoEat { threshold: 0.30, efficiency: 1.10, eat_to: 0.90 }),
            AutoEatTier::Tier3 => Some(AutoEat { threshold: 0.45, efficiency: 1.20, eat_to: 1.00 }),
        }
    }
}

/// What happens to the attacker after dying
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeathPolicy {
    /// Fraction of max hitpoints the attacker comes back with
    pub restore_fraction: f64,
    /// Eat food up to `restore_fraction` instead of restoring for free
    pub eat_to_restore: bool,
}

impl Default for DeathPolicy {
    fn default() -> Self {
        Self { restore_fraction: 1.0, eat_to_restore: false }
    }
}

/// Seconds of real play needed to re-supply one unit of each consumable
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumableCosts {
    pub prayer_point_seconds: f64,
    pub potion_seconds: f64,
    pub food_seconds: f64,
    pub rune_seconds: f64,
    /// Falls back to `rune_seconds` when unset
    pub combination_rune_seconds: Option<f64>,
    pub ammo_seconds: f64,
    pub summoning_charge_seconds: f64,
}

impl ConsumableCosts {
    pub fn seconds_per_unit(&self, consumable: Consumable) -> f64 {
        match consumable {
            Consumable::PrayerPoints => self.prayer_point_seconds,
            Consumable::Potions => self.potion_seconds,
            Consumable::Food => self.food_seconds,
            Consumable::Runes => self.rune_seconds,
            Consumable::CombinationRunes => self.combination_rune_seconds.unwrap_or(self.rune_seconds),
            Consumable::Ammo => self.ammo_seconds,
            Consumable::SummoningCharges => self.summoning_charge_seconds,
        }
    }
}

/// Loot valuation toggles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootPolicy {
    pub sell_bones: bool,
    pub convert_shards: bool,
    pub auto_alchemize: bool,
    pub alchemy_cutoff_gold: f64,
}

impl Default for LootPolicy {
    fn default() -> Self {
        Self {
            sell_bones: true,
            convert_shards: false,
            auto_alchemize: false,
            alchemy_cutoff_gold: 10_000.0,
        }
    }
}

/// Full build configuration loaded from YAML/JSON.
///
/// Read-only for the whole batch; the simulator never mutates it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub levels: BTreeMap<Skill, u32>,
    #[serde(default)]
    pub equipment: BTreeMap<EquipSlot, String>,
    #[serde(default)]
    pub prayers: Vec<String>,
    #[serde(default)]
    pub spells: SpellSelection,
    #[serde(default)]
    pub potion: Option<String>,
    #[serde(default)]
    pub food: Option<String>,
    #[serde(default)]
    pub auto_eat: AutoEatTier,
    #[serde(default)]
    pub styles: CombatStyles,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub costs: ConsumableCosts,
    #[serde(default)]
    pub death: DeathPolicy,
    #[serde(default)]
    pub loot: LootPolicy,
    /// Award slayer rewards for standalone monsters as if they were on task
    #[serde(default)]
    pub assume_slayer_task: bool,
}

impl BuildConfig {
    /// Load a build configuration from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: BuildConfig = load_document(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BuildConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: BuildConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that need no catalog lookups
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prayers.len() > MAX_PRAYERS {
            return Err(ConfigError::TooManyPrayers { count: self.prayers.len(), max: MAX_PRAYERS });
        }
        let books = self.spells.filled();
        if books.len() > 1 {
            return Err(ConfigError::ConflictingSpells(books));
        }
        Ok(())
    }

    /// Get a skill level; unlisted skills are level 1 except Hitpoints at 10
    pub fn get_level(&self, skill: Skill) -> u32 {
        match self.levels.get(&skill) {
            Some(&level) => level,
            None if skill == Skill::Hitpoints => 10,
            None => 1,
        }
    }

    /// Item id equipped in `slot`
    pub fn equipped(&self, slot: EquipSlot) -> Option<&str> {
        self.equipment.get(&slot).map(String::as_str)
    }

    pub fn has_equipped(&self, item: &str) -> bool {
        self.equipment.values().any(|id| id == item)
    }
}

/// Read a YAML or JSON document, picking the parser by file extension
pub(crate) fn load_document<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, ConfigError> {
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.as_ref().display().to_string(),
        source,
    })?;
    let path_str = path.as_ref().to_string_lossy().to_lowercase();

    // Check if it's JSON or YAML
    if path_str.ends_with(".json") {
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_yaml::from_str(&content)?)
    }
}
