//! Economic loot valuation: expected gold per kill or per dungeon completion
//!
//! Drop tables are weighted lists whose entries are either items or nested
//! tables. The expected value of a roll is the weight-normalised sum of each
//! entry's average quantity times its value, recursing into nested tables.

use crate::config::LootPolicy;
use crate::modifiers::Modifiers;
use crate::ruleset::{DungeonDef, ItemCategory, ItemDef, MonsterDef, Ruleset};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::{Add, AddAssign, Mul};
use tracing::warn;

/// Nested tables and container chains deeper than this are valued at zero
pub const MAX_TABLE_DEPTH: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropTable {
    pub entries: Vec<DropEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropEntry {
    pub weight: f64,
    #[serde(default = "one")]
    pub min_quantity: f64,
    #[serde(default = "one")]
    pub max_quantity: f64,
    #[serde(flatten)]
    pub target: DropTarget,
}

/// What a drop entry yields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropTarget {
    Item(String),
    Table(Box<DropTable>),
}

impl DropEntry {
    pub fn item(item: &str, weight: f64, min_quantity: f64, max_quantity: f64) -> Self {
        Self { weight, min_quantity, max_quantity, target: DropTarget::Item(item.to_string()) }
    }

    pub fn table(table: DropTable, weight: f64, min_quantity: f64, max_quantity: f64) -> Self {
        Self { weight, min_quantity, max_quantity, target: DropTarget::Table(Box::new(table)) }
    }

    pub fn avg_quantity(&self) -> f64 {
        (self.min_quantity + self.max_quantity) / 2.0
    }
}

impl DropTable {
    pub fn new(entries: Vec<DropEntry>) -> Self {
        Self { entries }
    }

    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|e| e.weight.max(0.0)).sum()
    }

    /// Probability of each entry being rolled; empty when the table has no weight
    pub fn probabilities(&self) -> Vec<f64> {
        let total = self.total_weight();
        if total <= 0.0 {
            return Vec::new();
        }
        self.entries.iter().map(|e| e.weight.max(0.0) / total).collect()
    }
}

/// Gold value plus the alchemy time spent to realise it
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Valuation {
    pub gold: f64,
    pub alch_seconds: f64,
}

impl Valuation {
    pub const ZERO: Valuation = Valuation { gold: 0.0, alch_seconds: 0.0 };

    pub fn gold(gold: f64) -> Self {
        Self { gold, alch_seconds: 0.0 }
    }
}

impl Add for Valuation {
    type Output = Valuation;

    fn add(self, o: Self) -> Self {
        Valuation { gold: self.gold + o.gold, alch_seconds: self.alch_seconds + o.alch_seconds }
    }
}

impl AddAssign for Valuation {
    fn add_assign(&mut self, o: Self) {
        *self = *self + o;
    }
}

impl Mul<f64> for Valuation {
    type Output = Valuation;

    fn mul(self, k: f64) -> Self {
        Valuation { gold: self.gold * k, alch_seconds: self.alch_seconds * k }
    }
}

/// Loot multipliers derived from the build's modifiers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LootMultipliers {
    /// Average quantity multiplier from loot doubling
    pub doubling: f64,
    /// Remaining chance of receiving loot at all
    pub loot_chance: f64,
}

impl LootMultipliers {
    pub fn from_modifiers(modifiers: &Modifiers) -> Self {
        Self {
            doubling: 1.0 + Modifiers::chance(modifiers.loot_doubling_pct),
            loot_chance: 1.0 - Modifiers::chance(modifiers.reduced_loot_chance_pct),
        }
    }

    pub fn factor(&self) -> f64 {
        self.doubling * self.loot_chance
    }
}

impl Default for LootMultipliers {
    fn default() -> Self {
        Self { doubling: 1.0, loot_chance: 1.0 }
    }
}

/// Values drops under one loot policy.
///
/// Built once per result refresh; multipliers and per-item values are
/// cached for its lifetime.
pub struct LootValuer<'a> {
    ruleset: &'a Ruleset,
    policy: LootPolicy,
    multipliers: LootMultipliers,
    cache: RefCell<HashMap<String, Valuation>>,
}

impl<'a> LootValuer<'a> {
    pub fn new(ruleset: &'a Ruleset, policy: LootPolicy, modifiers: &Modifiers) -> Self {
        Self {
            ruleset,
            policy,
            multipliers: LootMultipliers::from_modifiers(modifiers),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Value of a single unit of `item_id`
    pub fn item_value(&self, item_id: &str) -> Valuation {
        self.item_value_at(item_id, 0)
    }

    /// Expected value of one roll on `table`
    pub fn table_value(&self, table: &DropTable) -> Valuation {
        self.table_value_at(table, 0)
    }

    /// Expected drop value of one kill, excluding the simulated gold drop.
    ///
    /// Monsters fought inside a dungeon do not roll their drop table.
    pub fn monster_kill_value(&self, monster: &MonsterDef, in_dungeon: bool) -> Valuation {
        let mut value = Valuation::ZERO;
        if !in_dungeon {
            if let Some(table) = &monster.drop_table {
                value += self.table_value(table) * monster.loot_chance.clamp(0.0, 1.0);
            }
        }
        if let Some(bones) = &monster.bones {
            value += self.item_value(&bones.item) * bones.quantity;
        }
        value * self.multipliers.factor()
    }

    /// Expected value of the terminal rewards of one dungeon completion
    pub fn dungeon_completion_value(&self, dungeon: &DungeonDef) -> Valuation {
        let mut value = Valuation::ZERO;
        for reward in &dungeon.rewards {
            value += self.item_value(&reward.item) * reward.quantity;
        }
        if let Some(table) = &dungeon.reward_table {
            value += self.table_value(table);
        }
        value * self.multipliers.factor()
    }

    /// Expected quantity of `item_id` received per kill
    pub fn item_per_kill(&self, monster: &MonsterDef, item_id: &str, in_dungeon: bool) -> f64 {
        let mut quantity = 0.0;
        if !in_dungeon {
            if let Some(table) = &monster.drop_table {
                quantity += quantity_in_table(table, item_id, 0) * monster.loot_chance.clamp(0.0, 1.0);
            }
        }
        if let Some(bones) = &monster.bones {
            if bones.item == item_id {
                quantity += bones.quantity;
            }
        }
        quantity * self.multipliers.factor()
    }

    /// Expected quantity of `item_id` received per dungeon completion
    pub fn item_per_completion(&self, dungeon: &DungeonDef, item_id: &str) -> f64 {
        let fixed: f64 = dungeon.rewards.iter().filter(|r| r.item == item_id).map(|r| r.quantity).sum();
        let rolled = dungeon.reward_table.as_ref().map_or(0.0, |t| quantity_in_table(t, item_id, 0));
        (fixed + rolled) * self.multipliers.factor()
    }

    fn table_value_at(&self, table: &DropTable, depth: usize) -> Valuation {
        if depth > MAX_TABLE_DEPTH {
            warn!(depth, "drop table nesting too deep; valuing at zero");
            return Valuation::ZERO;
        }
        let total = table.total_weight();
        if total <= 0.0 {
            warn!("drop table has no weight; valuing at zero");
            return Valuation::ZERO;
        }
        let mut value = Valuation::ZERO;
        for entry in &table.entries {
            let per_unit = match &entry.target {
                DropTarget::Item(id) => self.item_value_at(id, depth + 1),
                DropTarget::Table(nested) => self.table_value_at(nested, depth + 1),
            };
            value += per_unit * (entry.weight.max(0.0) * entry.avg_quantity() / total);
        }
        value
    }

    fn item_value_at(&self, item_id: &str, depth: usize) -> Valuation {
        if let Some(cached) = self.cache.borrow().get(item_id) {
            return *cached;
        }
        let Some(item) = self.ruleset.item(item_id) else {
            warn!(item = item_id, "drop references unknown item; valuing at zero");
            return Valuation::ZERO;
        };
        if depth > MAX_TABLE_DEPTH {
            warn!(item = item_id, "item conversion chain too deep; valuing at zero");
            return Valuation::ZERO;
        }
        let value = self.resolve_item(item, depth);
        self.cache.borrow_mut().insert(item_id.to_string(), value);
        value
    }

    fn resolve_item(&self, item: &ItemDef, depth: usize) -> Valuation {
        if item.category == ItemCategory::Bones && !self.policy.sell_bones {
            return Valuation::ZERO;
        }
        if self.policy.convert_shards {
            if let Some(conversion) = &item.conversion {
                match self.ruleset.item(&conversion.container).and_then(|c| c.opens.as_ref()) {
                    Some(contents) if conversion.required > 0 => {
                        return self.table_value_at(contents, depth + 1) * (1.0 / conversion.required as f64);
                    }
                    _ => warn!(
                        item = %item.name,
                        container = %conversion.container,
                        "shard conversion target missing; using sell price"
                    ),
                }
            }
        }
        if let Some(contents) = &item.opens {
            return self.table_value_at(contents, depth + 1);
        }
        self.sale_value(item.sell_price)
    }

    /// Sell or alchemize, whichever the policy dictates
    fn sale_value(&self, sell_price: f64) -> Valuation {
        let alchemy = &self.ruleset.constants.alchemy;
        if self.policy.auto_alchemize && sell_price >= self.policy.alchemy_cutoff_gold {
            Valuation {
                gold: sell_price * alchemy.gold_multiplier,
                alch_seconds: alchemy.seconds_per_cast / alchemy.items_per_cast.max(1.0),
            }
        } else {
            Valuation::gold(sell_price)
        }
    }
}

fn quantity_in_table(table: &DropTable, item_id: &str, depth: usize) -> f64 {
    if depth > MAX_TABLE_DEPTH {
        return 0.0;
    }
    let total = table.total_weight();
    if total <= 0.0 {
        return 0.0;
    }
    table
        .entries
        .iter()
        .map(|entry| {
            let per_unit = match &entry.target {
                DropTarget::Item(id) if id == item_id => 1.0,
                DropTarget::Item(_) => 0.0,
                DropTarget::Table(nested) => quantity_in_table(nested, item_id, depth + 1),
            };
            entry.weight.max(0.0) / total * entry.avg_quantity() * per_unit
        })
        .sum()
}

fn one() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleset::{ItemQuantity, ShardConversion};

    fn item(name: &str, sell_price: f64, category: ItemCategory) -> ItemDef {
        ItemDef {
            name: name.to_string(),
            sell_price,
            category,
            attack_type: None,
            attack_speed_ms: None,
            stats: Default::default(),
            modifiers: Default::default(),
            heals_for: 0.0,
            special_attack: None,
            opens: None,
            conversion: None,
            combination_rune: false,
            summoning_xp: 0.0,
        }
    }

    fn ruleset() -> Ruleset {
        let mut r = Ruleset::default();
        r.items.insert("ten".into(), item("Ten", 10.0, ItemCategory::Misc));
        r.items.insert("five".into(), item("Five", 5.0, ItemCategory::Misc));
        r.items.insert("bones".into(), item("Bones", 3.0, ItemCategory::Bones));
        r.items.insert("gem".into(), item("Gem", 20_000.0, ItemCategory::Misc));
        let mut chest = item("Chest", 0.0, ItemCategory::Container);
        chest.opens = Some(DropTable::new(vec![DropEntry::item("gem", 1.0, 1.0, 1.0)]));
        r.items.insert("chest".into(), chest);
        let mut shard = item("Shard", 2.0, ItemCategory::Shard);
        shard.conversion = Some(ShardConversion { container: "chest".into(), required: 100 });
        r.items.insert("shard".into(), shard);
        r
    }

    fn two_entry_table() -> DropTable {
        DropTable::new(vec![DropEntry::item("ten", 1.0, 1.0, 1.0), DropEntry::item("five", 3.0, 2.0, 2.0)])
    }

    #[test]
    fn test_weighted_expectation() {
        let r = ruleset();
        let valuer = LootValuer::new(&r, LootPolicy::default(), &Modifiers::default());
        // (1*1*10 + 3*2*5) / 4
        assert!((valuer.table_value(&two_entry_table()).gold - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let p = two_entry_table().probabilities();
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(DropTable::default().probabilities().is_empty());
    }

    #[test]
    fn test_nested_table_uses_entry_quantity() {
        let r = ruleset();
        let valuer = LootValuer::new(&r, LootPolicy::default(), &Modifiers::default());
        let outer = DropTable::new(vec![
            DropEntry::table(two_entry_table(), 1.0, 2.0, 2.0),
            DropEntry::item("five", 1.0, 1.0, 1.0),
        ]);
        // half the time two rolls of the inner table (20), half the time 5
        assert!((valuer.table_value(&outer).gold - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_item_is_zero() {
        let r = ruleset();
        let valuer = LootValuer::new(&r, LootPolicy::default(), &Modifiers::default());
        let table =
            DropTable::new(vec![DropEntry::item("missing", 1.0, 1.0, 1.0), DropEntry::item("ten", 1.0, 1.0, 1.0)]);
        assert_eq!(valuer.table_value(&table).gold, 5.0);
    }

    #[test]
    fn test_bones_policy() {
        let r = ruleset();
        let sell = LootValuer::new(&r, LootPolicy::default(), &Modifiers::default());
        assert_eq!(sell.item_value("bones").gold, 3.0);
        let keep = LootValuer::new(&r, LootPolicy { sell_bones: false, ..Default::default() }, &Modifiers::default());
        assert_eq!(keep.item_value("bones").gold, 0.0);
    }

    #[test]
    fn test_shard_conversion() {
        let r = ruleset();
        let raw = LootValuer::new(&r, LootPolicy::default(), &Modifiers::default());
        assert_eq!(raw.item_value("shard").gold, 2.0);
        let policy = LootPolicy { convert_shards: true, ..Default::default() };
        let convert = LootValuer::new(&r, policy, &Modifiers::default());
        // one chest (a 20k gem) per 100 shards
        assert!((convert.item_value("shard").gold - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_alchemy_above_cutoff_tracks_time() {
        let r = ruleset();
        let policy = LootPolicy { auto_alchemize: true, alchemy_cutoff_gold: 15_000.0, ..Default::default() };
        let valuer = LootValuer::new(&r, policy, &Modifiers::default());
        let gem = valuer.item_value("gem");
        assert_eq!(gem.gold, 20_000.0);
        assert_eq!(gem.alch_seconds, 2.0);
        assert_eq!(valuer.item_value("ten").alch_seconds, 0.0);
    }

    #[test]
    fn test_global_multipliers_apply_per_kill() {
        let r = ruleset();
        let modifiers = Modifiers { loot_doubling_pct: 10.0, reduced_loot_chance_pct: 50.0, ..Default::default() };
        let valuer = LootValuer::new(&r, LootPolicy::default(), &modifiers);
        let monster: MonsterDef = serde_yaml::from_str("name: Dummy\nhitpoints: 10\nattack_type: melee\n").unwrap();
        let monster = MonsterDef {
            drop_table: Some(two_entry_table()),
            bones: Some(ItemQuantity { item: "bones".into(), quantity: 1.0 }),
            ..monster
        };
        let value = valuer.monster_kill_value(&monster, false);
        assert!((value.gold - 13.0 * 1.1 * 0.5).abs() < 1e-9);
        let dungeon_value = valuer.monster_kill_value(&monster, true);
        assert!((dungeon_value.gold - 3.0 * 1.1 * 0.5).abs() < 1e-9);
        assert!((valuer.item_per_kill(&monster, "five", false) - 1.5 * 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_yaml_drop_table_shape() {
        let yaml = "
entries:
  - weight: 1
    item: ten
  - weight: 3
    min_quantity: 2
    max_quantity: 2
    item: five
";
        let table: DropTable = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(table, two_entry_table());
    }
}
