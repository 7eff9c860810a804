//! Timed combat effects: damage over time, stuns and stat debuffs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DotKind {
    Burn,
    Poison,
    Bleed,
}

/// Effect applied to the opponent by a spell or special attack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectDef {
    DamageOverTime {
        kind: DotKind,
        damage_per_proc: f64,
        procs: u32,
        interval_ticks: u32,
    },
    Stun {
        ticks: u32,
    },
    Debuff {
        #[serde(default)]
        accuracy_pct: f64,
        #[serde(default)]
        evasion_pct: f64,
        #[serde(default)]
        damage_reduction: f64,
        ticks: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum ActiveEffect {
    DamageOverTime {
        kind: DotKind,
        damage: f64,
        procs_left: u32,
        interval: u32,
        timer: u32,
    },
    Stun {
        ticks_left: u32,
    },
    Debuff {
        accuracy_pct: f64,
        evasion_pct: f64,
        damage_reduction: f64,
        ticks_left: u32,
    },
}

impl ActiveEffect {
    fn expired(&self) -> bool {
        match self {
            ActiveEffect::DamageOverTime { procs_left, .. } => *procs_left == 0,
            ActiveEffect::Stun { ticks_left } | ActiveEffect::Debuff { ticks_left, .. } => *ticks_left == 0,
        }
    }
}

/// Effects currently affecting one combatant
#[derive(Debug, Clone, Default)]
pub struct EffectSet {
    active: Vec<ActiveEffect>,
}

impl EffectSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an effect. A new damage-over-time of the same kind replaces the old one,
    /// a new stun keeps whichever lasts longer.
    pub fn apply(&mut self, def: &EffectDef) {
        match *def {
            EffectDef::DamageOverTime { kind, damage_per_proc, procs, interval_ticks } => {
                self.active.retain(|e| !matches!(e, ActiveEffect::DamageOverTime { kind: k, .. } if *k == kind));
                let interval = interval_ticks.max(1);
                self.active.push(ActiveEffect::DamageOverTime {
                    kind,
                    damage: damage_per_proc,
                    procs_left: procs,
                    interval,
                    timer: interval,
                });
            }
            EffectDef::Stun { ticks } => {
                for effect in &mut self.active {
                    if let ActiveEffect::Stun { ticks_left } = effect {
                        *ticks_left = (*ticks_left).max(ticks);
                        return;
                    }
                }
                self.active.push(ActiveEffect::Stun { ticks_left: ticks });
            }
            EffectDef::Debuff { accuracy_pct, evasion_pct, damage_reduction, ticks } => {
                self.active.push(ActiveEffect::Debuff {
                    accuracy_pct,
                    evasion_pct,
                    damage_reduction,
                    ticks_left: ticks,
                });
            }
        }
    }

    /// Advance every effect by one tick and return the damage dealt this tick
    pub fn tick(&mut self) -> f64 {
        let mut damage = 0.0;
        for effect in &mut self.active {
            match effect {
                ActiveEffect::DamageOverTime { damage: per_proc, procs_left, interval, timer, .. } => {
                    *timer = timer.saturating_sub(1);
                    if *timer == 0 && *procs_left > 0 {
                        damage += *per_proc;
                        *procs_left -= 1;
                        *timer = *interval;
                    }
                }
                ActiveEffect::Stun { ticks_left } | ActiveEffect::Debuff { ticks_left, .. } => {
                    *ticks_left = ticks_left.saturating_sub(1);
                }
            }
        }
        self.active.retain(|e| !e.expired());
        damage
    }

    pub fn is_stunned(&self) -> bool {
        self.active.iter().any(|e| matches!(e, ActiveEffect::Stun { ticks_left } if *ticks_left > 0))
    }

    pub fn accuracy_pct(&self) -> f64 {
        self.debuffs().map(|(acc, _, _)| acc).sum()
    }

    pub fn evasion_pct(&self) -> f64 {
        self.debuffs().map(|(_, eva, _)| eva).sum()
    }

    pub fn damage_reduction(&self) -> f64 {
        self.debuffs().map(|(_, _, dr)| dr).sum()
    }

    fn debuffs(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.active.iter().filter_map(|e| match e {
            ActiveEffect::Debuff { accuracy_pct, evasion_pct, damage_reduction, .. } => {
                Some((*accuracy_pct, *evasion_pct, *damage_reduction))
            }
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
