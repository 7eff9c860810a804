//! Combat simulator for an idle RPG
//!
//! Estimates per-second experience, loot and consumable rates for a player
//! build against monsters, dungeons and slayer tasks by running tick-based
//! combat trials in parallel.

pub mod aggregate;
pub mod cancel;
pub mod config;
pub mod effects;
pub mod enemy;
pub mod error;
pub mod loot;
pub mod modifiers;
pub mod parallel;
pub mod player;
pub mod ruleset;
pub mod runner;
pub mod simulation;
pub mod stats;

pub use aggregate::{AggregateSettings, EncounterSummary, ResultAggregator};
pub use cancel::CancellationToken;
pub use config::{BuildConfig, LootPolicy};
pub use error::{ConfigError, SimError};
pub use parallel::{BatchReport, Coordinator, CoordinatorConfig};
pub use ruleset::{EncounterTarget, Ruleset};
pub use runner::{EncounterKey, SimulationRequest};
pub use stats::{RunOutcome, SimulationResult};
