//! Error types for loading inputs and standing up the worker pool.
//!
//! Recoverable simulation outcomes (ineligible targets, exhausted budgets,
//! missing drop data, cancellation) are not errors; they are reported on
//! [`crate::stats::SimulationResult`].

use thiserror::Error;

/// Failures while loading or validating a build or a ruleset document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("at most {max} prayers may be active, got {count}")]
    TooManyPrayers { count: usize, max: usize },
    #[error("prayers {first} and {second} belong to different holiness categories")]
    MixedHoliness { first: String, second: String },
    #[error("only one spellbook may have an active spell, found spells in {0:?}")]
    ConflictingSpells(Vec<String>),
    #[error("a magic weapon is equipped but no spell is selected")]
    MissingSpell,
    #[error("unknown {kind} '{id}'")]
    Unknown { kind: &'static str, id: String },
}

/// Top level error for the library entry points.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
