//! CLI entry point for the combat simulator

use clap::{Parser, ValueEnum};
use combat_sim::{
    aggregate::{AggregateSettings, EncounterSummary, ResultAggregator},
    cancel::CancellationToken,
    config::{BuildConfig, Skill},
    parallel::{Coordinator, CoordinatorConfig},
    ruleset::{EncounterTarget, Ruleset},
    stats::RunOutcome,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "combat-sim")]
#[command(version)]
#[command(about = "Estimate xp, loot and supply rates for a combat build", long_about = None)]
struct Args {
    /// Path to the build configuration file (YAML or JSON)
    #[arg(short, long)]
    build: PathBuf,

    /// Path to the ruleset data file (YAML or JSON)
    #[arg(short, long)]
    data: PathBuf,

    /// Encounter to simulate: `monster:<id>`, `dungeon:<id>` or `task:<id>`.
    /// Repeat for several; omit to simulate the whole catalog.
    #[arg(long = "target")]
    targets: Vec<EncounterTarget>,

    /// Trials per encounter
    #[arg(short = 'n', long, default_value = "10000")]
    trials: u32,

    /// Tick budget per encounter
    #[arg(long, default_value = "1000000")]
    tick_budget: u64,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Show timing information
    #[arg(short, long, default_value = "false")]
    timing: bool,

    /// Window for the signet ring chance, in hours
    #[arg(long, default_value = "1.0")]
    signet_hours: f64,

    /// Report the per-second rate of this item
    #[arg(long)]
    item: Option<String>,

    /// Override the build's bone selling setting
    #[arg(long)]
    sell_bones: Option<bool>,

    /// Override the build's shard conversion setting
    #[arg(long)]
    convert_shards: Option<bool>,

    /// Override the build's auto alchemy setting
    #[arg(long)]
    auto_alch: Option<bool>,

    /// Override the build's alchemy cutoff, in gold
    #[arg(long)]
    alch_cutoff: Option<f64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,combat_sim=info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let build = match BuildConfig::from_file(&args.build) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error loading build: {}", e);
            std::process::exit(1);
        }
    };
    let ruleset = match Ruleset::from_file(&args.data) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error loading ruleset: {}", e);
            std::process::exit(1);
        }
    };

    let targets = if args.targets.is_empty() { ruleset.all_targets() } else { args.targets.clone() };

    let mut config = CoordinatorConfig::new(args.trials, args.tick_budget);
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    let coordinator = match Coordinator::new(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    let mut finished = 0usize;
    let report = coordinator.run_batch(&targets, &build, &ruleset, &CancellationToken::new(), |result| {
        finished += 1;
        debug!(encounter = %result.key, outcome = ?result.outcome, finished, "result received");
    });
    let simulated = start.elapsed();

    let mut policy = build.loot;
    if let Some(v) = args.sell_bones {
        policy.sell_bones = v;
    }
    if let Some(v) = args.convert_shards {
        policy.convert_shards = v;
    }
    if let Some(v) = args.auto_alch {
        policy.auto_alchemize = v;
    }
    if let Some(v) = args.alch_cutoff {
        policy.alchemy_cutoff_gold = v;
    }

    let settings = AggregateSettings { signet_hours: args.signet_hours, selected_item: args.item.clone() };
    let aggregator = ResultAggregator::new(&ruleset, &build, settings);
    let summaries = aggregator.summarize_all(&targets, &report.results, policy);
    info!(targets = summaries.len(), "aggregation finished");

    match args.output {
        OutputFormat::Text => {
            println!("=== Combat Simulation Results ===");
            println!("Trials per encounter: {}", args.trials);
            println!("Encounters simulated: {}", report.results.len());
            println!();
            for summary in &summaries {
                print_summary(summary, args.item.as_deref(), args.signet_hours);
            }
            if args.timing {
                let total_ticks: u64 = report.results.values().map(|r| r.tick_count).sum();
                println!("--- Performance ---");
                println!("Simulation time: {:.3}s", simulated.as_secs_f64());
                println!("Ticks simulated: {}", total_ticks);
                println!("Ticks/sec: {:.0}", total_ticks as f64 / simulated.as_secs_f64().max(1e-9));
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "trials": args.trials,
                "tick_budget": args.tick_budget,
                "elapsed_seconds": simulated.as_secs_f64(),
                "loot_policy": policy,
                "summaries": summaries,
            });
            match serde_json::to_string_pretty(&output) {
                Ok(s) => println!("{}", s),
                Err(e) => {
                    eprintln!("Error writing results: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn print_summary(summary: &EncounterSummary, item: Option<&str>, hours: f64) {
    println!("--- {} ({}) ---", summary.name, summary.target);
    if !summary.success {
        println!("Unavailable: {}", summary.reason.as_deref().unwrap_or("no result"));
        println!();
        return;
    }
    if summary.outcome == RunOutcome::BudgetExhausted {
        println!("Note: {}", summary.reason.as_deref().unwrap_or("tick budget exhausted"));
    }
    match summary.kill_time_seconds {
        Some(t) => println!("Kill time: {:.2}s", t),
        None => println!("Kill time: -"),
    }
    println!("Death rate: {:.2}%", summary.death_rate * 100.0);
    println!("Hit rate: {:.2}%", summary.adjusted_rates.hit_rate * 100.0);
    println!("Cost factor: {:.4}", summary.cost_factor);
    println!();
    println!("XP/hour (adjusted):");
    for skill in Skill::ALL {
        let rate = summary.adjusted_rates.xp(skill);
        if rate > 0.0 {
            println!("  {:<10} {:>12.0}", format!("{:?}", skill), rate * 3600.0);
        }
    }
    println!("GP/hour: {:.0}", summary.loot.gp_per_second * 3600.0);
    println!("GP/hour (adjusted): {:.0}", summary.loot.adjusted_gp_per_second * 3600.0);
    if let (Some(item), Some(rate)) = (item, summary.loot.selected_item_per_second) {
        println!("{}/hour: {:.3}", item, rate * 3600.0);
    }
    println!("Signet chance ({}h): {:.4}%", hours, summary.signet_chance * 100.0);
    println!("Pet chance ({}h): {:.4}%", hours, summary.pet_chance * 100.0);
    if summary.low_confidence {
        println!("Low confidence: {:.1}% of trials finished", summary.confidence * 100.0);
    }
    println!();
}
