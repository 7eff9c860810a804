//! Debug script to print derived player and monster stats for a build

use combat_sim::config::BuildConfig;
use combat_sim::enemy::Enemy;
use combat_sim::player::Player;
use combat_sim::ruleset::Ruleset;
use combat_sim::simulation::hit_chance;
use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: debug_stats <build.yaml> <ruleset.yaml> [monster]");
        std::process::exit(2);
    }

    let build = match BuildConfig::from_file(&args[1]) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error loading build: {}", e);
            std::process::exit(1);
        }
    };
    let ruleset = match Ruleset::from_file(&args[2]) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error loading ruleset: {}", e);
            std::process::exit(1);
        }
    };
    let player = match Player::from_config(&build, &ruleset) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Build does not resolve: {}", e);
            std::process::exit(1);
        }
    };

    let ticks_per_second = ruleset.constants.ticks_per_second();
    println!("\n=== PLAYER ({:?}) ===", player.attack_type);
    println!("  max_hp:      {:.0}", player.max_hp);
    println!("  accuracy:    {:.0}", player.accuracy);
    println!("  max_hit:     {:.0}", player.max_hit);
    println!("  min_hit:     {:.0}", player.min_hit);
    println!("  evasion:     {:.0} / {:.0} / {:.0}", player.evasion.melee, player.evasion.ranged, player.evasion.magic);
    println!("  DR:          {:.2}%", player.damage_reduction);
    println!(
        "  interval:    {} ticks ({:.2}s)",
        player.attack_interval_ticks,
        player.attack_interval_ticks as f64 / ticks_per_second
    );
    println!("  lifesteal:   {:.2}%", player.lifesteal * 100.0);
    println!("  prayer/atk:  {:.3}", player.prayer_cost_per_attack);
    if let Some(food) = player.food_heal {
        println!("  food heals:  {:.0}", food);
    }

    let monsters: Vec<&String> = match args.get(3) {
        Some(id) => vec![id],
        None => ruleset.monsters.keys().collect(),
    };
    for id in monsters {
        let Some(def) = ruleset.monster(id) else {
            eprintln!("Unknown monster '{}'", id);
            continue;
        };
        let enemy = Enemy::new(def, &ruleset.constants);
        println!("\n=== {} ({:?}) ===", enemy.name, enemy.attack_type);
        println!("  HP:          {:.0}", enemy.max_hp);
        println!("  accuracy:    {:.0}", enemy.accuracy);
        println!("  max_hit:     {:.0}", enemy.max_hit);
        println!("  DR:          {:.2}%", enemy.damage_reduction);
        println!("  interval:    {} ticks", enemy.attack_interval_ticks);
        println!(
            "  player hit:  {:.2}%",
            hit_chance(player.accuracy, enemy.evasion.against(player.attack_type)) * 100.0
        );
        println!(
            "  enemy hit:   {:.2}%",
            hit_chance(enemy.accuracy, player.evasion.against(enemy.attack_type)) * 100.0
        );
    }
}
