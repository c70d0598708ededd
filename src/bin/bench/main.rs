// Arena Economy Bench Runner
// Seeded scenarios over the full economy loop, conservation audited per tick
//
// Usage:
//   cargo run --release --bin bench                        # All scenarios, 5 seeds each
//   cargo run --release --bin bench -- --runs 20           # More seeds
//   cargo run --release --bin bench -- EVENT_STORM         # Filter by name
//   cargo run --release --bin bench -- --ticks 500 --agents 24
//   cargo run --release --bin bench -- --config arena.toml # Flat TOML of env keys
//   cargo run --release --bin bench -- --json out.json --snapshot state.json
//
// Log level comes from RUST_LOG (default "info").

mod report;
mod scenarios;

use std::error::Error;
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use arena_economy::config::EconomyConfig;
use report::*;
use scenarios::*;
use tracing_subscriber::EnvFilter;

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    runs: usize,
    seed: u64,
    ticks: u64,
    agents: usize,
    config: Option<PathBuf>,
    json: Option<PathBuf>,
    snapshot: Option<PathBuf>,
    filter: Option<String>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs {
        runs: 5,
        seed: 0,
        ticks: 200,
        agents: 12,
        config: None,
        json: None,
        snapshot: None,
        filter: None,
    };

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match args[i].as_str() {
            "--runs" => {
                cli.runs = value.and_then(|v| v.parse().ok()).unwrap_or(5).max(1);
                i += 1;
            }
            "--seed" => {
                cli.seed = value.and_then(|v| v.parse().ok()).unwrap_or(0);
                i += 1;
            }
            "--ticks" => {
                cli.ticks = value.and_then(|v| v.parse().ok()).unwrap_or(200);
                i += 1;
            }
            "--agents" => {
                cli.agents = value.and_then(|v| v.parse().ok()).unwrap_or(12).max(1);
                i += 1;
            }
            "--config" => {
                cli.config = value.map(PathBuf::from);
                i += 1;
            }
            "--json" => {
                cli.json = value.map(PathBuf::from);
                i += 1;
            }
            "--snapshot" => {
                cli.snapshot = value.map(PathBuf::from);
                i += 1;
            }
            arg if !arg.starts_with('-') => {
                cli.filter = Some(arg.to_string());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    cli
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = parse_args();
    let base = match &cli.config {
        Some(path) => EconomyConfig::from_config_file(path)?,
        None => EconomyConfig::from_env(),
    };

    let all_scenarios = scenarios();
    let to_run: Vec<&Scenario> = match &cli.filter {
        Some(f) => {
            let f_lower = f.to_lowercase();
            all_scenarios
                .iter()
                .filter(|s| s.name.to_lowercase().contains(&f_lower) || s.label.to_lowercase().contains(&f_lower))
                .collect()
        }
        None => all_scenarios.iter().collect(),
    };

    if to_run.is_empty() {
        eprintln!("No scenarios match filter: {:?}", cli.filter);
        std::process::exit(1);
    }

    println!("\n  Arena Economy Bench");
    println!(
        "  PRNG: ChaCha8Rng | Runs/scenario: {} | Ticks: {} | Agents: {} | Base seed: {}",
        cli.runs, cli.ticks, cli.agents, cli.seed
    );
    println!(
        "  {:<28} {:>5} {:>9} {:>8} {:>7} {:>7} {:>7}",
        "Scenario", "Pass%", "Spot", "Swaps", "Events", "Skills", "Time"
    );
    println!("  {}", "-".repeat(78));

    let suite_start = Instant::now();
    let mut reports = Vec::new();
    let mut last_economy = None;

    for scenario in &to_run {
        let mut runs = Vec::with_capacity(cli.runs);
        for run in 0..cli.runs {
            let seed = cli.seed.wrapping_add(run as u64);
            let (result, economy) = run_scenario(scenario, &base, cli.ticks, cli.agents, seed)?;
            runs.push(result);
            last_economy = Some(economy);
        }
        let report = ScenarioReport::aggregate(scenario.name, scenario.label, runs);
        let status = if report.pass_rate >= 1.0 { "PASS" } else { "FAIL" };
        println!(
            "  {:<28} {:>4}% {:>9.4} {:>8.0} {:>7.1} {:>7.1} {:>5.0}ms  {}",
            report.label,
            (report.pass_rate * 100.0) as u32,
            report.final_spot.mean,
            report.swap_count.mean,
            report.events_created.mean,
            report.skill_purchases.mean,
            report.elapsed_ms.mean,
            status,
        );
        reports.push(report);
    }

    // ─── Summary ────────────────────────────────────────────────────────

    let total = reports.len();
    let passed = reports.iter().filter(|r| r.pass_rate >= 1.0).count();
    let failed = total - passed;

    println!("  {}", "-".repeat(78));
    println!(
        "  Total: {}  Passed: {}  Failed: {}  Suite time: {:.1}s\n",
        total,
        passed,
        failed,
        suite_start.elapsed().as_secs_f64()
    );

    // ─── Write JSON Report ──────────────────────────────────────────────

    let timestamp_ms = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
    let report = BenchReport {
        timestamp_ms,
        version: env!("CARGO_PKG_VERSION"),
        prng: "ChaCha8Rng",
        ticks: cli.ticks,
        agents: cli.agents,
        n_runs_per_scenario: cli.runs,
        summary: Summary { total, passed, failed },
        scenarios: reports,
    };

    let path = match cli.json {
        Some(path) => path,
        None => {
            let dir = std::path::Path::new("benchmark-results");
            std::fs::create_dir_all(dir)?;
            dir.join(format!("bench-{timestamp_ms}.json"))
        }
    };
    std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
    println!("  Results saved to: {}", path.display());

    if let (Some(path), Some(economy)) = (cli.snapshot, last_economy) {
        let snapshot = economy.store().snapshot()?;
        std::fs::write(&path, serde_json::to_string_pretty(&snapshot)?)?;
        println!("  Final store snapshot: {}", path.display());
    }
    println!();

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
