// Bench report types: one row per run, aggregated per scenario.

use serde::Serialize;

// ─── Statistics (per-metric aggregation across seeds) ───────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        Self {
            mean,
            std_dev: variance.sqrt(),
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }
}

// ─── Single-Run Result ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    pub scenario: String,
    pub seed: u64,
    pub pulse_trades: u64,
    pub pulse_failures: u64,
    pub swap_count: u64,
    pub events_created: u64,
    pub events_failed: u64,
    pub builds: u64,
    pub structures: u64,
    pub bounty_claims: u64,
    pub gold_rush_claims: u64,
    pub skill_purchases: u64,
    pub skill_throttled: u64,
    pub skill_rejected: u64,
    pub skill_spend: u64,
    pub fees_reserve: u64,
    pub fees_arena: u64,
    pub treasury_arena: u64,
    pub final_spot: f64,
    pub conservation_violations: u64,
    pub conservation_holds: bool,
    pub elapsed_ms: u128,
}

impl RunResult {
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self { scenario: scenario.to_string(), seed, ..Self::default() }
    }
}

// ─── Scenario Report ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario_name: String,
    pub label: String,
    pub n_runs: usize,
    pub pass_rate: f64,
    pub final_spot: Stats,
    pub swap_count: Stats,
    pub events_created: Stats,
    pub skill_purchases: Stats,
    pub skill_spend: Stats,
    pub elapsed_ms: Stats,
    pub individual_runs: Vec<RunResult>,
}

impl ScenarioReport {
    pub fn aggregate(name: &str, label: &str, runs: Vec<RunResult>) -> Self {
        let stat = |f: fn(&RunResult) -> f64| Stats::from_samples(&runs.iter().map(f).collect::<Vec<_>>());
        let passed = runs.iter().filter(|r| r.conservation_holds).count();
        Self {
            scenario_name: name.to_string(),
            label: label.to_string(),
            n_runs: runs.len(),
            pass_rate: if runs.is_empty() { 0.0 } else { passed as f64 / runs.len() as f64 },
            final_spot: stat(|r| r.final_spot),
            swap_count: stat(|r| r.swap_count as f64),
            events_created: stat(|r| r.events_created as f64),
            skill_purchases: stat(|r| r.skill_purchases as f64),
            skill_spend: stat(|r| r.skill_spend as f64),
            elapsed_ms: stat(|r| r.elapsed_ms as f64),
            individual_runs: runs,
        }
    }
}

// ─── Top-Level Report ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct BenchReport {
    pub timestamp_ms: u128,
    pub version: &'static str,
    pub prng: &'static str,
    pub ticks: u64,
    pub agents: usize,
    pub n_runs_per_scenario: usize,
    pub summary: Summary,
    pub scenarios: Vec<ScenarioReport>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}
