// Bench scenarios: config overrides plus the scripted world activity that
// runs alongside the economy each tick.

use std::sync::Arc;

use arena_economy::config::EconomyConfig;
use arena_economy::core_types::{SwapSide, Zone};
use arena_economy::skills::{OfflineModel, SkillError, SkillParams, SkillRequest};
use arena_economy::world::WorldMap;
use arena_economy::{AgentId, ArenaEconomy, EconomyError, PlotId, TownId};
use num_traits::ToPrimitive;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

use crate::report::RunResult;

pub struct Scenario {
    pub name: &'static str,
    pub label: &'static str,
    pub event_chance_pct: u32,
    pub pulse_enabled: bool,
    /// Per-tick chance (percent) that some agent builds.
    pub build_pct: u32,
    /// A skill purchase is attempted every `skill_every` ticks (0 = never).
    pub skill_every: u64,
}

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "BASELINE",
            label: "Baseline economy",
            event_chance_pct: 20,
            pulse_enabled: true,
            build_pct: 15,
            skill_every: 5,
        },
        Scenario {
            name: "QUIET_MARKET",
            label: "Pulse disabled",
            event_chance_pct: 20,
            pulse_enabled: false,
            build_pct: 15,
            skill_every: 5,
        },
        Scenario {
            name: "EVENT_STORM",
            label: "Event every eligible tick",
            event_chance_pct: 100,
            pulse_enabled: true,
            build_pct: 40,
            skill_every: 0,
        },
        Scenario {
            name: "SKILL_RUSH",
            label: "Skill purchase every tick",
            event_chance_pct: 10,
            pulse_enabled: true,
            build_pct: 10,
            skill_every: 1,
        },
    ]
}

// ─── Single run ─────────────────────────────────────────────────────────────

pub fn run_scenario(
    scenario: &Scenario,
    base: &EconomyConfig,
    ticks: u64,
    agents: usize,
    seed: u64,
) -> Result<(RunResult, ArenaEconomy), EconomyError> {
    let start = Instant::now();
    let mut config = base.clone();
    config.seed = seed;
    config.events.chance_pct = scenario.event_chance_pct;
    config.pulse.enabled = scenario.pulse_enabled;

    let mut economy = ArenaEconomy::with_config(config, Arc::new(OfflineModel))?;
    economy.populate(agents)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x5eed_b3c4);
    let mut result = RunResult::new(scenario.name, seed);

    for _ in 0..ticks {
        let tick = economy.tick_core();
        if let Some(pulse) = &tick.pulse {
            result.pulse_trades += pulse.executed as u64;
            result.pulse_failures += pulse.failed as u64;
        }
        result.events_created += u64::from(tick.events.created.is_some());
        result.events_failed += tick.events.failed as u64;
        if !tick.conserved {
            result.conservation_violations += 1;
        }

        if rng.gen_range(0..100) < scenario.build_pct {
            build_somewhere(&mut economy, &mut rng, agents, tick.tick, &mut result)?;
        }

        if scenario.skill_every > 0 && tick.tick % scenario.skill_every == 0 {
            buy_skill(&economy, &mut rng, agents, &mut result);
        }
    }

    let pool = economy.engine().pool_summary()?;
    result.final_spot = pool.spot_price.and_then(|p| p.to_f64()).unwrap_or(0.0);
    result.swap_count = economy.store().swap_count()? as u64;
    result.fees_reserve = pool.cumulative_fees_reserve;
    result.fees_arena = pool.cumulative_fees_arena;
    result.treasury_arena = pool.treasury_arena;
    result.structures = economy.world().structures().len() as u64;
    result.conservation_holds = !economy.conservation_tripped() && result.conservation_violations == 0;
    result.elapsed_ms = start.elapsed().as_millis();
    Ok((result, economy))
}

fn agent_id(rng: &mut ChaCha8Rng, agents: usize) -> AgentId {
    AgentId::from(format!("agent-{:02}", rng.gen_range(0..agents.max(1))))
}

fn build_somewhere(
    economy: &mut ArenaEconomy,
    rng: &mut ChaCha8Rng,
    agents: usize,
    tick: u64,
    result: &mut RunResult,
) -> Result<(), EconomyError> {
    let towns = economy.world().towns();
    if towns.is_empty() {
        return Ok(());
    }
    let town = towns[rng.gen_range(0..towns.len())].clone();
    let zone = economy
        .events()
        .get_gold_rush_zone()
        .filter(|_| rng.gen_bool(0.5))
        .unwrap_or_else(|| Zone::ALL[rng.gen_range(0..Zone::ALL.len())]);
    let cost = economy.world().typical_costs(Some(&town)).total();
    let invested = (rust_decimal::Decimal::from(cost) * economy.events().get_cost_multiplier())
        .floor()
        .to_u64()
        .unwrap_or(cost);
    let plot = PlotId::from(format!("plot-{tick}"));
    let owner = agent_id(rng, agents);
    economy.world().build(plot.clone(), town.clone(), zone, Some(owner.clone()), invested)?;
    result.builds += 1;

    settle_build_claims(economy, &owner, &town, zone, &plot, result);
    Ok(())
}

/// A finished structure may claim the open gold rush for its zone and the
/// bounty on its town. Only the builder is paid.
fn settle_build_claims(
    economy: &mut ArenaEconomy,
    owner: &AgentId,
    town: &TownId,
    zone: Zone,
    plot: &PlotId,
    result: &mut RunResult,
) {
    match economy.events_mut().claim_gold_rush(zone, plot) {
        Ok(true) => result.gold_rush_claims += 1,
        Ok(false) => {}
        Err(err) => tracing::warn!(plot = %plot, error = %err, "gold rush claim failed"),
    }
    match economy.events_mut().claim_bounty(owner, town) {
        Ok(Some(_)) => result.bounty_claims += 1,
        Ok(None) => {}
        Err(err) => tracing::warn!(agent = %owner, error = %err, "bounty claim failed"),
    }
}

fn buy_skill(economy: &ArenaEconomy, rng: &mut ChaCha8Rng, agents: usize, result: &mut RunResult) {
    let agent = agent_id(rng, agents);
    let Ok(Some(account)) = economy.store().agent(&agent) else {
        return;
    };
    let request = match rng.gen_range(0..3) {
        0 => SkillRequest {
            agent_id: agent.clone(),
            question: "How much does a big buy move the price?".to_string(),
            why_now: "The pool looks thin after the last wave of sells.".to_string(),
            expected_next_action: "buy arena with half my reserve".to_string(),
            if_then: "If impact stays under 2% I buy, otherwise I wait.".to_string(),
            params: SkillParams::MarketDepth {
                side: SwapSide::BuyArena,
                amount_in: account.reserve_balance / 2,
            },
        },
        1 => SkillRequest {
            agent_id: agent.clone(),
            question: "Which structures pay best right now?".to_string(),
            why_now: "I have enough bankroll to build this round.".to_string(),
            expected_next_action: "build on my empty plot".to_string(),
            if_then: "If a zone has a yield bonus I build there.".to_string(),
            params: SkillParams::BlueprintIndex { zone: None, plot: None },
        },
        _ => SkillRequest {
            agent_id: agent.clone(),
            question: "Is there open land worth claiming?".to_string(),
            why_now: "A new event just changed costs.".to_string(),
            expected_next_action: "claim a plot".to_string(),
            if_then: "If claims are cheap I claim, else I hold.".to_string(),
            params: SkillParams::ScoutReport {
                zone: Some(Zone::ALL[rng.gen_range(0..Zone::ALL.len())]),
                town: account.town.clone(),
            },
        },
    };

    match economy.broker().buy_skill(&request) {
        Ok(purchase) => {
            result.skill_purchases += 1;
            result.skill_spend += purchase.record.price_arena;
        }
        Err(SkillError::Throttled(_)) | Err(SkillError::CacheStillValid { .. }) => result.skill_throttled += 1,
        Err(err) => {
            tracing::debug!(agent = %agent, error = %err, "skill purchase rejected");
            result.skill_rejected += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_economy::events::WorldEventType;

    fn quiet_economy() -> ArenaEconomy {
        let mut config = EconomyConfig::default();
        config.pulse.enabled = false;
        config.events.chance_pct = 0;
        let mut economy = ArenaEconomy::with_config(config, Arc::new(OfflineModel)).expect("test: economy");
        economy.populate(4).expect("test: populate");
        economy
    }

    #[test]
    fn bounty_goes_to_builder_in_target_town() {
        let mut economy = quiet_economy();
        let now = economy.current_tick();
        economy.events_mut().spawn(WorldEventType::Bounty, now).expect("test: bounty");
        let target = economy.events().get_active_bounty().expect("test: active").town;
        let elsewhere = economy
            .world()
            .towns()
            .into_iter()
            .find(|t| *t != target)
            .expect("test: other town");

        let owner = AgentId::from("agent-01");
        let before = economy.store().agent(&owner).expect("test: read").expect("test: agent").bankroll;
        let mut result = RunResult::new("TEST", 0);

        settle_build_claims(&mut economy, &owner, &elsewhere, Zone::Civic, &PlotId::from("p-1"), &mut result);
        assert_eq!(result.bounty_claims, 0);

        settle_build_claims(&mut economy, &owner, &target, Zone::Civic, &PlotId::from("p-2"), &mut result);
        assert_eq!(result.bounty_claims, 1);
        let after = economy.store().agent(&owner).expect("test: read").expect("test: agent").bankroll;
        assert_eq!(after, before + 50);
        assert!(economy.events().get_active_bounty().is_none());
    }

    #[test]
    fn no_builds_means_no_bounties_paid() {
        let scenario = Scenario {
            name: "NO_BUILDS",
            label: "Events without construction",
            event_chance_pct: 100,
            pulse_enabled: false,
            build_pct: 0,
            skill_every: 0,
        };
        let (result, _) =
            run_scenario(&scenario, &EconomyConfig::default(), 60, 6, 11).expect("test: run");
        assert!(result.events_created > 0);
        assert_eq!(result.builds, 0);
        assert_eq!(result.bounty_claims, 0);
        assert!(result.conservation_holds);
    }
}
