// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Economy Core - Economy Composition
//
// Wires the services together around one store and one logical clock, and
// advances them in lockstep: one `tick_core` = pulse step, event tick,
// conservation check.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::clock::{ManualClock, SharedTick, TickSource};
use crate::conservation::{ConservationMonitor, SupplyReport};
use crate::config::EconomyConfig;
use crate::core_types::{AgentArchetype, Tick, Zone};
use crate::events::{EventTickSummary, WorldEventGenerator};
use crate::market::{MarketEngine, MarketError};
use crate::pulse::{MarketPulse, PulseReport};
use crate::skills::{SkillBroker, SkillModel};
use crate::store::{AgentAccount, EconomyStore, StoreError};
use crate::world::{InMemoryWorld, TownCosts, WorldError};

/// Wall-clock start of the simulated clock (2026-01-01T00:00:00Z).
pub const SIM_EPOCH_MS: u64 = 1_767_225_600_000;

const ARCHETYPES: [AgentArchetype; 5] = [
    AgentArchetype::Contrarian,
    AgentArchetype::MomentumChaser,
    AgentArchetype::Holder,
    AgentArchetype::Accumulator,
    AgentArchetype::VibeTrader,
];

const DEMO_TOWNS: [(&str, u64, u64); 3] = [("harbor", 120, 480), ("mesa", 200, 900), ("ridge", 80, 320)];

#[derive(Debug, thiserror::Error)]
pub enum EconomyError {
    #[error(transparent)]
    Market(#[from] MarketError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    World(#[from] WorldError),
}

// ─── Tick result ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyTick {
    pub tick: Tick,
    pub pulse: Option<PulseReport>,
    pub events: EventTickSummary,
    pub spot_price: Option<Decimal>,
    pub conserved: bool,
}

// ─── ArenaEconomy struct ─────────────────────────────────────────────────────

#[wasm_bindgen]
pub struct ArenaEconomy {
    pub(crate) config: EconomyConfig,
    pub(crate) store: Arc<EconomyStore>,
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) ticks: SharedTick,
    pub(crate) world: Arc<InMemoryWorld>,
    pub(crate) engine: Arc<MarketEngine>,
    pub(crate) pulse: MarketPulse,
    pub(crate) events: WorldEventGenerator,
    pub(crate) broker: SkillBroker,
    pub(crate) monitor: ConservationMonitor,
}

// ─── Internal Logic (Testable, pure Rust) ────────────────────────────────────

impl ArenaEconomy {
    pub fn with_config(config: EconomyConfig, model: Arc<dyn SkillModel>) -> Result<Self, EconomyError> {
        let store = Arc::new(EconomyStore::new());
        let clock = Arc::new(ManualClock::new(SIM_EPOCH_MS));
        let ticks = SharedTick::new(0);
        let world = Arc::new(InMemoryWorld::new());
        let engine = Arc::new(MarketEngine::new(Arc::clone(&store), config.market.clone(), clock.clone())?);
        engine.ensure_pool()?;

        let pulse = MarketPulse::new(Arc::clone(&engine), config.pulse.clone(), clock.clone(), config.seed);
        let events = WorldEventGenerator::new(
            config.events.clone(),
            Arc::clone(&store),
            world.clone(),
            clock.clone(),
            config.seed.wrapping_add(1),
        );
        let broker = SkillBroker::new(
            Arc::clone(&engine),
            world.clone(),
            model,
            Arc::new(ticks.clone()),
            clock.clone(),
            config.skills.clone(),
        );

        Ok(Self {
            config,
            store,
            clock,
            ticks,
            world,
            engine,
            pulse,
            events,
            broker,
            monitor: ConservationMonitor::default(),
        })
    }

    /// Seed the demo towns and `agents` trading agents with varied balances.
    pub fn populate(&mut self, agents: usize) -> Result<(), EconomyError> {
        for (town, claim_cost, build_cost) in DEMO_TOWNS {
            self.world.add_town(town, TownCosts { claim_cost, build_cost })?;
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(2));
        for i in 0..agents {
            let archetype = ARCHETYPES[i % ARCHETYPES.len()];
            let (town, _, _) = DEMO_TOWNS[i % DEMO_TOWNS.len()];
            let bankroll = rng.gen_range(0..=20_000u64);
            let reserve = rng.gen_range(2_000..=40_000u64);
            let account = AgentAccount::new(format!("agent-{i:02}"), archetype, bankroll, reserve).with_town(town);
            self.store.register_agent(account)?;
        }
        tracing::info!(agents, towns = DEMO_TOWNS.len(), "economy populated");
        Ok(())
    }

    /// One simulation tick. Pulse failures are logged, never fatal.
    pub fn tick_core(&mut self) -> EconomyTick {
        let tick = self.ticks.advance();
        self.clock.advance_ms(self.config.pulse.interval_ms);

        let pulse = if self.config.pulse.enabled {
            match self.pulse.step() {
                Ok(report) => Some(report),
                Err(err) => {
                    tracing::warn!(tick, error = %err, "pulse step failed");
                    None
                }
            }
        } else {
            None
        };

        let events = self.events.tick(tick);
        let conserved = self.monitor.check(&self.store).is_ok();
        let spot_price = self.engine.spot_price().ok().flatten();

        EconomyTick { tick, pulse, events, spot_price, conserved }
    }

    pub fn current_tick(&self) -> Tick {
        self.ticks.current_tick()
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<EconomyStore> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<MarketEngine> {
        &self.engine
    }

    pub fn world(&self) -> &Arc<InMemoryWorld> {
        &self.world
    }

    pub fn broker(&self) -> &SkillBroker {
        &self.broker
    }

    pub fn events(&self) -> &WorldEventGenerator {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut WorldEventGenerator {
        &mut self.events
    }

    pub fn supply_report(&self) -> Result<SupplyReport, StoreError> {
        Ok(SupplyReport::from_snapshot(&self.store.snapshot()?))
    }

    pub fn conservation_tripped(&self) -> bool {
        self.monitor.is_tripped()
    }

    pub fn yield_multiplier_for(&self, zone: Option<Zone>) -> Decimal {
        self.events.get_yield_multiplier(zone)
    }
}
