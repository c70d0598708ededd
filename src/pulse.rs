// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Economy Core - Market Pulse
//
// Cheap background trading that keeps the pool moving. Each step picks a
// few eligible agents at random and places one small archetype-flavoured
// swap for each. Swap failures are logged and skipped; the pulse never
// stops the simulation over an economic edge case.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::PulseConfig;
use crate::core_types::{AgentArchetype, AgentId, SwapSide, BPS_SCALE};
use crate::market::{MarketEngine, MarketError};
use crate::store::AgentAccount;

pub const AGENT_COOLDOWN_MS: u64 = 3_500;
pub const MIN_TRADE_IN: u64 = 120;
pub const MAX_TRADE_IN: u64 = 6_000;
/// Trade-size jitter, in basis points either side.
pub const JITTER_BPS: i64 = 1_500;

const SHARE_LOW: Decimal = dec!(0.2);
const SHARE_HIGH: Decimal = dec!(0.8);
const SHARE_NUDGE_PCT: i64 = 25;
const BUY_PCT_MIN: i64 = 5;
const BUY_PCT_MAX: i64 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    fn of(delta: Decimal) -> Self {
        if delta > Decimal::ZERO {
            Trend::Up
        } else if delta < Decimal::ZERO {
            Trend::Down
        } else {
            Trend::Flat
        }
    }
}

/// Share of the relevant balance each archetype trades, in basis points.
pub fn trade_fraction_bps(archetype: AgentArchetype) -> u64 {
    match archetype {
        AgentArchetype::Contrarian => 400,
        AgentArchetype::MomentumChaser => 600,
        AgentArchetype::Holder => 120,
        AgentArchetype::Accumulator => 200,
        AgentArchetype::VibeTrader => 350,
    }
}

/// Base probability of buying arena, in percent.
fn base_buy_pct(archetype: AgentArchetype, trend: Trend) -> i64 {
    match (archetype, trend) {
        (AgentArchetype::Contrarian, Trend::Up) => 25,
        (AgentArchetype::Contrarian, Trend::Down) => 75,
        (AgentArchetype::MomentumChaser, Trend::Up) => 75,
        (AgentArchetype::MomentumChaser, Trend::Down) => 25,
        (AgentArchetype::VibeTrader, Trend::Up) => 60,
        (AgentArchetype::VibeTrader, Trend::Down) => 40,
        (AgentArchetype::Accumulator, _) => 70,
        _ => 50,
    }
}

/// One planned pulse trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTrade {
    pub agent_id: AgentId,
    pub side: SwapSide,
    pub amount_in: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PulseReport {
    pub eligible: usize,
    pub selected: usize,
    pub executed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub trend: Decimal,
}

pub struct MarketPulse {
    engine: Arc<MarketEngine>,
    config: PulseConfig,
    clock: Arc<dyn Clock>,
    rng: ChaCha8Rng,
    last_spot: Option<Decimal>,
    last_trade_ms: HashMap<AgentId, u64>,
}

impl MarketPulse {
    pub fn new(engine: Arc<MarketEngine>, config: PulseConfig, clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self {
            engine,
            config,
            clock,
            rng: ChaCha8Rng::seed_from_u64(seed),
            last_spot: None,
            last_trade_ms: HashMap::new(),
        }
    }

    /// Run one pulse tick.
    pub fn step(&mut self) -> Result<PulseReport, MarketError> {
        let now_ms = self.clock.now_ms();
        let spot = self.engine.spot_price()?;
        let trend = match (spot, self.last_spot) {
            (Some(now), Some(before)) => now - before,
            _ => Decimal::ZERO,
        };
        self.last_spot = spot;

        let eligible: Vec<AgentAccount> = self
            .engine
            .store()
            .active_agents()?
            .into_iter()
            .filter(|a| {
                self.last_trade_ms
                    .get(&a.id)
                    .map_or(true, |last| now_ms.saturating_sub(*last) >= AGENT_COOLDOWN_MS)
            })
            .collect();

        let selected: Vec<AgentAccount> = eligible
            .choose_multiple(&mut self.rng, self.config.trades_per_tick)
            .cloned()
            .collect();

        let mut report = PulseReport {
            eligible: eligible.len(),
            selected: selected.len(),
            trend,
            ..PulseReport::default()
        };

        for agent in &selected {
            let Some(plan) = self.plan_trade(agent, spot, trend) else {
                report.skipped += 1;
                continue;
            };
            match self.engine.swap(&plan.agent_id, plan.side, plan.amount_in, None) {
                Ok(outcome) => {
                    report.executed += 1;
                    self.last_trade_ms.insert(plan.agent_id.clone(), now_ms);
                    tracing::debug!(
                        agent = %plan.agent_id,
                        side = %plan.side,
                        amount_in = plan.amount_in,
                        amount_out = outcome.swap.amount_out,
                        "pulse trade"
                    );
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::debug!(agent = %plan.agent_id, error = %err, "pulse trade skipped");
                }
            }
        }
        Ok(report)
    }

    /// Pick a side and size for `agent`, or `None` if it cannot trade the
    /// minimum.
    pub fn plan_trade(&mut self, agent: &AgentAccount, spot: Option<Decimal>, trend: Decimal) -> Option<PlannedTrade> {
        let side = match (agent.reserve_balance, agent.bankroll) {
            (0, 0) => return None,
            (_, 0) => SwapSide::BuyArena,
            (0, _) => SwapSide::SellArena,
            (reserve, bankroll) => {
                let mut buy_pct = base_buy_pct(agent.archetype, Trend::of(trend));
                if let Some(spot) = spot {
                    let arena_value = Decimal::from(bankroll) * spot;
                    let total = Decimal::from(reserve) + arena_value;
                    if total > Decimal::ZERO {
                        let share = arena_value / total;
                        if share < SHARE_LOW {
                            buy_pct += SHARE_NUDGE_PCT;
                        } else if share > SHARE_HIGH {
                            buy_pct -= SHARE_NUDGE_PCT;
                        }
                    }
                }
                let buy_pct = buy_pct.clamp(BUY_PCT_MIN, BUY_PCT_MAX);
                if self.rng.gen_range(0..100) < buy_pct {
                    SwapSide::BuyArena
                } else {
                    SwapSide::SellArena
                }
            }
        };

        let balance = match side {
            SwapSide::BuyArena => agent.reserve_balance,
            SwapSide::SellArena => agent.bankroll,
        };
        let jitter_bps = self.rng.gen_range(-JITTER_BPS..=JITTER_BPS);
        let amount_in = jittered_size(balance, trade_fraction_bps(agent.archetype), jitter_bps)
            .clamp(MIN_TRADE_IN, MAX_TRADE_IN)
            .min(balance);
        if amount_in < MIN_TRADE_IN {
            return None;
        }
        Some(PlannedTrade { agent_id: agent.id.clone(), side, amount_in })
    }

    /// Run `step` on a worker thread every `interval_ms` until the handle
    /// is stopped or dropped.
    pub fn spawn(self) -> std::io::Result<PulseHandle> {
        let interval = Duration::from_millis(self.config.interval_ms);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let mut pulse = self;
        let worker = thread::Builder::new().name("market-pulse".to_string()).spawn(move || {
            let mut ticks = 0u64;
            loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        ticks += 1;
                        if let Err(err) = pulse.step() {
                            tracing::warn!(error = %err, "market pulse step failed");
                        }
                    }
                }
            }
            tracing::info!(ticks, "market pulse stopped");
            pulse
        })?;
        Ok(PulseHandle { stop_tx: Some(stop_tx), worker: Some(worker) })
    }
}

/// `floor(balance * fraction * (1 + jitter))`, all in basis points.
fn jittered_size(balance: u64, fraction_bps: u64, jitter_bps: i64) -> u64 {
    let scale = BPS_SCALE as i128;
    let factor = (scale + jitter_bps as i128).max(0) as u128;
    let wide = (balance as u128) * (fraction_bps as u128) * factor / (BPS_SCALE as u128 * BPS_SCALE as u128);
    u64::try_from(wide).unwrap_or(u64::MAX)
}

/// Cancellation handle for a background pulse.
pub struct PulseHandle {
    stop_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<MarketPulse>>,
}

impl PulseHandle {
    /// Stop the worker and hand the pulse back.
    pub fn stop(mut self) -> Option<MarketPulse> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<MarketPulse> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        self.worker.take().and_then(|worker| worker.join().ok())
    }
}

impl Drop for PulseHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::MarketConfig;
    use crate::store::EconomyStore;

    fn fixture(trades_per_tick: usize) -> (MarketPulse, Arc<MarketEngine>, Arc<ManualClock>) {
        let store = Arc::new(EconomyStore::new());
        let clock = Arc::new(ManualClock::new(10_000));
        let engine = Arc::new(
            MarketEngine::new(store, MarketConfig::default(), clock.clone()).expect("test: engine"),
        );
        let config = PulseConfig { enabled: true, interval_ms: 250, trades_per_tick };
        let pulse = MarketPulse::new(Arc::clone(&engine), config, clock.clone(), 11);
        (pulse, engine, clock)
    }

    fn register(engine: &MarketEngine, id: &str, archetype: AgentArchetype, bankroll: u64, reserve: u64) {
        engine
            .store()
            .register_agent(AgentAccount::new(id, archetype, bankroll, reserve))
            .expect("test: register");
    }

    #[test]
    fn jitter_math() {
        assert_eq!(jittered_size(100_000, 400, 0), 4_000);
        assert_eq!(jittered_size(100_000, 400, 1_500), 4_600);
        assert_eq!(jittered_size(100_000, 400, -1_500), 3_400);
    }

    #[test]
    fn single_asset_agents_trade_what_they_hold() {
        let (mut pulse, _, _) = fixture(1);
        let reserve_only = AgentAccount::new("r", AgentArchetype::Contrarian, 0, 50_000);
        let arena_only = AgentAccount::new("a", AgentArchetype::Contrarian, 50_000, 0);
        for _ in 0..20 {
            let plan = pulse.plan_trade(&reserve_only, Some(dec!(1)), dec!(0.5)).expect("test: plan");
            assert_eq!(plan.side, SwapSide::BuyArena);
            let plan = pulse.plan_trade(&arena_only, Some(dec!(1)), dec!(-0.5)).expect("test: plan");
            assert_eq!(plan.side, SwapSide::SellArena);
        }
    }

    #[test]
    fn sizes_are_clamped() {
        let (mut pulse, _, _) = fixture(1);
        let whale = AgentAccount::new("w", AgentArchetype::MomentumChaser, 0, 10_000_000);
        let small = AgentAccount::new("s", AgentArchetype::Holder, 0, 500);
        let dust = AgentAccount::new("d", AgentArchetype::Holder, 0, 100);
        for _ in 0..20 {
            let plan = pulse.plan_trade(&whale, None, Decimal::ZERO).expect("test: plan");
            assert_eq!(plan.amount_in, MAX_TRADE_IN);
            let plan = pulse.plan_trade(&small, None, Decimal::ZERO).expect("test: plan");
            assert_eq!(plan.amount_in, MIN_TRADE_IN);
            assert!(pulse.plan_trade(&dust, None, Decimal::ZERO).is_none());
        }
    }

    #[test]
    fn share_nudge_leans_buy_when_underweight() {
        let (mut pulse, _, _) = fixture(1);
        // Holder: 50% base, arena share ~1% -> 75% buy.
        let underweight = AgentAccount::new("u", AgentArchetype::Holder, 1_000, 100_000);
        let buys = (0..2_000)
            .filter_map(|_| pulse.plan_trade(&underweight, Some(dec!(1)), Decimal::ZERO))
            .filter(|p| p.side == SwapSide::BuyArena)
            .count();
        assert!(buys > 1_300 && buys < 1_700, "buys={buys}");
    }

    #[test]
    fn step_trades_and_respects_cooldown() {
        let (mut pulse, engine, clock) = fixture(2);
        register(&engine, "a", AgentArchetype::Accumulator, 0, 100_000);
        register(&engine, "b", AgentArchetype::VibeTrader, 0, 100_000);

        let report = pulse.step().expect("test: step");
        assert_eq!(report.executed, 2);
        assert_eq!(engine.store().swap_count().expect("test: count"), 2);

        clock.advance_ms(1_000);
        let report = pulse.step().expect("test: step");
        assert_eq!(report.eligible, 0);
        assert_eq!(report.executed, 0);
        assert!(report.trend > Decimal::ZERO);

        clock.advance_ms(AGENT_COOLDOWN_MS);
        let report = pulse.step().expect("test: step");
        assert_eq!(report.eligible, 2);
        crate::conservation::audit(engine.store()).expect("test: conserved");
    }

    #[test]
    fn inactive_and_broke_agents_do_not_trade() {
        let (mut pulse, engine, _) = fixture(5);
        register(&engine, "off", AgentArchetype::Holder, 10_000, 10_000);
        register(&engine, "broke", AgentArchetype::Holder, 0, 0);
        engine.store().set_agent_active(&"off".into(), false).expect("test: deactivate");

        let report = pulse.step().expect("test: step");
        assert_eq!(report.eligible, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.executed, 0);
    }

    #[test]
    fn background_pulse_stops_cleanly() {
        let store = Arc::new(EconomyStore::new());
        let clock: Arc<dyn Clock> = Arc::new(crate::clock::SystemClock);
        let engine = Arc::new(
            MarketEngine::new(store, MarketConfig::default(), Arc::clone(&clock)).expect("test: engine"),
        );
        register(&engine, "bg", AgentArchetype::MomentumChaser, 50_000, 50_000);
        let config = PulseConfig { enabled: true, interval_ms: 250, trades_per_tick: 1 };
        let handle = MarketPulse::new(Arc::clone(&engine), config, clock, 3)
            .spawn()
            .expect("test: spawn");
        std::thread::sleep(Duration::from_millis(700));
        let pulse = handle.stop();
        assert!(pulse.is_some());
        assert!(engine.store().swap_count().expect("test: count") >= 1);
    }
}
