// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Economy Core - Paid Skill Broker
//
// Agents spend arena on computed artifacts. A purchase runs a fixed
// pipeline and stops at the first failing stage:
//
//   justification -> stake threshold -> cache -> throttle -> execute -> settle
//
// Throttle counters and the result cache live in memory, keyed by agent,
// and only advance after settlement commits. All purchases by one agent are
// serialized on that agent's state lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, TickSource};
use crate::config::SkillConfig;
use crate::core_types::{bps_of, AgentId, BPS_SCALE, PlotId, SkillKind, SwapSide, Tick, TownId, Zone};
use crate::fee_distribution::{agent_account, LedgerEntry, LedgerEntryType, ACCOUNT_TREASURY};
use crate::market::{MarketEngine, MarketError, MAX_HISTORY_LIMIT, MIN_HISTORY_LIMIT};
use crate::store::{AgentAccount, SkillPurchaseRecord, StoreError};
use crate::world::WorldMap;

pub const GLOBAL_GAP_TICKS: Tick = 2;
pub const WINDOW_TICKS: Tick = 10;
pub const MAX_PURCHASES_PER_WINDOW: u32 = 2;
pub const MIN_WINDOW_SPEND: u64 = 25;
/// Share of a town's typical claim+build cost an agent may spend per window.
pub const WINDOW_SPEND_BPS: u64 = 1_500;
pub const DESTITUTE_BELOW: u64 = 25;
pub const MAX_SKILL_PRICE: u64 = 250;
/// Market-depth reads are only sold for trades of at least this share of
/// the relevant balance.
pub const MARKET_DEPTH_MIN_STAKE_BPS: u64 = 2_500;

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSpec {
    pub kind: SkillKind,
    /// Value in reserve units, converted to arena at spot.
    pub base_price_reserve: u64,
    pub ttl_ticks: Tick,
    pub min_gap_ticks: Tick,
    /// Arena price used when no spot price is available.
    pub fallback_price: u64,
}

pub fn skill_spec(kind: SkillKind) -> SkillSpec {
    let (base_price_reserve, ttl_ticks, min_gap_ticks, fallback_price) = match kind {
        SkillKind::MarketDepth => (40, 3, 3, 5),
        SkillKind::BlueprintIndex => (80, 8, 6, 10),
        SkillKind::ScoutReport => (60, 6, 4, 8),
    };
    SkillSpec { kind, base_price_reserve, ttl_ticks, min_gap_ticks, fallback_price }
}

/// `ceil(base_reserve / spot)` clamped to `[1, 250]`, or the skill's
/// fallback price without a usable spot.
pub fn estimate_price(skill: SkillKind, spot: Option<Decimal>) -> u64 {
    let spec = skill_spec(skill);
    spot.filter(|p| *p > Decimal::ZERO)
        .and_then(|p| Decimal::from(spec.base_price_reserve).checked_div(p))
        .and_then(|arena| arena.ceil().to_u64())
        .map(|price| price.clamp(1, MAX_SKILL_PRICE))
        .unwrap_or(spec.fallback_price)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "skill", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillParams {
    MarketDepth { side: SwapSide, amount_in: u64 },
    BlueprintIndex { zone: Option<Zone>, plot: Option<PlotId> },
    ScoutReport { zone: Option<Zone>, town: Option<TownId> },
}

impl SkillParams {
    pub fn kind(&self) -> SkillKind {
        match self {
            Self::MarketDepth { .. } => SkillKind::MarketDepth,
            Self::BlueprintIndex { .. } => SkillKind::BlueprintIndex,
            Self::ScoutReport { .. } => SkillKind::ScoutReport,
        }
    }

    /// Stable string form used as the cache key.
    pub fn canonical(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRequest {
    pub agent_id: AgentId,
    pub question: String,
    pub why_now: String,
    pub expected_next_action: String,
    pub if_then: String,
    pub params: SkillParams,
}

impl SkillRequest {
    pub fn skill(&self) -> SkillKind {
        self.params.kind()
    }
}

/// What the stated next action is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionIntent {
    Trade,
    Build,
    Claim,
    Other,
}

impl ActionIntent {
    pub fn classify(text: &str) -> Self {
        let text = text.to_ascii_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| text.contains(w));
        if has(&["buy", "sell", "swap", "trade"]) {
            ActionIntent::Trade
        } else if has(&["claim"]) {
            ActionIntent::Claim
        } else if has(&["build", "construct", "upgrade"]) {
            ActionIntent::Build
        } else {
            ActionIntent::Other
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThrottleReason {
    GlobalGap { wait_ticks: Tick },
    SkillGap { skill: SkillKind, wait_ticks: Tick },
    WindowCount { limit: u32, window_ticks: Tick },
    WindowSpend { cap: u64, spent: u64, price: u64 },
}

impl fmt::Display for ThrottleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GlobalGap { wait_ticks } => {
                write!(f, "too soon after your last skill purchase, wait {wait_ticks} ticks")
            }
            Self::SkillGap { skill, wait_ticks } => {
                write!(f, "{skill} was bought recently, wait {wait_ticks} ticks")
            }
            Self::WindowCount { limit, window_ticks } => {
                write!(f, "at most {limit} skill purchases per {window_ticks} ticks")
            }
            Self::WindowSpend { cap, spent, price } => write!(
                f,
                "skill budget exhausted: {spent} of {cap} arena spent this window, price {price}"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkillError {
    #[error("skill purchase rejected: {0}")]
    ValidationFailed(String),
    #[error("previous {skill} result still valid, wait {wait_ticks} ticks")]
    CacheStillValid { skill: SkillKind, wait_ticks: Tick },
    #[error("skill purchase throttled: {0}")]
    Throttled(ThrottleReason),
    #[error("insufficient arena: needed {needed}, available {available}")]
    InsufficientBalance { needed: u64, available: u64 },
    #[error("agent {0} not found")]
    AgentNotFound(AgentId),
    #[error(transparent)]
    Market(#[from] MarketError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Model seam
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    Unavailable(String),
    #[error("model returned unusable output: {0}")]
    InvalidOutput(String),
    #[error("model timed out after {0} ms")]
    Timeout(u64),
}

/// Input handed to the inference collaborator for generative skills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillPrompt {
    pub skill: SkillKind,
    pub agent_id: AgentId,
    pub question: String,
    pub params: serde_json::Value,
    pub context: serde_json::Value,
}

pub trait SkillModel: Send + Sync {
    fn generate(&self, prompt: &SkillPrompt) -> Result<serde_json::Value, ModelError>;
}

impl<F> SkillModel for F
where
    F: Fn(&SkillPrompt) -> Result<serde_json::Value, ModelError> + Send + Sync,
{
    fn generate(&self, prompt: &SkillPrompt) -> Result<serde_json::Value, ModelError> {
        self(prompt)
    }
}

/// Model that is never reachable; every generative skill degrades to its
/// fallback output.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineModel;

impl SkillModel for OfflineModel {
    fn generate(&self, _prompt: &SkillPrompt) -> Result<serde_json::Value, ModelError> {
        Err(ModelError::Unavailable("no inference backend configured".to_string()))
    }
}

/// Run the model on a worker thread and give up after `timeout`.
fn generate_with_timeout(
    model: &Arc<dyn SkillModel>,
    prompt: SkillPrompt,
    timeout: Duration,
) -> Result<serde_json::Value, ModelError> {
    let (tx, rx) = mpsc::channel();
    let model = Arc::clone(model);
    thread::Builder::new()
        .name("skill-model".to_string())
        .spawn(move || {
            let _ = tx.send(model.generate(&prompt));
        })
        .map_err(|err| ModelError::Unavailable(err.to_string()))?;
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(ModelError::Timeout(timeout.as_millis() as u64)),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(ModelError::Unavailable("model worker exited without a result".to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillPurchase {
    pub record: SkillPurchaseRecord,
    /// Bankroll after settlement.
    pub bankroll_after: u64,
    /// True when the output is the deterministic fallback.
    pub degraded: bool,
}

/// Public activity-feed line. Carries the summary only, never the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillFeedItem {
    pub purchase_id: u64,
    pub agent_id: AgentId,
    pub skill: SkillKind,
    pub price_arena: u64,
    pub tick: Tick,
    pub summary: String,
}

// ---------------------------------------------------------------------------
// Per-agent throttle state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct AgentSkillState {
    last_purchase_tick: Option<Tick>,
    window_start_tick: Tick,
    purchases_in_window: u32,
    spent_in_window: u64,
    last_skill_tick: HashMap<SkillKind, Tick>,
    /// (skill, canonical params) -> tick the result was produced.
    cache: HashMap<(SkillKind, String), Tick>,
}

impl AgentSkillState {
    fn roll_window(&mut self, tick: Tick) {
        self.cache
            .retain(|(skill, _), produced| tick.saturating_sub(*produced) < skill_spec(*skill).ttl_ticks);
        if self.purchases_in_window == 0 || tick.saturating_sub(self.window_start_tick) >= WINDOW_TICKS {
            self.window_start_tick = tick;
            self.purchases_in_window = 0;
            self.spent_in_window = 0;
        }
    }

    fn check_cache(&self, skill: SkillKind, key: &str, tick: Tick) -> Result<(), SkillError> {
        let ttl = skill_spec(skill).ttl_ticks;
        if let Some(produced) = self.cache.get(&(skill, key.to_string())) {
            let age = tick.saturating_sub(*produced);
            if age < ttl {
                return Err(SkillError::CacheStillValid { skill, wait_ticks: ttl - age });
            }
        }
        Ok(())
    }

    fn check_throttle(&self, skill: SkillKind, tick: Tick, price: u64, spend_cap: u64) -> Result<(), ThrottleReason> {
        if let Some(last) = self.last_purchase_tick {
            let since = tick.saturating_sub(last);
            if since < GLOBAL_GAP_TICKS {
                return Err(ThrottleReason::GlobalGap { wait_ticks: GLOBAL_GAP_TICKS - since });
            }
        }
        let gap = skill_spec(skill).min_gap_ticks;
        if let Some(last) = self.last_skill_tick.get(&skill) {
            let since = tick.saturating_sub(*last);
            if since < gap {
                return Err(ThrottleReason::SkillGap { skill, wait_ticks: gap - since });
            }
        }
        if self.purchases_in_window >= MAX_PURCHASES_PER_WINDOW {
            return Err(ThrottleReason::WindowCount {
                limit: MAX_PURCHASES_PER_WINDOW,
                window_ticks: WINDOW_TICKS,
            });
        }
        if self.spent_in_window.saturating_add(price) > spend_cap {
            return Err(ThrottleReason::WindowSpend { cap: spend_cap, spent: self.spent_in_window, price });
        }
        Ok(())
    }

    fn record(&mut self, skill: SkillKind, key: String, tick: Tick, price: u64) {
        self.last_purchase_tick = Some(tick);
        self.last_skill_tick.insert(skill, tick);
        self.purchases_in_window += 1;
        self.spent_in_window = self.spent_in_window.saturating_add(price);
        self.cache.insert((skill, key), tick);
    }
}

// ---------------------------------------------------------------------------
// SkillBroker
// ---------------------------------------------------------------------------

pub struct SkillBroker {
    engine: Arc<MarketEngine>,
    world: Arc<dyn WorldMap>,
    model: Arc<dyn SkillModel>,
    ticks: Arc<dyn TickSource>,
    clock: Arc<dyn Clock>,
    config: SkillConfig,
    states: Mutex<HashMap<AgentId, Arc<Mutex<AgentSkillState>>>>,
    feed: Mutex<Vec<mpsc::Sender<SkillFeedItem>>>,
}

impl SkillBroker {
    pub fn new(
        engine: Arc<MarketEngine>,
        world: Arc<dyn WorldMap>,
        model: Arc<dyn SkillModel>,
        ticks: Arc<dyn TickSource>,
        clock: Arc<dyn Clock>,
        config: SkillConfig,
    ) -> Self {
        Self {
            engine,
            world,
            model,
            ticks,
            clock,
            config,
            states: Mutex::new(HashMap::new()),
            feed: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe_feed(&self) -> Result<mpsc::Receiver<SkillFeedItem>, SkillError> {
        let (tx, rx) = mpsc::channel();
        self.feed.lock().map_err(|_| StoreError::Poisoned)?.push(tx);
        Ok(rx)
    }

    /// Current arena price of `skill`.
    pub fn price_of(&self, skill: SkillKind) -> Result<u64, SkillError> {
        Ok(estimate_price(skill, self.engine.spot_price()?))
    }

    /// Most recent first, `limit` clamped to `[1, 200]`.
    pub fn list_purchases(
        &self,
        agent: Option<&AgentId>,
        limit: usize,
    ) -> Result<Vec<SkillPurchaseRecord>, SkillError> {
        let limit = limit.clamp(MIN_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
        Ok(self.engine.store().skill_purchases(agent, limit)?)
    }

    /// Per-window arena cap for an agent, from its town's typical costs.
    pub fn spend_cap(&self, agent: &AgentAccount) -> u64 {
        let costs = self.world.typical_costs(agent.town.as_ref());
        bps_of(costs.total(), WINDOW_SPEND_BPS).max(MIN_WINDOW_SPEND)
    }

    fn state_for(&self, agent: &AgentId) -> Result<Arc<Mutex<AgentSkillState>>, SkillError> {
        let tick = self.ticks.current_tick();
        let mut states = self.states.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(Arc::clone(states.entry(agent.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(AgentSkillState { window_start_tick: tick, ..AgentSkillState::default() }))
        })))
    }

    pub fn buy_skill(&self, request: &SkillRequest) -> Result<SkillPurchase, SkillError> {
        validate_justification(request)?;

        let agent = self
            .engine
            .store()
            .agent(&request.agent_id)?
            .ok_or_else(|| SkillError::AgentNotFound(request.agent_id.clone()))?;
        check_stake(request, &agent)?;

        let state = self.state_for(&request.agent_id)?;
        let mut state = state.lock().map_err(|_| StoreError::Poisoned)?;
        let tick = self.ticks.current_tick();
        let skill = request.skill();
        let key = request.params.canonical();

        state.check_cache(skill, &key, tick)?;

        state.roll_window(tick);
        let spot = self.engine.spot_price()?;
        let price = estimate_price(skill, spot);
        let cap = self.spend_cap(&agent);
        state
            .check_throttle(skill, tick, price, cap)
            .map_err(SkillError::Throttled)?;

        let (output, degraded) = self.execute(request, &agent, spot)?;
        let summary = public_summary(request, price, degraded);

        let now_ms = self.clock.now_ms();
        let record = SkillPurchaseRecord {
            id: 0,
            agent_id: request.agent_id.clone(),
            skill,
            price_arena: price,
            tick,
            question: request.question.clone(),
            why_now: request.why_now.clone(),
            expected_next_action: request.expected_next_action.clone(),
            if_then: request.if_then.clone(),
            params: serde_json::to_value(&request.params).unwrap_or(serde_json::Value::Null),
            output,
            public_summary: summary,
            created_at_ms: now_ms,
        };
        let (record, bankroll_after) = self.settle(record)?;

        state.record(skill, key, tick, price);
        drop(state);

        tracing::info!(
            agent = %record.agent_id,
            skill = %skill,
            price,
            tick,
            degraded,
            "skill purchased"
        );
        self.publish(SkillFeedItem {
            purchase_id: record.id,
            agent_id: record.agent_id.clone(),
            skill,
            price_arena: price,
            tick,
            summary: record.public_summary.clone(),
        });
        Ok(SkillPurchase { record, bankroll_after, degraded })
    }

    fn settle(&self, record: SkillPurchaseRecord) -> Result<(SkillPurchaseRecord, u64), SkillError> {
        let engine = &self.engine;
        engine.store().transact(|tx| {
            let mut agent = tx
                .agent(&record.agent_id)
                .ok_or_else(|| SkillError::AgentNotFound(record.agent_id.clone()))?;
            if agent.bankroll < record.price_arena {
                return Err(SkillError::InsufficientBalance {
                    needed: record.price_arena,
                    available: agent.bankroll,
                });
            }
            agent.bankroll -= record.price_arena;
            let mut pool = engine.active_pool_in(tx)?;
            pool.treasury_arena = pool
                .treasury_arena
                .checked_add(record.price_arena)
                .ok_or(MarketError::Overflow)?;

            tx.append_ledger(LedgerEntry::new(
                agent_account(&agent.id),
                ACCOUNT_TREASURY,
                record.price_arena,
                LedgerEntryType::SkillPurchase,
                Some(agent.id.clone()),
                serde_json::json!({ "skill": record.skill.label(), "tick": record.tick }),
                record.created_at_ms,
            ));
            let bankroll_after = agent.bankroll;
            tx.put_pool(pool)?;
            tx.put_agent(agent)?;
            let mut record = record;
            record.id = tx.append_purchase(record.clone());
            Ok((record, bankroll_after))
        })
    }

    fn publish(&self, item: SkillFeedItem) {
        if let Ok(mut feed) = self.feed.lock() {
            feed.retain(|tx| tx.send(item.clone()).is_ok());
        }
    }

    fn execute(
        &self,
        request: &SkillRequest,
        agent: &AgentAccount,
        spot: Option<Decimal>,
    ) -> Result<(serde_json::Value, bool), SkillError> {
        match &request.params {
            SkillParams::MarketDepth { side, amount_in } => {
                let quote = self.engine.quote(*side, *amount_in)?;
                let impact_pct = match (quote.price_before, quote.price_after) {
                    (Some(before), Some(after)) if before > Decimal::ZERO => {
                        ((after - before) / before * Decimal::ONE_HUNDRED).round_dp(2)
                    }
                    _ => Decimal::ZERO,
                };
                let pool = self.engine.pool_summary()?;
                Ok((
                    serde_json::json!({
                        "side": side,
                        "amountIn": quote.amount_in,
                        "amountOut": quote.amount_out,
                        "fee": quote.fee_amount,
                        "priceBefore": quote.price_before,
                        "priceAfter": quote.price_after,
                        "priceImpactPct": impact_pct,
                        "poolReserve": pool.reserve_balance,
                        "poolArena": pool.arena_balance,
                    }),
                    false,
                ))
            }
            SkillParams::BlueprintIndex { .. } | SkillParams::ScoutReport { .. } => {
                let prompt = self.prompt_for(request, agent, spot);
                let timeout = Duration::from_millis(self.config.model_timeout_ms);
                match generate_with_timeout(&self.model, prompt, timeout) {
                    Ok(output) if output.is_object() => Ok((output, false)),
                    Ok(_) => {
                        let err = ModelError::InvalidOutput("expected a JSON object".to_string());
                        tracing::warn!(skill = %request.skill(), error = %err, "skill model failed, using fallback");
                        Ok((self.fallback_output(request, agent), true))
                    }
                    Err(err) => {
                        tracing::warn!(skill = %request.skill(), error = %err, "skill model failed, using fallback");
                        Ok((self.fallback_output(request, agent), true))
                    }
                }
            }
        }
    }

    fn prompt_for(&self, request: &SkillRequest, agent: &AgentAccount, spot: Option<Decimal>) -> SkillPrompt {
        let costs = self.world.typical_costs(agent.town.as_ref());
        SkillPrompt {
            skill: request.skill(),
            agent_id: agent.id.clone(),
            question: request.question.clone(),
            params: serde_json::to_value(&request.params).unwrap_or(serde_json::Value::Null),
            context: serde_json::json!({
                "bankroll": agent.bankroll,
                "reserve": agent.reserve_balance,
                "town": agent.town,
                "spotPrice": spot,
                "typicalClaimCost": costs.claim_cost,
                "typicalBuildCost": costs.build_cost,
                "structures": self.world.structures().len(),
            }),
        }
    }

    /// Deterministic low-confidence output built from world data alone.
    fn fallback_output(&self, request: &SkillRequest, agent: &AgentAccount) -> serde_json::Value {
        let costs = self.world.typical_costs(agent.town.as_ref());
        match &request.params {
            SkillParams::ScoutReport { zone, town } => {
                let structures = self.world.structures();
                let in_zone = structures.iter().filter(|s| Some(s.zone) == *zone).count();
                let advice = if in_zone == 0 {
                    "zone is open; claim early"
                } else {
                    "zone is contested; compare costs first"
                };
                serde_json::json!({
                    "confidence": "low",
                    "fallback": true,
                    "zone": zone,
                    "town": town,
                    "structuresInZone": in_zone,
                    "typicalClaimCost": costs.claim_cost,
                    "advice": advice,
                })
            }
            _ => serde_json::json!({
                "confidence": "low",
                "fallback": true,
                "typicalBuildCost": costs.build_cost,
                "affordable": agent.bankroll >= costs.build_cost,
                "advice": "build the cheapest structure you can afford",
            }),
        }
    }
}

fn validate_justification(request: &SkillRequest) -> Result<(), SkillError> {
    let fields = [
        ("question", &request.question),
        ("why_now", &request.why_now),
        ("expected_next_action", &request.expected_next_action),
        ("if_then", &request.if_then),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(SkillError::ValidationFailed(format!("{name} must be stated")));
        }
    }
    Ok(())
}

fn check_stake(request: &SkillRequest, agent: &AgentAccount) -> Result<(), SkillError> {
    let intent = ActionIntent::classify(&request.expected_next_action);
    match &request.params {
        SkillParams::MarketDepth { side, amount_in } => {
            if intent != ActionIntent::Trade {
                return Err(SkillError::ValidationFailed(
                    "market depth is only sold ahead of a trade".to_string(),
                ));
            }
            let balance = match side {
                SwapSide::BuyArena => agent.reserve_balance,
                SwapSide::SellArena => agent.bankroll,
            };
            // no rounding: exactly 25% or more
            let staked = (*amount_in as u128) * (BPS_SCALE as u128);
            let required = (balance as u128) * (MARKET_DEPTH_MIN_STAKE_BPS as u128);
            if balance == 0 || staked < required {
                return Err(SkillError::ValidationFailed(format!(
                    "trade of {amount_in} is below 25% of the {balance} balance at stake"
                )));
            }
        }
        SkillParams::BlueprintIndex { .. } => {
            if intent != ActionIntent::Build {
                return Err(SkillError::ValidationFailed(
                    "blueprint index is only sold ahead of a build".to_string(),
                ));
            }
            if agent.bankroll < DESTITUTE_BELOW && agent.reserve_balance < DESTITUTE_BELOW {
                return Err(SkillError::ValidationFailed(
                    "agent cannot afford to act on a blueprint".to_string(),
                ));
            }
        }
        SkillParams::ScoutReport { zone, .. } => {
            if !matches!(intent, ActionIntent::Claim | ActionIntent::Build) {
                return Err(SkillError::ValidationFailed(
                    "scout report is only sold ahead of a claim or build".to_string(),
                ));
            }
            if zone.is_none() {
                return Err(SkillError::ValidationFailed("scout report needs a target zone".to_string()));
            }
        }
    }
    Ok(())
}

fn public_summary(request: &SkillRequest, price: u64, degraded: bool) -> String {
    let mut summary = format!(
        "{} bought a {} for {} arena",
        request.agent_id,
        request.skill().display_name(),
        price
    );
    match &request.params {
        SkillParams::ScoutReport { zone: Some(zone), .. } => summary.push_str(&format!(" (scouting {zone})")),
        SkillParams::BlueprintIndex { zone: Some(zone), .. } => summary.push_str(&format!(" (planning in {zone})")),
        _ => {}
    }
    if degraded {
        summary.push_str(" [low confidence]");
    }
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
