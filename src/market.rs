// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Economy Core - Market Engine
//
// Constant-product pricing over the reserve/arena pool and the atomic swap
// that moves pool balances, agent balances, fee counters and ledger rows
// together. All balance math is integer (u128 intermediates); spot prices
// are `Decimal` and only ever reported, never used to move value.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::{MarketConfig, MAX_FEE_BPS};
use crate::core_types::{bps_of, spot_price, AgentId, SwapSide};
use crate::fee_distribution::{FeeSplitter, LedgerEntry};
use crate::store::{AgentAccount, EconomyStore, Pool, StoreError, SwapRecord, Transaction};

/// Hard ceiling on a single swap input.
pub const MAX_SWAP_AMOUNT_IN: u64 = 2_000_000_000;

/// Page size bounds for history queries.
pub const MIN_HISTORY_LIMIT: usize = 1;
pub const MAX_HISTORY_LIMIT: usize = 200;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("insufficient pool liquidity")]
    InsufficientLiquidity,
    #[error("insufficient {asset} balance: needed {needed}, available {available}")]
    InsufficientBalance {
        asset: &'static str,
        needed: u64,
        available: u64,
    },
    #[error("slippage exceeded: wanted at least {min_amount_out}, got {amount_out}")]
    SlippageExceeded { min_amount_out: u64, amount_out: u64 },
    #[error("agent {0} not found")]
    AgentNotFound(AgentId),
    #[error("pool misconfigured: {0}")]
    PoolMisconfigured(String),
    #[error("arithmetic overflow")]
    Overflow,
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Quote
// ---------------------------------------------------------------------------

/// Priced swap against a specific pool state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub side: SwapSide,
    pub amount_in: u64,
    pub fee_amount: u64,
    pub amount_in_after_fee: u64,
    pub amount_out: u64,
    pub price_before: Option<Decimal>,
    pub price_after: Option<Decimal>,
    /// Pool balances if this quote were executed.
    pub reserve_after: u64,
    pub arena_after: u64,
}

/// Price `amount_in` of the input asset against `pool`.
///
/// `amount_out = floor(in_after_fee * reserve_out / (reserve_in + in_after_fee))`
/// where the fee is `floor(amount_in * fee_bps / 10_000)` and stays out of
/// the curve.
pub fn quote_against(pool: &Pool, side: SwapSide, amount_in: u64) -> Result<SwapQuote, MarketError> {
    if amount_in == 0 {
        return Err(MarketError::InvalidAmount("amount_in must be positive".to_string()));
    }
    if amount_in > MAX_SWAP_AMOUNT_IN {
        return Err(MarketError::InvalidAmount(format!(
            "amount_in {amount_in} exceeds ceiling {MAX_SWAP_AMOUNT_IN}"
        )));
    }
    if pool.fee_bps > MAX_FEE_BPS {
        return Err(MarketError::PoolMisconfigured(format!("fee_bps {} > {}", pool.fee_bps, MAX_FEE_BPS)));
    }

    let fee_amount = bps_of(amount_in, pool.fee_bps);
    let amount_in_after_fee = amount_in - fee_amount;
    if amount_in_after_fee == 0 {
        return Err(MarketError::InvalidAmount("amount_in is consumed entirely by the fee".to_string()));
    }

    let (reserve_in, reserve_out) = match side {
        SwapSide::BuyArena => (pool.reserve_balance, pool.arena_balance),
        SwapSide::SellArena => (pool.arena_balance, pool.reserve_balance),
    };

    let numerator = (amount_in_after_fee as u128)
        .checked_mul(reserve_out as u128)
        .ok_or(MarketError::Overflow)?;
    let denominator = (reserve_in as u128)
        .checked_add(amount_in_after_fee as u128)
        .ok_or(MarketError::Overflow)?;
    if denominator == 0 {
        return Err(MarketError::InsufficientLiquidity);
    }
    let amount_out = u64::try_from(numerator / denominator).map_err(|_| MarketError::Overflow)?;
    if amount_out == 0 {
        return Err(MarketError::InvalidAmount("amount_out rounds to zero".to_string()));
    }

    let new_in = reserve_in.checked_add(amount_in_after_fee).ok_or(MarketError::Overflow)?;
    let new_out = reserve_out
        .checked_sub(amount_out)
        .ok_or(MarketError::InsufficientLiquidity)?;

    let (reserve_after, arena_after) = match side {
        SwapSide::BuyArena => (new_in, new_out),
        SwapSide::SellArena => (new_out, new_in),
    };

    Ok(SwapQuote {
        side,
        amount_in,
        fee_amount,
        amount_in_after_fee,
        amount_out,
        price_before: spot_price(pool.reserve_balance, pool.arena_balance),
        price_after: spot_price(reserve_after, arena_after),
        reserve_after,
        arena_after,
    })
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSummary {
    pub pool_id: u64,
    pub reserve_balance: u64,
    pub arena_balance: u64,
    pub fee_bps: u64,
    /// Reserve per arena.
    pub spot_price: Option<Decimal>,
    pub cumulative_fees_reserve: u64,
    pub cumulative_fees_arena: u64,
    pub ops_budget: u64,
    pub insurance_budget: u64,
    pub treasury_arena: u64,
}

impl From<&Pool> for PoolSummary {
    fn from(pool: &Pool) -> Self {
        Self {
            pool_id: pool.id,
            reserve_balance: pool.reserve_balance,
            arena_balance: pool.arena_balance,
            fee_bps: pool.fee_bps,
            spot_price: spot_price(pool.reserve_balance, pool.arena_balance),
            cumulative_fees_reserve: pool.cumulative_fees_reserve,
            cumulative_fees_arena: pool.cumulative_fees_arena,
            ops_budget: pool.ops_budget,
            insurance_budget: pool.insurance_budget,
            treasury_arena: pool.treasury_arena,
        }
    }
}

/// Committed result of a swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOutcome {
    pub pool: PoolSummary,
    pub swap: SwapRecord,
    pub agent: AgentAccount,
}

/// Agent holdings valued in reserve at the current spot price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub agent_id: AgentId,
    pub bankroll: u64,
    pub reserve_balance: u64,
    pub arena_value_reserve: Option<Decimal>,
    pub total_value_reserve: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// MarketEngine
// ---------------------------------------------------------------------------

pub struct MarketEngine {
    store: Arc<EconomyStore>,
    config: MarketConfig,
    splitter: FeeSplitter,
    clock: Arc<dyn Clock>,
}

impl MarketEngine {
    pub fn new(store: Arc<EconomyStore>, config: MarketConfig, clock: Arc<dyn Clock>) -> Result<Self, MarketError> {
        if config.fee_bps > MAX_FEE_BPS {
            return Err(MarketError::PoolMisconfigured(format!("fee_bps {} > {}", config.fee_bps, MAX_FEE_BPS)));
        }
        let splitter = FeeSplitter::new(config.ops_share_bps)
            .map_err(|err| MarketError::PoolMisconfigured(err.to_string()))?;
        Ok(Self { store, config, splitter, clock })
    }

    pub fn store(&self) -> &Arc<EconomyStore> {
        &self.store
    }

    /// Active pool inside an open transaction, creating the configured pool
    /// if none exists yet.
    pub fn active_pool_in(&self, tx: &mut Transaction<'_>) -> Result<Pool, MarketError> {
        if let Some(pool) = tx.active_pool() {
            return Ok(pool);
        }
        let pool = self.stage_pool(
            tx,
            self.config.initial_reserve,
            self.config.initial_arena,
            self.config.fee_bps,
        )?;
        tracing::info!(
            pool_id = pool.id,
            reserve = pool.reserve_balance,
            arena = pool.arena_balance,
            fee_bps = pool.fee_bps,
            "created initial pool"
        );
        Ok(pool)
    }

    fn stage_pool(
        &self,
        tx: &mut Transaction<'_>,
        reserve: u64,
        arena: u64,
        fee_bps: u64,
    ) -> Result<Pool, MarketError> {
        let pool = Pool {
            id: tx.next_id(),
            reserve_balance: reserve,
            arena_balance: arena,
            fee_bps,
            cumulative_fees_reserve: 0,
            cumulative_fees_arena: 0,
            ops_budget: 0,
            insurance_budget: 0,
            treasury_arena: 0,
            created_at_ms: self.clock.now_ms(),
        };
        tx.issue_reserve(reserve)?;
        tx.issue_arena(arena)?;
        tx.insert_pool(pool.clone());
        Ok(pool)
    }

    /// Lazily create the configured pool and return it.
    pub fn ensure_pool(&self) -> Result<Pool, MarketError> {
        if let Some(pool) = self.store.active_pool()? {
            return Ok(pool);
        }
        self.store.transact(|tx| self.active_pool_in(tx))
    }

    /// Create a new pool; it replaces the current one as the active pool.
    pub fn create_pool(&self, reserve: u64, arena: u64, fee_bps: u64) -> Result<Pool, MarketError> {
        if reserve == 0 || arena == 0 {
            return Err(MarketError::InvalidAmount("pool balances must be positive".to_string()));
        }
        if fee_bps > MAX_FEE_BPS {
            return Err(MarketError::PoolMisconfigured(format!("fee_bps {fee_bps} > {MAX_FEE_BPS}")));
        }
        let pool = self.store.transact(|tx| self.stage_pool(tx, reserve, arena, fee_bps))?;
        tracing::info!(pool_id = pool.id, reserve, arena, fee_bps, "created pool");
        Ok(pool)
    }

    /// Price a swap against the current committed pool.
    pub fn quote(&self, side: SwapSide, amount_in: u64) -> Result<SwapQuote, MarketError> {
        let pool = self.ensure_pool()?;
        quote_against(&pool, side, amount_in)
    }

    /// Execute a swap for `agent_id` as one atomic unit of work.
    ///
    /// The quote is re-derived against the pool inside the transaction, so a
    /// caller's earlier `quote` only serves as a hint; `min_amount_out`
    /// guards against the difference.
    pub fn swap(
        &self,
        agent_id: &AgentId,
        side: SwapSide,
        amount_in: u64,
        min_amount_out: Option<u64>,
    ) -> Result<SwapOutcome, MarketError> {
        let now_ms = self.clock.now_ms();
        let outcome = self.store.transact(|tx| {
            let mut pool = self.active_pool_in(tx)?;
            let mut agent = tx
                .agent(agent_id)
                .ok_or_else(|| MarketError::AgentNotFound(agent_id.clone()))?;

            let (asset, available) = match side {
                SwapSide::BuyArena => ("reserve", agent.reserve_balance),
                SwapSide::SellArena => ("arena", agent.bankroll),
            };
            if amount_in > 0 && available < amount_in {
                return Err(MarketError::InsufficientBalance { asset, needed: amount_in, available });
            }

            let quote = quote_against(&pool, side, amount_in)?;
            if let Some(min_amount_out) = min_amount_out {
                if quote.amount_out < min_amount_out {
                    return Err(MarketError::SlippageExceeded {
                        min_amount_out,
                        amount_out: quote.amount_out,
                    });
                }
            }

            let swap_id = tx.next_id();
            pool.reserve_balance = quote.reserve_after;
            pool.arena_balance = quote.arena_after;
            match side {
                SwapSide::BuyArena => {
                    agent.reserve_balance -= amount_in;
                    agent.bankroll = agent
                        .bankroll
                        .checked_add(quote.amount_out)
                        .ok_or(MarketError::Overflow)?;
                    pool.cumulative_fees_reserve = pool
                        .cumulative_fees_reserve
                        .checked_add(quote.fee_amount)
                        .ok_or(MarketError::Overflow)?;
                }
                SwapSide::SellArena => {
                    agent.bankroll -= amount_in;
                    agent.reserve_balance = agent
                        .reserve_balance
                        .checked_add(quote.amount_out)
                        .ok_or(MarketError::Overflow)?;
                    pool.cumulative_fees_arena = pool
                        .cumulative_fees_arena
                        .checked_add(quote.fee_amount)
                        .ok_or(MarketError::Overflow)?;
                    if quote.fee_amount > 0 {
                        self.route_sell_fee(tx, &mut pool, agent_id, swap_id, quote.fee_amount, now_ms)?;
                    }
                }
            }

            let swap = SwapRecord {
                id: swap_id,
                agent_id: agent_id.clone(),
                side,
                amount_in,
                amount_out: quote.amount_out,
                fee_amount: quote.fee_amount,
                price_before: quote.price_before,
                price_after: quote.price_after,
                created_at_ms: now_ms,
            };
            tx.put_pool(pool.clone())?;
            tx.put_agent(agent.clone())?;
            tx.append_swap(swap.clone());

            Ok(SwapOutcome { pool: PoolSummary::from(&pool), swap, agent })
        })?;

        tracing::debug!(
            agent = %agent_id,
            side = %side,
            amount_in,
            amount_out = outcome.swap.amount_out,
            fee = outcome.swap.fee_amount,
            price_after = ?outcome.swap.price_after,
            "swap committed"
        );
        Ok(outcome)
    }

    fn route_sell_fee(
        &self,
        tx: &mut Transaction<'_>,
        pool: &mut Pool,
        agent_id: &AgentId,
        swap_id: u64,
        fee: u64,
        now_ms: u64,
    ) -> Result<(), MarketError> {
        let split = self
            .splitter
            .split(fee)
            .map_err(|err| MarketError::PoolMisconfigured(err.to_string()))?;
        pool.ops_budget = pool.ops_budget.checked_add(split.ops).ok_or(MarketError::Overflow)?;
        pool.insurance_budget = pool
            .insurance_budget
            .checked_add(split.insurance)
            .ok_or(MarketError::Overflow)?;
        for row in self.splitter.ledger_rows(&split, agent_id, swap_id, now_ms) {
            tx.append_ledger(row);
        }
        Ok(())
    }

    pub fn pool_summary(&self) -> Result<PoolSummary, MarketError> {
        let pool = self.ensure_pool()?;
        Ok(PoolSummary::from(&pool))
    }

    /// Current spot price (reserve per arena) of the committed pool.
    pub fn spot_price(&self) -> Result<Option<Decimal>, MarketError> {
        Ok(self.pool_summary()?.spot_price)
    }

    /// Most recent swaps first; `limit` is clamped to `[1, 200]`.
    pub fn list_recent_swaps(&self, limit: usize) -> Result<Vec<SwapRecord>, MarketError> {
        let limit = limit.clamp(MIN_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
        Ok(self.store.recent_swaps(limit)?)
    }

    /// Most recent ledger rows first; `limit` is clamped to `[1, 200]`.
    pub fn list_ledger(&self, limit: usize) -> Result<Vec<LedgerEntry>, MarketError> {
        let limit = limit.clamp(MIN_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
        Ok(self.store.recent_ledger(limit)?)
    }

    pub fn portfolio(&self, agent_id: &AgentId) -> Result<Portfolio, MarketError> {
        let agent = self
            .store
            .agent(agent_id)?
            .ok_or_else(|| MarketError::AgentNotFound(agent_id.clone()))?;
        let spot = self.spot_price()?;
        let arena_value_reserve = spot.map(|p| Decimal::from(agent.bankroll) * p);
        Ok(Portfolio {
            agent_id: agent.id,
            bankroll: agent.bankroll,
            reserve_balance: agent.reserve_balance,
            total_value_reserve: arena_value_reserve.map(|v| v + Decimal::from(agent.reserve_balance)),
            arena_value_reserve,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
