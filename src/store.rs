// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Economy Core - Transactional Store
//
// In-memory backing store for pools, agents, swaps, ledger rows and skill
// purchases. Writers are serialized through a single writer lock and stage
// their changes in a `Transaction`; the staged rows become visible in one
// step on commit, or are discarded if the closure returns an error. Readers
// see the latest committed state and never observe a half-applied write.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock, RwLockReadGuard};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{AgentArchetype, AgentId, SkillKind, SwapSide, Tick, TownId};
use crate::fee_distribution::LedgerEntry;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store lock poisoned")]
    Poisoned,
    #[error("agent {0} is already registered")]
    DuplicateAgent(AgentId),
    #[error("agent {0} not found")]
    AgentNotFound(AgentId),
    #[error("pool {0} not found")]
    PoolNotFound(u64),
    #[error("supply counter overflow")]
    Overflow,
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Two-asset liquidity pool. The most recently created pool is the active one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: u64,
    pub reserve_balance: u64,
    pub arena_balance: u64,
    pub fee_bps: u64,
    /// Buy-side fees, reserve-denominated. They stay in the pool.
    pub cumulative_fees_reserve: u64,
    /// Sell-side fees, arena-denominated. Routed to ops/insurance.
    pub cumulative_fees_arena: u64,
    pub ops_budget: u64,
    pub insurance_budget: u64,
    /// Arena spent on paid skills.
    pub treasury_arena: u64,
    pub created_at_ms: u64,
}

/// Immutable trade record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecord {
    pub id: u64,
    pub agent_id: AgentId,
    pub side: SwapSide,
    pub amount_in: u64,
    pub amount_out: u64,
    pub fee_amount: u64,
    pub price_before: Option<Decimal>,
    pub price_after: Option<Decimal>,
    pub created_at_ms: u64,
}

/// The slice of an agent the economy reads and adjusts. Everything except
/// the two balances is owned by the external agent registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAccount {
    pub id: AgentId,
    pub name: String,
    pub archetype: AgentArchetype,
    /// Arena-denominated balance.
    pub bankroll: u64,
    /// Reserve-denominated balance.
    pub reserve_balance: u64,
    pub active: bool,
    pub town: Option<TownId>,
}

impl AgentAccount {
    pub fn new(id: impl Into<AgentId>, archetype: AgentArchetype, bankroll: u64, reserve_balance: u64) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            archetype,
            bankroll,
            reserve_balance,
            active: true,
            town: None,
        }
    }

    pub fn with_town(mut self, town: impl Into<TownId>) -> Self {
        self.town = Some(town.into());
        self
    }
}

/// Log row for a settled skill purchase, including the full justification
/// and output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillPurchaseRecord {
    pub id: u64,
    pub agent_id: AgentId,
    pub skill: SkillKind,
    pub price_arena: u64,
    pub tick: Tick,
    pub question: String,
    pub why_now: String,
    pub expected_next_action: String,
    pub if_then: String,
    pub params: serde_json::Value,
    pub output: serde_json::Value,
    pub public_summary: String,
    pub created_at_ms: u64,
}

/// Totals of value that entered or left the closed economy from outside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyTotals {
    pub issued_reserve: u64,
    pub issued_arena: u64,
    pub sunk_arena: u64,
}

/// Everything the store holds; also the durable serialization format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub pools: Vec<Pool>,
    pub agents: BTreeMap<AgentId, AgentAccount>,
    pub swaps: Vec<SwapRecord>,
    pub ledger: Vec<LedgerEntry>,
    pub skill_purchases: Vec<SkillPurchaseRecord>,
    pub supply: SupplyTotals,
    pub next_id: u64,
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// Rows written by a transaction but not yet visible to readers.
#[derive(Debug, Default)]
struct Staged {
    pool_writes: BTreeMap<u64, Pool>,
    new_pools: Vec<Pool>,
    agent_writes: HashMap<AgentId, AgentAccount>,
    swaps: Vec<SwapRecord>,
    ledger: Vec<LedgerEntry>,
    purchases: Vec<SkillPurchaseRecord>,
    supply: SupplyTotals,
    next_id: u64,
}

impl Staged {
    fn apply(self, state: &mut StoreSnapshot) {
        for pool in state.pools.iter_mut() {
            if let Some(updated) = self.pool_writes.get(&pool.id) {
                *pool = updated.clone();
            }
        }
        state.pools.extend(self.new_pools);
        state.agents.extend(self.agent_writes);
        state.swaps.extend(self.swaps);
        state.ledger.extend(self.ledger);
        state.skill_purchases.extend(self.purchases);
        state.supply = self.supply;
        state.next_id = self.next_id;
    }
}

/// Staged writes over a read view of the committed state.
pub struct Transaction<'a> {
    base: RwLockReadGuard<'a, StoreSnapshot>,
    staged: Staged,
}

impl<'a> Transaction<'a> {
    fn new(base: RwLockReadGuard<'a, StoreSnapshot>) -> Self {
        let staged = Staged { supply: base.supply, next_id: base.next_id, ..Staged::default() };
        Self { base, staged }
    }

    pub fn next_id(&mut self) -> u64 {
        self.staged.next_id += 1;
        self.staged.next_id
    }

    pub fn active_pool(&self) -> Option<Pool> {
        if let Some(pool) = self.staged.new_pools.last() {
            return Some(pool.clone());
        }
        self.base
            .pools
            .last()
            .map(|p| self.staged.pool_writes.get(&p.id).cloned().unwrap_or_else(|| p.clone()))
    }

    pub fn insert_pool(&mut self, pool: Pool) {
        self.staged.new_pools.push(pool);
    }

    pub fn put_pool(&mut self, pool: Pool) -> Result<(), StoreError> {
        if let Some(staged) = self.staged.new_pools.iter_mut().find(|p| p.id == pool.id) {
            *staged = pool;
            return Ok(());
        }
        if !self.base.pools.iter().any(|p| p.id == pool.id) {
            return Err(StoreError::PoolNotFound(pool.id));
        }
        self.staged.pool_writes.insert(pool.id, pool);
        Ok(())
    }

    pub fn agent(&self, id: &AgentId) -> Option<AgentAccount> {
        self.staged
            .agent_writes
            .get(id)
            .or_else(|| self.base.agents.get(id))
            .cloned()
    }

    pub fn agents(&self) -> Vec<AgentAccount> {
        let mut merged: BTreeMap<AgentId, AgentAccount> = self.base.agents.clone();
        for (id, account) in &self.staged.agent_writes {
            merged.insert(id.clone(), account.clone());
        }
        merged.into_values().collect()
    }

    /// Overwrite an existing agent row.
    pub fn put_agent(&mut self, account: AgentAccount) -> Result<(), StoreError> {
        if self.agent(&account.id).is_none() {
            return Err(StoreError::AgentNotFound(account.id));
        }
        self.staged.agent_writes.insert(account.id.clone(), account);
        Ok(())
    }

    fn insert_agent(&mut self, account: AgentAccount) -> Result<(), StoreError> {
        if self.agent(&account.id).is_some() {
            return Err(StoreError::DuplicateAgent(account.id));
        }
        self.staged.agent_writes.insert(account.id.clone(), account);
        Ok(())
    }

    pub fn append_swap(&mut self, mut record: SwapRecord) -> u64 {
        if record.id == 0 {
            record.id = self.next_id();
        }
        let id = record.id;
        self.staged.swaps.push(record);
        id
    }

    pub fn append_ledger(&mut self, mut entry: LedgerEntry) -> u64 {
        entry.id = self.next_id();
        let id = entry.id;
        self.staged.ledger.push(entry);
        id
    }

    pub fn append_purchase(&mut self, mut record: SkillPurchaseRecord) -> u64 {
        record.id = self.next_id();
        let id = record.id;
        self.staged.purchases.push(record);
        id
    }

    pub fn issue_reserve(&mut self, amount: u64) -> Result<(), StoreError> {
        let supply = &mut self.staged.supply;
        supply.issued_reserve = supply.issued_reserve.checked_add(amount).ok_or(StoreError::Overflow)?;
        Ok(())
    }

    pub fn issue_arena(&mut self, amount: u64) -> Result<(), StoreError> {
        let supply = &mut self.staged.supply;
        supply.issued_arena = supply.issued_arena.checked_add(amount).ok_or(StoreError::Overflow)?;
        Ok(())
    }

    pub fn sink_arena(&mut self, amount: u64) -> Result<(), StoreError> {
        let supply = &mut self.staged.supply;
        supply.sunk_arena = supply.sunk_arena.checked_add(amount).ok_or(StoreError::Overflow)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EconomyStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct EconomyStore {
    state: RwLock<StoreSnapshot>,
    writer: Mutex<()>,
}

impl EconomyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self { state: RwLock::new(snapshot), writer: Mutex::new(()) }
    }

    /// Run `f` as one all-or-nothing unit of work. Concurrent writers are
    /// serialized; on `Err` nothing is committed.
    pub fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _writer = self.writer.lock().map_err(|_| StoreError::Poisoned)?;
        let base = self.state.read().map_err(|_| StoreError::Poisoned)?;
        let mut tx = Transaction::new(base);
        let value = f(&mut tx)?;

        // The writer lock keeps the committed state unchanged between
        // releasing the read view and taking the write guard.
        let Transaction { base, staged } = tx;
        drop(base);
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        staged.apply(&mut state);
        Ok(value)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreSnapshot>, StoreError> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    pub fn register_agent(&self, account: AgentAccount) -> Result<(), StoreError> {
        self.transact(|tx| {
            tx.issue_arena(account.bankroll)?;
            tx.issue_reserve(account.reserve_balance)?;
            tx.insert_agent(account)
        })
    }

    /// External top-up of an agent's balances (rewards, faucets).
    pub fn credit_agent(&self, id: &AgentId, arena: u64, reserve: u64) -> Result<AgentAccount, StoreError> {
        self.transact(|tx| {
            let mut account = tx.agent(id).ok_or_else(|| StoreError::AgentNotFound(id.clone()))?;
            account.bankroll = account.bankroll.checked_add(arena).ok_or(StoreError::Overflow)?;
            account.reserve_balance =
                account.reserve_balance.checked_add(reserve).ok_or(StoreError::Overflow)?;
            tx.issue_arena(arena)?;
            tx.issue_reserve(reserve)?;
            tx.put_agent(account.clone())?;
            Ok(account)
        })
    }

    pub fn set_agent_active(&self, id: &AgentId, active: bool) -> Result<(), StoreError> {
        self.transact(|tx| {
            let mut account = tx.agent(id).ok_or_else(|| StoreError::AgentNotFound(id.clone()))?;
            account.active = active;
            tx.put_agent(account)
        })
    }

    pub fn active_pool(&self) -> Result<Option<Pool>, StoreError> {
        Ok(self.read()?.pools.last().cloned())
    }

    pub fn pools(&self) -> Result<Vec<Pool>, StoreError> {
        Ok(self.read()?.pools.clone())
    }

    pub fn agent(&self, id: &AgentId) -> Result<Option<AgentAccount>, StoreError> {
        Ok(self.read()?.agents.get(id).cloned())
    }

    pub fn agents(&self) -> Result<Vec<AgentAccount>, StoreError> {
        Ok(self.read()?.agents.values().cloned().collect())
    }

    pub fn active_agents(&self) -> Result<Vec<AgentAccount>, StoreError> {
        Ok(self.read()?.agents.values().filter(|a| a.active).cloned().collect())
    }

    /// Most recent first.
    pub fn recent_swaps(&self, limit: usize) -> Result<Vec<SwapRecord>, StoreError> {
        Ok(self.read()?.swaps.iter().rev().take(limit).cloned().collect())
    }

    pub fn swap_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.swaps.len())
    }

    /// Most recent first.
    pub fn recent_ledger(&self, limit: usize) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.read()?.ledger.iter().rev().take(limit).cloned().collect())
    }

    /// Most recent first, optionally filtered to one agent.
    pub fn skill_purchases(
        &self,
        agent: Option<&AgentId>,
        limit: usize,
    ) -> Result<Vec<SkillPurchaseRecord>, StoreError> {
        Ok(self
            .read()?
            .skill_purchases
            .iter()
            .rev()
            .filter(|p| agent.map_or(true, |a| &p.agent_id == a))
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn supply(&self) -> Result<SupplyTotals, StoreError> {
        Ok(self.read()?.supply)
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        Ok(self.read()?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee_distribution::{LedgerEntryType, ACCOUNT_WORLD};

    fn store_with_agent() -> EconomyStore {
        let store = EconomyStore::new();
        store
            .register_agent(AgentAccount::new("alice", AgentArchetype::Holder, 500, 1_000))
            .expect("test: register agent");
        store
    }

    fn pool(id: u64) -> Pool {
        Pool {
            id,
            reserve_balance: 100,
            arena_balance: 100,
            fee_bps: 100,
            cumulative_fees_reserve: 0,
            cumulative_fees_arena: 0,
            ops_budget: 0,
            insurance_budget: 0,
            treasury_arena: 0,
            created_at_ms: 0,
        }
    }

    #[test]
    fn register_records_issuance() {
        let store = store_with_agent();
        let supply = store.supply().expect("test: supply");
        assert_eq!(supply.issued_arena, 500);
        assert_eq!(supply.issued_reserve, 1_000);
    }

    #[test]
    fn duplicate_agent_rejected() {
        let store = store_with_agent();
        let err = store.register_agent(AgentAccount::new("alice", AgentArchetype::Holder, 1, 1));
        assert_eq!(err, Err(StoreError::DuplicateAgent(AgentId::from("alice"))));
        assert_eq!(store.supply().expect("test: supply").issued_arena, 500);
    }

    #[test]
    fn failed_transaction_commits_nothing() {
        let store = store_with_agent();
        let before = store.snapshot().expect("test: snapshot");

        let result: Result<(), StoreError> = store.transact(|tx| {
            let mut alice = tx.agent(&AgentId::from("alice")).expect("test: alice exists");
            alice.bankroll = 0;
            tx.put_agent(alice)?;
            tx.append_ledger(LedgerEntry::new(
                "agent:alice",
                ACCOUNT_WORLD,
                500,
                LedgerEntryType::Tax,
                None,
                serde_json::Value::Null,
                0,
            ));
            tx.insert_pool(pool(99));
            Err(StoreError::Overflow)
        });

        assert_eq!(result, Err(StoreError::Overflow));
        assert_eq!(store.snapshot().expect("test: snapshot"), before);
    }

    #[test]
    fn transaction_sees_its_own_writes() {
        let store = store_with_agent();
        store
            .transact(|tx| {
                let id = tx.next_id();
                tx.insert_pool(pool(id));
                let mut staged = tx.active_pool().expect("test: staged pool visible");
                staged.reserve_balance = 7;
                tx.put_pool(staged)?;
                assert_eq!(tx.active_pool().map(|p| p.reserve_balance), Some(7));
                Ok::<_, StoreError>(())
            })
            .expect("test: commit");

        let active = store.active_pool().expect("test: read").expect("test: pool exists");
        assert_eq!(active.reserve_balance, 7);
    }

    #[test]
    fn most_recent_pool_is_active() {
        let store = EconomyStore::new();
        store
            .transact(|tx| {
                tx.insert_pool(pool(1));
                tx.insert_pool(pool(2));
                Ok::<_, StoreError>(())
            })
            .expect("test: commit");
        assert_eq!(store.active_pool().expect("test: read").map(|p| p.id), Some(2));
        assert_eq!(store.pools().expect("test: read").len(), 2);
    }

    #[test]
    fn put_unknown_pool_fails() {
        let store = EconomyStore::new();
        let err = store.transact(|tx| tx.put_pool(pool(5)));
        assert_eq!(err, Err(StoreError::PoolNotFound(5)));
    }

    #[test]
    fn recent_swaps_are_newest_first() {
        let store = store_with_agent();
        store
            .transact(|tx| {
                for amount in [10, 20, 30] {
                    tx.append_swap(SwapRecord {
                        id: 0,
                        agent_id: AgentId::from("alice"),
                        side: SwapSide::BuyArena,
                        amount_in: amount,
                        amount_out: amount,
                        fee_amount: 0,
                        price_before: None,
                        price_after: None,
                        created_at_ms: amount,
                    });
                }
                Ok::<_, StoreError>(())
            })
            .expect("test: commit");

        let swaps = store.recent_swaps(2).expect("test: read");
        assert_eq!(swaps.iter().map(|s| s.amount_in).collect::<Vec<_>>(), vec![30, 20]);
        assert!(swaps[0].id > swaps[1].id);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let store = store_with_agent();
        store.credit_agent(&AgentId::from("alice"), 5, 0).expect("test: credit");
        let snapshot = store.snapshot().expect("test: snapshot");
        let json = serde_json::to_string(&snapshot).expect("test: serialize");
        let restored: StoreSnapshot = serde_json::from_str(&json).expect("test: deserialize");
        let reopened = EconomyStore::from_snapshot(restored);
        let alice = reopened
            .agent(&AgentId::from("alice"))
            .expect("test: read")
            .expect("test: alice restored");
        assert_eq!(alice.bankroll, 505);
        assert_eq!(reopened.supply().expect("test: supply").issued_arena, 505);
    }

    #[test]
    fn inactive_agents_are_filtered() {
        let store = store_with_agent();
        store
            .register_agent(AgentAccount::new("bob", AgentArchetype::Contrarian, 0, 0))
            .expect("test: register bob");
        store.set_agent_active(&AgentId::from("bob"), false).expect("test: deactivate");
        let active = store.active_agents().expect("test: read");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, AgentId::from("alice"));
    }
}
