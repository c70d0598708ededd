// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Conservation law for the closed two-asset economy.
//!
//! Value only enters through recorded issuance (pool seeding, agent
//! registration, credits, bounties) and only leaves through recorded sinks
//! (taxes). Everything else moves between accounts:
//!
//! ```text
//! issued_reserve              = Σ pool.reserve + Σ agent.reserve + Σ pool.fees_reserve
//! issued_arena - sunk_arena   = Σ pool.arena + Σ agent.bankroll
//!                               + Σ (ops + insurance + treasury)
//! ```
//!
//! Balances are integers, so the check is exact: there is no tolerance.

use serde::{Deserialize, Serialize};

use crate::store::{EconomyStore, StoreError, StoreSnapshot};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConservationError {
    #[error("{asset} imbalance: expected {expected}, found {actual}")]
    Imbalance {
        asset: &'static str,
        expected: u128,
        actual: u128,
    },
    #[error("circuit breaker tripped after {0} violations")]
    CircuitBreakerTripped(u32),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// Where every unit of each asset currently sits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyReport {
    pub issued_reserve: u128,
    pub issued_arena: u128,
    pub sunk_arena: u128,
    pub pool_reserve: u128,
    pub pool_arena: u128,
    pub agent_reserve: u128,
    pub agent_arena: u128,
    pub fees_reserve: u128,
    /// ops + insurance + treasury across all pools.
    pub budgets_arena: u128,
}

impl SupplyReport {
    pub fn from_snapshot(snapshot: &StoreSnapshot) -> Self {
        let mut report = SupplyReport {
            issued_reserve: snapshot.supply.issued_reserve as u128,
            issued_arena: snapshot.supply.issued_arena as u128,
            sunk_arena: snapshot.supply.sunk_arena as u128,
            ..SupplyReport::default()
        };
        for pool in &snapshot.pools {
            report.pool_reserve += pool.reserve_balance as u128;
            report.pool_arena += pool.arena_balance as u128;
            report.fees_reserve += pool.cumulative_fees_reserve as u128;
            report.budgets_arena +=
                pool.ops_budget as u128 + pool.insurance_budget as u128 + pool.treasury_arena as u128;
        }
        for agent in snapshot.agents.values() {
            report.agent_reserve += agent.reserve_balance as u128;
            report.agent_arena += agent.bankroll as u128;
        }
        report
    }

    pub fn held_reserve(&self) -> u128 {
        self.pool_reserve + self.agent_reserve + self.fees_reserve
    }

    pub fn held_arena(&self) -> u128 {
        self.pool_arena + self.agent_arena + self.budgets_arena
    }

    /// Check both identities.
    pub fn verify(&self) -> Result<(), ConservationError> {
        if self.held_reserve() != self.issued_reserve {
            return Err(ConservationError::Imbalance {
                asset: "reserve",
                expected: self.issued_reserve,
                actual: self.held_reserve(),
            });
        }
        let circulating = self.issued_arena.saturating_sub(self.sunk_arena);
        if self.held_arena() != circulating {
            return Err(ConservationError::Imbalance {
                asset: "arena",
                expected: circulating,
                actual: self.held_arena(),
            });
        }
        Ok(())
    }
}

/// Audit the committed state of `store`.
pub fn audit(store: &EconomyStore) -> Result<SupplyReport, ConservationError> {
    let report = SupplyReport::from_snapshot(&store.snapshot()?);
    report.verify()?;
    Ok(report)
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Runs periodic audits and trips after `threshold` consecutive violations.
/// Once tripped it stays tripped until [`reset`](Self::reset).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConservationMonitor {
    threshold: u32,
    consecutive_violations: u32,
    total_checks: u64,
    tripped: bool,
}

impl ConservationMonitor {
    pub fn new(threshold: u32) -> Self {
        Self { threshold: threshold.max(1), consecutive_violations: 0, total_checks: 0, tripped: false }
    }

    pub fn check(&mut self, store: &EconomyStore) -> Result<SupplyReport, ConservationError> {
        if self.tripped {
            return Err(ConservationError::CircuitBreakerTripped(self.consecutive_violations));
        }
        self.total_checks += 1;
        match audit(store) {
            Ok(report) => {
                self.consecutive_violations = 0;
                Ok(report)
            }
            Err(err @ ConservationError::Imbalance { .. }) => {
                self.consecutive_violations += 1;
                tracing::error!(error = %err, violations = self.consecutive_violations, "conservation violated");
                if self.consecutive_violations >= self.threshold {
                    self.tripped = true;
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    pub fn total_checks(&self) -> u64 {
        self.total_checks
    }

    pub fn reset(&mut self) {
        self.consecutive_violations = 0;
        self.tripped = false;
    }
}

impl Default for ConservationMonitor {
    fn default() -> Self {
        Self::new(3)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::AgentArchetype;
    use crate::store::{AgentAccount, Pool};

    fn pool(reserve: u64, arena: u64) -> Pool {
        Pool {
            id: 1,
            reserve_balance: reserve,
            arena_balance: arena,
            fee_bps: 100,
            cumulative_fees_reserve: 0,
            cumulative_fees_arena: 0,
            ops_budget: 0,
            insurance_budget: 0,
            treasury_arena: 0,
            created_at_ms: 0,
        }
    }

    fn seeded_store() -> EconomyStore {
        let store = EconomyStore::new();
        store
            .transact(|tx| {
                tx.issue_reserve(1_000)?;
                tx.issue_arena(1_000)?;
                tx.insert_pool(pool(1_000, 1_000));
                Ok::<_, StoreError>(())
            })
            .expect("test: seed pool");
        store
            .register_agent(AgentAccount::new("a", AgentArchetype::Holder, 50, 70))
            .expect("test: register");
        store
    }

    #[test]
    fn balanced_store_passes() {
        let report = audit(&seeded_store()).expect("test: balanced");
        assert_eq!(report.held_reserve(), 1_070);
        assert_eq!(report.held_arena(), 1_050);
    }

    #[test]
    fn leaked_arena_is_detected() {
        let store = seeded_store();
        store
            .transact(|tx| {
                let mut agent = tx.agent(&"a".into()).expect("test: agent");
                agent.bankroll += 1;
                tx.put_agent(agent)
            })
            .expect("test: unaccounted credit");
        let err = audit(&store);
        assert_eq!(
            err,
            Err(ConservationError::Imbalance { asset: "arena", expected: 1_050, actual: 1_051 })
        );
    }

    #[test]
    fn sunk_arena_reduces_expected_supply() {
        let store = seeded_store();
        store
            .transact(|tx| {
                let mut agent = tx.agent(&"a".into()).expect("test: agent");
                agent.bankroll -= 10;
                tx.put_agent(agent)?;
                tx.sink_arena(10)
            })
            .expect("test: tax");
        audit(&store).expect("test: sink accounted");
    }

    #[test]
    fn monitor_trips_after_threshold() {
        let store = seeded_store();
        store
            .transact(|tx| {
                let mut agent = tx.agent(&"a".into()).expect("test: agent");
                agent.reserve_balance += 5;
                tx.put_agent(agent)
            })
            .expect("test: leak reserve");

        let mut monitor = ConservationMonitor::new(2);
        assert!(matches!(monitor.check(&store), Err(ConservationError::Imbalance { .. })));
        assert!(!monitor.is_tripped());
        assert!(matches!(monitor.check(&store), Err(ConservationError::Imbalance { .. })));
        assert!(monitor.is_tripped());
        assert!(matches!(monitor.check(&store), Err(ConservationError::CircuitBreakerTripped(2))));
        assert_eq!(monitor.total_checks(), 2);

        monitor.reset();
        assert!(!monitor.is_tripped());
    }
}
