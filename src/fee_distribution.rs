// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Fee distribution -- splitting collected swap fees into named budgets.
//!
//! No value creation occurs here. A sell-side fee (arena-denominated) is
//! split between the operations budget and the insurance budget, and the
//! split is described as immutable ledger rows that the caller appends in the
//! same transaction that moves the balances.

use serde::{Deserialize, Serialize};

use crate::core_types::{bps_of, AgentId, BPS_SCALE};

pub const ACCOUNT_POOL: &str = "pool";
pub const ACCOUNT_OPS: &str = "ops_budget";
pub const ACCOUNT_INSURANCE: &str = "insurance_budget";
pub const ACCOUNT_TREASURY: &str = "treasury";
pub const ACCOUNT_WORLD: &str = "world";

/// Prefix for agent wallet account names in ledger rows.
pub fn agent_account(agent: &AgentId) -> String {
    format!("agent:{}", agent)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from fee distribution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeeError {
    #[error("zero fee -- nothing to distribute")]
    ZeroFee,
    #[error("ops share {0} bps exceeds 10000")]
    InvalidShare(u64),
}

// ---------------------------------------------------------------------------
// Ledger rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    OpsBudget,
    InsuranceBudget,
    Tax,
    Bounty,
    SkillPurchase,
}

/// Append-only accounting row. Never updated or deleted once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Assigned by the store on append.
    pub id: u64,
    pub source: String,
    pub destination: String,
    pub amount: u64,
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,
    pub agent_id: Option<AgentId>,
    pub metadata: serde_json::Value,
    pub created_at_ms: u64,
}

impl LedgerEntry {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        amount: u64,
        entry_type: LedgerEntryType,
        agent_id: Option<AgentId>,
        metadata: serde_json::Value,
        created_at_ms: u64,
    ) -> Self {
        Self {
            id: 0,
            source: source.into(),
            destination: destination.into(),
            amount,
            entry_type,
            agent_id,
            metadata,
            created_at_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// FeeSplitter
// ---------------------------------------------------------------------------

/// Result of splitting one fee. `ops + insurance == total` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub total: u64,
    pub ops: u64,
    pub insurance: u64,
}

/// Stateless fee splitter -- holds the ops/insurance share ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplitter {
    /// Share of each fee routed to the ops budget, in basis points.
    pub ops_share_bps: u64,
}

impl Default for FeeSplitter {
    fn default() -> Self {
        Self { ops_share_bps: 5_000 }
    }
}

impl FeeSplitter {
    pub fn new(ops_share_bps: u64) -> Result<Self, FeeError> {
        if ops_share_bps > BPS_SCALE {
            return Err(FeeError::InvalidShare(ops_share_bps));
        }
        Ok(Self { ops_share_bps })
    }

    /// Split a fee. Ops receives the rounded-down share; insurance receives
    /// the remainder, so no unit is lost to rounding.
    pub fn split(&self, total_fee: u64) -> Result<FeeSplit, FeeError> {
        if total_fee == 0 {
            return Err(FeeError::ZeroFee);
        }
        if self.ops_share_bps > BPS_SCALE {
            return Err(FeeError::InvalidShare(self.ops_share_bps));
        }
        let ops = bps_of(total_fee, self.ops_share_bps);
        Ok(FeeSplit { total: total_fee, ops, insurance: total_fee - ops })
    }

    /// Ledger rows describing a split, one per non-empty bucket.
    pub fn ledger_rows(
        &self,
        split: &FeeSplit,
        agent_id: &AgentId,
        swap_id: u64,
        now_ms: u64,
    ) -> Vec<LedgerEntry> {
        let metadata = serde_json::json!({
            "swapId": swap_id,
            "fee": split.total,
            "opsShareBps": self.ops_share_bps,
        });
        let buckets = [
            (ACCOUNT_OPS, split.ops, LedgerEntryType::OpsBudget),
            (ACCOUNT_INSURANCE, split.insurance, LedgerEntryType::InsuranceBudget),
        ];
        buckets
            .into_iter()
            .filter(|(_, amount, _)| *amount > 0)
            .map(|(destination, amount, entry_type)| {
                LedgerEntry::new(
                    ACCOUNT_POOL,
                    destination,
                    amount,
                    entry_type,
                    Some(agent_id.clone()),
                    metadata.clone(),
                    now_ms,
                )
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split() {
        let split = FeeSplitter::default().split(10).expect("test: should split");
        assert_eq!(split, FeeSplit { total: 10, ops: 5, insurance: 5 });
    }

    #[test]
    fn odd_fee_remainder_goes_to_insurance() {
        let split = FeeSplitter::default().split(5).expect("test: should split");
        assert_eq!(split.ops, 2);
        assert_eq!(split.insurance, 3);
        assert_eq!(split.ops + split.insurance, 5);
    }

    #[test]
    fn custom_split_ratio() {
        let splitter = FeeSplitter::new(7_000).expect("test: valid share");
        let split = splitter.split(100).expect("test: custom 70/30 split");
        assert_eq!(split.ops, 70);
        assert_eq!(split.insurance, 30);
    }

    #[test]
    fn split_always_sums_to_fee() {
        for share in [0, 1, 3_333, 5_000, 9_999, 10_000] {
            let splitter = FeeSplitter::new(share).expect("test: valid share");
            for fee in [1, 2, 7, 99, 1_001, 123_457] {
                let split = splitter.split(fee).expect("test: non-zero fee");
                assert_eq!(split.ops + split.insurance, fee, "share={share} fee={fee}");
            }
        }
    }

    #[test]
    fn zero_fee_error() {
        let err = FeeSplitter::default().split(0);
        assert!(matches!(err, Err(FeeError::ZeroFee)), "expected ZeroFee, got {err:?}");
    }

    #[test]
    fn invalid_share_rejected() {
        assert_eq!(FeeSplitter::new(10_001), Err(FeeError::InvalidShare(10_001)));
    }

    #[test]
    fn ledger_rows_skip_empty_bucket() {
        let splitter = FeeSplitter::new(10_000).expect("test: valid share");
        let split = splitter.split(9).expect("test: split");
        let rows = splitter.ledger_rows(&split, &AgentId::from("a1"), 7, 1_000);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].destination, ACCOUNT_OPS);
        assert_eq!(rows[0].amount, 9);
        assert_eq!(rows[0].metadata["swapId"], 7);
    }

    #[test]
    fn ledger_rows_cover_both_buckets() {
        let splitter = FeeSplitter::default();
        let split = splitter.split(5).expect("test: split");
        let rows = splitter.ledger_rows(&split, &AgentId::from("a1"), 1, 0);
        let total: u64 = rows.iter().map(|r| r.amount).sum();
        assert_eq!(total, 5);
        assert!(rows.iter().all(|r| r.source == ACCOUNT_POOL));
    }
}
