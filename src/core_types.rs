// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Economy Core - Shared Types
//
// Identifiers, asset sides, zones and the integer/decimal helpers every
// service uses. Balances are whole units (`u64`); prices are `Decimal`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical simulation time unit.
pub type Tick = u64;

/// Monotonic identifier for world events.
pub type EventId = u64;

/// Basis-point denominator (100% = 10_000).
pub const BPS_SCALE: u64 = 10_000;

// ---------------------------------------------------------------------------
// String identifiers
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self { $name(s) }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self { $name(s.to_string()) }
        }
    };
}

string_id!(
    /// Agent identifier, owned by the external agent registry.
    AgentId
);
string_id!(
    /// Town identifier in the building subsystem.
    TownId
);
string_id!(
    /// Plot (structure site) identifier in the building subsystem.
    PlotId
);

// ---------------------------------------------------------------------------
// SwapSide
// ---------------------------------------------------------------------------

/// Direction of a pool trade, named from the agent's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapSide {
    /// Pay reserve, receive arena.
    BuyArena,
    /// Pay arena, receive reserve.
    SellArena,
}

impl SwapSide {
    pub fn label(&self) -> &'static str {
        match self {
            Self::BuyArena => "BUY_ARENA",
            Self::SellArena => "SELL_ARENA",
        }
    }
}

impl fmt::Display for SwapSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Zone
// ---------------------------------------------------------------------------

/// Town zoning category for plots and structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Zone {
    Residential,
    Commercial,
    Industrial,
    Civic,
    Entertainment,
}

impl Zone {
    pub const ALL: [Zone; 5] = [
        Zone::Residential,
        Zone::Commercial,
        Zone::Industrial,
        Zone::Civic,
        Zone::Entertainment,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Residential => "residential",
            Self::Commercial => "commercial",
            Self::Industrial => "industrial",
            Self::Civic => "civic",
            Self::Entertainment => "entertainment",
        }
    }

    /// Case-insensitive parse of the label form.
    pub fn parse(s: &str) -> Option<Zone> {
        let s = s.trim().to_ascii_lowercase();
        Zone::ALL.iter().copied().find(|z| z.label() == s)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// AgentArchetype
// ---------------------------------------------------------------------------

/// Trading temperament used by the market pulse heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentArchetype {
    /// Buys dips, sells rips.
    Contrarian,
    /// Follows the last price move.
    MomentumChaser,
    /// Barely trades.
    #[default]
    Holder,
    /// Keeps accumulating regardless of direction.
    Accumulator,
    /// Leans with the mood, weakly.
    VibeTrader,
}

// ---------------------------------------------------------------------------
// SkillKind
// ---------------------------------------------------------------------------

/// Paid informational skills sold by the skill broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillKind {
    MarketDepth,
    BlueprintIndex,
    ScoutReport,
}

impl SkillKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MarketDepth => "MARKET_DEPTH",
            Self::BlueprintIndex => "BLUEPRINT_INDEX",
            Self::ScoutReport => "SCOUT_REPORT",
        }
    }

    /// Human name for feeds and prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MarketDepth => "market depth read",
            Self::BlueprintIndex => "blueprint index",
            Self::ScoutReport => "scout report",
        }
    }
}

impl fmt::Display for SkillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Integer / price helpers
// ---------------------------------------------------------------------------

/// `floor(amount * bps / 10_000)` without intermediate overflow.
pub fn bps_of(amount: u64, bps: u64) -> u64 {
    let wide = (amount as u128) * (bps as u128) / (BPS_SCALE as u128);
    // bps is at most BPS_SCALE at every call site, so this never truncates.
    u64::try_from(wide).unwrap_or(u64::MAX)
}

/// Reserve-per-arena ratio, or `None` when the arena side is empty.
pub fn spot_price(reserve: u64, arena: u64) -> Option<Decimal> {
    if arena == 0 {
        return None;
    }
    Decimal::from(reserve).checked_div(Decimal::from(arena))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn bps_rounds_down() {
        assert_eq!(bps_of(1_000, 100), 10);
        assert_eq!(bps_of(99, 100), 0);
        assert_eq!(bps_of(u64::MAX, BPS_SCALE), u64::MAX);
    }

    #[test]
    fn spot_price_ratio() {
        assert_eq!(spot_price(1_000_000, 1_000_000), Some(dec!(1)));
        assert_eq!(spot_price(3, 2), Some(dec!(1.5)));
        assert_eq!(spot_price(5, 0), None);
    }

    #[test]
    fn zone_parse_is_case_insensitive() {
        assert_eq!(Zone::parse("Entertainment"), Some(Zone::Entertainment));
        assert_eq!(Zone::parse(" civic "), Some(Zone::Civic));
        assert_eq!(Zone::parse("moon"), None);
    }

    #[test]
    fn unknown_temperament_defaults_to_holder() {
        assert_eq!(AgentArchetype::default(), AgentArchetype::Holder);
    }

    #[test]
    fn swap_side_serializes_screaming() {
        let json = serde_json::to_string(&SwapSide::BuyArena).expect("test: serialize side");
        assert_eq!(json, "\"BUY_ARENA\"");
    }
}
