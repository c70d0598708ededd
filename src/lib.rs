// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Economy Core ("The Arena")

pub mod core_types;
pub mod clock;
pub mod config;
pub mod store;
pub mod fee_distribution;
pub mod market;
pub mod conservation;
pub mod pulse;
pub mod world;
pub mod events;
pub mod skills;
pub mod economy;

pub use core_types::*;
pub use config::EconomyConfig;
pub use economy::{ArenaEconomy, EconomyError, EconomyTick};
pub use market::{MarketEngine, MarketError};
pub use store::EconomyStore;

use std::sync::Arc;

use num_traits::ToPrimitive;
use wasm_bindgen::prelude::*;

/// Agents seeded by the browser constructor.
pub const DEMO_AGENT_COUNT: usize = 12;

/// JS numbers are floats; trades only accept positive whole amounts.
fn whole_amount(amount: f64) -> Option<u64> {
    if !amount.is_finite() || amount.fract() != 0.0 || amount <= 0.0 {
        return None;
    }
    amount.to_u64()
}

// ─── WASM Interface ──────────────────────────────────────────────────────────

#[wasm_bindgen]
impl ArenaEconomy {
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u32) -> Result<ArenaEconomy, JsValue> {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        let config = EconomyConfig { seed: seed as u64, ..EconomyConfig::default() };
        let mut economy = ArenaEconomy::with_config(config, Arc::new(skills::OfflineModel))
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        economy
            .populate(DEMO_AGENT_COUNT)
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        Ok(economy)
    }

    pub fn tick(&mut self) -> JsValue {
        let result = self.tick_core();
        serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
    }

    pub fn run_batch(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.tick_core();
        }
    }

    /// Manual trade from the UI. `side` is `BUY_ARENA` or `SELL_ARENA`.
    pub fn swap(&mut self, agent_id: &str, side: &str, amount_in: f64) -> Result<JsValue, JsValue> {
        let side = match side.trim().to_ascii_uppercase().as_str() {
            "BUY_ARENA" => SwapSide::BuyArena,
            "SELL_ARENA" => SwapSide::SellArena,
            other => return Err(JsValue::from_str(&format!("unknown side {other}"))),
        };
        let amount_in = whole_amount(amount_in)
            .ok_or_else(|| JsValue::from_str(&format!("amount {amount_in} must be a positive whole number")))?;
        let outcome = self
            .engine
            .swap(&AgentId::from(agent_id), side, amount_in, None)
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        Ok(serde_wasm_bindgen::to_value(&outcome).unwrap_or(JsValue::NULL))
    }

    pub fn pool_summary(&self) -> JsValue {
        match self.engine.pool_summary() {
            Ok(summary) => serde_wasm_bindgen::to_value(&summary).unwrap_or(JsValue::NULL),
            Err(_) => JsValue::NULL,
        }
    }

    pub fn recent_swaps(&self, limit: u32) -> JsValue {
        match self.engine.list_recent_swaps(limit as usize) {
            Ok(swaps) => serde_wasm_bindgen::to_value(&swaps).unwrap_or(JsValue::NULL),
            Err(_) => JsValue::NULL,
        }
    }

    pub fn agents(&self) -> JsValue {
        match self.store.agents() {
            Ok(agents) => serde_wasm_bindgen::to_value(&agents).unwrap_or(JsValue::NULL),
            Err(_) => JsValue::NULL,
        }
    }

    pub fn active_events(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.events.get_active_events()).unwrap_or(JsValue::NULL)
    }

    pub fn prompt_text(&self) -> String {
        self.events.get_prompt_text()
    }

    pub fn cost_multiplier(&self) -> f64 {
        self.events.get_cost_multiplier().to_f64().unwrap_or(1.0)
    }

    /// Empty string means "no particular zone".
    pub fn yield_multiplier(&self, zone: &str) -> f64 {
        self.yield_multiplier_for(Zone::parse(zone)).to_f64().unwrap_or(1.0)
    }

    pub fn upkeep_multiplier(&self) -> f64 {
        self.events.get_upkeep_multiplier().to_f64().unwrap_or(1.0)
    }

    pub fn supply(&self) -> JsValue {
        match self.supply_report() {
            Ok(report) => serde_wasm_bindgen::to_value(&report).unwrap_or(JsValue::NULL),
            Err(_) => JsValue::NULL,
        }
    }

    pub fn reset(&mut self) -> Result<(), JsValue> {
        *self = ArenaEconomy::new(self.config.seed as u32)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_amounts_must_be_whole() {
        assert_eq!(whole_amount(1_500.0), Some(1_500));
        assert_eq!(whole_amount(1_500.7), None);
        assert_eq!(whole_amount(0.0), None);
        assert_eq!(whole_amount(-3.0), None);
        assert_eq!(whole_amount(f64::NAN), None);
        assert_eq!(whole_amount(f64::INFINITY), None);
        assert_eq!(whole_amount(1e30), None);
    }
}
