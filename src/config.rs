// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Economy Core - Configuration
//
// Environment-style key/value configuration. Every key is optional; values
// that fail to parse fall back to their default with a warning and are then
// clamped into their legal range.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const ENV_POOL_INITIAL_RESERVE: &str = "ARENA_POOL_INITIAL_RESERVE";
pub const ENV_POOL_INITIAL_ARENA: &str = "ARENA_POOL_INITIAL_ARENA";
pub const ENV_POOL_FEE_BPS: &str = "ARENA_POOL_FEE_BPS";
pub const ENV_POOL_OPS_SHARE_BPS: &str = "ARENA_POOL_OPS_SHARE_BPS";
pub const ENV_PULSE_ENABLED: &str = "MARKET_PULSE_ENABLED";
pub const ENV_PULSE_INTERVAL_MS: &str = "MARKET_PULSE_INTERVAL_MS";
pub const ENV_PULSE_TRADES_PER_TICK: &str = "MARKET_PULSE_TRADES_PER_TICK";
pub const ENV_EVENT_CHANCE_PCT: &str = "WORLD_EVENT_CHANCE_PCT";
pub const ENV_EVENT_MAX_ACTIVE: &str = "WORLD_EVENT_MAX_ACTIVE";
pub const ENV_EVENT_COOLDOWN_TICKS: &str = "WORLD_EVENT_COOLDOWN_TICKS";
pub const ENV_SKILL_MODEL_TIMEOUT_MS: &str = "SKILL_MODEL_TIMEOUT_MS";
pub const ENV_ECONOMY_SEED: &str = "ECONOMY_SEED";

pub const MAX_FEE_BPS: u64 = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    ReadConfigFile { path: String, message: String },
    #[error("failed to parse config file {path}: {message}")]
    ParseConfigFile { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub initial_reserve: u64,
    pub initial_arena: u64,
    /// Swap fee in basis points, at most 1_000 (10%).
    pub fee_bps: u64,
    /// Share of sell-side fees routed to the ops budget; the rest is insurance.
    pub ops_share_bps: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            initial_reserve: 1_000_000,
            initial_arena: 1_000_000,
            fee_bps: 100,
            ops_share_bps: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    pub trades_per_tick: usize,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self { enabled: true, interval_ms: 1_200, trades_per_tick: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Per-tick trigger probability in percent.
    pub chance_pct: u32,
    pub max_active: usize,
    pub cooldown_ticks: u64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { chance_pct: 20, max_active: 1, cooldown_ticks: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillConfig {
    pub model_timeout_ms: u64,
}

impl Default for SkillConfig {
    fn default() -> Self {
        Self { model_timeout_ms: 8_000 }
    }
}

// ---------------------------------------------------------------------------
// EconomyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyConfig {
    pub market: MarketConfig,
    pub pulse: PulseConfig,
    pub events: EventConfig,
    pub skills: SkillConfig,
    pub seed: u64,
}

impl EconomyConfig {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Read a flat TOML table of the same keys; any key missing from the
    /// file is looked up in the environment.
    pub fn from_config_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| ConfigError::ReadConfigFile {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let value: toml::Value =
            toml::from_str(&content).map_err(|err| ConfigError::ParseConfigFile {
                path: path.display().to_string(),
                message: err.to_string(),
            })?;
        let table = value.as_table().ok_or_else(|| ConfigError::ParseConfigFile {
            path: path.display().to_string(),
            message: "root is not a TOML table".to_string(),
        })?;

        Ok(Self::from_env_with(|key| {
            table
                .get(key)
                .and_then(toml_value_to_string)
                .or_else(|| std::env::var(key).ok())
        }))
    }

    pub fn from_env_with<F>(mut getter: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let market = MarketConfig {
            initial_reserve: int_env(&mut getter, ENV_POOL_INITIAL_RESERVE, defaults.market.initial_reserve)
                .max(1),
            initial_arena: int_env(&mut getter, ENV_POOL_INITIAL_ARENA, defaults.market.initial_arena)
                .max(1),
            fee_bps: int_env(&mut getter, ENV_POOL_FEE_BPS, defaults.market.fee_bps).min(MAX_FEE_BPS),
            ops_share_bps: int_env(&mut getter, ENV_POOL_OPS_SHARE_BPS, defaults.market.ops_share_bps)
                .min(crate::core_types::BPS_SCALE),
        };
        let pulse = PulseConfig {
            enabled: bool_env(&mut getter, ENV_PULSE_ENABLED, defaults.pulse.enabled),
            interval_ms: int_env(&mut getter, ENV_PULSE_INTERVAL_MS, defaults.pulse.interval_ms)
                .clamp(250, 60_000),
            trades_per_tick: int_env(
                &mut getter,
                ENV_PULSE_TRADES_PER_TICK,
                defaults.pulse.trades_per_tick as u64,
            )
            .clamp(1, 20) as usize,
        };
        let events = EventConfig {
            chance_pct: int_env(&mut getter, ENV_EVENT_CHANCE_PCT, defaults.events.chance_pct as u64)
                .min(100) as u32,
            max_active: int_env(&mut getter, ENV_EVENT_MAX_ACTIVE, defaults.events.max_active as u64)
                .clamp(1, 5) as usize,
            cooldown_ticks: int_env(
                &mut getter,
                ENV_EVENT_COOLDOWN_TICKS,
                defaults.events.cooldown_ticks,
            )
            .min(100),
        };
        let skills = SkillConfig {
            model_timeout_ms: int_env(
                &mut getter,
                ENV_SKILL_MODEL_TIMEOUT_MS,
                defaults.skills.model_timeout_ms,
            )
            .clamp(100, 60_000),
        };
        let seed = int_env(&mut getter, ENV_ECONOMY_SEED, defaults.seed);

        Self { market, pulse, events, skills, seed }
    }
}

fn int_env<F>(getter: &mut F, key: &'static str, default: u64) -> u64
where
    F: FnMut(&str) -> Option<String>,
{
    match getter(key) {
        Some(raw) if !raw.trim().is_empty() => match raw.trim().parse::<u64>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, default, "invalid integer config value, using default");
                default
            }
        },
        _ => default,
    }
}

fn bool_env<F>(getter: &mut F, key: &'static str, default: bool) -> bool
where
    F: FnMut(&str) -> Option<String>,
{
    match getter(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        Some(v) if !v.is_empty() => {
            tracing::warn!(key, value = %v, default, "invalid boolean config value, using default");
            default
        }
        _ => default,
    }
}

fn toml_value_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(value) => Some(value.clone()),
        toml::Value::Integer(value) => Some(value.to_string()),
        toml::Value::Float(value) => Some(value.to_string()),
        toml::Value::Boolean(value) => Some(value.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> EconomyConfig {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        EconomyConfig::from_env_with(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = config_from(&[]);
        assert_eq!(cfg, EconomyConfig::default());
        assert_eq!(cfg.market.fee_bps, 100);
        assert_eq!(cfg.pulse.interval_ms, 1_200);
        assert_eq!(cfg.pulse.trades_per_tick, 2);
    }

    #[test]
    fn values_are_parsed_and_clamped() {
        let cfg = config_from(&[
            (ENV_POOL_INITIAL_RESERVE, "500000"),
            (ENV_POOL_FEE_BPS, "5000"),
            (ENV_PULSE_INTERVAL_MS, "10"),
            (ENV_PULSE_TRADES_PER_TICK, "99"),
            (ENV_EVENT_CHANCE_PCT, "150"),
            (ENV_PULSE_ENABLED, "off"),
        ]);
        assert_eq!(cfg.market.initial_reserve, 500_000);
        assert_eq!(cfg.market.fee_bps, MAX_FEE_BPS);
        assert_eq!(cfg.pulse.interval_ms, 250);
        assert_eq!(cfg.pulse.trades_per_tick, 20);
        assert_eq!(cfg.events.chance_pct, 100);
        assert!(!cfg.pulse.enabled);
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let cfg = config_from(&[
            (ENV_POOL_INITIAL_ARENA, "lots"),
            (ENV_POOL_FEE_BPS, "-3"),
            (ENV_PULSE_ENABLED, "maybe"),
        ]);
        assert_eq!(cfg.market.initial_arena, 1_000_000);
        assert_eq!(cfg.market.fee_bps, 100);
        assert!(cfg.pulse.enabled);
    }

    #[test]
    fn zero_initial_balance_is_raised_to_one() {
        let cfg = config_from(&[(ENV_POOL_INITIAL_RESERVE, "0")]);
        assert_eq!(cfg.market.initial_reserve, 1);
    }

    #[test]
    fn config_file_values_override_defaults() {
        let dir = std::env::temp_dir().join(format!("arena-economy-config-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("test: create temp dir");
        let path = dir.join("economy.toml");
        fs::write(&path, "ARENA_POOL_FEE_BPS = 30\nECONOMY_SEED = \"42\"\n")
            .expect("test: write config");

        let cfg = EconomyConfig::from_config_file(&path).expect("test: load config file");
        assert_eq!(cfg.market.fee_bps, 30);
        assert_eq!(cfg.seed, 42);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = EconomyConfig::from_config_file(Path::new("/definitely/not/here.toml"));
        assert!(matches!(err, Err(ConfigError::ReadConfigFile { .. })));
    }
}
