// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Economy Core - Time Sources
//
// Logical ticks drive event lifecycles and skill throttling; wall-clock
// milliseconds drive the market pulse cooldown and row timestamps. Both are
// injected so tests can step time instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core_types::Tick;

/// Source of the current logical simulation tick.
pub trait TickSource: Send + Sync {
    fn current_tick(&self) -> Tick;
}

/// Source of wall-clock time in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

// ---------------------------------------------------------------------------
// SharedTick
// ---------------------------------------------------------------------------

/// Tick counter advanced by the single external scheduler and read by
/// everyone else.
#[derive(Debug, Clone, Default)]
pub struct SharedTick {
    inner: Arc<AtomicU64>,
}

impl SharedTick {
    pub fn new(start: Tick) -> Self {
        Self { inner: Arc::new(AtomicU64::new(start)) }
    }

    /// Advance by one and return the new tick.
    pub fn advance(&self) -> Tick {
        self.inner.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn set(&self, tick: Tick) {
        self.inner.store(tick, Ordering::SeqCst);
    }
}

impl TickSource for SharedTick {
    fn current_tick(&self) -> Tick {
        self.inner.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// Real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for tests and the wasm facade.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self { now: Arc::new(AtomicU64::new(start_ms)) }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_tick_is_shared_between_clones() {
        let tick = SharedTick::new(0);
        let reader = tick.clone();
        assert_eq!(tick.advance(), 1);
        assert_eq!(tick.advance(), 2);
        assert_eq!(reader.current_tick(), 2);
        tick.set(40);
        assert_eq!(reader.current_tick(), 40);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance_ms(250);
        assert_eq!(clock.now_ms(), 1_250);
    }
}
