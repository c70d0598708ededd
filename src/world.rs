// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Economy Core - World Map
//
// The building/claiming subsystem is an external collaborator. The event
// generator and the skill broker only need a narrow view of it: which towns
// exist, which structures are built, what a typical claim/build costs, and
// two write hooks (damage and yield bonus). `InMemoryWorld` backs the tests
// and the headless driver.

use std::collections::BTreeMap;
use std::sync::RwLock;

use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{AgentId, PlotId, TownId, Zone};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("plot {0} has no built structure")]
    PlotNotFound(PlotId),
    #[error("town {0} not found")]
    TownNotFound(TownId),
    #[error("damage fraction {0} outside [0, 1]")]
    InvalidFraction(Decimal),
    #[error("world state lock poisoned")]
    Poisoned,
}

/// A completed structure on a plot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub plot: PlotId,
    pub town: TownId,
    pub zone: Zone,
    pub owner: Option<AgentId>,
    /// Value sunk into the structure; damage destroys a share of it.
    pub invested_value: u64,
    /// Permanent yield bonus (1 unless a gold rush was claimed here).
    pub yield_bonus: Decimal,
}

/// Typical action costs in a town, used to size discretionary spend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownCosts {
    pub claim_cost: u64,
    pub build_cost: u64,
}

impl TownCosts {
    pub fn total(&self) -> u64 {
        self.claim_cost.saturating_add(self.build_cost)
    }
}

pub trait WorldMap: Send + Sync {
    fn towns(&self) -> Vec<TownId>;

    /// All built structures, in a stable order.
    fn structures(&self) -> Vec<Structure>;

    /// Destroy `fraction` of a structure's invested value. Returns the
    /// amount destroyed.
    fn damage_structure(&self, plot: &PlotId, fraction: Decimal) -> Result<u64, WorldError>;

    fn grant_yield_bonus(&self, plot: &PlotId, multiplier: Decimal) -> Result<(), WorldError>;

    /// Costs for `town`, or the average over all towns when `None`.
    fn typical_costs(&self, town: Option<&TownId>) -> TownCosts;
}

// ---------------------------------------------------------------------------
// InMemoryWorld
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct WorldState {
    towns: BTreeMap<TownId, TownCosts>,
    structures: BTreeMap<PlotId, Structure>,
}

#[derive(Debug, Default)]
pub struct InMemoryWorld {
    state: RwLock<WorldState>,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_town(&self, town: impl Into<TownId>, costs: TownCosts) -> Result<(), WorldError> {
        let mut state = self.state.write().map_err(|_| WorldError::Poisoned)?;
        state.towns.insert(town.into(), costs);
        Ok(())
    }

    pub fn build(
        &self,
        plot: impl Into<PlotId>,
        town: impl Into<TownId>,
        zone: Zone,
        owner: Option<AgentId>,
        invested_value: u64,
    ) -> Result<Structure, WorldError> {
        let town = town.into();
        let mut state = self.state.write().map_err(|_| WorldError::Poisoned)?;
        if !state.towns.contains_key(&town) {
            return Err(WorldError::TownNotFound(town));
        }
        let structure = Structure {
            plot: plot.into(),
            town,
            zone,
            owner,
            invested_value,
            yield_bonus: Decimal::ONE,
        };
        state.structures.insert(structure.plot.clone(), structure.clone());
        Ok(structure)
    }

    /// Remove a structure entirely (demolition, abandonment).
    pub fn demolish(&self, plot: &PlotId) -> Result<Structure, WorldError> {
        let mut state = self.state.write().map_err(|_| WorldError::Poisoned)?;
        state
            .structures
            .remove(plot)
            .ok_or_else(|| WorldError::PlotNotFound(plot.clone()))
    }

    pub fn structure(&self, plot: &PlotId) -> Option<Structure> {
        self.state.read().ok()?.structures.get(plot).cloned()
    }
}

impl WorldMap for InMemoryWorld {
    fn towns(&self) -> Vec<TownId> {
        self.state
            .read()
            .map(|s| s.towns.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn structures(&self) -> Vec<Structure> {
        self.state
            .read()
            .map(|s| s.structures.values().cloned().collect())
            .unwrap_or_default()
    }

    fn damage_structure(&self, plot: &PlotId, fraction: Decimal) -> Result<u64, WorldError> {
        if fraction < Decimal::ZERO || fraction > Decimal::ONE {
            return Err(WorldError::InvalidFraction(fraction));
        }
        let mut state = self.state.write().map_err(|_| WorldError::Poisoned)?;
        let structure = state
            .structures
            .get_mut(plot)
            .ok_or_else(|| WorldError::PlotNotFound(plot.clone()))?;
        let destroyed = (Decimal::from(structure.invested_value) * fraction)
            .floor()
            .to_u64()
            .unwrap_or(0)
            .min(structure.invested_value);
        structure.invested_value -= destroyed;
        Ok(destroyed)
    }

    fn grant_yield_bonus(&self, plot: &PlotId, multiplier: Decimal) -> Result<(), WorldError> {
        let mut state = self.state.write().map_err(|_| WorldError::Poisoned)?;
        let structure = state
            .structures
            .get_mut(plot)
            .ok_or_else(|| WorldError::PlotNotFound(plot.clone()))?;
        structure.yield_bonus *= multiplier;
        Ok(())
    }

    fn typical_costs(&self, town: Option<&TownId>) -> TownCosts {
        let Ok(state) = self.state.read() else {
            return TownCosts::default();
        };
        if let Some(costs) = town.and_then(|t| state.towns.get(t)) {
            return *costs;
        }
        let count = state.towns.len() as u64;
        if count == 0 {
            return TownCosts::default();
        }
        let (claim, build) = state
            .towns
            .values()
            .fold((0u128, 0u128), |(c, b), t| (c + t.claim_cost as u128, b + t.build_cost as u128));
        TownCosts {
            claim_cost: (claim / count as u128) as u64,
            build_cost: (build / count as u128) as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn world() -> InMemoryWorld {
        let world = InMemoryWorld::new();
        world
            .add_town("north", TownCosts { claim_cost: 100, build_cost: 300 })
            .expect("test: town");
        world
            .add_town("south", TownCosts { claim_cost: 200, build_cost: 500 })
            .expect("test: town");
        world
    }

    #[test]
    fn damage_destroys_floor_of_fraction() {
        let world = world();
        world.build("p1", "north", Zone::Industrial, None, 1_001).expect("test: build");
        let destroyed = world.damage_structure(&"p1".into(), dec!(0.25)).expect("test: damage");
        assert_eq!(destroyed, 250);
        assert_eq!(world.structure(&"p1".into()).map(|s| s.invested_value), Some(751));
    }

    #[test]
    fn damage_rejects_bad_input() {
        let world = world();
        assert_eq!(
            world.damage_structure(&"nope".into(), dec!(0.1)),
            Err(WorldError::PlotNotFound("nope".into()))
        );
        world.build("p1", "north", Zone::Civic, None, 10).expect("test: build");
        assert!(matches!(
            world.damage_structure(&"p1".into(), dec!(1.5)),
            Err(WorldError::InvalidFraction(_))
        ));
    }

    #[test]
    fn build_requires_known_town() {
        let world = world();
        let err = world.build("p9", "atlantis", Zone::Civic, None, 10);
        assert_eq!(err, Err(WorldError::TownNotFound("atlantis".into())));
    }

    #[test]
    fn typical_costs_by_town_or_average() {
        let world = world();
        assert_eq!(world.typical_costs(Some(&"south".into())).total(), 700);
        let avg = world.typical_costs(None);
        assert_eq!(avg, TownCosts { claim_cost: 150, build_cost: 400 });
        assert_eq!(InMemoryWorld::new().typical_costs(None).total(), 0);
    }

    #[test]
    fn yield_bonus_compounds() {
        let world = world();
        world.build("p1", "north", Zone::Commercial, None, 10).expect("test: build");
        world.grant_yield_bonus(&"p1".into(), dec!(2)).expect("test: bonus");
        assert_eq!(world.structure(&"p1".into()).map(|s| s.yield_bonus), Some(dec!(2)));
    }
}
