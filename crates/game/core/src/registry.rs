//! Named definitions shared by every game in a session.
//!
//! Built once by the content loader and handed to games behind an `Arc`;
//! nothing here changes while a game runs.

use std::collections::BTreeMap;

use tracing::warn;

use crate::entity::{EntityDef, GearDef};
use crate::house::{House, HouseDef, RoomDef, SpatialError};
use crate::stats::{ConditionDef, builtin_conditions};

#[derive(Clone, Debug)]
pub struct Registries {
    pub entities: BTreeMap<String, EntityDef>,
    pub conditions: BTreeMap<String, ConditionDef>,
    pub gear: BTreeMap<String, GearDef>,
    pub rooms: BTreeMap<String, RoomDef>,
    pub houses: BTreeMap<String, HouseDef>,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
            conditions: builtin_conditions()
                .into_iter()
                .map(|c| (c.name.clone(), c))
                .collect(),
            gear: BTreeMap::new(),
            rooms: BTreeMap::new(),
            houses: BTreeMap::new(),
        }
    }
}

impl Registries {
    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    pub fn condition(&self, name: &str) -> Option<&ConditionDef> {
        self.conditions.get(name)
    }

    pub fn gear(&self, name: &str) -> Option<&GearDef> {
        self.gear.get(name)
    }

    pub fn add_entity(&mut self, def: EntityDef) {
        if self.entities.insert(def.name.clone(), def).is_some() {
            warn!(target: "core::registry", "entity definition replaced");
        }
    }

    pub fn add_condition(&mut self, def: ConditionDef) {
        self.conditions.insert(def.name.clone(), def);
    }

    pub fn add_gear(&mut self, def: GearDef) {
        self.gear.insert(def.name.clone(), def);
    }

    pub fn add_room(&mut self, def: RoomDef) {
        self.rooms.insert(def.name.clone(), def);
    }

    pub fn add_house(&mut self, def: HouseDef) {
        self.houses.insert(def.name.clone(), def);
    }

    /// Builds the named house from its document and the room registry.
    pub fn build_house(&self, name: &str) -> Result<House, SpatialError> {
        self.houses
            .get(name)
            .ok_or_else(|| SpatialError::UnknownHouse(name.to_string()))?
            .build(&self.rooms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_conditions_are_registered() {
        let registries = Registries::default();
        assert!(registries.condition("FireDebuffAttack").is_some());
        assert!(registries.condition("Brutalized").is_some());
    }

    #[test]
    fn unknown_house() {
        let err = Registries::default().build_house("Manor").unwrap_err();
        assert_eq!(err, SpatialError::UnknownHouse("Manor".into()));
    }
}
