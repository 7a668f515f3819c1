//! Registry loader: walks `data/<kind>/` and fills [`Registries`].

use std::path::Path;

use haunts_core::house::{HouseDef, RoomDef};
use haunts_core::{ConditionDef, EntityDef, GearDef, Registries};
use tracing::info;

use crate::loaders::{LoadResult, load_named_dir};

/// Loader for every named definition under a data directory.
///
/// ```text
/// data_dir/
/// ├── houses/*.house
/// ├── rooms/*.room
/// ├── entities/*.json
/// ├── conditions/*.json
/// └── gear/*.json
/// ```
pub struct RegistryLoader;

impl RegistryLoader {
    pub fn load(data_dir: &Path) -> LoadResult<Registries> {
        let mut registries = Registries::default();

        for def in load_named_dir::<ConditionDef>(&data_dir.join("conditions"), "json")? {
            registries.add_condition(def);
        }
        for def in load_named_dir::<GearDef>(&data_dir.join("gear"), "json")? {
            registries.add_gear(def);
        }
        for def in load_named_dir::<EntityDef>(&data_dir.join("entities"), "json")? {
            registries.add_entity(def);
        }
        for def in load_named_dir::<RoomDef>(&data_dir.join("rooms"), "room")? {
            registries.add_room(def);
        }
        for def in load_named_dir::<HouseDef>(&data_dir.join("houses"), "house")? {
            registries.add_house(def);
        }

        info!(
            target: "content::loader",
            entities = registries.entities.len(),
            conditions = registries.conditions.len(),
            gear = registries.gear.len(),
            rooms = registries.rooms.len(),
            houses = registries.houses.len(),
            "registries loaded"
        );
        Ok(registries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haunts_core::Side;

    fn write(dir: &Path, rel: &str, text: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn loads_and_builds_a_house() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "rooms/parlor.room", r#"{"Name": "Parlor", "Size": {"Dx": 10, "Dy": 4}}"#);
        write(root, "rooms/hall.room", r#"{"Name": "Hall", "Size": {"Dx": 10, "Dy": 4}}"#);
        write(
            root,
            "houses/manor.house",
            r#"{
                "Name": "Manor",
                "Floors": [{
                    "Rooms": [
                        {"Room": "Parlor", "X": 0, "Y": 0,
                         "Doors": [{"Facing": "FarLeft", "Pos": 5, "Width": 1}]},
                        {"Room": "Hall", "X": 0, "Y": 4}
                    ],
                    "Spawns": [{"Name": "intruders-start", "X": 0, "Y": 0, "Dx": 10, "Dy": 4}]
                }]
            }"#,
        );
        write(
            root,
            "entities/occultist.json",
            r#"{
                "Name": "Occultist",
                "Explorer": {},
                "Actions": [{"Move": {"Name": "Move"}}]
            }"#,
        );
        write(root, "entities/broken.json", r#"{"Explorer": {}}"#);

        let registries = RegistryLoader::load(root).unwrap();
        assert_eq!(registries.entities.len(), 1);
        assert_eq!(registries.entity("Occultist").unwrap().side(), Side::Intruders);

        let house = registries.build_house("Manor").unwrap();
        assert_eq!(house.floors[0].rooms.len(), 2);
        assert!(house.floors[0].doors_paired());
    }

    #[test]
    fn builtin_conditions_survive_an_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let registries = RegistryLoader::load(dir.path()).unwrap();
        assert!(registries.condition("Brutalized").is_some());
    }
}
