//! Small boards for unit tests.

use std::sync::Arc;

use haunts_core::action::{ActionDef, BasicAttackDef, MoveDef};
use haunts_core::entity::{ExplorerDef, HauntDef, HauntLevel};
use haunts_core::house::Room;
use haunts_core::{BoardPos, DamageKind, EntityDef, EntityId, Floor, Game, House, Registries, Side, SpawnPoint};

fn attack(name: &str, ap: i32, range: i32) -> ActionDef {
    ActionDef::BasicAttack(BasicAttackDef {
        name: name.into(),
        ap,
        damage: 2,
        strength: 3,
        kind: DamageKind::Unspecified,
        range,
        ammo: 0,
        conditions: Vec::new(),
        sounds: Default::default(),
    })
}

fn walker() -> ActionDef {
    ActionDef::Move(MoveDef {
        name: "Move".into(),
        ..MoveDef::default()
    })
}

pub(crate) fn registries() -> Registries {
    let mut registries = Registries::default();

    let mut occultist = EntityDef::new("Occultist");
    occultist.explorer = Some(ExplorerDef::default());
    occultist.sight = Some(8);
    occultist.actions = vec![walker(), attack("Pistol", 3, 10)];
    registries.add_entity(occultist);

    let mut ghost = EntityDef::new("Poltergeist");
    ghost.haunt = Some(HauntDef {
        level: HauntLevel::Servitor,
        cost: 1,
    });
    ghost.actions = vec![walker(), attack("Claw", 2, 1)];
    registries.add_entity(ghost);

    let mut shade = EntityDef::new("Shade");
    shade.haunt = Some(HauntDef::default());
    shade.actions = vec![walker()];
    registries.add_entity(shade);
    registries
}

/// One open 12x12 hall with a start strip for each side.
pub(crate) fn skirmish(first: Side) -> Game {
    let mut floor = Floor::default();
    let _ = floor.add_room(Room::new("Hall", 0, 0, 12, 12));
    floor.spawns.push(SpawnPoint {
        name: "intruders-start".into(),
        x: 0,
        y: 0,
        dx: 12,
        dy: 3,
    });
    floor.spawns.push(SpawnPoint {
        name: "denizens-start".into(),
        x: 0,
        y: 9,
        dx: 12,
        dy: 3,
    });
    let house = House {
        name: "Hall".into(),
        floors: vec![floor],
    };
    Game::new(house, Arc::new(registries()), 7, first)
}

pub(crate) fn spawn(game: &mut Game, name: &str, x: i32, y: i32) -> EntityId {
    game.spawn_at(name, BoardPos::new(x, y)).unwrap()
}
