#![allow(dead_code)]

use std::sync::Arc;

use haunts_core::action::{ActionDef, BasicAttackDef, MoveDef};
use haunts_core::entity::{ExplorerDef, HauntDef, HauntLevel};
use haunts_core::house::Room;
use haunts_core::{
    BoardPos, DamageKind, EntityDef, EntityId, Floor, Game, House, Registries, Side, SpawnPoint,
};
use haunts_runtime::{Event, Runtime, TurnEvent};
use haunts_core::TurnState;
use tokio::sync::broadcast::{Receiver, error::TryRecvError};

pub fn registries() -> Arc<Registries> {
    let walk = ActionDef::Move(MoveDef {
        name: "Move".into(),
        ..MoveDef::default()
    });
    let mut registries = Registries::default();

    let mut occultist = EntityDef::new("Occultist");
    occultist.explorer = Some(ExplorerDef::default());
    occultist.sight = Some(8);
    occultist.actions = vec![
        walk.clone(),
        ActionDef::BasicAttack(BasicAttackDef {
            name: "Pistol".into(),
            ap: 3,
            damage: 2,
            strength: 3,
            kind: DamageKind::Unspecified,
            range: 10,
            ammo: 0,
            conditions: Vec::new(),
            sounds: Default::default(),
        }),
    ];
    registries.add_entity(occultist);

    let mut ghost = EntityDef::new("Poltergeist");
    ghost.haunt = Some(HauntDef {
        level: HauntLevel::Servitor,
        cost: 1,
    });
    ghost.actions = vec![walk];
    registries.add_entity(ghost);
    Arc::new(registries)
}

/// A single 12x12 hall. Intruders start along the top, denizens along the
/// bottom.
pub fn hall(first: Side, seed: u64) -> Game {
    let mut floor = Floor::default();
    floor
        .add_room(Room::new("Hall", 0, 0, 12, 12))
        .expect("room fits");
    for (name, y) in [("intruders-start", 0), ("denizens-start", 9)] {
        floor.spawns.push(SpawnPoint {
            name: name.into(),
            x: 0,
            y,
            dx: 12,
            dy: 3,
        });
    }
    let house = House {
        name: "Hall".into(),
        floors: vec![floor],
    };
    Game::new(house, registries(), seed, first)
}

pub fn spawn(game: &mut Game, name: &str, x: i32, y: i32) -> EntityId {
    game.spawn_at(name, BoardPos::new(x, y))
        .expect("spawn cell is free")
}

/// Everything published so far on `rx`.
pub fn drain(rx: &mut Receiver<Event>, into: &mut Vec<Event>) {
    loop {
        match rx.try_recv() {
            Ok(event) => into.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return,
        }
    }
}

pub fn states(events: &[Event]) -> Vec<TurnState> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Turn(TurnEvent::StateChanged { to, .. }) => Some(*to),
            _ => None,
        })
        .collect()
}

pub fn frames(runtime: &mut Runtime, n: usize) {
    for _ in 0..n {
        runtime.frame(1.0 / 30.0);
    }
}
