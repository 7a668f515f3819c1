//! Host functions, executed on the game thread.
//!
//! The script thread turns each call into a [`HostRequest`] and blocks on
//! the reply. The game thread runs requests one at a time between frames,
//! so a request always sees a game with no exec half applied.

use haunts_core::house::compile_pattern;
use haunts_core::{
    ActionExec, BoardPos, Entity, EntityId, Game, GameEngine, GameEvent, LosMode, MusicCommand, Side,
    SpawnPoint, SpriteCommand, Waypoint,
};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::saved::{decode_saved, encode_saved};
use crate::ai::AiTarget;
use crate::api::{PlacementRequest, Ui};

pub type HostReply = Result<Value, String>;

#[derive(Clone, Debug, PartialEq)]
pub enum HostRequest {
    LoadHouse(String),
    SpawnAt {
        name: String,
        pos: BoardPos,
    },
    SpawnSomewhere {
        name: String,
        spawns: Vec<SpawnPoint>,
        hidden: bool,
    },
    SpawnPointsMatching(String),
    SpawnPointInLos {
        spawn: SpawnPoint,
        side: Side,
    },
    PlaceEntities {
        pattern: String,
        roster: Vec<String>,
        min: usize,
        max: usize,
    },
    RoomAtPos(BoardPos),
    SetLosMode {
        side: Side,
        mode: LosMode,
        rooms: Vec<usize>,
    },
    AllEnts,
    SelectEnt(EntityId),
    RemoveEnt(EntityId),
    SetPosition(EntityId, BoardPos),
    SetHp(EntityId, i32),
    SetAp(EntityId, i32),
    SetCondition {
        ent: EntityId,
        name: String,
        on: bool,
    },
    SetGear {
        ent: EntityId,
        name: String,
    },
    BindAi {
        target: AiTarget,
        source: String,
    },
    DialogBox {
        path: String,
        args: Value,
    },
    PickFromN {
        min: usize,
        max: usize,
        options: Vec<String>,
    },
    ChooserFromFile(String),
    DoExec(ActionExec),
    PlayAnimations {
        ent: EntityId,
        anims: Vec<String>,
    },
    PlayMusic(String),
    StopMusic,
    SetMusicParam {
        name: String,
        value: f64,
    },
    PlaySound(String),
    SetWaypoint(Waypoint),
    RemoveWaypoint(String),
    Rand(i32),
    /// Answered by the bridge once the frames have passed.
    Sleep(f64),
    EndGame,
    SaveGameState {
        store: String,
    },
    LoadGameState(String),
    FocusPos(BoardPos),
    FocusZoom(f64),
    ShowMainBar(bool),
}

impl HostRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadHouse(_) => "LoadHouse",
            Self::SpawnAt { .. } => "SpawnEntityAtPosition",
            Self::SpawnSomewhere { .. } => "SpawnEntitySomewhereInSpawnPoints",
            Self::SpawnPointsMatching(_) => "GetSpawnPointsMatching",
            Self::SpawnPointInLos { .. } => "IsSpawnPointInLos",
            Self::PlaceEntities { .. } => "PlaceEntities",
            Self::RoomAtPos(_) => "RoomAtPos",
            Self::SetLosMode { .. } => "SetLosMode",
            Self::AllEnts => "GetAllEnts",
            Self::SelectEnt(_) => "SelectEnt",
            Self::RemoveEnt(_) => "RemoveEnt",
            Self::SetPosition(..) => "SetPosition",
            Self::SetHp(..) => "SetHp",
            Self::SetAp(..) => "SetAp",
            Self::SetCondition { .. } => "SetCondition",
            Self::SetGear { .. } => "SetGear",
            Self::BindAi { .. } => "BindAi",
            Self::DialogBox { .. } => "DialogBox",
            Self::PickFromN { .. } => "PickFromN",
            Self::ChooserFromFile(_) => "ChooserFromFile",
            Self::DoExec(_) => "DoExec",
            Self::PlayAnimations { .. } => "PlayAnimations",
            Self::PlayMusic(_) => "PlayMusic",
            Self::StopMusic => "StopMusic",
            Self::SetMusicParam { .. } => "SetMusicParam",
            Self::PlaySound(_) => "PlaySound",
            Self::SetWaypoint(_) => "SetWaypoint",
            Self::RemoveWaypoint(_) => "RemoveWaypoint",
            Self::Rand(_) => "Rand",
            Self::Sleep(_) => "Sleep",
            Self::EndGame => "EndGame",
            Self::SaveGameState { .. } => "SaveGameState",
            Self::LoadGameState(_) => "LoadGameState",
            Self::FocusPos(_) => "FocusPos",
            Self::FocusZoom(_) => "FocusZoom",
            Self::ShowMainBar(_) => "ShowMainBar",
        }
    }

    /// Frames the calling script stays blocked after the request is served.
    /// Animations take one frame each.
    pub fn blocking_frames(&self) -> usize {
        match self {
            Self::PlayAnimations { anims, .. } => anims.len(),
            _ => 0,
        }
    }
}

/// Side effects a request leaves for the turn driver.
#[derive(Debug, Default)]
pub struct HostEffects {
    pub bindings: Vec<(AiTarget, String)>,
    /// A saved game replaced the running one.
    pub restored: bool,
}

pub struct HostContext<'a> {
    pub game: &'a mut Game,
    pub ui: &'a mut dyn Ui,
    pub effects: &'a mut HostEffects,
}

pub(crate) fn ent_summary(e: &Entity) -> Value {
    json!({
        "Id": e.id.0,
        "Name": e.name(),
        "Side": e.side().to_string(),
        "Pos": { "X": e.pos.x, "Y": e.pos.y },
        "HpCur": e.stats.hp_cur(),
        "ApCur": e.stats.ap_cur(),
        "Alive": e.is_alive(),
    })
}

fn ent_or_null(id: Option<EntityId>) -> Value {
    id.map_or(Value::Null, |id| json!(id.0))
}

fn known(game: &Game, id: EntityId) -> Result<(), String> {
    game.entity(id)
        .map(|_| ())
        .ok_or_else(|| format!("no entity {id}"))
}

impl HostContext<'_> {
    pub fn execute(&mut self, request: HostRequest) -> HostReply {
        debug!(target: "runtime::script", call = request.name(), "host call");
        let game = &mut *self.game;
        match request {
            HostRequest::LoadHouse(name) => {
                let house = game
                    .registries()
                    .build_house(&name)
                    .map_err(|e| e.to_string())?;
                game.load_house(house);
                Ok(Value::Null)
            }
            HostRequest::SpawnAt { name, pos } => Ok(ent_or_null(game.spawn_at(&name, pos))),
            HostRequest::SpawnSomewhere {
                name,
                spawns,
                hidden,
            } => Ok(ent_or_null(game.spawn_somewhere(&name, &spawns, hidden))),
            HostRequest::SpawnPointsMatching(pattern) => {
                let regex = compile_pattern(&pattern).map_err(|e| e.to_string())?;
                let spawns: Vec<&SpawnPoint> = game.floor().spawns_matching(&regex).collect();
                serde_json::to_value(spawns).map_err(|e| e.to_string())
            }
            HostRequest::SpawnPointInLos { spawn, side } => {
                Ok(Value::Bool(game.team_los(side, &spawn.rect())))
            }
            HostRequest::PlaceEntities {
                pattern,
                roster,
                min,
                max,
            } => self.place_entities(&pattern, roster, min, max),
            HostRequest::RoomAtPos(pos) => Ok(json!(
                game.floor()
                    .room_index_at(pos)
                    .map_or(-1, |i| i as i64)
            )),
            HostRequest::SetLosMode { side, mode, rooms } => {
                game.set_los_mode(side, mode, rooms);
                Ok(Value::Null)
            }
            HostRequest::AllEnts => Ok(Value::Array(
                game.entities()
                    .iter()
                    .map(ent_summary)
                    .collect(),
            )),
            HostRequest::SelectEnt(id) => {
                known(game, id)?;
                game.select(Some(id));
                Ok(Value::Null)
            }
            HostRequest::RemoveEnt(id) => Ok(Value::Bool(game.remove_entity(id).is_some())),
            HostRequest::SetPosition(id, pos) => {
                known(game, id)?;
                Ok(Value::Bool(game.relocate(id, pos)))
            }
            HostRequest::SetHp(id, hp) => Ok(Value::Bool(game.set_hp(id, hp))),
            HostRequest::SetAp(id, ap) => Ok(Value::Bool(game.set_ap(id, ap))),
            HostRequest::SetCondition { ent, name, on } => {
                Ok(Value::Bool(game.set_condition(ent, &name, on)))
            }
            HostRequest::SetGear { ent, name } => Ok(Value::Bool(game.set_gear(ent, &name))),
            HostRequest::BindAi { target, source } => {
                self.effects.bindings.push((target, source));
                Ok(Value::Null)
            }
            HostRequest::DialogBox { path, args } => Ok(json!(self.ui.dialog(&path, &args))),
            HostRequest::PickFromN { min, max, options } => {
                Ok(json!(self.ui.pick_from_n(min, max, &options)))
            }
            HostRequest::ChooserFromFile(path) => Ok(json!(self.ui.chooser_from_file(&path))),
            HostRequest::DoExec(exec) => match GameEngine::new(game).run_to_completion(exec) {
                Ok(()) => Ok(Value::Bool(true)),
                Err(reason) => {
                    warn!(target: "runtime::script", %reason, "DoExec dropped an exec");
                    Ok(Value::Bool(false))
                }
            },
            HostRequest::PlayAnimations { ent, anims } => {
                known(game, ent)?;
                for anim in anims {
                    game.push_event(GameEvent::Sprite {
                        ent,
                        command: SpriteCommand::Play(anim),
                    });
                }
                let alive = game.entity(ent).is_some_and(|e| e.is_alive());
                Ok(json!(if alive { "ready" } else { "killed" }))
            }
            HostRequest::PlayMusic(name) => {
                game.push_event(GameEvent::Music(MusicCommand::Play(name)));
                Ok(Value::Null)
            }
            HostRequest::StopMusic => {
                game.push_event(GameEvent::Music(MusicCommand::Stop));
                Ok(Value::Null)
            }
            HostRequest::SetMusicParam { name, value } => {
                game.push_event(GameEvent::Music(MusicCommand::Param { name, value }));
                Ok(Value::Null)
            }
            HostRequest::PlaySound(name) => {
                game.push_event(GameEvent::Sound { name, ent: None });
                Ok(Value::Null)
            }
            HostRequest::SetWaypoint(waypoint) => {
                game.set_waypoint(waypoint);
                Ok(Value::Null)
            }
            HostRequest::RemoveWaypoint(name) => Ok(Value::Bool(game.remove_waypoint(&name))),
            HostRequest::Rand(n) => {
                if n < 1 {
                    return Err(format!("Rand needs a positive bound, got {n}"));
                }
                Ok(json!(game.rand(n)))
            }
            HostRequest::Sleep(_) => Ok(Value::Null),
            HostRequest::EndGame => {
                info!(target: "runtime::script", "scenario ended");
                game.end_game();
                Ok(Value::Null)
            }
            HostRequest::SaveGameState { store } => encode_saved(game, &store)
                .map(Value::String)
                .map_err(|e| e.to_string()),
            HostRequest::LoadGameState(encoded) => {
                let (restored, store) =
                    decode_saved(&encoded, game.registries_arc()).map_err(|e| e.to_string())?;
                self.restore(restored);
                Ok(Value::String(store))
            }
            HostRequest::FocusPos(pos) => {
                self.ui.focus(pos);
                Ok(Value::Null)
            }
            HostRequest::FocusZoom(zoom) => {
                self.ui.zoom(zoom);
                Ok(Value::Null)
            }
            HostRequest::ShowMainBar(show) => {
                self.ui.show_main_bar(show);
                Ok(Value::Null)
            }
        }
    }

    /// Swaps in a restored game: overlays go, the viewer and waypoint
    /// draw lists are rebuilt, and the turn machine re-enters its round.
    pub fn restore(&mut self, restored: Game) {
        info!(
            target: "runtime::script",
            turn = restored.turn,
            side = %restored.side,
            "game state restored"
        );
        self.ui.clear_overlays();
        *self.game = restored;
        self.game.push_event(GameEvent::ViewerRebuilt);
        self.game.push_event(GameEvent::WaypointsChanged);
        self.effects.restored = true;
    }

    fn place_entities(
        &mut self,
        pattern: &str,
        roster: Vec<String>,
        min: usize,
        max: usize,
    ) -> HostReply {
        let regex = compile_pattern(pattern).map_err(|e| e.to_string())?;
        let game = &mut *self.game;
        let mut cells = Vec::new();
        for sp in game.floor().spawns_matching(&regex) {
            cells.extend(sp.rect().cells().filter(|&c| game.entity_at(c).is_none()));
        }
        let request = PlacementRequest {
            roster,
            cells,
            min,
            max,
        };
        let mut placed = Vec::new();
        for (name, pos) in self.ui.place_entities(&request) {
            let Some(def) = game.registries().entity(&name) else {
                warn!(target: "runtime::script", entity = %name, "unknown roster entry");
                continue;
            };
            if !game.can_place(def, pos, None) {
                debug!(target: "runtime::script", entity = %name, cell = %pos, "placement refused");
                continue;
            }
            if let Some(entity) = game.make_entity(&name)
                && let Some(id) = game.place_entity(entity, pos, &regex)
            {
                placed.push(id.0);
            }
        }
        if placed.len() < min {
            warn!(target: "runtime::script", placed = placed.len(), min, "fewer entities placed than required");
        }
        Ok(json!(placed))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use haunts_core::{EntityDef, House, Registries};

    use super::*;
    use crate::api::HeadlessUi;

    fn game() -> Game {
        let mut registries = Registries::default();
        registries.add_entity(EntityDef::new("Lamp"));
        Game::new(House::empty("Empty"), Arc::new(registries), 3, Side::Intruders)
    }

    fn run(game: &mut Game, request: HostRequest) -> (HostReply, HostEffects) {
        let mut ui = HeadlessUi;
        let mut effects = HostEffects::default();
        let reply = HostContext {
            game,
            ui: &mut ui,
            effects: &mut effects,
        }
        .execute(request);
        (reply, effects)
    }

    #[test]
    fn rand_draws_from_the_game_prng() {
        let mut a = game();
        let mut b = game();
        let (ra, _) = run(&mut a, HostRequest::Rand(6));
        assert_eq!(ra, Ok(json!(b.rand(6))));
        assert!(run(&mut a, HostRequest::Rand(0)).0.is_err());
    }

    #[test]
    fn bind_ai_is_left_for_the_driver() {
        let mut g = game();
        let (reply, effects) = run(
            &mut g,
            HostRequest::BindAi {
                target: AiTarget::Denizens,
                source: "net".into(),
            },
        );
        assert_eq!(reply, Ok(Value::Null));
        assert_eq!(effects.bindings, [(AiTarget::Denizens, "net".to_string())]);
    }

    #[test]
    fn load_game_state_restores_and_flags_reentry() {
        let mut g = game();
        g.turn = 5;
        let (saved, _) = run(
            &mut g,
            HostRequest::SaveGameState {
                store: "{\"k\":1}".into(),
            },
        );
        let Ok(Value::String(saved)) = saved else {
            panic!("save failed");
        };
        g.turn = 9;
        g.drain_events();

        let (reply, effects) = run(&mut g, HostRequest::LoadGameState(saved));
        assert_eq!(reply, Ok(Value::String("{\"k\":1}".into())));
        assert!(effects.restored);
        assert_eq!(g.turn, 5);
        let events = g.drain_events();
        assert!(events.contains(&GameEvent::ViewerRebuilt));
        assert!(events.contains(&GameEvent::WaypointsChanged));
    }

    #[test]
    fn unknown_house_is_a_script_error() {
        let mut g = game();
        assert!(run(&mut g, HostRequest::LoadHouse("Nowhere".into())).0.is_err());
    }
}
