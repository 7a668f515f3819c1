//! AI driven by a rhai script on its own thread.
//!
//! The script keeps a private copy of the game. `Think(ents)` runs once per
//! activation; each action helper it calls builds an exec against that copy,
//! validates it, hands it to the turn driver and blocks until the driver
//! reports the exec applied together with the game it produced.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use haunts_core::{
    Action, ActionExec, AoeExec, AttackExec, BoardPos, EntityId, Game, GameConfig,
    GameEngine, House, InteractExec, MoveExec, Registries, Side, SummonExec,
};
use rhai::{Array, CallFnOptions, Dynamic, Engine, Scope};
use tracing::{debug, info, warn};

use super::{Ai, AiPoll};
use crate::script::{RhaiResult, ScriptError, ent, ent_summary, pos, side, to_dyn};

/// Operations a single `Think` may run before it is cut off.
const MAX_OPERATIONS: u64 = 5_000_000;

enum Command {
    Activate { game: Box<Game>, ents: Vec<EntityId> },
    Applied(Box<Game>),
    Terminate,
}

enum Message {
    Exec(ActionExec),
    Done,
}

pub struct ScriptedAi {
    name: String,
    commands: Sender<Command>,
    messages: Receiver<Message>,
    active: bool,
    /// An exec is out and the script is blocked on it.
    awaiting: bool,
}

impl ScriptedAi {
    /// Compiles `source` on a new thread. Errors in the top level are
    /// reported here rather than on the first turn.
    pub fn spawn(name: &str, source: String) -> Result<Self, ScriptError> {
        let (commands, command_rx) = mpsc::channel();
        let (message_tx, messages) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_name = name.to_owned();
        std::thread::Builder::new()
            .name(format!("ai-{name}"))
            .spawn(move || ai_main(thread_name, source, command_rx, message_tx, ready_tx))
            .map_err(|_| ScriptError::Disconnected)?;
        ready_rx.recv().map_err(|_| ScriptError::Disconnected)??;
        info!(target: "runtime::ai", ai = name, "ai script loaded");
        Ok(Self {
            name: name.to_owned(),
            commands,
            messages,
            active: false,
            awaiting: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Ai for ScriptedAi {
    fn activate(&mut self, game: &Game, ents: &[EntityId]) {
        if ents.is_empty() {
            self.active = false;
            return;
        }
        let command = Command::Activate {
            game: Box::new(game.clone()),
            ents: ents.to_vec(),
        };
        self.active = self.commands.send(command).is_ok();
        self.awaiting = false;
        if !self.active {
            warn!(target: "runtime::ai", ai = %self.name, "ai thread is gone");
        }
    }

    fn active(&self) -> bool {
        self.active
    }

    fn terminate(&mut self) {
        let _ = self.commands.send(Command::Terminate);
        self.active = false;
        self.awaiting = false;
    }

    fn poll(&mut self) -> AiPoll {
        if !self.active {
            return AiPoll::Done;
        }
        if self.awaiting {
            return AiPoll::Pending;
        }
        match self.messages.try_recv() {
            Ok(Message::Exec(exec)) => {
                self.awaiting = true;
                AiPoll::Exec(exec)
            }
            Ok(Message::Done) | Err(TryRecvError::Disconnected) => {
                self.active = false;
                AiPoll::Done
            }
            Err(TryRecvError::Empty) => AiPoll::Pending,
        }
    }

    fn applied(&mut self, game: &Game) {
        if !self.awaiting {
            return;
        }
        self.awaiting = false;
        if self.commands.send(Command::Applied(Box::new(game.clone()))).is_err() {
            self.active = false;
        }
    }
}

// ===== ai thread =====

struct AiState {
    game: RefCell<Game>,
    commands: Receiver<Command>,
    messages: Sender<Message>,
    terminated: Cell<bool>,
}

impl AiState {
    /// Hands `exec` over and waits for the game it produced. `false` when
    /// the exec does not validate against the current copy.
    fn submit(&self, exec: ActionExec) -> RhaiResult<bool> {
        {
            let mut game = self.game.borrow_mut();
            if let Err(e) = GameEngine::new(&mut game).validate(&exec) {
                debug!(target: "runtime::ai", kind = exec.kind(), error = %e, "exec refused");
                return Ok(false);
            }
        }
        self.messages
            .send(Message::Exec(exec))
            .map_err(|_| "turn driver is gone")?;
        loop {
            match self.commands.recv() {
                Ok(Command::Applied(game)) => {
                    *self.game.borrow_mut() = *game;
                    return Ok(true);
                }
                Ok(Command::Activate { .. }) => {}
                Ok(Command::Terminate) | Err(_) => {
                    self.terminated.set(true);
                    return Err("ai terminated".into());
                }
            }
        }
    }

    /// Index of the entity's first action of `kind`.
    fn action(&self, id: EntityId, kind: &str) -> Option<usize> {
        let game = self.game.borrow();
        game.entity(id)?.actions.iter().position(|a| a.kind() == kind)
    }

    /// Shortest path to `to`, or to the cheapest cell next to it when `to`
    /// itself is taken, trimmed to what the entity can pay for.
    fn path_towards(&self, id: EntityId, to: BoardPos) -> Option<Vec<BoardPos>> {
        let game = self.game.borrow();
        let ent = game.entity(id)?;
        let path = game.find_path(id, to).or_else(|| {
            (-1..=1)
                .flat_map(|dx| (-1..=1).map(move |dy| BoardPos::new(to.x + dx, to.y + dy)))
                .filter(|&p| p != to && p != ent.pos)
                .filter_map(|p| game.find_path(id, p))
                .min_by_key(|(_, cost)| *cost)
        });
        let (mut path, _) = path?;
        let steps = usize::try_from(ent.stats.ap_cur() / GameConfig::STEP_COST).unwrap_or(0);
        path.truncate(steps);
        (!path.is_empty()).then_some(path)
    }
}

fn ai_main(
    name: String,
    source: String,
    commands: Receiver<Command>,
    messages: Sender<Message>,
    ready: Sender<Result<(), ScriptError>>,
) {
    let blank = Game::new(
        House::empty(""),
        Arc::new(Registries::default()),
        0,
        Side::Denizens,
    );
    let state = Rc::new(AiState {
        game: RefCell::new(blank),
        commands,
        messages,
        terminated: Cell::new(false),
    });
    let engine = build_engine(state.clone());
    let mut scope = Scope::new();
    let ast = match engine.compile(&source) {
        Ok(ast) => ast,
        Err(e) => {
            let _ = ready.send(Err(ScriptError::Compile(e.to_string())));
            return;
        }
    };
    if let Err(e) = engine.run_ast_with_scope(&mut scope, &ast) {
        let _ = ready.send(Err(ScriptError::Compile(e.to_string())));
        return;
    }
    let thinks = ast.iter_functions().any(|f| f.name == "Think");
    if ready.send(Ok(())).is_err() {
        return;
    }

    while !state.terminated.get() {
        let ents = match state.commands.recv() {
            Ok(Command::Activate { game, ents }) => {
                *state.game.borrow_mut() = *game;
                ents
            }
            Ok(Command::Applied(_)) => continue,
            Ok(Command::Terminate) | Err(_) => break,
        };
        if thinks {
            let ents: Array = ents.iter().map(|id| Dynamic::from_int(id.0.into())).collect();
            let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
            let result = engine.call_fn_with_options::<Dynamic>(
                options,
                &mut scope,
                &ast,
                "Think",
                (ents,),
            );
            if let Err(e) = result {
                if state.terminated.get() {
                    break;
                }
                warn!(target: "runtime::ai", ai = %name, error = %e, "think aborted");
            }
        }
        if state.messages.send(Message::Done).is_err() {
            break;
        }
    }
    debug!(target: "runtime::ai", ai = %name, "ai thread exiting");
}

fn build_engine(state: Rc<AiState>) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(MAX_OPERATIONS);
    engine.on_print(|text| info!(target: "runtime::ai", "{text}"));
    engine.on_debug(|text, _, at| debug!(target: "runtime::ai", %at, "{text}"));
    register_queries(&mut engine, &state);
    register_actions(&mut engine, &state);
    engine
}

fn register_queries(engine: &mut Engine, state: &Rc<AiState>) {
    let s = state.clone();
    engine.register_fn("Describe", move |id: i64| -> RhaiResult<Dynamic> {
        let game = s.game.borrow();
        match game.entity(ent(id)?) {
            Some(e) => to_dyn(&ent_summary(e)),
            None => Ok(Dynamic::UNIT),
        }
    });
    let s = state.clone();
    engine.register_fn("Ents", move |team: &str| -> RhaiResult<Array> {
        let side = side(team)?;
        let game = s.game.borrow();
        Ok(game
            .side_entities(side)
            .filter(|e| e.is_alive())
            .map(|e| Dynamic::from_int(e.id.0.into()))
            .collect())
    });
    let s = state.clone();
    engine.register_fn("Pos", move |id: i64| -> RhaiResult<Dynamic> {
        let game = s.game.borrow();
        match game.entity(ent(id)?) {
            Some(e) => to_dyn(&e.pos),
            None => Ok(Dynamic::UNIT),
        }
    });
    let s = state.clone();
    engine.register_fn("Ap", move |id: i64| -> RhaiResult<i64> {
        let game = s.game.borrow();
        Ok(game
            .entity(ent(id)?)
            .map_or(0, |e| e.stats.ap_cur().into()))
    });
    let s = state.clone();
    engine.register_fn("Distance", move |a: i64, b: i64| -> RhaiResult<i64> {
        let game = s.game.borrow();
        match (game.entity(ent(a)?), game.entity(ent(b)?)) {
            (Some(a), Some(b)) => Ok(a.pos.chebyshev(b.pos).into()),
            _ => Ok(-1),
        }
    });
    let s = state.clone();
    engine.register_fn("InLos", move |id: i64, target: i64| -> RhaiResult<bool> {
        let game = s.game.borrow();
        let (id, target) = (ent(id)?, ent(target)?);
        Ok(game
            .entity(target)
            .is_some_and(|t| game.has_los(id, &t.footprint())))
    });
    let s = state.clone();
    engine.register_fn("Nearest", move |id: i64, team: &str| -> RhaiResult<Dynamic> {
        let side = side(team)?;
        let game = s.game.borrow();
        let Some(me) = game.entity(ent(id)?) else {
            return Ok(Dynamic::UNIT);
        };
        let nearest = game
            .side_entities(side)
            .filter(|e| e.is_alive() && e.id != me.id)
            .min_by_key(|e| (me.pos.chebyshev(e.pos), e.id));
        Ok(nearest.map_or(Dynamic::UNIT, |e| Dynamic::from_int(e.id.0.into())))
    });
}

fn register_actions(engine: &mut Engine, state: &Rc<AiState>) {
    let s = state.clone();
    engine.register_fn("Move", move |id: i64, to: Dynamic| -> RhaiResult<bool> {
        let (id, to) = (ent(id)?, pos(&to)?);
        let (Some(index), Some(path)) = (s.action(id, "Move"), s.path_towards(id, to)) else {
            return Ok(false);
        };
        s.submit(ActionExec::new(id, index, MoveExec { path }))
    });
    let s = state.clone();
    engine.register_fn("Attack", move |id: i64, target: i64| -> RhaiResult<bool> {
        let (id, target) = (ent(id)?, ent(target)?);
        let Some(index) = s.action(id, "BasicAttack") else {
            return Ok(false);
        };
        s.submit(ActionExec::new(id, index, AttackExec { target }))
    });
    let s = state.clone();
    engine.register_fn("AoeAttack", move |id: i64, at: Dynamic| -> RhaiResult<bool> {
        let (id, at) = (ent(id)?, pos(&at)?);
        let exec = {
            let game = s.game.borrow();
            let found = game.entity(id).and_then(|e| {
                e.actions.iter().enumerate().find_map(|(i, a)| match a {
                    Action::AoeAttack(aoe) => Some((i, aoe.targets_at(&game, at))),
                    _ => None,
                })
            });
            found.map(|(index, targets)| {
                ActionExec::new(id, index, AoeExec { pos: at, targets })
            })
        };
        match exec {
            Some(exec) => s.submit(exec),
            None => Ok(false),
        }
    });
    let s = state.clone();
    engine.register_fn("Summon", move |id: i64, at: Dynamic| -> RhaiResult<bool> {
        let (id, at) = (ent(id)?, pos(&at)?);
        let Some(index) = s.action(id, "Summon") else {
            return Ok(false);
        };
        s.submit(ActionExec::new(id, index, SummonExec { pos: at }))
    });
    let s = state.clone();
    engine.register_fn("Interact", move |id: i64| -> RhaiResult<bool> {
        let id = ent(id)?;
        let exec = {
            let game = s.game.borrow();
            let found = game.entity(id).and_then(|e| {
                e.actions.iter().enumerate().find_map(|(i, a)| match a {
                    Action::Interact(act) => {
                        act.candidates(e, &game).first().map(|t| (i, t.clone()))
                    }
                    _ => None,
                })
            });
            found.map(|(index, target)| ActionExec::new(id, index, InteractExec { target }))
        };
        match exec {
            Some(exec) => s.submit(exec),
            None => Ok(false),
        }
    });
}
