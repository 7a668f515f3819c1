//! The scenario script's thread and the channels around it.
//!
//! The interpreter runs on its own thread. The game thread starts a callback
//! over a one-slot channel; while the callback runs, every host function the
//! script calls crosses a zero-capacity rendezvous channel, so the script
//! only touches the game while the game thread is inside [`ScriptBridge::think_once`].
//! A `Finished` event ends the callback and hands the token back for good.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError, SyncSender};
use std::time::{Duration, Instant};

use haunts_core::{ActionExec, BoardPos, EntityId, LosMode, Waypoint};
use rhai::{Array, CallFnOptions, Dynamic, Engine, Map, Module, Scope, AST};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::convert::{RhaiResult, arg, count, ent, pos, side, to_dyn, to_json};
use super::error::ScriptError;
use super::host::{HostContext, HostReply, HostRequest};
use crate::ai::AiTarget;
use crate::net::{NetSession, TurnUpdate};

/// Entry points a scenario script may define. Missing ones are skipped.
#[derive(Clone, Debug, PartialEq)]
pub enum Callback {
    Init,
    RoundStart { intruders: bool, round: u32 },
    /// Returns how many steps of the path to keep.
    OnMove { ent: EntityId, path: Vec<BoardPos> },
    OnAction { intruders: bool, round: u32, exec: ActionExec },
    RoundEnd { intruders: bool, round: u32 },
    DumpStore,
    RestoreStore(String),
}

impl Callback {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::RoundStart { .. } => "RoundStart",
            Self::OnMove { .. } => "OnMove",
            Self::OnAction { .. } => "OnAction",
            Self::RoundEnd { .. } => "RoundEnd",
            Self::DumpStore => "DumpStore",
            Self::RestoreStore(_) => "RestoreStore",
        }
    }
}

enum ScriptEvent {
    Host {
        request: HostRequest,
        reply: oneshot::Sender<HostReply>,
    },
    Finished {
        callback: &'static str,
        result: Result<Value, String>,
    },
}

#[derive(Debug, PartialEq)]
pub enum ScriptPoll {
    /// No callback in flight.
    Idle,
    Running,
    /// A callback ended; errors mean it was aborted.
    Finished {
        callback: &'static str,
        result: Result<Value, String>,
    },
}

/// A host reply held back until time or frames have passed.
struct Held {
    wait: Wait,
    reply: oneshot::Sender<HostReply>,
    answer: HostReply,
}

enum Wait {
    Secs(f64),
    Frames(usize),
}

impl Held {
    /// Counts one frame off the wait. True once it is over.
    fn tick(&mut self, dt: f64) -> bool {
        match &mut self.wait {
            Wait::Secs(left) => {
                *left -= dt;
                *left <= 0.0
            }
            Wait::Frames(left) => {
                *left = left.saturating_sub(1);
                *left == 0
            }
        }
    }
}

pub struct ScriptBridge {
    name: String,
    to_script: mpsc::Sender<Callback>,
    from_script: std_mpsc::Receiver<ScriptEvent>,
    running: Option<&'static str>,
    /// Callbacks given up on whose `Finished` has not arrived yet.
    abandoned: usize,
    held: Option<Held>,
    /// Longest the game thread waits on the script in one frame.
    slice: Duration,
    /// Longest a blocking store round trip may take.
    timeout: Duration,
}

impl ScriptBridge {
    /// Compiles `source` on a fresh script thread and runs its top level.
    pub fn spawn(
        name: &str,
        source: String,
        net: Option<NetSession>,
        slice: Duration,
        timeout: Duration,
    ) -> Result<Self, ScriptError> {
        let (to_script, callbacks) = mpsc::channel(1);
        let (events, from_script) = std_mpsc::sync_channel(0);
        let (ready_tx, ready_rx) = std_mpsc::channel();
        std::thread::Builder::new()
            .name(format!("script-{name}"))
            .spawn(move || script_main(source, net, callbacks, events, ready_tx))
            .map_err(|_| ScriptError::Disconnected)?;
        ready_rx.recv().map_err(|_| ScriptError::Disconnected)??;
        info!(target: "runtime::script", script = name, "script loaded");
        Ok(Self {
            name: name.to_owned(),
            to_script,
            from_script,
            running: None,
            abandoned: 0,
            held: None,
            slice,
            timeout,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_idle(&self) -> bool {
        self.running.is_none()
    }

    pub fn running(&self) -> Option<&'static str> {
        self.running
    }

    pub fn start(&mut self, callback: Callback) -> Result<(), ScriptError> {
        if let Some(running) = self.running {
            return Err(ScriptError::Busy(running.to_owned()));
        }
        let name = callback.name();
        self.to_script.try_send(callback).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ScriptError::Busy(name.to_owned()),
            mpsc::error::TrySendError::Closed(_) => ScriptError::Disconnected,
        })?;
        debug!(target: "runtime::script", callback = name, "callback started");
        self.running = Some(name);
        Ok(())
    }

    /// Serves the running callback for at most one frame slice.
    pub fn think_once(&mut self, dt: f64, host: &mut HostContext<'_>) -> ScriptPoll {
        let Some(callback) = self.running else {
            return ScriptPoll::Idle;
        };
        if let Some(held) = &mut self.held {
            if !held.tick(dt) {
                return ScriptPoll::Running;
            }
            if let Some(held) = self.held.take() {
                let _ = held.reply.send(held.answer);
            }
        }
        let deadline = Instant::now() + self.slice;
        loop {
            let wait = deadline.saturating_duration_since(Instant::now());
            let event = match self.from_script.recv_timeout(wait) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => return ScriptPoll::Running,
                Err(RecvTimeoutError::Disconnected) => {
                    self.running = None;
                    return ScriptPoll::Finished {
                        callback,
                        result: Err(ScriptError::Disconnected.to_string()),
                    };
                }
            };
            match event {
                ScriptEvent::Host {
                    request: HostRequest::Sleep(secs),
                    reply,
                } => {
                    self.held = Some(Held {
                        wait: Wait::Secs(secs),
                        reply,
                        answer: Ok(Value::Null),
                    });
                    return ScriptPoll::Running;
                }
                ScriptEvent::Host { request, reply } => {
                    let frames = request.blocking_frames();
                    let answer = host.execute(request);
                    if frames > 0 && answer.is_ok() {
                        self.held = Some(Held {
                            wait: Wait::Frames(frames),
                            reply,
                            answer,
                        });
                        return ScriptPoll::Running;
                    }
                    let _ = reply.send(answer);
                }
                ScriptEvent::Finished { .. } if self.abandoned > 0 => {
                    self.abandoned -= 1;
                }
                ScriptEvent::Finished { callback, result } => {
                    self.running = None;
                    if let Err(message) = &result {
                        warn!(target: "runtime::script", callback, %message, "callback aborted");
                    }
                    return ScriptPoll::Finished { callback, result };
                }
            }
        }
    }

    /// Script store as JSON. Only while idle.
    pub fn dump_store(&mut self) -> Result<String, ScriptError> {
        match self.run_blocking(Callback::DumpStore)? {
            Value::String(json) => Ok(json),
            other => Ok(other.to_string()),
        }
    }

    pub fn restore_store(&mut self, json: String) -> Result<(), ScriptError> {
        self.run_blocking(Callback::RestoreStore(json)).map(|_| ())
    }

    /// Runs a callback that makes no host calls to completion.
    fn run_blocking(&mut self, callback: Callback) -> Result<Value, ScriptError> {
        let name = callback.name();
        self.start(callback)?;
        let deadline = Instant::now() + self.timeout;
        let result = loop {
            let wait = deadline.saturating_duration_since(Instant::now());
            match self.from_script.recv_timeout(wait) {
                Ok(ScriptEvent::Finished { .. }) if self.abandoned > 0 => self.abandoned -= 1,
                other => break other,
            }
        };
        self.running = None;
        match result {
            Ok(ScriptEvent::Finished { result, .. }) => {
                result.map_err(|message| ScriptError::Runtime {
                    callback: name.to_owned(),
                    message,
                })
            }
            Ok(ScriptEvent::Host { reply, .. }) => {
                let _ = reply.send(Err("host calls are not served here".into()));
                Err(ScriptError::Busy(name.to_owned()))
            }
            Err(RecvTimeoutError::Timeout) => {
                // Its result arrives later and must not answer the next callback.
                self.abandoned += 1;
                warn!(target: "runtime::script", callback = name, "callback abandoned after timeout");
                Err(ScriptError::Timeout {
                    callback: name.to_owned(),
                    secs: self.timeout.as_secs(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(ScriptError::Disconnected),
        }
    }
}

// ===== script thread =====

#[derive(Clone)]
struct HostLink {
    events: SyncSender<ScriptEvent>,
}

impl HostLink {
    fn call(&self, request: HostRequest) -> RhaiResult<Value> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(ScriptEvent::Host { request, reply })
            .map_err(|_| "game is gone")?;
        rx.blocking_recv()
            .map_err(|_| "host dropped the call")?
            .map_err(Into::into)
    }

    fn call_dyn(&self, request: HostRequest) -> RhaiResult<Dynamic> {
        to_dyn(&self.call(request)?)
    }

    fn call_unit(&self, request: HostRequest) -> RhaiResult<()> {
        self.call(request).map(|_| ())
    }
}

/// Net state visible to the script thread.
struct NetLink {
    session: Option<NetSession>,
    round: Cell<u32>,
}

fn store_json(store: &Dynamic) -> Result<String, String> {
    serde_json::to_string(&store.flatten_clone()).map_err(|e| e.to_string())
}

fn restore_store(store: &Dynamic, json: &str) -> Result<(), String> {
    let value: Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let map = match value {
        Value::Null => Map::new(),
        other => to_dyn(&other)
            .map_err(|e| e.to_string())?
            .try_cast::<Map>()
            .ok_or("store must be an object map")?,
    };
    // The clone shares the script's cell.
    let mut shared = store.clone();
    let mut slot = shared
        .write_lock::<Map>()
        .ok_or("store is not an object map")?;
    *slot = map;
    Ok(())
}

fn script_main(
    source: String,
    net: Option<NetSession>,
    mut callbacks: mpsc::Receiver<Callback>,
    events: SyncSender<ScriptEvent>,
    ready: std_mpsc::Sender<Result<(), ScriptError>>,
) {
    let store = Dynamic::from_map(Map::new()).into_shared();
    let net = Rc::new(NetLink {
        session: net,
        round: Cell::new(0),
    });
    let link = HostLink {
        events: events.clone(),
    };
    let engine = build_engine(link, store.clone(), net.clone());
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
    let defined: BTreeSet<String> = ast.iter_functions().map(|f| f.name.to_string()).collect();
    if ready.send(Ok(())).is_err() {
        return;
    }

    while let Some(callback) = callbacks.blocking_recv() {
        let name = callback.name();
        let result = run_callback(&engine, &ast, &mut scope, &store, &net, &defined, callback);
        if events
            .send(ScriptEvent::Finished {
                callback: name,
                result,
            })
            .is_err()
        {
            break;
        }
    }
    debug!(target: "runtime::script", "script thread exiting");
}

fn run_callback(
    engine: &Engine,
    ast: &AST,
    scope: &mut Scope<'static>,
    store: &Dynamic,
    net: &NetLink,
    defined: &BTreeSet<String>,
    callback: Callback,
) -> Result<Value, String> {
    let name = callback.name();
    let args: Vec<Dynamic> = match callback {
        Callback::DumpStore => return store_json(store).map(Value::String),
        Callback::RestoreStore(json) => return restore_store(store, &json).map(|_| Value::Null),
        Callback::Init => Vec::new(),
        Callback::RoundStart { intruders, round } | Callback::RoundEnd { intruders, round } => {
            net.round.set(round);
            vec![Dynamic::from_bool(intruders), Dynamic::from_int(round.into())]
        }
        Callback::OnMove { ent, path } => vec![
            Dynamic::from_int(ent.0.into()),
            to_dyn(&path).map_err(|e| e.to_string())?,
        ],
        Callback::OnAction {
            intruders,
            round,
            exec,
        } => {
            net.round.set(round);
            vec![
                Dynamic::from_bool(intruders),
                Dynamic::from_int(round.into()),
                to_dyn(&exec).map_err(|e| e.to_string())?,
            ]
        }
    };
    if !defined.contains(name) {
        return Ok(Value::Null);
    }
    let mut this = store.clone();
    let options = CallFnOptions::new()
        .eval_ast(false)
        .rewind_scope(true)
        .bind_this_ptr(&mut this);
    let result = engine
        .call_fn_with_options::<Dynamic>(options, scope, ast, name, args)
        .map_err(|e| e.to_string())?;
    to_json(&result)
}

fn build_engine(link: HostLink, store: Dynamic, net: Rc<NetLink>) -> Engine {
    let mut engine = Engine::new();
    engine.on_print(|text| info!(target: "runtime::script", "{text}"));
    engine.on_debug(|text, _, at| debug!(target: "runtime::script", %at, "{text}"));

    register_board(&mut engine, &link);
    register_entities(&mut engine, &link);
    register_ui(&mut engine, &link);
    register_flow(&mut engine, &link, store);
    engine.register_static_module("Net", rhai::Shared::new(net_module(net)));
    engine
}

fn register_board(engine: &mut Engine, link: &HostLink) {
    let l = link.clone();
    engine.register_fn("LoadHouse", move |name: &str| {
        l.call_unit(HostRequest::LoadHouse(name.into()))
    });
    let l = link.clone();
    engine.register_fn("SpawnEntityAtPosition", move |name: &str, at: Dynamic| {
        l.call_dyn(HostRequest::SpawnAt {
            name: name.into(),
            pos: pos(&at)?,
        })
    });
    let l = link.clone();
    engine.register_fn(
        "SpawnEntitySomewhereInSpawnPoints",
        move |name: &str, spawns: Dynamic, hidden: bool| {
            l.call_dyn(HostRequest::SpawnSomewhere {
                name: name.into(),
                spawns: arg(&spawns, "spawn points")?,
                hidden,
            })
        },
    );
    let l = link.clone();
    engine.register_fn("GetSpawnPointsMatching", move |pattern: &str| {
        l.call_dyn(HostRequest::SpawnPointsMatching(pattern.into()))
    });
    let l = link.clone();
    engine.register_fn("IsSpawnPointInLos", move |spawn: Dynamic, team: &str| {
        l.call_dyn(HostRequest::SpawnPointInLos {
            spawn: arg(&spawn, "spawn point")?,
            side: side(team)?,
        })
    });
    let l = link.clone();
    engine.register_fn(
        "PlaceEntities",
        move |pattern: &str, roster: Dynamic, min: i64, max: i64| {
            l.call_dyn(HostRequest::PlaceEntities {
                pattern: pattern.into(),
                roster: arg(&roster, "roster")?,
                min: count(min, "min")?,
                max: count(max, "max")?,
            })
        },
    );
    let l = link.clone();
    engine.register_fn("RoomAtPos", move |at: Dynamic| {
        l.call_dyn(HostRequest::RoomAtPos(pos(&at)?))
    });
    let set_los = |l: &HostLink, team: &str, mode: &str, rooms: Vec<usize>| -> RhaiResult<()> {
        let mode: LosMode = mode
            .parse()
            .map_err(|_| format!("unknown los mode {mode:?}"))?;
        l.call_unit(HostRequest::SetLosMode {
            side: side(team)?,
            mode,
            rooms,
        })
    };
    let l = link.clone();
    engine.register_fn("SetLosMode", move |team: &str, mode: &str| {
        set_los(&l, team, mode, Vec::new())
    });
    let l = link.clone();
    engine.register_fn("SetLosMode", move |team: &str, mode: &str, rooms: Dynamic| {
        set_los(&l, team, mode, arg(&rooms, "room list")?)
    });
    let l = link.clone();
    engine.register_fn("SetWaypoint", move |name: &str, team: &str, at: Dynamic, radius: f64| {
        let at = pos(&at)?;
        l.call_unit(HostRequest::SetWaypoint(Waypoint {
            name: name.into(),
            side: side(team)?,
            x: f64::from(at.x) + 0.5,
            y: f64::from(at.y) + 0.5,
            radius,
        }))
    });
    let l = link.clone();
    engine.register_fn("RemoveWaypoint", move |name: &str| {
        l.call_dyn(HostRequest::RemoveWaypoint(name.into()))
    });
}

fn register_entities(engine: &mut Engine, link: &HostLink) {
    let l = link.clone();
    engine.register_fn("GetAllEnts", move || l.call_dyn(HostRequest::AllEnts));
    let l = link.clone();
    engine.register_fn("SelectEnt", move |id: i64| {
        l.call_unit(HostRequest::SelectEnt(ent(id)?))
    });
    let l = link.clone();
    engine.register_fn("RemoveEnt", move |id: i64| {
        l.call_dyn(HostRequest::RemoveEnt(ent(id)?))
    });
    let l = link.clone();
    engine.register_fn("SetPosition", move |id: i64, at: Dynamic| {
        l.call_dyn(HostRequest::SetPosition(ent(id)?, pos(&at)?))
    });
    let l = link.clone();
    engine.register_fn("SetHp", move |id: i64, hp: i64| {
        l.call_dyn(HostRequest::SetHp(ent(id)?, hp as i32))
    });
    let l = link.clone();
    engine.register_fn("SetAp", move |id: i64, ap: i64| {
        l.call_dyn(HostRequest::SetAp(ent(id)?, ap as i32))
    });
    let l = link.clone();
    engine.register_fn("SetCondition", move |id: i64, name: &str, on: bool| {
        l.call_dyn(HostRequest::SetCondition {
            ent: ent(id)?,
            name: name.into(),
            on,
        })
    });
    let l = link.clone();
    engine.register_fn("SetGear", move |id: i64, name: &str| {
        l.call_dyn(HostRequest::SetGear {
            ent: ent(id)?,
            name: name.into(),
        })
    });
    let l = link.clone();
    engine.register_fn("BindAi", move |target: &str, source: &str| {
        let target =
            AiTarget::parse(target).ok_or_else(|| format!("unknown ai target {target:?}"))?;
        l.call_unit(HostRequest::BindAi {
            target,
            source: source.into(),
        })
    });
    let l = link.clone();
    engine.register_fn("BindAi", move |id: i64, source: &str| {
        l.call_unit(HostRequest::BindAi {
            target: AiTarget::Entity(ent(id)?),
            source: source.into(),
        })
    });
    let l = link.clone();
    engine.register_fn("DoExec", move |exec: Dynamic| {
        l.call_dyn(HostRequest::DoExec(arg(&exec, "exec")?))
    });
    let l = link.clone();
    engine.register_fn("PlayAnimations", move |id: i64, anims: Dynamic| {
        l.call_dyn(HostRequest::PlayAnimations {
            ent: ent(id)?,
            anims: arg(&anims, "animation list")?,
        })
    });
}

fn register_ui(engine: &mut Engine, link: &HostLink) {
    let l = link.clone();
    engine.register_fn("DialogBox", move |path: &str| {
        l.call_dyn(HostRequest::DialogBox {
            path: path.into(),
            args: Value::Null,
        })
    });
    let l = link.clone();
    engine.register_fn("DialogBox", move |path: &str, args: Dynamic| {
        l.call_dyn(HostRequest::DialogBox {
            path: path.into(),
            args: to_json(&args)?,
        })
    });
    let l = link.clone();
    engine.register_fn("PickFromN", move |min: i64, max: i64, options: Array| -> RhaiResult<Dynamic> {
        let options = options
            .into_iter()
            .map(|o| o.into_string().map_err(|t| format!("option is a {t}")))
            .collect::<Result<Vec<_>, _>>()?;
        l.call_dyn(HostRequest::PickFromN {
            min: count(min, "min")?,
            max: count(max, "max")?,
            options,
        })
    });
    let l = link.clone();
    engine.register_fn("ChooserFromFile", move |path: &str| {
        l.call_dyn(HostRequest::ChooserFromFile(path.into()))
    });
    let l = link.clone();
    engine.register_fn("FocusPos", move |at: Dynamic| {
        l.call_unit(HostRequest::FocusPos(pos(&at)?))
    });
    let l = link.clone();
    engine.register_fn("FocusZoom", move |zoom: f64| {
        l.call_unit(HostRequest::FocusZoom(zoom))
    });
    let l = link.clone();
    engine.register_fn("ShowMainBar", move |show: bool| {
        l.call_unit(HostRequest::ShowMainBar(show))
    });
    let l = link.clone();
    engine.register_fn("PlayMusic", move |name: &str| {
        l.call_unit(HostRequest::PlayMusic(name.into()))
    });
    let l = link.clone();
    engine.register_fn("StopMusic", move || l.call_unit(HostRequest::StopMusic));
    let l = link.clone();
    engine.register_fn("SetMusicParam", move |name: &str, value: f64| {
        l.call_unit(HostRequest::SetMusicParam {
            name: name.into(),
            value,
        })
    });
    let l = link.clone();
    engine.register_fn("PlaySound", move |name: &str| {
        l.call_unit(HostRequest::PlaySound(name.into()))
    });
}

fn register_flow(engine: &mut Engine, link: &HostLink, store: Dynamic) {
    let l = link.clone();
    engine.register_fn("Rand", move |n: i64| -> RhaiResult<i64> {
        let n = i32::try_from(n).map_err(|_| format!("Rand bound {n} out of range"))?;
        let value = l.call(HostRequest::Rand(n))?;
        value
            .as_i64()
            .ok_or_else(|| "Rand returned a non-number".into())
    });
    let l = link.clone();
    engine.register_fn("Sleep", move |secs: f64| l.call_unit(HostRequest::Sleep(secs)));
    let l = link.clone();
    engine.register_fn("Sleep", move |secs: i64| {
        l.call_unit(HostRequest::Sleep(secs as f64))
    });
    let l = link.clone();
    engine.register_fn("EndGame", move || l.call_unit(HostRequest::EndGame));

    let l = link.clone();
    let s = store.clone();
    engine.register_fn("SaveGameState", move || -> RhaiResult<String> {
        let store = store_json(&s)?;
        match l.call(HostRequest::SaveGameState { store })? {
            Value::String(saved) => Ok(saved),
            _ => Err("SaveGameState returned a non-string".into()),
        }
    });
    let l = link.clone();
    engine.register_fn("LoadGameState", move |saved: &str| -> RhaiResult<()> {
        match l.call(HostRequest::LoadGameState(saved.into()))? {
            Value::String(json) => restore_store(&store, &json).map_err(Into::into),
            _ => Err("LoadGameState returned no store".into()),
        }
    });
}

fn net_module(net: Rc<NetLink>) -> Module {
    let mut module = Module::new();

    let n = net.clone();
    module.set_native_fn("Active", move || -> RhaiResult<bool> { Ok(n.session.is_some()) });
    let n = net.clone();
    module.set_native_fn("Side", move || -> RhaiResult<String> {
        Ok(n.session
            .as_ref()
            .map_or_else(String::new, |s| s.side().to_string()))
    });

    // Before-state recorded by UpdateState, consumed by UpdateExecs.
    let before: Rc<RefCell<Option<String>>> = Rc::default();
    let b = before.clone();
    module.set_native_fn("UpdateState", move |state: &str| -> RhaiResult<()> {
        *b.borrow_mut() = Some(state.to_owned());
        Ok(())
    });
    let n = net.clone();
    module.set_native_fn("UpdateExecs", move |state: &str, execs: Dynamic| -> RhaiResult<()> {
        let Some(session) = &n.session else {
            return Err("not a networked game".into());
        };
        let execs: Vec<ActionExec> = arg(&execs, "exec list")?;
        let execs = session
            .codec()
            .encode_all(&execs)
            .map_err(|e| e.to_string())?;
        let update = TurnUpdate {
            before: before.borrow_mut().take().unwrap_or_else(|| state.to_owned()),
            after: state.to_owned(),
            execs,
        };
        session
            .send_update_blocking(n.round.get(), update)
            .map_err(|e| e.to_string().into())
    });
    let n = net.clone();
    module.set_native_fn("Wait", move || -> RhaiResult<()> {
        let Some(session) = &n.session else {
            return Ok(());
        };
        let round = n.round.get().saturating_sub(1);
        if round == 0 {
            return Ok(());
        }
        session
            .wait_blocking(round)
            .map(|_| ())
            .map_err(|e| e.to_string().into())
    });
    let n = net;
    module.set_native_fn("LatestStateAndExecs", move || -> RhaiResult<Dynamic> {
        let Some(session) = &n.session else {
            return Ok(Dynamic::UNIT);
        };
        let Some((round, update)) = session.latest_blocking().map_err(|e| e.to_string())?
        else {
            return Ok(Dynamic::UNIT);
        };
        let execs = session
            .codec()
            .decode_all(&update.execs)
            .map_err(|e| e.to_string())?;
        let mut out = Map::new();
        out.insert("Round".into(), Dynamic::from_int(round.into()));
        out.insert("Before".into(), update.before.into());
        out.insert("After".into(), update.after.into());
        out.insert("Execs".into(), to_dyn(&execs)?);
        Ok(Dynamic::from_map(out))
    });
    module
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use haunts_core::{Game, GameEvent, House, Registries, Side, SpriteCommand};

    use super::*;
    use crate::api::HeadlessUi;
    use crate::script::host::HostEffects;

    fn bridge(source: &str) -> ScriptBridge {
        ScriptBridge::spawn(
            "test",
            source.to_owned(),
            None,
            Duration::from_millis(200),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn game() -> Game {
        Game::new(
            House::empty("Empty"),
            Arc::new(Registries::default()),
            11,
            Side::Intruders,
        )
    }

    /// Pumps frames until the callback finishes.
    fn finish(bridge: &mut ScriptBridge, game: &mut Game) -> (Result<Value, String>, HostEffects) {
        let mut ui = HeadlessUi;
        let mut effects = HostEffects::default();
        for _ in 0..500 {
            let mut host = HostContext {
                game: &mut *game,
                ui: &mut ui,
                effects: &mut effects,
            };
            if let ScriptPoll::Finished { result, .. } = bridge.think_once(0.1, &mut host) {
                return (result, effects);
            }
        }
        panic!("callback never finished");
    }

    #[test]
    fn compile_errors_surface_at_spawn() {
        let err = ScriptBridge::spawn(
            "broken",
            "fn Init( {".into(),
            None,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ScriptError::Compile(_)));
    }

    #[test]
    fn missing_callbacks_finish_immediately() {
        let mut b = bridge("let unused = 1;");
        let mut g = game();
        b.start(Callback::Init).unwrap();
        assert_eq!(finish(&mut b, &mut g).0, Ok(Value::Null));
        assert!(b.is_idle());
    }

    #[test]
    fn host_calls_run_against_the_game() {
        let mut b = bridge(
            r#"
            fn Init() {
                PlayMusic("dread");
                this.first = Rand(100);
            }
            "#,
        );
        let mut g = game();
        let mut twin = game();
        b.start(Callback::Init).unwrap();
        assert!(finish(&mut b, &mut g).0.is_ok());
        assert!(g.drain_events().contains(&GameEvent::Music(
            haunts_core::MusicCommand::Play("dread".into())
        )));
        let store: Value = serde_json::from_str(&b.dump_store().unwrap()).unwrap();
        assert_eq!(store["first"], serde_json::json!(twin.rand(100)));
    }

    #[test]
    fn a_second_callback_while_running_is_busy() {
        let mut b = bridge("fn Init() { Sleep(1.0); }");
        let mut g = game();
        b.start(Callback::Init).unwrap();
        assert!(matches!(b.start(Callback::Init), Err(ScriptError::Busy(_))));
        assert!(finish(&mut b, &mut g).0.is_ok());
    }

    #[test]
    fn on_move_returns_the_kept_step_count() {
        let mut b = bridge("fn OnMove(ent, path) { path.len() - 1 }");
        let mut g = game();
        b.start(Callback::OnMove {
            ent: EntityId(2),
            path: vec![BoardPos::new(1, 1), BoardPos::new(1, 2), BoardPos::new(1, 3)],
        })
        .unwrap();
        assert_eq!(finish(&mut b, &mut g).0, Ok(serde_json::json!(2)));
    }

    #[test]
    fn script_errors_end_the_callback() {
        let mut b = bridge("fn RoundEnd(intruders, round) { throw \"boom\"; }");
        let mut g = game();
        b.start(Callback::RoundEnd {
            intruders: true,
            round: 1,
        })
        .unwrap();
        let (result, _) = finish(&mut b, &mut g);
        assert!(result.unwrap_err().contains("boom"));
        assert!(b.is_idle());
    }

    #[test]
    fn animations_block_the_script_one_frame_each() {
        use crate::fixtures::{skirmish, spawn};

        let mut g = skirmish(Side::Intruders);
        let id = spawn(&mut g, "Occultist", 1, 1);
        g.drain_events();
        let mut b = bridge(&format!(
            r#"fn Init() {{ this.said = PlayAnimations({}, ["reload", "aim", "fire"]); }}"#,
            id.0
        ));
        b.start(Callback::Init).unwrap();

        let mut ui = HeadlessUi;
        let mut effects = HostEffects::default();
        for _ in 0..3 {
            let mut host = HostContext {
                game: &mut g,
                ui: &mut ui,
                effects: &mut effects,
            };
            assert!(matches!(b.think_once(0.1, &mut host), ScriptPoll::Running));
        }
        assert!(finish(&mut b, &mut g).0.is_ok());

        let played = g
            .drain_events()
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    GameEvent::Sprite {
                        command: SpriteCommand::Play(_),
                        ..
                    }
                )
            })
            .count();
        assert_eq!(played, 3);
        let store: Value = serde_json::from_str(&b.dump_store().unwrap()).unwrap();
        assert_eq!(store["said"], serde_json::json!("ready"));
    }

    #[test]
    fn a_timed_out_dump_does_not_answer_the_next_callback() {
        let mut b = ScriptBridge::spawn(
            "slow",
            "fn RoundStart(intruders, round) { round * 10 }".into(),
            None,
            Duration::from_millis(200),
            Duration::ZERO,
        )
        .unwrap();
        let mut g = game();
        // Zero timeout: the dump is normally given up on before the script
        // thread answers it.
        let _ = b.dump_store();
        b.start(Callback::RoundStart {
            intruders: false,
            round: 4,
        })
        .unwrap();

        let mut ui = HeadlessUi;
        let mut effects = HostEffects::default();
        let mut finished = None;
        for _ in 0..500 {
            let mut host = HostContext {
                game: &mut g,
                ui: &mut ui,
                effects: &mut effects,
            };
            if let ScriptPoll::Finished { callback, result } = b.think_once(0.1, &mut host) {
                finished = Some((callback, result));
                break;
            }
        }
        assert_eq!(finished, Some(("RoundStart", Ok(serde_json::json!(40)))));
        assert!(b.is_idle());
    }

    #[test]
    fn restored_store_is_seen_by_callbacks() {
        let mut b = bridge("fn RoundEnd(intruders, round) { this.kills }");
        let mut g = game();
        b.restore_store(r#"{"kills":3}"#.into()).unwrap();
        b.start(Callback::RoundEnd {
            intruders: true,
            round: 2,
        })
        .unwrap();
        assert_eq!(finish(&mut b, &mut g).0, Ok(serde_json::json!(3)));
    }

    #[test]
    fn store_round_trips_through_json() {
        let mut b = bridge("");
        b.restore_store(r#"{"seen":[1,2]}"#.into()).unwrap();
        let store: Value = serde_json::from_str(&b.dump_store().unwrap()).unwrap();
        assert_eq!(store["seen"], serde_json::json!([1, 2]));
    }
}
