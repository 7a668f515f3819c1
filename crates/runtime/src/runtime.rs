//! High-level runtime orchestrator.
//!
//! The runtime owns the game, the scenario script, the AI bindings and the
//! host collaborators, and advances all of them one frame at a time. Hosts
//! build it with [`RuntimeBuilder`], push player input, call
//! [`Runtime::frame`] at their frame rate and subscribe to the event bus.

use std::collections::VecDeque;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use haunts_content::{ContentFactory, ScriptLoader};
use haunts_core::{
    EntityId, Game, GameEngine, GameEvent, House, InputEvent, NetInfo, Registries, Side,
};
use tracing::{debug, info, warn};

use crate::ai::{AiSet, AiTarget, NetAi};
use crate::api::{Audio, HeadlessAudio, HeadlessUi, Result, RuntimeError, Ui};
use crate::events::{Event, EventBus, TurnEvent};
use crate::net::NetSession;
use crate::repository::{FileSaveRepository, InMemorySaveRepository, SaveRepository};
use crate::script::{ScriptBridge, decode_saved, encode_saved};
use crate::turn::TurnFlow;

/// Slot the "save" and "load" key bindings use.
pub const QUICK_SLOT: &str = "quick";

/// Runtime configuration shared across the orchestrator and its tasks.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Root of houses, rooms, entities, scenarios and AI scripts.
    pub data_dir: PathBuf,
    pub frame_rate: u32,
    /// Interval between server polls while waiting on the peer.
    pub net_poll: Duration,
    pub event_buffer_size: usize,
    /// Where quick saves go. `None` picks the platform data directory.
    pub save_dir: Option<PathBuf>,
    /// Longest the frame waits on the scenario script.
    pub script_slice: Duration,
    /// Longest a blocking store round trip with the script may take.
    pub script_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            frame_rate: 60,
            net_poll: Duration::from_secs(5),
            event_buffer_size: 256,
            save_dir: None,
            script_slice: Duration::from_millis(4),
            script_timeout: Duration::from_secs(10),
        }
    }
}

impl RuntimeConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `HAUNTS_DATA_DIR` - Content root (default: `data`)
    /// - `HAUNTS_FRAME_RATE` - Frames per second (default: 60)
    /// - `HAUNTS_NET_POLL_SECS` - Seconds between server polls (default: 5)
    /// - `HAUNTS_EVENT_BUFFER` - Event bus capacity per topic (default: 256)
    /// - `HAUNTS_SAVE_DIR` - Quick save directory (default: platform-specific)
    /// - `HAUNTS_SCRIPT_SLICE_MS` - Script time per frame (default: 4)
    /// - `HAUNTS_SCRIPT_TIMEOUT_SECS` - Store round trip limit (default: 10)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = env::var("HAUNTS_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(rate) = read_env::<u32>("HAUNTS_FRAME_RATE") {
            config.frame_rate = rate.clamp(1, 1000);
        }
        if let Some(secs) = read_env::<u64>("HAUNTS_NET_POLL_SECS") {
            config.net_poll = Duration::from_secs(secs.max(1));
        }
        if let Some(capacity) = read_env::<usize>("HAUNTS_EVENT_BUFFER") {
            config.event_buffer_size = capacity.max(1);
        }
        config.save_dir = env::var("HAUNTS_SAVE_DIR").ok().map(PathBuf::from);
        if let Some(ms) = read_env::<u64>("HAUNTS_SCRIPT_SLICE_MS") {
            config.script_slice = Duration::from_millis(ms);
        }
        if let Some(secs) = read_env::<u64>("HAUNTS_SCRIPT_TIMEOUT_SECS") {
            config.script_timeout = Duration::from_secs(secs.max(1));
        }

        config
    }

    /// Seconds per frame.
    pub fn frame_dt(&self) -> f64 {
        1.0 / f64::from(self.frame_rate.max(1))
    }

    pub fn resolved_save_dir(&self) -> PathBuf {
        self.save_dir.clone().unwrap_or_else(|| {
            ProjectDirs::from("", "", "haunts")
                .map(|dirs| dirs.data_dir().join("saves"))
                .unwrap_or_else(|| PathBuf::from("saves"))
        })
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}

/// Input from the local player, already resolved to board terms.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerInput {
    Select(EntityId),
    /// Prepare action `index` of `ent`.
    Prep { ent: EntityId, index: usize },
    Event(InputEvent),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Running,
    /// The scenario ended the game.
    Ended,
    /// The player asked to quit.
    Quit,
}

/// Main runtime that drives one game.
pub struct Runtime {
    pub(crate) config: RuntimeConfig,
    pub(crate) game: Game,
    pub(crate) bridge: Option<ScriptBridge>,
    pub(crate) ais: AiSet,
    pub(crate) ui: Box<dyn Ui>,
    pub(crate) audio: Box<dyn Audio>,
    pub(crate) events: EventBus,
    pub(crate) net: Option<NetSession>,
    pub(crate) flow: TurnFlow,
    repository: Box<dyn SaveRepository>,
    scripts: ScriptLoader,
    inputs: VecDeque<PlayerInput>,
    quit: bool,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn net(&self) -> Option<&NetSession> {
        self.net.as_ref()
    }

    pub fn push_input(&mut self, input: PlayerInput) {
        self.inputs.push_back(input);
    }

    /// Advances everything by `dt` seconds.
    pub fn frame(&mut self, dt: f64) -> FrameStatus {
        self.process_inputs();
        if self.quit {
            return FrameStatus::Quit;
        }
        if !self.game.ended {
            self.step_turn(dt);
        }
        for side in [Side::Intruders, Side::Denizens] {
            self.game.remap(side);
        }
        self.game.advance_frame();
        self.flush_events();
        if self.game.ended {
            FrameStatus::Ended
        } else {
            FrameStatus::Running
        }
    }

    /// Replaces a binding. Sources are `""`/`"inactive"`, `"net"` or an AI
    /// script name under `data/ais`.
    pub fn bind_ai(&mut self, target: AiTarget, source: &str) -> Result<()> {
        let ai: Box<dyn crate::ai::Ai> = match source {
            "" | "inactive" => Box::new(crate::ai::InactiveAi),
            "net" => {
                let session = self.net.clone().ok_or(RuntimeError::Missing("a net session"))?;
                Box::new(NetAi::new(session))
            }
            name => {
                let code = self.scripts.ai(name).map_err(RuntimeError::content)?;
                Box::new(crate::ai::ScriptedAi::spawn(name, code)?)
            }
        };
        self.ais.bind(target, ai);
        Ok(())
    }

    /// Saves game and script store into `slot`. Only between callbacks and
    /// execs.
    pub fn save_to(&mut self, slot: &str) -> Result<()> {
        if !self.is_quiescent() {
            return Err(RuntimeError::Script(crate::script::ScriptError::Busy(
                "save".into(),
            )));
        }
        let store = match &mut self.bridge {
            Some(bridge) => bridge.dump_store()?,
            None => "{}".to_owned(),
        };
        let saved = encode_saved(&self.game, &store)?;
        self.repository.save(slot, &saved)?;
        info!(target: "runtime::repository", slot, turn = self.game.turn, "game saved");
        self.events.publish(Event::Turn(TurnEvent::Saved { slot: slot.into() }));
        Ok(())
    }

    /// Restores `slot` over the running game; the turn machine re-enters the
    /// restored side's turn without flipping.
    pub fn load_from(&mut self, slot: &str) -> Result<()> {
        if !self.is_quiescent() {
            return Err(RuntimeError::Script(crate::script::ScriptError::Busy(
                "load".into(),
            )));
        }
        let saved = self
            .repository
            .load(slot)?
            .ok_or_else(|| RuntimeError::EmptySlot(slot.into()))?;
        let (game, store) = decode_saved(&saved, self.game.registries_arc())?;
        if let Some(bridge) = &mut self.bridge {
            bridge.restore_store(store)?;
        }
        self.ui.clear_overlays();
        self.game = game;
        self.game.net = self.net_info();
        self.game.push_event(GameEvent::ViewerRebuilt);
        self.game.push_event(GameEvent::WaypointsChanged);
        self.flow.restart_after_restore();
        info!(target: "runtime::repository", slot, turn = self.game.turn, "game loaded");
        self.events.publish(Event::Turn(TurnEvent::Loaded { slot: slot.into() }));
        Ok(())
    }

    /// Ends the game and shuts every AI down.
    pub fn shutdown(mut self) {
        self.ais.terminate_all();
        if let Some(net) = &self.net {
            info!(target: "runtime::net", game = %net.key(), "leaving networked game");
        }
    }

    /// No callback, exec or script-held token in flight.
    fn is_quiescent(&self) -> bool {
        self.bridge.as_ref().is_none_or(ScriptBridge::is_idle)
            && self.game.current_exec().is_none()
    }

    fn process_inputs(&mut self) {
        while let Some(input) = self.inputs.pop_front() {
            match input {
                PlayerInput::Event(InputEvent::Key(name)) => self.named_key(&name),
                PlayerInput::Event(InputEvent::EndTurn) => self.flow.request_end_turn(&self.game),
                PlayerInput::Select(id) => {
                    if self.game.entity(id).is_some_and(|e| e.side() == self.game.side) {
                        self.game.select(Some(id));
                    }
                }
                PlayerInput::Prep { ent, index } => {
                    if !self.flow.accepts_player_input(&self.game) {
                        debug!(target: "runtime::turn", entity = %ent, "prep ignored");
                        continue;
                    }
                    if let Err(e) = GameEngine::new(&mut self.game).prep_action(ent, index) {
                        debug!(target: "runtime::turn", entity = %ent, index, error = %e, "prep refused");
                    }
                }
                PlayerInput::Event(event) => {
                    if !self.flow.accepts_player_input(&self.game) {
                        continue;
                    }
                    let outcome = GameEngine::new(&mut self.game).handle_input(&event);
                    if let Some(exec) = outcome.exec {
                        self.flow.offer_player_exec(exec);
                    }
                }
            }
        }
    }

    fn named_key(&mut self, name: &str) {
        let result = match name {
            "save" => self.save_to(QUICK_SLOT),
            "load" => self.load_from(QUICK_SLOT),
            "quit" => {
                self.quit = true;
                Ok(())
            }
            other => {
                debug!(target: "runtime::ui", key = other, "unhandled key");
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(target: "runtime::repository", key = name, error = %e, "key action failed");
        }
    }

    /// Republishes the core outbox and routes audio to the host.
    fn flush_events(&mut self) {
        for event in self.game.drain_events() {
            match &event {
                GameEvent::Sound { name, ent } => self.audio.play_sound(name, *ent),
                GameEvent::Music(command) => self.audio.music(command),
                GameEvent::GameEnded => {
                    info!(target: "runtime::turn", turn = self.game.turn, "game ended");
                }
                _ => {}
            }
            self.events.publish(Event::Game(event));
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.ais.terminate_all();
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    game: Option<Game>,
    registries: Option<Arc<Registries>>,
    seed: u64,
    first_side: Side,
    scenario: Option<(String, Option<String>)>,
    ui: Option<Box<dyn Ui>>,
    audio: Option<Box<dyn Audio>>,
    repository: Option<Box<dyn SaveRepository>>,
    events: Option<EventBus>,
    net: Option<NetSession>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            game: None,
            registries: None,
            seed: 0,
            first_side: Side::Intruders,
            scenario: None,
            ui: None,
            audio: None,
            repository: None,
            events: None,
            net: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from an existing game instead of an empty house.
    pub fn game(mut self, game: Game) -> Self {
        self.game = Some(game);
        self
    }

    /// Registries to build the game with. Loaded from the data directory
    /// when neither these nor a game are given.
    pub fn registries(mut self, registries: Arc<Registries>) -> Self {
        self.registries = Some(registries);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn first_side(mut self, side: Side) -> Self {
        self.first_side = side;
        self
    }

    /// Scenario script loaded from `data/scenarios/<name>.rhai`.
    pub fn scenario(mut self, name: impl Into<String>) -> Self {
        self.scenario = Some((name.into(), None));
        self
    }

    /// Scenario script given inline.
    pub fn scenario_source(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.scenario = Some((name.into(), Some(source.into())));
        self
    }

    pub fn ui(mut self, ui: impl Ui + 'static) -> Self {
        self.ui = Some(Box::new(ui));
        self
    }

    pub fn audio(mut self, audio: impl Audio + 'static) -> Self {
        self.audio = Some(Box::new(audio));
        self
    }

    pub fn repository(mut self, repository: impl SaveRepository + 'static) -> Self {
        self.repository = Some(Box::new(repository));
        self
    }

    /// Keeps saves in memory only.
    pub fn ephemeral_saves(self) -> Self {
        self.repository(InMemorySaveRepository::new())
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Plays a networked game. The opposing side is bound to the peer.
    pub fn net(mut self, session: NetSession) -> Self {
        self.net = Some(session);
        self
    }

    /// Build the runtime
    pub fn build(self) -> Result<Runtime> {
        let factory = ContentFactory::new(&self.config.data_dir);
        let mut game = match self.game {
            Some(game) => game,
            None => {
                let registries = match self.registries {
                    Some(registries) => registries,
                    None => factory.load_registries().map_err(RuntimeError::content)?,
                };
                let config = factory.load_config().map_err(RuntimeError::content)?;
                Game::new(House::empty("Empty"), registries, self.seed, self.first_side)
                    .with_config(config)
            }
        };

        // A session publishes on its own bus; the runtime shares it.
        let net = self.net;
        let events = self
            .events
            .or_else(|| net.as_ref().map(|session| session.events().clone()))
            .unwrap_or_else(|| EventBus::with_capacity(self.config.event_buffer_size));
        if let Some(session) = &net {
            game.net = Some(NetInfo {
                game_key: session.key().to_string(),
                side: session.side(),
            });
        }

        let bridge = match self.scenario {
            Some((name, source)) => {
                let source = match source {
                    Some(source) => source,
                    None => factory.scripts().scenario(&name).map_err(RuntimeError::content)?,
                };
                Some(ScriptBridge::spawn(
                    &name,
                    source,
                    net.clone(),
                    self.config.script_slice,
                    self.config.script_timeout,
                )?)
            }
            None => None,
        };

        let repository = match self.repository {
            Some(repository) => repository,
            None => Box::new(FileSaveRepository::new(self.config.resolved_save_dir())?),
        };

        let mut runtime = Runtime {
            scripts: factory.scripts(),
            config: self.config,
            game,
            bridge,
            ais: AiSet::new(),
            ui: self.ui.unwrap_or_else(|| Box::new(HeadlessUi)),
            audio: self.audio.unwrap_or_else(|| Box::new(HeadlessAudio)),
            events,
            net,
            flow: TurnFlow::default(),
            repository,
            inputs: VecDeque::new(),
            quit: false,
        };

        if let Some(side) = runtime.net.as_ref().and_then(|n| n.side().opponent()) {
            let target = if side == Side::Denizens {
                AiTarget::Denizens
            } else {
                AiTarget::Intruders
            };
            runtime.bind_ai(target, "net")?;
        }
        info!(
            target: "runtime::turn",
            scenario = runtime.bridge.as_ref().map(ScriptBridge::name),
            networked = runtime.net.is_some(),
            "runtime built"
        );
        Ok(runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_dt_follows_the_rate() {
        let config = RuntimeConfig {
            frame_rate: 50,
            ..RuntimeConfig::default()
        };
        assert!((config.frame_dt() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn frames_keep_the_side_textures_current() {
        use haunts_core::BoardRect;
        use tokio::sync::broadcast::error::TryRecvError;

        use crate::events::Topic;
        use crate::fixtures::{skirmish, spawn};

        let mut game = skirmish(Side::Intruders);
        spawn(&mut game, "Occultist", 1, 1);
        let mut runtime = Runtime::builder()
            .game(game)
            .ephemeral_saves()
            .build()
            .unwrap();
        let mut rx = runtime.events().subscribe(Topic::Render);
        for _ in 0..5 {
            runtime.frame(1.0 / 60.0);
        }

        let game = runtime.game();
        assert!(game.team_los(Side::Intruders, &BoardRect::new(1, 1, 1, 1)));
        assert!(game.team_los(Side::Intruders, &BoardRect::new(3, 3, 1, 1)));
        assert!(!game.team_los(Side::Denizens, &BoardRect::new(3, 3, 1, 1)));

        let mut snapshots = 0;
        loop {
            match rx.try_recv() {
                Ok(Event::Game(GameEvent::LosTexture { side: Side::Intruders, .. })) => {
                    snapshots += 1;
                }
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(_) => break,
            }
        }
        assert_eq!(snapshots, 5);
    }

    #[test]
    fn explicit_save_dir_wins() {
        let config = RuntimeConfig {
            save_dir: Some(PathBuf::from("/tmp/haunts-saves")),
            ..RuntimeConfig::default()
        };
        assert_eq!(config.resolved_save_dir(), PathBuf::from("/tmp/haunts-saves"));
    }
}
