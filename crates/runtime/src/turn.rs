//! The round state machine.
//!
//! ```text
//! Init -> Start -> AiAction <-> ScriptOnAction
//!                  AiAction -> MainPhaseOver -> End -> Start
//! ```
//!
//! Each state may run one scenario callback across as many frames as it
//! needs. A restored game takes effect once the running callback returns:
//! the machine re-enters `Start` for the restored side without flipping it
//! and without refreshing AP.

use std::collections::BTreeSet;

use haunts_core::{
    ActionExec, EntityId, Game, GameEngine, GameEvent, MaintainStatus, NetInfo, Side, TurnState,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::ai::{AiPoll, AiTarget};
use crate::events::{Event, TurnEvent};
use crate::net::states_match;
use crate::runtime::Runtime;
use crate::script::{
    Callback, HostContext, HostEffects, ScriptBridge, ScriptPoll, decode_saved, encode_saved,
};

/// Transitions allowed in one frame before yielding.
const MAX_STEPS_PER_FRAME: usize = 16;

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    /// `OnMove` decides how much of the path survives.
    FilteringMove(ActionExec),
    Running(ActionExec),
}

/// Turn machine bookkeeping that is not part of the saved game.
#[derive(Debug, Default)]
pub(crate) struct TurnFlow {
    phase: Phase,
    /// The current state's entry work is done.
    entered: bool,
    /// A callback was started for the current state.
    calling: bool,
    end_requested: bool,
    player_exec: Option<ActionExec>,
    /// Exec `OnAction` reports.
    committed: Option<ActionExec>,
    pending_restore: bool,
    resume: bool,
    /// Entities whose def names an AI and that already have it bound.
    bound: BTreeSet<EntityId>,
}

impl TurnFlow {
    pub(crate) fn accepts_player_input(&self, game: &Game) -> bool {
        game.turn_state == TurnState::AiAction
            && !game.player_inactive
            && matches!(self.phase, Phase::Idle)
            && self.player_exec.is_none()
    }

    pub(crate) fn request_end_turn(&mut self, game: &Game) {
        if game.turn_state == TurnState::AiAction && !game.player_inactive {
            self.end_requested = true;
        }
    }

    pub(crate) fn offer_player_exec(&mut self, exec: ActionExec) {
        self.player_exec = Some(exec);
    }

    /// Schedules re-entry into `Start` for the restored game.
    pub(crate) fn restart_after_restore(&mut self) {
        self.pending_restore = true;
    }
}

enum Step {
    Wait,
    Next(TurnState),
}

impl Runtime {
    pub(crate) fn step_turn(&mut self, dt: f64) {
        let mut dt = dt;
        for _ in 0..MAX_STEPS_PER_FRAME {
            if self.flow.pending_restore && !self.flow.calling {
                self.flow.pending_restore = false;
                self.flow.resume = true;
                self.flow.phase = Phase::Idle;
                self.flow.player_exec = None;
                self.flow.end_requested = false;
                self.ais.applied(&self.game);
                self.transition(TurnState::Start);
                continue;
            }
            let step = match self.game.turn_state {
                TurnState::Init => self.on_init(dt),
                TurnState::Start => self.on_start(dt),
                TurnState::AiAction => self.on_ai_action(dt),
                TurnState::ScriptOnAction => self.on_script_on_action(dt),
                TurnState::MainPhaseOver => self.on_main_phase_over(dt),
                TurnState::End => self.on_end(),
            };
            match step {
                Step::Next(state) => self.transition(state),
                Step::Wait if self.flow.pending_restore && !self.flow.calling => {}
                Step::Wait => return,
            }
            if self.game.ended {
                return;
            }
            dt = 0.0;
        }
    }

    fn transition(&mut self, to: TurnState) {
        let from = self.game.turn_state;
        self.game.turn_state = to;
        self.flow.entered = false;
        debug!(target: "runtime::turn", turn = self.game.turn, side = %self.game.side, %from, %to, "turn state");
        self.events.publish(Event::Turn(TurnEvent::StateChanged {
            turn: self.game.turn,
            side: self.game.side,
            from,
            to,
        }));
    }

    /// Drives `callback` until it returns. Without a scenario every
    /// callback finishes at once with `null`; an aborted one counts as
    /// finished too.
    fn run_callback(&mut self, dt: f64, callback: impl FnOnce() -> Callback) -> Option<Value> {
        let Some(bridge) = self.bridge.as_mut() else {
            return Some(Value::Null);
        };
        if !self.flow.calling {
            let callback = callback();
            let name = callback.name();
            if let Err(e) = bridge.start(callback) {
                self.report_script_failure(name, e.to_string());
                return Some(Value::Null);
            }
            self.flow.calling = true;
        }

        let mut effects = HostEffects::default();
        let poll = {
            let mut host = HostContext {
                game: &mut self.game,
                ui: self.ui.as_mut(),
                effects: &mut effects,
            };
            bridge.think_once(dt, &mut host)
        };
        self.apply_effects(effects);

        match poll {
            ScriptPoll::Running => None,
            ScriptPoll::Idle => {
                self.flow.calling = false;
                Some(Value::Null)
            }
            ScriptPoll::Finished { callback, result } => {
                self.flow.calling = false;
                match result {
                    Ok(value) => Some(value),
                    Err(message) => {
                        self.report_script_failure(callback, message);
                        Some(Value::Null)
                    }
                }
            }
        }
    }

    fn report_script_failure(&self, callback: &str, message: String) {
        warn!(target: "runtime::script", callback, %message, "callback treated as finished");
        self.events.publish(Event::Turn(TurnEvent::ScriptFailed {
            callback: callback.to_owned(),
            message,
        }));
    }

    fn apply_effects(&mut self, effects: HostEffects) {
        for (target, source) in effects.bindings {
            if let Err(e) = self.bind_ai(target, &source) {
                warn!(target: "runtime::ai", ?target, source, error = %e, "ai binding failed");
            }
        }
        if effects.restored {
            self.game.net = self.net_info();
            self.flow.restart_after_restore();
        }
    }

    pub(crate) fn net_info(&self) -> Option<NetInfo> {
        self.net.as_ref().map(|session| NetInfo {
            game_key: session.key().to_string(),
            side: session.side(),
        })
    }

    fn on_init(&mut self, dt: f64) -> Step {
        match self.run_callback(dt, || Callback::Init) {
            Some(_) => Step::Next(TurnState::Start),
            None => Step::Wait,
        }
    }

    fn on_start(&mut self, dt: f64) -> Step {
        if !self.flow.entered {
            self.flow.entered = true;
            let mut engine = GameEngine::new(&mut self.game);
            if std::mem::take(&mut self.flow.resume) {
                engine.resume_side_turn();
            } else {
                engine.begin_side_turn();
            }
            self.flow.end_requested = false;
            self.bind_def_ais();
            self.record_before_state();
        }

        let intruders = self.game.side == Side::Intruders;
        let round = self.game.turn;
        if self
            .run_callback(dt, || Callback::RoundStart { intruders, round })
            .is_none()
        {
            return Step::Wait;
        }
        if self.flow.pending_restore {
            return Step::Wait;
        }
        self.ais.activate_side(&self.game, self.game.side);
        self.game.player_inactive = self.ais.any_active();
        info!(
            target: "runtime::turn",
            turn = round,
            side = %self.game.side,
            player = !self.game.player_inactive,
            "round started"
        );
        Step::Next(TurnState::AiAction)
    }

    /// Binds the AI named by each living entity's def, once per entity.
    fn bind_def_ais(&mut self) {
        let wanted: Vec<(EntityId, String)> = self
            .game
            .entities()
            .iter()
            .filter(|e| e.is_alive() && !self.flow.bound.contains(&e.id))
            .filter_map(|e| e.def.ai.clone().map(|ai| (e.id, ai)))
            .collect();
        for (id, ai) in wanted {
            self.flow.bound.insert(id);
            if let Err(e) = self.bind_ai(AiTarget::Entity(id), &ai) {
                warn!(target: "runtime::ai", entity = %id, ai, error = %e, "entity ai unavailable");
            }
        }
    }

    fn record_before_state(&mut self) {
        let Some(session) = self.net.as_mut() else {
            return;
        };
        if !session.is_local_turn(&self.game) || !session.auto_update() {
            return;
        }
        match snapshot(&self.game, self.bridge.as_mut()) {
            Ok(state) => session.set_before(state),
            Err(e) => warn!(target: "runtime::net", error = %e, "before-state unavailable"),
        }
    }

    fn on_ai_action(&mut self, dt: f64) -> Step {
        match std::mem::take(&mut self.flow.phase) {
            Phase::Idle => self.next_exec(dt),
            Phase::FilteringMove(mut exec) => {
                let ent = exec.ent;
                let path = exec.path().map(<[_]>::to_vec).unwrap_or_default();
                let len = path.len();
                match self.run_callback(dt, || Callback::OnMove { ent, path }) {
                    None => {
                        self.flow.phase = Phase::FilteringMove(exec);
                        Step::Wait
                    }
                    Some(value) => {
                        if let Some(keep) = value.as_u64().map(|n| n as usize)
                            && keep < len
                        {
                            debug!(target: "runtime::turn", entity = %ent, keep, len, "move shortened");
                            exec.truncate_path(keep);
                        }
                        self.begin_exec(exec, dt)
                    }
                }
            }
            Phase::Running(exec) => self.maintain_exec(exec, dt),
        }
    }

    fn next_exec(&mut self, dt: f64) -> Step {
        if self.flow.pending_restore {
            return Step::Wait;
        }
        let exec = match self.flow.player_exec.take() {
            Some(exec) => Some(exec),
            None => match self.ais.poll() {
                AiPoll::Exec(exec) => Some(exec),
                AiPoll::Pending => None,
                AiPoll::Done => {
                    if self.game.player_inactive || self.flow.end_requested {
                        self.flow.end_requested = false;
                        return Step::Next(TurnState::MainPhaseOver);
                    }
                    None
                }
            },
        };
        match exec {
            Some(exec) if exec.path().is_some() => {
                self.flow.phase = Phase::FilteringMove(exec);
                self.on_ai_action(dt)
            }
            Some(exec) => self.begin_exec(exec, dt),
            None => Step::Wait,
        }
    }

    fn begin_exec(&mut self, exec: ActionExec, dt: f64) -> Step {
        if let Err(err) = GameEngine::new(&mut self.game).begin(exec.clone()) {
            self.events.publish(Event::Turn(TurnEvent::ExecRejected {
                exec,
                reason: err.to_string(),
            }));
            self.ais.applied(&self.game);
            return Step::Wait;
        }
        self.maintain_exec(exec, dt)
    }

    fn maintain_exec(&mut self, exec: ActionExec, dt: f64) -> Step {
        match GameEngine::new(&mut self.game).maintain(dt) {
            Some(MaintainStatus::InProgress | MaintainStatus::CheckForInterrupts) => {
                self.flow.phase = Phase::Running(exec);
                Step::Wait
            }
            Some(MaintainStatus::Complete) | None => {
                self.flow.committed = Some(exec);
                Step::Next(TurnState::ScriptOnAction)
            }
        }
    }

    fn on_script_on_action(&mut self, dt: f64) -> Step {
        let Some(exec) = self.flow.committed.clone() else {
            self.ais.applied(&self.game);
            return Step::Next(TurnState::AiAction);
        };
        let intruders = self.game.side == Side::Intruders;
        let round = self.game.turn;
        if self
            .run_callback(dt, || Callback::OnAction {
                intruders,
                round,
                exec,
            })
            .is_none()
        {
            return Step::Wait;
        }
        self.flow.committed = None;
        self.ais.applied(&self.game);
        Step::Next(TurnState::AiAction)
    }

    fn on_main_phase_over(&mut self, dt: f64) -> Step {
        let intruders = self.game.side == Side::Intruders;
        let round = self.game.turn;
        match self.run_callback(dt, || Callback::RoundEnd { intruders, round }) {
            Some(_) if self.flow.pending_restore => Step::Wait,
            Some(_) => Step::Next(TurnState::End),
            None => Step::Wait,
        }
    }

    fn on_end(&mut self) -> Step {
        self.sync_with_peer();
        let side = GameEngine::new(&mut self.game).end_side_turn();
        debug!(target: "runtime::turn", turn = self.game.turn, %side, "board handed over");
        Step::Next(TurnState::Start)
    }

    /// Uploads a finished local turn, or checks a replayed remote turn
    /// against the peer's recorded after-state.
    fn sync_with_peer(&mut self) {
        let Some(session) = self.net.as_mut() else {
            return;
        };
        let round = self.game.turn;
        if session.is_local_turn(&self.game) {
            if !session.auto_update() {
                return;
            }
            let result = snapshot(&self.game, self.bridge.as_mut())
                .map_err(|e| e.to_string())
                .and_then(|after| {
                    session
                        .finish_turn(round, after, self.game.exec_log())
                        .map_err(|e| e.to_string())
                });
            if let Err(message) = result {
                warn!(target: "runtime::net", round, %message, "turn upload skipped");
            }
            return;
        }

        let Some(after) = self.ais.checkpoint(self.game.side) else {
            return;
        };
        let remote = match decode_saved(&after, self.game.registries_arc()) {
            Ok((remote, _store)) => remote,
            Err(e) => {
                warn!(target: "runtime::net", round, error = %e, "peer after-state unreadable");
                return;
            }
        };
        if states_match(&self.game, &remote) {
            return;
        }
        warn!(target: "runtime::net", round, "replay diverged from peer, adopting its state");
        let turn_state = self.game.turn_state;
        let net = self.game.net.take();
        self.game = remote;
        self.game.turn_state = turn_state;
        self.game.net = net;
        self.game.push_event(GameEvent::ViewerRebuilt);
        self.game.push_event(GameEvent::WaypointsChanged);
    }
}

/// Saved-game string of the current state, store included.
fn snapshot(game: &Game, bridge: Option<&mut ScriptBridge>) -> crate::api::Result<String> {
    let store = match bridge {
        Some(bridge) => bridge.dump_store()?,
        None => "{}".to_owned(),
    };
    Ok(encode_saved(game, &store)?)
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::events::Topic;
    use crate::fixtures::{skirmish, spawn};
    use haunts_core::{InputEvent, MoveExec};

    use crate::runtime::PlayerInput;

    fn runtime(game: Game, scenario: Option<&str>) -> Runtime {
        let mut builder = Runtime::builder().game(game).ephemeral_saves();
        if let Some(source) = scenario {
            builder = builder.scenario_source("test", source);
        }
        builder.build().unwrap()
    }

    fn states(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<TurnState> {
        let mut seen = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(Event::Turn(TurnEvent::StateChanged { to, .. })) => seen.push(to),
                Ok(_) => {}
                Err(TryRecvError::Lagged(_)) => {}
                Err(_) => return seen,
            }
        }
    }

    #[test]
    fn without_a_scenario_the_player_holds_the_turn() {
        let mut game = skirmish(Side::Intruders);
        spawn(&mut game, "Occultist", 1, 1);
        let mut rt = runtime(game, None);
        let mut rx = rt.events().subscribe(Topic::Turn);

        for _ in 0..5 {
            rt.frame(0.016);
        }
        assert_eq!(rt.game().turn_state, TurnState::AiAction);
        assert_eq!(states(&mut rx), [TurnState::Start, TurnState::AiAction]);
        assert!(!rt.game().player_inactive);
    }

    #[test]
    fn player_move_goes_through_on_action() {
        let mut game = skirmish(Side::Intruders);
        let a = spawn(&mut game, "Occultist", 1, 1);
        let mut rt = runtime(game, None);
        rt.frame(0.016);

        let exec = ActionExec::new(
            a,
            0,
            MoveExec {
                path: vec![haunts_core::BoardPos::new(2, 1)],
            },
        );
        rt.flow.offer_player_exec(exec);
        let mut rx = rt.events().subscribe(Topic::Turn);
        for _ in 0..120 {
            rt.frame(0.05);
        }
        assert_eq!(rt.game().entity(a).unwrap().pos, haunts_core::BoardPos::new(2, 1));
        let seen = states(&mut rx);
        assert!(seen.contains(&TurnState::ScriptOnAction));
        assert_eq!(rt.game().turn_state, TurnState::AiAction);
    }

    #[test]
    fn on_move_can_shorten_a_path() {
        let mut game = skirmish(Side::Intruders);
        let a = spawn(&mut game, "Occultist", 1, 1);
        let mut rt = runtime(game, Some("fn OnMove(ent, path) { 1 }"));
        rt.frame(0.016);

        let exec = ActionExec::new(
            a,
            0,
            MoveExec {
                path: vec![
                    haunts_core::BoardPos::new(2, 1),
                    haunts_core::BoardPos::new(3, 1),
                ],
            },
        );
        rt.flow.offer_player_exec(exec);
        for _ in 0..200 {
            rt.frame(0.05);
        }
        assert_eq!(rt.game().entity(a).unwrap().pos, haunts_core::BoardPos::new(2, 1));
    }

    #[test]
    fn failing_callbacks_do_not_stall_the_round() {
        let game = skirmish(Side::Denizens);
        let mut rt = runtime(game, Some("fn RoundStart(intruders, round) { throw \"boom\"; }"));
        let mut rx = rt.events().subscribe(Topic::Turn);
        for _ in 0..20 {
            rt.frame(0.016);
        }
        assert_eq!(rt.game().turn_state, TurnState::AiAction);
        let mut failed = false;
        while let Ok(event) = rx.try_recv() {
            if let Event::Turn(TurnEvent::ScriptFailed { callback, .. }) = event {
                assert_eq!(callback, "RoundStart");
                failed = true;
            }
        }
        assert!(failed);
    }

    #[test]
    fn end_turn_hands_over_and_refreshes_the_next_side() {
        let mut game = skirmish(Side::Intruders);
        let a = spawn(&mut game, "Occultist", 1, 1);
        let d = spawn(&mut game, "Poltergeist", 1, 10);
        game.set_ap(d, 1);
        let mut rt = runtime(game, None);
        rt.frame(0.016);
        rt.push_input(PlayerInput::Event(InputEvent::EndTurn));
        for _ in 0..5 {
            rt.frame(0.016);
        }
        assert_eq!(rt.game().turn, 2);
        assert_eq!(rt.game().side, Side::Denizens);
        assert_eq!(rt.game().turn_state, TurnState::AiAction);
        assert_eq!(rt.game().entity(d).unwrap().stats.ap_cur(), 10);
        assert!(rt.game().entity(a).is_some());
    }
}
