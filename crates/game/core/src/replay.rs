//! Re-applying a recorded exec stream.
//!
//! Both peers of a networked game and a loaded save rebuild their state by
//! feeding the same execs, in order, through [`GameEngine`]. An exec that no
//! longer validates is skipped, never partially applied.

use tracing::{debug, warn};

use crate::action::{ActionExec, ExecCodecError, ExecRegistry, InvalidExec};
use crate::engine::GameEngine;
use crate::state::Game;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub applied: usize,
    pub skipped: Vec<(usize, InvalidExec)>,
}

impl ReplayReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Runs every exec to completion in order.
pub fn replay_execs<I>(game: &mut Game, execs: I) -> ReplayReport
where
    I: IntoIterator<Item = ActionExec>,
{
    let mut report = ReplayReport::default();
    let mut engine = GameEngine::new(game);
    for (i, exec) in execs.into_iter().enumerate() {
        match engine.run_to_completion(exec) {
            Ok(()) => report.applied += 1,
            Err(err) => {
                warn!(target: "core::exec", position = i, %err, "replayed exec skipped");
                report.skipped.push((i, err));
            }
        }
    }
    debug!(
        target: "core::exec",
        applied = report.applied,
        skipped = report.skipped.len(),
        "replay finished"
    );
    report
}

/// Decodes an encoded exec stream and replays it. Decoding failures abort
/// before anything is applied.
pub fn replay_encoded(
    game: &mut Game,
    codec: &ExecRegistry,
    bytes: &[u8],
) -> Result<ReplayReport, ExecCodecError> {
    let execs = codec.decode_all(bytes)?;
    Ok(replay_execs(game, execs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::AttackExec;
    use crate::entity::EntityId;
    use crate::state::tests::{spawn, test_game};

    fn skirmish() -> (Game, [EntityId; 3]) {
        let mut game = test_game();
        let a = spawn(&mut game, "Occultist", 5, 1);
        let b = spawn(&mut game, "Medium", 5, 2);
        let target = spawn(&mut game, "Poltergeist", 5, 5);
        game.toggle_door(0, 0);
        GameEngine::new(&mut game).begin_side_turn();
        (game, [a, b, target])
    }

    #[test]
    fn replay_reaches_the_same_state() {
        let (mut game, [a, b, target]) = skirmish();
        let snapshot = game.to_bytes().unwrap();
        let execs = vec![
            ActionExec::new(a, 1, AttackExec { target }),
            ActionExec::new(b, 1, AttackExec { target }),
            ActionExec::new(a, 1, AttackExec { target }),
        ];

        let live = replay_execs(&mut game, execs.clone());
        assert!(live.is_clean());

        let mut copy = Game::from_bytes(&snapshot, game.registries_arc()).unwrap();
        let codec = ExecRegistry::standard();
        let stream = codec.encode_all(&execs).unwrap();
        let replayed = replay_encoded(&mut copy, &codec, &stream).unwrap();

        assert_eq!(replayed, live);
        assert_eq!(
            copy.entity(target).unwrap().stats.hp_cur(),
            game.entity(target).unwrap().stats.hp_cur()
        );
        assert_eq!(copy.digest().unwrap(), game.digest().unwrap());
    }

    #[test]
    fn invalid_execs_are_skipped() {
        let (mut game, [a, _, target]) = skirmish();
        let execs = vec![
            ActionExec::new(a, 1, AttackExec { target }),
            ActionExec::new(a, 9, AttackExec { target }),
            ActionExec::new(target, 0, AttackExec { target: a }),
        ];
        let report = replay_execs(&mut game, execs);
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].0, 1);
        assert_eq!(game.exec_log().len(), 1);
    }

    #[test]
    fn unknown_kind_aborts_decoding() {
        let (mut game, [a, _, target]) = skirmish();
        let stream = ExecRegistry::standard()
            .encode_all(&[ActionExec::new(a, 1, AttackExec { target })])
            .unwrap();
        let err = replay_encoded(&mut game, &ExecRegistry::empty(), &stream).unwrap_err();
        assert_eq!(err, ExecCodecError::Unregistered("BasicAttack".into()));
        assert!(game.exec_log().is_empty());
    }
}
