use haunts_core::{EntityId, Game};

use super::{Ai, AiPoll};

/// Never active; the side is driven by the local player.
#[derive(Debug, Default, Clone, Copy)]
pub struct InactiveAi;

impl Ai for InactiveAi {
    fn activate(&mut self, _game: &Game, _ents: &[EntityId]) {}

    fn active(&self) -> bool {
        false
    }

    fn terminate(&mut self) {}

    fn poll(&mut self) -> AiPoll {
        AiPoll::Done
    }
}
