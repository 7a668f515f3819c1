//! One networked game as seen from the local peer.

use haunts_core::{ActionExec, ExecRegistry, Game, Side};
use tokio::runtime::Handle;
use tracing::{info, warn};

use super::client::NetClient;
use super::error::NetError;
use super::wire::{GameKey, TurnUpdate};
use crate::events::{Event, EventBus, NetEvent};

/// Binds a [`NetClient`] to a game key and the side this peer plays.
///
/// State strings are opaque here; the runtime produces them with the same
/// encoding scripts see from `SaveGameState`.
#[derive(Clone)]
pub struct NetSession {
    client: NetClient,
    key: GameKey,
    side: Side,
    handle: Handle,
    codec: ExecRegistry,
    events: EventBus,
    auto_update: bool,
    before: Option<String>,
}

impl NetSession {
    pub fn new(client: NetClient, key: GameKey, side: Side, handle: Handle, events: EventBus) -> Self {
        Self {
            client,
            key,
            side,
            handle,
            codec: ExecRegistry::standard(),
            events,
            auto_update: true,
            before: None,
        }
    }

    /// When off, scripts upload turns themselves through `Net.UpdateExecs`.
    pub fn with_auto_update(mut self, on: bool) -> Self {
        self.auto_update = on;
        self
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn key(&self) -> &GameKey {
        &self.key
    }

    pub fn client(&self) -> &NetClient {
        &self.client
    }

    pub fn codec(&self) -> &ExecRegistry {
        &self.codec
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn auto_update(&self) -> bool {
        self.auto_update
    }

    pub fn is_local_turn(&self, game: &Game) -> bool {
        game.side == self.side
    }

    /// Records the state the local turn starts from.
    pub fn set_before(&mut self, state: String) {
        self.before = Some(state);
    }

    pub fn has_before(&self) -> bool {
        self.before.is_some()
    }

    /// Uploads the finished local turn in the background.
    ///
    /// Without a recorded before-state the after-state stands in for it,
    /// which a replaying peer treats as an empty turn.
    pub fn finish_turn(
        &mut self,
        round: u32,
        after: String,
        execs: &[ActionExec],
    ) -> Result<(), NetError> {
        let execs = self
            .codec
            .encode_all(execs)
            .map_err(|e| NetError::Malformed(e.to_string()))?;
        let before = self.before.take().unwrap_or_else(|| after.clone());
        let update = TurnUpdate {
            before,
            after,
            execs,
        };
        let client = self.client.clone();
        let key = self.key.clone();
        let intruders = self.side == Side::Intruders;
        let events = self.events.clone();
        self.handle.spawn(async move {
            match client.update(&key, round, intruders, update).await {
                Ok(()) => events.publish(Event::Net(NetEvent::UpdateSent { round })),
                Err(e) => {
                    warn!(target: "runtime::net", round, error = %e, "turn upload failed");
                    events.publish(Event::Net(NetEvent::Failed(e.to_string())));
                }
            }
        });
        Ok(())
    }

    /// Blocking upload for callers off the async runtime.
    pub fn send_update_blocking(&self, round: u32, update: TurnUpdate) -> Result<(), NetError> {
        let intruders = self.side == Side::Intruders;
        self.handle
            .block_on(self.client.update(&self.key, round, intruders, update))?;
        self.events
            .publish(Event::Net(NetEvent::UpdateSent { round }));
        Ok(())
    }

    /// Latest completed round on the server and its update.
    pub fn latest_blocking(&self) -> Result<Option<(u32, TurnUpdate)>, NetError> {
        let record = self.handle.block_on(self.client.status(&self.key))?;
        let rounds = record.rounds() as u32;
        Ok(record.update(rounds).map(|update| (rounds, update)))
    }

    /// Blocks until `round` is on record. Off the async runtime only.
    pub fn wait_blocking(&self, round: u32) -> Result<TurnUpdate, NetError> {
        let update = self
            .handle
            .block_on(self.client.wait_for_round(&self.key, round, 0))?;
        info!(target: "runtime::net", game = %self.key, round, "caught up");
        self.events.publish(Event::Net(NetEvent::CaughtUp { round }));
        Ok(update)
    }
}

/// Compares the replayable parts of two games: entities and PRNG.
///
/// Presentation state (selection, turn machine position, who is driving)
/// legitimately differs between peers and is ignored.
pub fn states_match(local: &Game, remote: &Game) -> bool {
    let encode = |g: &Game| bincode::serialize(&(g.entities(), g.rng(), g.turn, g.side)).ok();
    match (encode(local), encode(remote)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::net::server::LocalServer;
    use crate::net::wire::NetId;

    #[tokio::test(flavor = "multi_thread")]
    async fn finished_turns_reach_the_server() {
        let server = Arc::new(LocalServer::new());
        let host = NetClient::new(server.clone(), NetId(1));
        let key = host.new_game("ann", "lvl1", true).await.unwrap();
        let bus = EventBus::new();
        let mut net_events = bus.subscribe(crate::events::Topic::Net);

        let mut session = NetSession::new(host, key.clone(), Side::Intruders, Handle::current(), bus);
        session.set_before("before".into());
        session.finish_turn(1, "after".into(), &[]).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), net_events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, Event::Net(NetEvent::UpdateSent { round: 1 })));

        let peer = NetClient::new(server, NetId(2));
        let update = peer.wait_for_round(&key, 1, 1).await.unwrap();
        assert_eq!(update.before, "before");
        assert_eq!(update.after, "after");
        assert!(session.codec().decode_all(&update.execs).unwrap().is_empty());
        assert!(!session.has_before());
    }
}
