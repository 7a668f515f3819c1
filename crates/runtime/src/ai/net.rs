//! The remote peer, replayed.

use haunts_core::{ActionExec, EntityId, Game};
use tokio::sync::mpsc::{self, UnboundedReceiver, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Ai, AiPoll};
use crate::events::{Event, NetEvent};
use crate::net::NetSession;

enum Feed {
    Exec(ActionExec),
    Finished { after: String },
    Failed(String),
}

/// Feeds the peer's recorded execs for the current round, in order.
///
/// Activation starts a background wait for the round on the server. Once it
/// is on record the execs are decoded and handed out one per poll; the
/// after-state is kept as the turn's checkpoint.
pub struct NetAi {
    session: NetSession,
    feed: Option<UnboundedReceiver<Feed>>,
    task: Option<JoinHandle<()>>,
    checkpoint: Option<String>,
}

impl NetAi {
    pub fn new(session: NetSession) -> Self {
        Self {
            session,
            feed: None,
            task: None,
            checkpoint: None,
        }
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.feed = None;
    }
}

impl Ai for NetAi {
    fn activate(&mut self, game: &Game, _ents: &[EntityId]) {
        self.stop();
        self.checkpoint = None;
        let round = game.turn;
        let (tx, rx) = mpsc::unbounded_channel();
        let session = self.session.clone();
        let task = self.session.handle().spawn(async move {
            let key = session.key().clone();
            let update = match session.client().wait_for_round(&key, round, 0).await {
                Ok(update) => update,
                Err(e) => {
                    let _ = tx.send(Feed::Failed(e.to_string()));
                    return;
                }
            };
            let execs = match session.codec().decode_all(&update.execs) {
                Ok(execs) => execs,
                Err(e) => {
                    let _ = tx.send(Feed::Failed(e.to_string()));
                    return;
                }
            };
            debug!(target: "runtime::net", game = %key, round, execs = execs.len(), "peer turn received");
            for exec in execs {
                if tx.send(Feed::Exec(exec)).is_err() {
                    return;
                }
            }
            let _ = tx.send(Feed::Finished {
                after: update.after,
            });
        });
        self.feed = Some(rx);
        self.task = Some(task);
    }

    fn active(&self) -> bool {
        self.feed.is_some()
    }

    fn terminate(&mut self) {
        self.stop();
    }

    fn poll(&mut self) -> AiPoll {
        let Some(feed) = &mut self.feed else {
            return AiPoll::Done;
        };
        match feed.try_recv() {
            Ok(Feed::Exec(exec)) => AiPoll::Exec(exec),
            Err(TryRecvError::Empty) => AiPoll::Pending,
            Ok(Feed::Finished { after }) => {
                self.checkpoint = Some(after);
                self.stop();
                AiPoll::Done
            }
            Ok(Feed::Failed(message)) => {
                warn!(target: "runtime::net", %message, "peer turn unavailable");
                self.session
                    .events()
                    .publish(Event::Net(NetEvent::Failed(message)));
                self.stop();
                AiPoll::Done
            }
            Err(TryRecvError::Disconnected) => {
                self.stop();
                AiPoll::Done
            }
        }
    }

    fn checkpoint(&mut self) -> Option<String> {
        self.checkpoint.take()
    }
}

impl Drop for NetAi {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use haunts_core::{ExecRegistry, ReadyExec, Side};
    use tokio::runtime::Handle;

    use super::*;
    use crate::events::EventBus;
    use crate::fixtures::skirmish;
    use crate::net::{LocalServer, NetClient, NetId, TurnUpdate};

    async fn drain(ai: &mut NetAi) -> Vec<ActionExec> {
        let mut execs = Vec::new();
        for _ in 0..500 {
            match ai.poll() {
                AiPoll::Exec(exec) => execs.push(exec),
                AiPoll::Done => return execs,
                AiPoll::Pending => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }
        panic!("peer turn never arrived");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replays_the_recorded_round() {
        let server = Arc::new(LocalServer::new());
        let host = NetClient::new(server.clone(), NetId(1));
        let key = host.new_game("ann", "lvl1", true).await.unwrap();
        let guest = NetClient::new(server, NetId(2))
            .with_poll_interval(Duration::from_millis(10));
        guest.join(&key, "bo").await.unwrap();

        let exec = ActionExec::new(EntityId(4), 0, ReadyExec);
        let execs = ExecRegistry::standard().encode_all(&[exec.clone()]).unwrap();
        host.update(
            &key,
            1,
            true,
            TurnUpdate {
                before: "b1".into(),
                after: "a1".into(),
                execs,
            },
        )
        .await
        .unwrap();

        let session = NetSession::new(guest, key, Side::Denizens, Handle::current(), EventBus::new());
        let mut ai = NetAi::new(session);
        ai.activate(&skirmish(Side::Intruders), &[]);
        assert!(ai.active());
        assert_eq!(drain(&mut ai).await, vec![exec]);
        assert!(!ai.active());
        assert_eq!(ai.checkpoint().as_deref(), Some("a1"));
        assert_eq!(ai.checkpoint(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn waits_until_the_peer_uploads() {
        let server = Arc::new(LocalServer::new());
        let host = NetClient::new(server.clone(), NetId(1));
        let key = host.new_game("ann", "lvl1", true).await.unwrap();
        let guest = NetClient::new(server, NetId(2))
            .with_poll_interval(Duration::from_millis(10));
        guest.join(&key, "bo").await.unwrap();

        let session = NetSession::new(guest, key.clone(), Side::Denizens, Handle::current(), EventBus::new());
        let mut ai = NetAi::new(session);
        ai.activate(&skirmish(Side::Intruders), &[]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ai.poll(), AiPoll::Pending);

        host.update(
            &key,
            1,
            true,
            TurnUpdate {
                before: "b1".into(),
                after: "a1".into(),
                execs: ExecRegistry::standard().encode_all(&[]).unwrap(),
            },
        )
        .await
        .unwrap();
        assert!(drain(&mut ai).await.is_empty());
        assert_eq!(ai.checkpoint().as_deref(), Some("a1"));
    }
}
