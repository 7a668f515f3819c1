//! Retrying client over a [`NetTransport`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::{debug, warn};

use super::error::NetError;
use super::transport::NetTransport;
use super::wire::{
    GameKey, GameRecord, JoinGameRequest, KillRequest, ListGamesRequest, NetId, NewGameRequest,
    StatusRequest, TurnUpdate, UpdateGameRequest, UpdateUserRequest,
};

/// Exponential backoff for transient failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            initial: Duration::from_millis(250),
            max: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            initial: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

#[derive(Clone)]
pub struct NetClient {
    transport: Arc<dyn NetTransport>,
    id: NetId,
    retry: RetryPolicy,
    poll: Duration,
}

impl NetClient {
    pub fn new(transport: Arc<dyn NetTransport>, id: NetId) -> Self {
        Self {
            transport,
            id,
            retry: RetryPolicy::default(),
            poll: Duration::from_secs(5),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Interval between status polls while waiting on the other side.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn id(&self) -> NetId {
        self.id
    }

    async fn with_retry_loop<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T, NetError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NetError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(e) if e.is_transient() && attempt + 1 < self.retry.attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!(target: "runtime::net", request = what, attempt, ?delay, error = %e, "retrying");
                    time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    pub async fn set_name(&self, name: &str) -> Result<(), NetError> {
        let req = UpdateUserRequest {
            id: self.id,
            name: name.to_owned(),
        };
        self.with_retry_loop("user", || self.transport.user(req.clone()))
            .await
    }

    pub async fn new_game(
        &self,
        name: &str,
        script: &str,
        intruders: bool,
    ) -> Result<GameKey, NetError> {
        let req = NewGameRequest {
            id: self.id,
            name: name.to_owned(),
            script: script.to_owned(),
            intruders,
        };
        let resp = self
            .with_retry_loop("new_game", || self.transport.new_game(req.clone()))
            .await?;
        Ok(resp.game_key)
    }

    pub async fn join(&self, key: &GameKey, name: &str) -> Result<(), NetError> {
        let req = JoinGameRequest {
            id: self.id,
            game_key: key.clone(),
            name: name.to_owned(),
        };
        self.with_retry_loop("join", || self.transport.join(req.clone()))
            .await
    }

    pub async fn status(&self, key: &GameKey) -> Result<GameRecord, NetError> {
        let req = StatusRequest {
            id: self.id,
            game_key: key.clone(),
        };
        let resp = self
            .with_retry_loop("status", || self.transport.status(req.clone()))
            .await?;
        resp.game.ok_or_else(|| NetError::UnknownGame(key.to_string()))
    }

    pub async fn update(
        &self,
        key: &GameKey,
        round: u32,
        intruders: bool,
        update: TurnUpdate,
    ) -> Result<(), NetError> {
        let req = UpdateGameRequest {
            id: self.id,
            game_key: key.clone(),
            round,
            intruders,
            update,
        };
        self.with_retry_loop("update", || self.transport.update(req.clone()))
            .await?;
        debug!(target: "runtime::net", game = %key, round, "turn uploaded");
        Ok(())
    }

    pub async fn kill(&self, key: &GameKey) -> Result<(), NetError> {
        let req = KillRequest {
            id: self.id,
            game_key: key.clone(),
        };
        self.with_retry_loop("kill", || self.transport.kill(req.clone()))
            .await
    }

    pub async fn list(&self) -> Result<Vec<GameKey>, NetError> {
        let req = ListGamesRequest { id: self.id };
        let resp = self
            .with_retry_loop("list", || self.transport.list(req.clone()))
            .await?;
        Ok(resp.games)
    }

    /// Poll until `round` is on record. `max_polls` of zero waits forever.
    pub async fn wait_for_round(
        &self,
        key: &GameKey,
        round: u32,
        max_polls: u32,
    ) -> Result<TurnUpdate, NetError> {
        let mut polls = 0;
        loop {
            let record = self.status(key).await?;
            if record.killed {
                return Err(NetError::Rejected("game was killed".into()));
            }
            if let Some(update) = record.update(round) {
                return Ok(update);
            }
            polls += 1;
            if max_polls != 0 && polls >= max_polls {
                return Err(NetError::Timeout(round));
            }
            time::sleep(self.poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::net::server::LocalServer;
    use crate::net::wire::{
        ListGamesResponse, NewGameResponse, StatusResponse,
    };

    /// Fails `flaky` times with `Unreachable` before answering status.
    struct Flaky {
        flaky: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl NetTransport for Flaky {
        async fn new_game(&self, _: NewGameRequest) -> Result<NewGameResponse, NetError> {
            Err(NetError::Rejected("no".into()))
        }
        async fn join(&self, _: JoinGameRequest) -> Result<(), NetError> {
            Ok(())
        }
        async fn status(&self, _: StatusRequest) -> Result<StatusResponse, NetError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.flaky {
                return Err(NetError::Unreachable("down".into()));
            }
            Ok(StatusResponse {
                game: Some(GameRecord::default()),
            })
        }
        async fn update(&self, _: UpdateGameRequest) -> Result<(), NetError> {
            Ok(())
        }
        async fn kill(&self, _: KillRequest) -> Result<(), NetError> {
            Ok(())
        }
        async fn user(&self, _: UpdateUserRequest) -> Result<(), NetError> {
            Ok(())
        }
        async fn list(&self, _: ListGamesRequest) -> Result<ListGamesResponse, NetError> {
            Ok(ListGamesResponse { games: Vec::new() })
        }
    }

    fn quick() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            initial: Duration::from_millis(1),
            max: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let flaky = Arc::new(Flaky {
            flaky: 2,
            calls: AtomicU32::new(0),
        });
        let client = NetClient::new(flaky.clone(), NetId(1)).with_retry(quick());
        assert!(client.status(&GameKey("g".into())).await.is_ok());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_give_up_after_the_last_attempt() {
        let flaky = Arc::new(Flaky {
            flaky: 10,
            calls: AtomicU32::new(0),
        });
        let client = NetClient::new(flaky.clone(), NetId(1)).with_retry(quick());
        let err = client.status(&GameKey("g".into())).await.unwrap_err();
        assert!(matches!(err, NetError::Unreachable(_)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn waiting_for_a_missing_round_times_out() {
        let server = Arc::new(LocalServer::new());
        let client = NetClient::new(server, NetId(9))
            .with_poll_interval(Duration::from_millis(1));
        let key = client.new_game("ann", "lvl1", true).await.unwrap();
        let err = client.wait_for_round(&key, 1, 3).await.unwrap_err();
        assert_eq!(err, NetError::Timeout(1));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(250));
        assert_eq!(policy.delay(2), Duration::from_secs(1));
        assert_eq!(policy.delay(10), Duration::from_secs(4));
    }
}
