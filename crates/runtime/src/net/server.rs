//! In-process game server.
//!
//! Holds game records in memory and enforces the same rules a remote server
//! would: only seated players may update, and rounds arrive in order.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::NetError;
use super::transport::NetTransport;
use super::wire::{
    GameKey, GameRecord, JoinGameRequest, KillRequest, ListGamesRequest, ListGamesResponse,
    NetId, NewGameRequest, NewGameResponse, StatusRequest, StatusResponse, UpdateGameRequest,
    UpdateUserRequest,
};

#[derive(Default)]
struct ServerState {
    users: BTreeMap<NetId, String>,
    games: BTreeMap<GameKey, GameRecord>,
    next_game: u64,
}

#[derive(Default)]
pub struct LocalServer {
    state: Mutex<ServerState>,
}

impl LocalServer {
    pub fn new() -> Self {
        Self::default()
    }
}

fn game_mut<'a>(
    state: &'a mut ServerState,
    key: &GameKey,
) -> Result<&'a mut GameRecord, NetError> {
    state
        .games
        .get_mut(key)
        .ok_or_else(|| NetError::UnknownGame(key.to_string()))
}

#[async_trait]
impl NetTransport for LocalServer {
    async fn new_game(&self, req: NewGameRequest) -> Result<NewGameResponse, NetError> {
        let mut state = self.state.lock().await;
        state.next_game += 1;
        let key = GameKey(format!("game-{}", state.next_game));
        let mut record = GameRecord {
            name: req.name.clone(),
            script: Some(req.script),
            ..GameRecord::default()
        };
        if req.intruders {
            record.intruders_id = Some(req.id);
            record.intruders_name = req.name;
        } else {
            record.denizens_id = Some(req.id);
            record.denizens_name = req.name;
        }
        state.games.insert(key.clone(), record);
        debug!(target: "runtime::net", game = %key, "game created");
        Ok(NewGameResponse { game_key: key })
    }

    async fn join(&self, req: JoinGameRequest) -> Result<(), NetError> {
        let mut state = self.state.lock().await;
        let record = game_mut(&mut state, &req.game_key)?;
        match (record.denizens_id, record.intruders_id) {
            (None, Some(other)) if other != req.id => {
                record.denizens_id = Some(req.id);
                record.denizens_name = req.name;
            }
            (Some(other), None) if other != req.id => {
                record.intruders_id = Some(req.id);
                record.intruders_name = req.name;
            }
            _ => return Err(NetError::Rejected("game is full".into())),
        }
        Ok(())
    }

    async fn status(&self, req: StatusRequest) -> Result<StatusResponse, NetError> {
        let state = self.state.lock().await;
        Ok(StatusResponse {
            game: state.games.get(&req.game_key).cloned(),
        })
    }

    async fn update(&self, req: UpdateGameRequest) -> Result<(), NetError> {
        let mut state = self.state.lock().await;
        let record = game_mut(&mut state, &req.game_key)?;
        if record.killed {
            return Err(NetError::Rejected("game was killed".into()));
        }
        let seat = if req.intruders {
            record.intruders_id
        } else {
            record.denizens_id
        };
        if seat != Some(req.id) {
            return Err(NetError::Rejected(format!("{} does not hold that seat", req.id)));
        }
        let expected = record.rounds() + 1;
        if req.round as usize != expected {
            return Err(NetError::Rejected(format!(
                "round {} out of order, expected {expected}",
                req.round
            )));
        }
        record.before.push(req.update.before);
        record.after.push(req.update.after);
        record.execs.push(req.update.execs);
        debug!(target: "runtime::net", game = %req.game_key, round = req.round, "update stored");
        Ok(())
    }

    async fn kill(&self, req: KillRequest) -> Result<(), NetError> {
        let mut state = self.state.lock().await;
        let record = game_mut(&mut state, &req.game_key)?;
        if record.denizens_id != Some(req.id) && record.intruders_id != Some(req.id) {
            return Err(NetError::Rejected("not a player of this game".into()));
        }
        record.killed = true;
        Ok(())
    }

    async fn user(&self, req: UpdateUserRequest) -> Result<(), NetError> {
        self.state.lock().await.users.insert(req.id, req.name);
        Ok(())
    }

    async fn list(&self, req: ListGamesRequest) -> Result<ListGamesResponse, NetError> {
        let state = self.state.lock().await;
        let games = state
            .games
            .iter()
            .filter(|(_, g)| {
                !g.killed && (g.denizens_id == Some(req.id) || g.intruders_id == Some(req.id))
            })
            .map(|(k, _)| k.clone())
            .collect();
        Ok(ListGamesResponse { games })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::wire::TurnUpdate;

    fn update(id: u64, key: &GameKey, round: u32, intruders: bool) -> UpdateGameRequest {
        UpdateGameRequest {
            id: NetId(id),
            game_key: key.clone(),
            round,
            intruders,
            update: TurnUpdate {
                before: format!("b{round}"),
                after: format!("a{round}"),
                execs: vec![round as u8],
            },
        }
    }

    #[tokio::test]
    async fn seats_and_round_order_are_enforced() {
        let server = LocalServer::new();
        let key = server
            .new_game(NewGameRequest {
                id: NetId(1),
                name: "ann".into(),
                script: "lvl1".into(),
                intruders: true,
            })
            .await
            .unwrap()
            .game_key;
        server
            .join(JoinGameRequest {
                id: NetId(2),
                game_key: key.clone(),
                name: "bo".into(),
            })
            .await
            .unwrap();

        assert!(server.update(update(2, &key, 1, true)).await.is_err());
        assert!(server.update(update(1, &key, 2, true)).await.is_err());
        server.update(update(1, &key, 1, true)).await.unwrap();
        server.update(update(2, &key, 2, false)).await.unwrap();

        let record = server
            .status(StatusRequest {
                id: NetId(1),
                game_key: key.clone(),
            })
            .await
            .unwrap()
            .game
            .unwrap();
        assert_eq!(record.rounds(), 2);
        assert_eq!(record.denizens_name, "bo");

        let listed = server.list(ListGamesRequest { id: NetId(2) }).await.unwrap();
        assert_eq!(listed.games, [key]);
    }
}
