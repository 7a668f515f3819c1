//! Request and response records exchanged with the game server.
//!
//! Field names follow the server's JSON schema.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-install identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetId(pub u64);

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameKey(pub String);

impl fmt::Display for GameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGameRequest {
    #[serde(rename = "Id")]
    pub id: NetId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Script")]
    pub script: String,
    /// Side the creator plays.
    #[serde(rename = "Intruders")]
    pub intruders: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGameResponse {
    #[serde(rename = "Game_key")]
    pub game_key: GameKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGameRequest {
    #[serde(rename = "Id")]
    pub id: NetId,
    #[serde(rename = "Game_key")]
    pub game_key: GameKey,
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRequest {
    #[serde(rename = "Id")]
    pub id: NetId,
    #[serde(rename = "Game_key")]
    pub game_key: GameKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(rename = "Game")]
    pub game: Option<GameRecord>,
}

/// One side's completed turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnUpdate {
    #[serde(rename = "Before")]
    pub before: String,
    #[serde(rename = "After")]
    pub after: String,
    /// Encoded exec stream.
    #[serde(rename = "Execs")]
    pub execs: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGameRequest {
    #[serde(rename = "Id")]
    pub id: NetId,
    #[serde(rename = "Game_key")]
    pub game_key: GameKey,
    #[serde(rename = "Round")]
    pub round: u32,
    #[serde(rename = "Intruders")]
    pub intruders: bool,
    #[serde(flatten)]
    pub update: TurnUpdate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillRequest {
    #[serde(rename = "Id")]
    pub id: NetId,
    #[serde(rename = "Game_key")]
    pub game_key: GameKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(rename = "Id")]
    pub id: NetId,
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListGamesRequest {
    #[serde(rename = "Id")]
    pub id: NetId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListGamesResponse {
    #[serde(rename = "Games")]
    pub games: Vec<GameKey>,
}

/// The server's record of one game.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Denizens_id")]
    pub denizens_id: Option<NetId>,
    #[serde(rename = "Intruders_id")]
    pub intruders_id: Option<NetId>,
    #[serde(rename = "Denizens_name")]
    pub denizens_name: String,
    #[serde(rename = "Intruders_name")]
    pub intruders_name: String,
    #[serde(rename = "Script")]
    pub script: Option<String>,
    #[serde(rename = "Before")]
    pub before: Vec<String>,
    #[serde(rename = "After")]
    pub after: Vec<String>,
    #[serde(rename = "Execs")]
    pub execs: Vec<Vec<u8>>,
    #[serde(rename = "Killed")]
    pub killed: bool,
}

impl GameRecord {
    /// Completed turns on record.
    pub fn rounds(&self) -> usize {
        self.before.len().min(self.after.len()).min(self.execs.len())
    }

    /// Update for 1-based `round`, once every part of it has arrived.
    pub fn update(&self, round: u32) -> Option<TurnUpdate> {
        let i = usize::try_from(round).ok()?.checked_sub(1)?;
        if i >= self.rounds() {
            return None;
        }
        Some(TurnUpdate {
            before: self.before[i].clone(),
            after: self.after[i].clone(),
            execs: self.execs[i].clone(),
        })
    }
}
