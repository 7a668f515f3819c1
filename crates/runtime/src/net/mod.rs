//! Peer synchronisation.
//!
//! Two peers, one per side, share a game record on a server. After each of
//! its turns a peer uploads the state it started from, the state it ended in
//! and the execs it committed; the other peer replays those execs against
//! the before-state and uses the after-state only to break divergence.

mod client;
mod error;
mod id_store;
mod server;
mod session;
mod transport;
mod wire;

pub use client::{NetClient, RetryPolicy};
pub use error::NetError;
pub use id_store::NetIdStore;
pub use server::LocalServer;
pub use session::{NetSession, states_match};
pub use transport::NetTransport;
pub use wire::{
    GameKey, GameRecord, JoinGameRequest, KillRequest, ListGamesRequest, ListGamesResponse,
    NetId, NewGameRequest, NewGameResponse, StatusRequest, StatusResponse, TurnUpdate,
    UpdateGameRequest, UpdateUserRequest,
};
