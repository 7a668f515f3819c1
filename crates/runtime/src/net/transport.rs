use async_trait::async_trait;

use super::error::NetError;
use super::wire::{
    JoinGameRequest, KillRequest, ListGamesRequest, ListGamesResponse, NewGameRequest,
    NewGameResponse, StatusRequest, StatusResponse, UpdateGameRequest, UpdateUserRequest,
};

/// Request/response pairs the game server answers.
#[async_trait]
pub trait NetTransport: Send + Sync {
    async fn new_game(&self, req: NewGameRequest) -> Result<NewGameResponse, NetError>;

    async fn join(&self, req: JoinGameRequest) -> Result<(), NetError>;

    async fn status(&self, req: StatusRequest) -> Result<StatusResponse, NetError>;

    async fn update(&self, req: UpdateGameRequest) -> Result<(), NetError>;

    async fn kill(&self, req: KillRequest) -> Result<(), NetError>;

    async fn user(&self, req: UpdateUserRequest) -> Result<(), NetError>;

    async fn list(&self, req: ListGamesRequest) -> Result<ListGamesResponse, NetError>;
}
