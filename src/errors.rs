use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::board::CellPosition;
use crate::models::game::{GameId, LifecycleState};

// Errors produced by the game engine. Every one of them ends up as a Status for the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("game {0} does not exist")]
    NoSuchGame(GameId),
    #[error("game is full ({capacity} players)")]
    CapacityExceeded { capacity: u8 },
    #[error("already a participant of this game")]
    AlreadyJoined,
    #[error("not a participant of this game")]
    NotAParticipant,
    #[error("this game is invite-only")]
    NotInvited,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("position {0} is outside the board")]
    InvalidPosition(CellPosition),
    #[error("cell {0} is already occupied")]
    CellOccupied(CellPosition),
    #[error("game is not in progress (state: {0:?})")]
    GameNotInProgress(LifecycleState),
    #[error("the server holds the maximum number of games")]
    StoreFull,
    #[error("game {0} is busy, try again")]
    Busy(GameId),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("session token is not valid")]
    Unauthorized,
    #[error("internal error: {0}")]
    Internal(String),
}

// Result code carried by every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    NoSuchGame,
    CapacityExceeded,
    AlreadyJoined,
    NotAParticipant,
    NotInvited,
    NotYourTurn,
    InvalidPosition,
    CellOccupied,
    GameNotInProgress,
    StoreFull,
    Busy,
    Unsupported,
    Unauthorized,
    Internal,
    /// Some, but not all, of a batch of operations succeeded.
    Partial,
    /// None of a batch of operations succeeded.
    Failed,
}

impl GameError {
    pub fn status(&self) -> Status {
        match self {
            Self::NoSuchGame(_) => Status::NoSuchGame,
            Self::CapacityExceeded { .. } => Status::CapacityExceeded,
            Self::AlreadyJoined => Status::AlreadyJoined,
            Self::NotAParticipant => Status::NotAParticipant,
            Self::NotInvited => Status::NotInvited,
            Self::NotYourTurn => Status::NotYourTurn,
            Self::InvalidPosition(_) => Status::InvalidPosition,
            Self::CellOccupied(_) => Status::CellOccupied,
            Self::GameNotInProgress(_) => Status::GameNotInProgress,
            Self::StoreFull => Status::StoreFull,
            Self::Busy(_) => Status::Busy,
            Self::Unsupported(_) => Status::Unsupported,
            Self::Unauthorized => Status::Unauthorized,
            Self::Internal(_) => Status::Internal,
        }
    }
}

impl Status {
    pub fn http_code(&self) -> StatusCode {
        match self {
            Self::Ok | Self::Partial => StatusCode::OK,
            Self::NoSuchGame => StatusCode::NOT_FOUND,
            Self::CapacityExceeded
            | Self::AlreadyJoined
            | Self::NotYourTurn
            | Self::CellOccupied
            | Self::GameNotInProgress
            | Self::Failed => StatusCode::CONFLICT,
            Self::NotAParticipant | Self::NotInvited => StatusCode::FORBIDDEN,
            Self::InvalidPosition | Self::Unsupported => StatusCode::BAD_REQUEST,
            Self::StoreFull => StatusCode::INSUFFICIENT_STORAGE,
            Self::Busy => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

//implementation of the error response used by the handlers
impl IntoResponse for GameError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        (
            status.http_code(),
            Json(json!({"status": status, "error": self.to_string()})),
        )
            .into_response()
    }
}
