use axum::{
    extract::{Path, State, TypedHeader},
    headers::{authorization::Bearer, Authorization},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use log::info;
use serde::{Deserialize, Serialize};

use crate::errors::{GameError, Status};
use crate::manager::LeaveAllReport;
use crate::models::board::CellPosition;
use crate::models::filter::GameFilter;
use crate::models::game::{Game, GameId, GameSettings};
use crate::AppState;

// Response carrying nothing but the status
#[derive(Deserialize, Serialize, Debug)]
pub struct StatusResponse {
    pub status: Status,
}

impl StatusResponse {
    fn ok() -> Json<Self> {
        Json(Self { status: Status::Ok })
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CreateGameResponse {
    pub status: Status,
    pub gid: GameId,
}

#[derive(Serialize, Debug)]
pub struct GetGameResponse {
    pub status: Status,
    pub game: Game,
}

// The struct used for a listing request
#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(default)]
pub struct ListGamesRequest {
    pub filter: GameFilter,
    pub limit: Option<usize>,
    pub cursor: Option<GameId>,
}

#[derive(Serialize, Debug)]
pub struct ListGamesResponse {
    pub status: Status,
    pub games: Vec<Game>,
    pub next_cursor: Option<GameId>,
}

//handler for creating a new game. The new game id is returned with the status
pub async fn create_game(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(settings): Json<GameSettings>,
) -> Result<impl IntoResponse, GameError> {
    info!("new game request");
    let gid = state.manager.create_game(bearer.token(), settings)?;
    Ok((
        StatusCode::CREATED,
        Json(CreateGameResponse {
            status: Status::Ok,
            gid,
        }),
    ))
}

pub async fn join_game(
    Path(gid): Path<GameId>,
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
) -> Result<impl IntoResponse, GameError> {
    info!("join game {} request", gid);
    state.manager.join_game(bearer.token(), gid).await?;
    Ok(StatusResponse::ok())
}

pub async fn leave_game(
    Path(gid): Path<GameId>,
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
) -> Result<impl IntoResponse, GameError> {
    info!("leave game {} request", gid);
    state.manager.leave_game(bearer.token(), gid).await?;
    Ok(StatusResponse::ok())
}

// handler for leaving every game at once. Partial failures are listed in the body
pub async fn leave_all_games(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
) -> Result<impl IntoResponse, GameError> {
    info!("leave all games request");
    let report: LeaveAllReport = state.manager.leave_all_games(bearer.token()).await?;
    Ok((report.status.http_code(), Json(report)))
}

pub async fn get_game(
    Path(gid): Path<GameId>,
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
) -> Result<impl IntoResponse, GameError> {
    info!("get game {} request", gid);
    let game = state.manager.get_game(bearer.token(), gid).await?;
    Ok(Json(GetGameResponse {
        status: Status::Ok,
        game,
    }))
}

pub async fn list_games(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<ListGamesRequest>,
) -> Result<impl IntoResponse, GameError> {
    info!("list games request");
    let page = state
        .manager
        .list_games(bearer.token(), request.filter, request.limit, request.cursor)
        .await?;
    Ok(Json(ListGamesResponse {
        status: Status::Ok,
        games: page.games,
        next_cursor: page.next_cursor,
    }))
}

pub async fn put_move(
    Path(gid): Path<GameId>,
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(position): Json<CellPosition>,
) -> Result<impl IntoResponse, GameError> {
    info!("move request for game {} at {}", gid, position);
    state.manager.put_move(bearer.token(), gid, position).await?;
    Ok(StatusResponse::ok())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::auth::JwtValidator;
    use crate::manager::GameManager;
    use crate::store::GameStore;

    fn state() -> AppState {
        AppState::new(GameManager::new(
            GameStore::new(8, Duration::from_millis(100)),
            Arc::new(JwtValidator::new("http-secret")),
        ))
    }

    fn bearer(who: &str) -> TypedHeader<Authorization<Bearer>> {
        let token = JwtValidator::new("http-secret").issue(who, 60).unwrap();
        TypedHeader(Authorization::bearer(&token).unwrap())
    }

    #[tokio::test]
    async fn create_answers_created_with_the_new_id() {
        let response = create_game(State(state()), bearer("a"), Json(GameSettings::default()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn rejected_move_maps_to_conflict() {
        let state = state();
        let gid = state
            .manager
            .create_game(bearer("a").0.token(), GameSettings::default())
            .unwrap();
        let response = put_move(
            Path(gid),
            State(state.clone()),
            bearer("a"),
            Json(CellPosition::new(0, 0)),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn bad_token_maps_to_unauthorized() {
        let forged = TypedHeader(Authorization::bearer("not.a.token").unwrap());
        let response = get_game(Path(GameId(1)), State(state()), forged)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_game_maps_to_not_found() {
        let response = join_game(Path(GameId(99)), State(state()), bearer("a"))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
