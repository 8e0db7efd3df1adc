use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::auth::SessionValidator;
use crate::errors::{GameError, Status};
use crate::models::board::CellPosition;
use crate::models::filter::GameFilter;
use crate::models::game::{Game, GameId, GameSettings, LifecycleState};
use crate::models::session::Session;
use crate::registry::SessionRegistry;
use crate::store::GameStore;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 200;

/// One page of a game listing.
#[derive(Serialize, Debug, Clone)]
pub struct Page {
    pub games: Vec<Game>,
    /// Pass back as `cursor` to fetch the next page.
    pub next_cursor: Option<GameId>,
}

/// Outcome of leaving every game of a session.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LeaveAllReport {
    pub status: Status,
    pub left: Vec<GameId>,
    pub failed: Vec<(GameId, Status)>,
}

pub struct GameManager {
    store: GameStore,
    registry: SessionRegistry,
    validator: Arc<dyn SessionValidator>,
}

impl GameManager {
    pub fn new(store: GameStore, validator: Arc<dyn SessionValidator>) -> Self {
        Self {
            store,
            registry: SessionRegistry::new(),
            validator,
        }
    }

    pub fn store(&self) -> &GameStore {
        &self.store
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    fn session(&self, token: &str) -> Result<Session, GameError> {
        self.validator.validate(token)
    }

    // The registry must agree with the game before the game is touched.
    fn check_membership(&self, session: &Session, game: &Game) -> Result<(), GameError> {
        let in_game = game.is_participant(session);
        let in_registry = self.registry.contains(session, game.id());
        if in_game != in_registry {
            error!(
                "registry diverged for {} in game {}: game says {}, registry says {}",
                session,
                game.id(),
                in_game,
                in_registry
            );
            return Err(GameError::Internal(format!(
                "membership of game {} is inconsistent",
                game.id()
            )));
        }
        Ok(())
    }

    pub fn create_game(&self, token: &str, settings: GameSettings) -> Result<GameId, GameError> {
        let session = self.session(token)?;
        let rule = settings.validate()?;
        let id = self.store.create(settings, session.clone(), rule)?;
        info!("{} created game {}", session, id);
        Ok(id)
    }

    pub async fn join_game(&self, token: &str, id: GameId) -> Result<LifecycleState, GameError> {
        let session = self.session(token)?;
        let state = self
            .store
            .mutate(id, |game| {
                self.check_membership(&session, game)?;
                game.join(&session)?;
                self.registry.record_join(&session, id);
                Ok(game.state())
            })
            .await?;
        info!("{} joined game {} ({:?})", session, id, state);
        Ok(state)
    }

    pub async fn leave_game(&self, token: &str, id: GameId) -> Result<(), GameError> {
        let session = self.session(token)?;
        self.leave_as(&session, id).await
    }

    async fn leave_as(&self, session: &Session, id: GameId) -> Result<(), GameError> {
        let state = self
            .store
            .mutate(id, |game| {
                self.check_membership(session, game)?;
                game.leave(session)?;
                self.registry.record_leave(session, id);
                Ok(game.state())
            })
            .await?;
        info!("{} left game {} ({:?})", session, id, state);

        if state == LifecycleState::Abandoned {
            // nobody is left to read it
            self.store.delete(id).await;
        }
        Ok(())
    }

    /// Leaves every game the session takes part in, carrying on past failures.
    /// Only an invalid session fails the whole operation.
    pub async fn leave_all_games(&self, token: &str) -> Result<LeaveAllReport, GameError> {
        let session = self.session(token)?;
        let ids = self.registry.games_for(&session);

        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let outcome = match self.leave_as(&session, id).await {
                // deleted meanwhile; drop whatever membership is left behind
                Err(GameError::NoSuchGame(_)) => {
                    self.registry.record_leave(&session, id);
                    Ok(())
                }
                other => other,
            };
            outcomes.push((id, outcome));
        }

        let mut report = LeaveAllReport {
            status: Status::Ok,
            left: Vec::new(),
            failed: Vec::new(),
        };
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.left.push(id),
                Err(err) => {
                    warn!("{} could not leave game {}: {}", session, id, err);
                    report.failed.push((id, err.status()));
                }
            }
        }
        report.status = match (report.left.is_empty(), report.failed.is_empty()) {
            (_, true) => Status::Ok,
            (true, false) => Status::Failed,
            (false, false) => Status::Partial,
        };
        info!(
            "{} left {} games, {} failures",
            session,
            report.left.len(),
            report.failed.len()
        );
        Ok(report)
    }

    pub async fn get_game(&self, token: &str, id: GameId) -> Result<Game, GameError> {
        let session = self.session(token)?;
        let game = self.store.get(id).await?;
        if !game.is_visible_to(&session) {
            debug!("{} asked for hidden game {}", session, id);
            return Err(GameError::NoSuchGame(id));
        }
        Ok(game)
    }

    pub async fn list_games(
        &self,
        token: &str,
        filter: GameFilter,
        limit: Option<usize>,
        cursor: Option<GameId>,
    ) -> Result<Page, GameError> {
        let session = self.session(token)?;
        filter.validate()?;
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let mut listing = self.store.list(filter);
        if let Some(cursor) = cursor {
            listing = listing.after(cursor);
        }
        let games = listing
            .take(limit, |game| game.is_visible_to(&session))
            .await?;
        let next_cursor = match games.last() {
            Some(last) if games.len() == limit && !listing.is_exhausted() => Some(last.id()),
            _ => None,
        };
        debug!("{} listed {} games", session, games.len());
        Ok(Page { games, next_cursor })
    }

    pub async fn put_move(
        &self,
        token: &str,
        id: GameId,
        pos: CellPosition,
    ) -> Result<LifecycleState, GameError> {
        let session = self.session(token)?;
        let state = self
            .store
            .mutate(id, |game| game.apply_move(&session, pos))
            .await?;
        if state == LifecycleState::Finished {
            info!("game {} finished after a move by {} at {}", id, session, pos);
        } else {
            debug!("{} moved at {} in game {}", session, pos, id);
        }
        Ok(state)
    }

    /// Deletes games idle for at least `grace` that are over or were never joined,
    /// releasing the memberships they still hold. Returns how many games were removed.
    pub async fn reap(&self, grace: Duration) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        for id in self.store.ids() {
            let game = match self.store.get(id).await {
                Ok(game) => game,
                // busy games are not idle; gone ones need nothing
                Err(_) => continue,
            };
            let idle = (now - game.last_activity()).to_std().unwrap_or_default();
            let unjoined =
                game.state() == LifecycleState::Pending && game.participants().is_empty();
            if !(game.state().is_terminal() || unjoined) || idle < grace {
                continue;
            }
            let deleted = self
                .store
                .delete_with(id, |game| {
                    for session in game.participants() {
                        self.registry.record_leave(session, id);
                    }
                })
                .await;
            if deleted {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("reaped {} games, {} remain", removed, self.store.len());
        }
        removed
    }
}
