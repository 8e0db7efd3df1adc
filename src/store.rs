use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use log::{debug, info};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;

use crate::errors::GameError;
use crate::models::filter::GameFilter;
use crate::models::game::{Game, GameId, GameSettings};
use crate::models::rules::TerminalRule;
use crate::models::session::Session;

// `None` marks a game that was deleted while someone still held the slot
type Slot = Arc<Mutex<Option<Game>>>;

// Every game sits behind its own guard; only `mutate` changes one
pub struct GameStore {
    games: DashMap<GameId, Slot>,
    next_id: AtomicU64,
    // reserved before insert, released on delete
    live: AtomicUsize,
    max_games: usize,
    lock_timeout: Duration,
}

impl GameStore {
    pub fn new(max_games: usize, lock_timeout: Duration) -> Self {
        Self {
            games: DashMap::new(),
            next_id: AtomicU64::new(1),
            live: AtomicUsize::new(0),
            max_games,
            lock_timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Allocates a fresh identifier and stores a new `Pending` game under it.
    pub fn create(
        &self,
        settings: GameSettings,
        created_by: Session,
        rule: Arc<dyn TerminalRule>,
    ) -> Result<GameId, GameError> {
        let max = self.max_games;
        self.live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .map_err(|_| GameError::StoreFull)?;
        // identifiers are never handed out twice, even after deletion
        let raw = match self
            .next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
        {
            Ok(raw) => raw,
            Err(_) => {
                self.live.fetch_sub(1, Ordering::SeqCst);
                return Err(GameError::StoreFull);
            }
        };
        let id = GameId(raw);
        let game = Game::new(id, settings, created_by, rule);
        self.games.insert(id, Arc::new(Mutex::new(Some(game))));
        debug!("game {} stored ({} live)", id, self.games.len());
        Ok(id)
    }

    fn slot(&self, id: GameId) -> Result<Slot, GameError> {
        self.games
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(GameError::NoSuchGame(id))
    }

    async fn lock_slot(
        &self,
        id: GameId,
        slot: Slot,
    ) -> Result<OwnedMutexGuard<Option<Game>>, GameError> {
        let guard = timeout(self.lock_timeout, slot.lock_owned())
            .await
            .map_err(|_| GameError::Busy(id))?;
        if guard.is_none() {
            return Err(GameError::NoSuchGame(id));
        }
        Ok(guard)
    }

    /// Returns a copy of the game.
    pub async fn get(&self, id: GameId) -> Result<Game, GameError> {
        let guard = self.lock_slot(id, self.slot(id)?).await?;
        guard.as_ref().cloned().ok_or(GameError::NoSuchGame(id))
    }

    /// Runs `f` on the game while holding its guard. The guard is released when this
    /// returns, whatever `f` returned.
    pub async fn mutate<F, R>(&self, id: GameId, f: F) -> Result<R, GameError>
    where
        F: FnOnce(&mut Game) -> Result<R, GameError>,
    {
        let mut guard = self.lock_slot(id, self.slot(id)?).await?;
        let game = guard.as_mut().ok_or(GameError::NoSuchGame(id))?;
        f(game)
    }

    /// Removes the game, handing its final state to `on_removed` under its guard.
    /// Returns false when the game was already gone.
    pub async fn delete_with<F>(&self, id: GameId, on_removed: F) -> bool
    where
        F: FnOnce(Game),
    {
        let Some((_, slot)) = self.games.remove(&id) else {
            return false;
        };
        self.live.fetch_sub(1, Ordering::SeqCst);
        // unbounded wait: the slot is no longer reachable through the map
        let mut guard = slot.lock().await;
        match guard.take() {
            Some(game) => {
                on_removed(game);
                info!("game {} deleted", id);
                true
            }
            None => false,
        }
    }

    pub async fn delete(&self, id: GameId) -> bool {
        self.delete_with(id, |_| {}).await
    }

    /// Point-in-time listing of the games matching `filter`, ordered by identifier.
    pub fn list(&self, filter: GameFilter) -> Listing {
        let mut slots: Vec<(GameId, Slot)> = self
            .games
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        slots.sort_by_key(|(id, _)| *id);
        Listing {
            slots,
            pos: 0,
            filter,
            lock_timeout: self.lock_timeout,
        }
    }

    /// Identifiers of every live game, for background sweeps.
    pub fn ids(&self) -> Vec<GameId> {
        self.games.iter().map(|entry| *entry.key()).collect()
    }
}

/// Finite sequence over the games that existed when the listing was taken. Each game
/// is copied under its own guard as the sequence reaches it; games deleted in the
/// meantime are skipped. [`Listing::restart`] rewinds it.
pub struct Listing {
    slots: Vec<(GameId, Slot)>,
    pos: usize,
    filter: GameFilter,
    lock_timeout: Duration,
}

impl Listing {
    /// Skips ahead to the first game after `cursor`.
    pub fn after(mut self, cursor: GameId) -> Self {
        self.pos = self.slots.partition_point(|(id, _)| *id <= cursor);
        self
    }

    pub fn restart(&mut self) {
        self.pos = 0;
    }

    pub async fn next(&mut self) -> Result<Option<Game>, GameError> {
        while let Some((id, slot)) = self.slots.get(self.pos) {
            self.pos += 1;
            let guard = timeout(self.lock_timeout, slot.lock())
                .await
                .map_err(|_| GameError::Busy(*id))?;
            match guard.as_ref() {
                Some(game) if self.filter.matches(game) => return Ok(Some(game.clone())),
                _ => continue,
            }
        }
        Ok(None)
    }

    /// Collects up to `limit` matches accepted by `keep`.
    pub async fn take<P>(&mut self, limit: usize, keep: P) -> Result<Vec<Game>, GameError>
    where
        P: Fn(&Game) -> bool,
    {
        let mut out = Vec::new();
        while out.len() < limit {
            match self.next().await? {
                Some(game) if keep(&game) => out.push(game),
                Some(_) => continue,
                None => break,
            }
        }
        Ok(out)
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.slots.len()
    }
}
