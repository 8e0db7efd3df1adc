// Which games each session takes part in

use std::collections::BTreeSet;

use dashmap::DashMap;

use crate::models::game::GameId;
use crate::models::session::Session;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Session, BTreeSet<GameId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the entry was not there yet.
    pub fn record_join(&self, session: &Session, id: GameId) -> bool {
        self.sessions.entry(session.clone()).or_default().insert(id)
    }

    /// Returns true if the entry was there.
    pub fn record_leave(&self, session: &Session, id: GameId) -> bool {
        let removed = match self.sessions.get_mut(session) {
            Some(mut games) => games.remove(&id),
            None => return false,
        };
        // forget sessions that no longer take part in any game
        self.sessions.remove_if(session, |_, games| games.is_empty());
        removed
    }

    pub fn contains(&self, session: &Session, id: GameId) -> bool {
        self.sessions
            .get(session)
            .map_or(false, |games| games.contains(&id))
    }

    pub fn games_for(&self, session: &Session) -> BTreeSet<GameId> {
        self.sessions
            .get(session)
            .map(|games| games.value().clone())
            .unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_leave_are_idempotent() {
        let registry = SessionRegistry::new();
        let alice = Session::new("alice");
        assert!(registry.record_join(&alice, GameId(1)));
        assert!(!registry.record_join(&alice, GameId(1)));
        registry.record_join(&alice, GameId(2));
        assert_eq!(
            registry.games_for(&alice).into_iter().collect::<Vec<_>>(),
            vec![GameId(1), GameId(2)]
        );

        assert!(registry.record_leave(&alice, GameId(1)));
        assert!(!registry.record_leave(&alice, GameId(1)));
        assert!(!registry.contains(&alice, GameId(1)));
        assert!(registry.contains(&alice, GameId(2)));
    }

    #[test]
    fn empty_sessions_are_dropped() {
        let registry = SessionRegistry::new();
        let bob = Session::new("bob");
        registry.record_join(&bob, GameId(3));
        registry.record_leave(&bob, GameId(3));
        assert_eq!(registry.session_count(), 0);
        assert!(registry.games_for(&bob).is_empty());
        assert!(!registry.record_leave(&Session::new("nobody"), GameId(3)));
    }
}
