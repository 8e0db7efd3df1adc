use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::GameError;
use crate::models::board::{Board, CellPosition};
use crate::models::rules::{RuleVariant, TerminalRule, Verdict};
use crate::models::session::Session;

pub const MAX_BOARD_SIDE: u32 = 64;
pub const MAX_CAPACITY: u8 = 16;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Pending,
    InProgress,
    Finished,
    Abandoned,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Abandoned)
    }
}

// Who moves first once the game starts
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FirstTurn {
    #[default]
    FirstJoined,
    Random,
}

// Settings captured when the game is created. They never change afterwards.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct GameSettings {
    pub rows: u32,
    pub cols: u32,
    /// Maximum number of participants.
    pub capacity: u8,
    /// Participants needed to start; defaults to `capacity`.
    pub min_players: Option<u8>,
    pub rule: RuleVariant,
    /// Total number of moves after which the game finishes without a winner.
    pub move_budget: Option<u32>,
    pub first_turn: FirstTurn,
    /// When non-empty, only these sessions may join.
    pub invitees: Vec<Session>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            rows: 3,
            cols: 3,
            capacity: 2,
            min_players: None,
            rule: RuleVariant::default(),
            move_budget: None,
            first_turn: FirstTurn::default(),
            invitees: Vec::new(),
        }
    }
}

impl GameSettings {
    pub fn min_players(&self) -> u8 {
        self.min_players.unwrap_or(self.capacity)
    }

    pub fn is_invite_only(&self) -> bool {
        !self.invitees.is_empty()
    }

    /// Checks the combination of settings and builds the terminal rule they name.
    pub fn validate(&self) -> Result<Arc<dyn TerminalRule>, GameError> {
        if !(1..=MAX_BOARD_SIDE).contains(&self.rows) || !(1..=MAX_BOARD_SIDE).contains(&self.cols) {
            return Err(GameError::Unsupported(format!(
                "board of {}x{} (each side must be 1..={MAX_BOARD_SIDE})",
                self.rows, self.cols
            )));
        }
        if !(1..=MAX_CAPACITY).contains(&self.capacity) {
            return Err(GameError::Unsupported(format!(
                "capacity of {} (must be 1..={MAX_CAPACITY})",
                self.capacity
            )));
        }
        let min = self.min_players();
        if min == 0 || min > self.capacity {
            return Err(GameError::Unsupported(format!(
                "{min} players to start a game for {}",
                self.capacity
            )));
        }
        self.rule.build(self.rows, self.cols)
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Game {
    id: GameId,
    settings: GameSettings,
    board: Board,
    participants: Vec<Session>,
    /// Index into `participants` of the turn holder. Meaningful only while in progress.
    turn: usize,
    state: LifecycleState,
    winner: Option<Session>,
    moves: u32,
    created_by: Session,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    #[serde(skip)]
    rule: Arc<dyn TerminalRule>,
}

impl Game {
    pub fn new(
        id: GameId,
        settings: GameSettings,
        created_by: Session,
        rule: Arc<dyn TerminalRule>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            board: Board::new(settings.rows, settings.cols),
            settings,
            participants: Vec::new(),
            turn: 0,
            state: LifecycleState::Pending,
            winner: None,
            moves: 0,
            created_by,
            created_at: now,
            last_activity: now,
            rule,
        }
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn participants(&self) -> &[Session] {
        &self.participants
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn winner(&self) -> Option<&Session> {
        self.winner.as_ref()
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn created_by(&self) -> &Session {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn is_participant(&self, session: &Session) -> bool {
        self.participants.contains(session)
    }

    pub fn turn_holder(&self) -> Option<&Session> {
        match self.state {
            LifecycleState::InProgress => self.participants.get(self.turn),
            _ => None,
        }
    }

    /// Whether the game shows up for `session`: open games for everybody, invite-only
    /// games for the creator, invitees and participants.
    pub fn is_visible_to(&self, session: &Session) -> bool {
        !self.settings.is_invite_only()
            || self.created_by == *session
            || self.settings.invitees.contains(session)
            || self.is_participant(session)
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn join(&mut self, session: &Session) -> Result<(), GameError> {
        if self.state.is_terminal() {
            return Err(GameError::GameNotInProgress(self.state));
        }
        if self.is_participant(session) {
            return Err(GameError::AlreadyJoined);
        }
        if self.settings.is_invite_only() && !self.settings.invitees.contains(session) {
            return Err(GameError::NotInvited);
        }
        if self.participants.len() >= self.settings.capacity as usize {
            return Err(GameError::CapacityExceeded {
                capacity: self.settings.capacity,
            });
        }

        self.participants.push(session.clone());
        self.touch();

        if self.state == LifecycleState::Pending
            && self.participants.len() >= self.settings.min_players() as usize
        {
            self.turn = match self.settings.first_turn {
                FirstTurn::FirstJoined => 0,
                FirstTurn::Random => rand::thread_rng().gen_range(0..self.participants.len()),
            };
            self.state = LifecycleState::InProgress;
        }
        Ok(())
    }

    /// Removes `session` from the game. On a game that already ended only the
    /// membership is released.
    pub fn leave(&mut self, session: &Session) -> Result<(), GameError> {
        let idx = self
            .participants
            .iter()
            .position(|p| p == session)
            .ok_or(GameError::NotAParticipant)?;
        self.participants.remove(idx);
        self.touch();

        if self.state.is_terminal() {
            return Ok(());
        }
        if self.participants.is_empty() {
            self.state = LifecycleState::Abandoned;
            self.turn = 0;
            return Ok(());
        }
        if self.state == LifecycleState::InProgress {
            if idx < self.turn {
                self.turn -= 1;
            } else if self.turn >= self.participants.len() {
                // the last participant in turn order left while holding the turn
                self.turn = 0;
            }
        }
        Ok(())
    }

    /// Applies a move by `session` and returns the state the game is in afterwards.
    pub fn apply_move(
        &mut self,
        session: &Session,
        pos: CellPosition,
    ) -> Result<LifecycleState, GameError> {
        if self.state != LifecycleState::InProgress {
            return Err(GameError::GameNotInProgress(self.state));
        }
        if !self.is_participant(session) {
            return Err(GameError::NotAParticipant);
        }
        if self.participants.get(self.turn) != Some(session) {
            return Err(GameError::NotYourTurn);
        }
        if !self.board.contains(pos) {
            return Err(GameError::InvalidPosition(pos));
        }
        if !self.board.occupy(pos, session.clone()) {
            return Err(GameError::CellOccupied(pos));
        }
        self.moves += 1;
        self.touch();

        match self.rule.evaluate(&self.board) {
            Verdict::Won(winner) => self.finish(Some(winner)),
            Verdict::Drawn => self.finish(None),
            Verdict::Ongoing => match self.settings.move_budget {
                Some(budget) if self.moves >= budget => self.finish(None),
                _ => self.turn = (self.turn + 1) % self.participants.len(),
            },
        }
        Ok(self.state)
    }

    fn finish(&mut self, winner: Option<Session>) {
        self.winner = winner;
        self.state = LifecycleState::Finished;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(name: &str) -> Session {
        Session::new(name)
    }

    fn game_with(settings: GameSettings) -> Game {
        let rule = settings.validate().unwrap();
        Game::new(GameId(1), settings, s("creator"), rule)
    }

    fn two_by_two() -> Game {
        game_with(GameSettings {
            rows: 2,
            cols: 2,
            capacity: 2,
            ..Default::default()
        })
    }

    #[test]
    fn joins_never_exceed_capacity() {
        let mut game = game_with(GameSettings {
            capacity: 3,
            min_players: Some(1),
            ..Default::default()
        });
        for name in ["a", "b", "c"] {
            game.join(&s(name)).unwrap();
            assert!(game.participants().len() <= 3);
        }
        assert_eq!(
            game.join(&s("d")),
            Err(GameError::CapacityExceeded { capacity: 3 })
        );
        assert_eq!(game.participants().len(), 3);
    }

    #[test]
    fn joining_twice_is_rejected() {
        let mut game = two_by_two();
        game.join(&s("a")).unwrap();
        assert_eq!(game.join(&s("a")), Err(GameError::AlreadyJoined));
    }

    #[test]
    fn game_starts_when_minimum_is_reached() {
        let mut game = two_by_two();
        game.join(&s("a")).unwrap();
        assert_eq!(game.state(), LifecycleState::Pending);
        assert_eq!(game.turn_holder(), None);
        game.join(&s("b")).unwrap();
        assert_eq!(game.state(), LifecycleState::InProgress);
        assert_eq!(game.turn_holder(), Some(&s("a")));
    }

    #[test]
    fn moves_in_a_pending_game_are_rejected() {
        let mut game = two_by_two();
        game.join(&s("a")).unwrap();
        assert_eq!(
            game.apply_move(&s("a"), CellPosition::new(0, 0)),
            Err(GameError::GameNotInProgress(LifecycleState::Pending))
        );
    }

    #[test]
    fn turns_alternate() {
        let mut game = two_by_two();
        game.join(&s("a")).unwrap();
        game.join(&s("b")).unwrap();
        game.apply_move(&s("a"), CellPosition::new(0, 0)).unwrap();
        assert_eq!(
            game.apply_move(&s("a"), CellPosition::new(0, 1)),
            Err(GameError::NotYourTurn)
        );
        game.apply_move(&s("b"), CellPosition::new(1, 1)).unwrap();
        game.apply_move(&s("a"), CellPosition::new(0, 1)).unwrap();
    }

    #[test]
    fn accepted_move_occupies_the_cell_once() {
        let mut game = two_by_two();
        game.join(&s("a")).unwrap();
        game.join(&s("b")).unwrap();
        let pos = CellPosition::new(0, 0);
        assert!(!game.board().is_occupied(pos));
        game.apply_move(&s("a"), pos).unwrap();
        assert_eq!(game.board().owner(pos), Some(&s("a")));
        assert_eq!(
            game.apply_move(&s("b"), pos),
            Err(GameError::CellOccupied(pos))
        );
        assert_eq!(
            game.apply_move(&s("b"), CellPosition::new(2, 0)),
            Err(GameError::InvalidPosition(CellPosition::new(2, 0)))
        );
        assert_eq!(
            game.apply_move(&s("mallory"), CellPosition::new(1, 0)),
            Err(GameError::NotAParticipant)
        );
    }

    #[test]
    fn full_board_finishes_and_freezes_the_game() {
        let mut game = two_by_two();
        game.join(&s("a")).unwrap();
        game.join(&s("b")).unwrap();
        game.apply_move(&s("a"), CellPosition::new(0, 0)).unwrap();
        game.apply_move(&s("b"), CellPosition::new(0, 1)).unwrap();
        game.apply_move(&s("a"), CellPosition::new(1, 0)).unwrap();
        let state = game.apply_move(&s("b"), CellPosition::new(1, 1)).unwrap();
        assert_eq!(state, LifecycleState::Finished);
        assert_eq!(game.winner(), None);
        assert_eq!(
            game.join(&s("c")),
            Err(GameError::GameNotInProgress(LifecycleState::Finished))
        );
    }

    #[test]
    fn line_of_three_wins() {
        let mut game = game_with(GameSettings {
            rule: RuleVariant::InARow { length: 3 },
            ..Default::default()
        });
        game.join(&s("a")).unwrap();
        game.join(&s("b")).unwrap();
        for (who, row, col) in [("a", 0, 0), ("b", 1, 0), ("a", 0, 1), ("b", 1, 1)] {
            game.apply_move(&s(who), CellPosition::new(row, col)).unwrap();
        }
        let state = game.apply_move(&s("a"), CellPosition::new(0, 2)).unwrap();
        assert_eq!(state, LifecycleState::Finished);
        assert_eq!(game.winner(), Some(&s("a")));
    }

    #[test]
    fn exhausted_move_budget_finishes_the_game() {
        let mut game = game_with(GameSettings {
            move_budget: Some(1),
            ..Default::default()
        });
        game.join(&s("a")).unwrap();
        game.join(&s("b")).unwrap();
        let state = game.apply_move(&s("a"), CellPosition::new(1, 1)).unwrap();
        assert_eq!(state, LifecycleState::Finished);
    }

    #[test]
    fn turn_passes_on_when_holder_leaves() {
        let mut game = game_with(GameSettings {
            capacity: 3,
            ..Default::default()
        });
        for name in ["a", "b", "c"] {
            game.join(&s(name)).unwrap();
        }
        game.apply_move(&s("a"), CellPosition::new(0, 0)).unwrap();
        game.apply_move(&s("b"), CellPosition::new(0, 1)).unwrap();
        assert_eq!(game.turn_holder(), Some(&s("c")));
        game.leave(&s("c")).unwrap();
        assert_eq!(game.turn_holder(), Some(&s("a")));
        game.leave(&s("a")).unwrap();
        assert_eq!(game.turn_holder(), Some(&s("b")));
    }

    #[test]
    fn leaving_before_the_turn_holder_keeps_the_turn() {
        let mut game = game_with(GameSettings {
            capacity: 3,
            ..Default::default()
        });
        for name in ["a", "b", "c"] {
            game.join(&s(name)).unwrap();
        }
        game.apply_move(&s("a"), CellPosition::new(0, 0)).unwrap();
        game.leave(&s("a")).unwrap();
        assert_eq!(game.turn_holder(), Some(&s("b")));
    }

    #[test]
    fn last_leave_abandons_the_game() {
        let mut game = two_by_two();
        game.join(&s("a")).unwrap();
        assert_eq!(game.leave(&s("b")), Err(GameError::NotAParticipant));
        game.leave(&s("a")).unwrap();
        assert_eq!(game.state(), LifecycleState::Abandoned);
        assert_eq!(
            game.join(&s("a")),
            Err(GameError::GameNotInProgress(LifecycleState::Abandoned))
        );
    }

    #[test]
    fn leaving_a_finished_game_keeps_it_finished() {
        let mut game = game_with(GameSettings {
            move_budget: Some(1),
            ..Default::default()
        });
        game.join(&s("a")).unwrap();
        game.join(&s("b")).unwrap();
        game.apply_move(&s("a"), CellPosition::new(0, 0)).unwrap();
        game.leave(&s("a")).unwrap();
        game.leave(&s("b")).unwrap();
        assert_eq!(game.state(), LifecycleState::Finished);
        assert!(game.board().is_occupied(CellPosition::new(0, 0)));
    }

    #[test]
    fn invite_only_games_reject_outsiders() {
        let mut game = game_with(GameSettings {
            invitees: vec![s("a"), s("b")],
            ..Default::default()
        });
        assert_eq!(game.join(&s("c")), Err(GameError::NotInvited));
        assert!(!game.is_visible_to(&s("c")));
        assert!(game.is_visible_to(&s("creator")));
        game.join(&s("a")).unwrap();
    }

    #[test]
    fn random_first_turn_picks_a_participant() {
        let mut game = game_with(GameSettings {
            first_turn: FirstTurn::Random,
            ..Default::default()
        });
        game.join(&s("a")).unwrap();
        game.join(&s("b")).unwrap();
        let holder = game.turn_holder().cloned().unwrap();
        assert!(game.is_participant(&holder));
    }

    #[test]
    fn unsupported_settings_are_rejected() {
        let too_big = GameSettings {
            rows: MAX_BOARD_SIDE + 1,
            ..Default::default()
        };
        assert!(matches!(too_big.validate(), Err(GameError::Unsupported(_))));
        let bad_min = GameSettings {
            capacity: 2,
            min_players: Some(3),
            ..Default::default()
        };
        assert!(matches!(bad_min.validate(), Err(GameError::Unsupported(_))));
    }
}
