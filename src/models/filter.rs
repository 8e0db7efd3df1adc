use serde::{Deserialize, Serialize};

use crate::errors::GameError;
use crate::models::game::{Game, LifecycleState};
use crate::models::rules::RuleVariant;
use crate::models::session::Session;

const MAX_DEPTH: usize = 8;

// Predicate used to select games for listing
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum GameFilter {
    #[default]
    All,
    State { states: Vec<LifecycleState> },
    Participant { session: Session },
    Creator { session: Session },
    /// Not ended and below capacity.
    Joinable,
    Settings(SettingsMatch),
    And { filters: Vec<GameFilter> },
    Or { filters: Vec<GameFilter> },
    Not { filter: Box<GameFilter> },
}

// Equality match on individual settings; unset fields match anything
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SettingsMatch {
    pub rows: Option<u32>,
    pub cols: Option<u32>,
    pub capacity: Option<u8>,
    pub rule: Option<RuleVariant>,
}

impl GameFilter {
    pub fn participant(session: Session) -> Self {
        Self::Participant { session }
    }

    pub fn state(state: LifecycleState) -> Self {
        Self::State {
            states: vec![state],
        }
    }

    /// Rejects filters that cannot select anything meaningful.
    pub fn validate(&self) -> Result<(), GameError> {
        self.validate_at(0)
    }

    fn validate_at(&self, depth: usize) -> Result<(), GameError> {
        if depth > MAX_DEPTH {
            return Err(GameError::Unsupported(format!(
                "filter nested deeper than {MAX_DEPTH}"
            )));
        }
        match self {
            Self::State { states } if states.is_empty() => Err(GameError::Unsupported(
                "state filter without states".to_string(),
            )),
            Self::Settings(m) if *m == SettingsMatch::default() => Err(GameError::Unsupported(
                "settings filter without fields".to_string(),
            )),
            Self::And { filters } | Self::Or { filters } => {
                if filters.is_empty() {
                    return Err(GameError::Unsupported(
                        "empty filter combination".to_string(),
                    ));
                }
                filters.iter().try_for_each(|f| f.validate_at(depth + 1))
            }
            Self::Not { filter } => filter.validate_at(depth + 1),
            _ => Ok(()),
        }
    }

    pub fn matches(&self, game: &Game) -> bool {
        match self {
            Self::All => true,
            Self::State { states } => states.contains(&game.state()),
            Self::Participant { session } => game.is_participant(session),
            Self::Creator { session } => game.created_by() == session,
            Self::Joinable => {
                !game.state().is_terminal()
                    && game.participants().len() < game.settings().capacity as usize
            }
            Self::Settings(m) => m.matches(game),
            Self::And { filters } => filters.iter().all(|f| f.matches(game)),
            Self::Or { filters } => filters.iter().any(|f| f.matches(game)),
            Self::Not { filter } => !filter.matches(game),
        }
    }
}

impl SettingsMatch {
    fn matches(&self, game: &Game) -> bool {
        let settings = game.settings();
        self.rows.map_or(true, |v| v == settings.rows)
            && self.cols.map_or(true, |v| v == settings.cols)
            && self.capacity.map_or(true, |v| v == settings.capacity)
            && self.rule.as_ref().map_or(true, |v| *v == settings.rule)
    }
}
