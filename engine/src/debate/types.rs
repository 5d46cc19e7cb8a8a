//! Identifiers, positions and the small value types shared by the debate
//! aggregate, statements and verdicts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a debate.
    DebateId
);
string_id!(
    /// Identifier of a platform user (participant or appellant).
    UserId
);
string_id!(
    /// Identifier of a judge persona.
    JudgeId
);
string_id!(
    /// Identifier of a submitted statement.
    StatementId
);
string_id!(
    /// Identifier of a persisted verdict.
    VerdictId
);

/// Stance a participant argues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    For,
    Against,
}

impl Position {
    /// The stance the other participant takes.
    pub fn opposite(self) -> Self {
        match self {
            Self::For => Self::Against,
            Self::Against => Self::For,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::For => write!(f, "for"),
            Self::Against => write!(f, "against"),
        }
    }
}

/// Which seat a participant occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Challenger,
    Opponent,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Challenger => write!(f, "challenger"),
            Self::Opponent => write!(f, "opponent"),
        }
    }
}

/// Who may read the debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
}

/// Error returned when a [`WriteOnce`] cell is written a second time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("write-once value is already set")]
pub struct AlreadySet;

/// A cell that accepts exactly one write.
///
/// There is no way to clear or replace the value once set; the only
/// mutator is [`WriteOnce::set`], which fails on the second call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOnce<T>(Option<T>);

impl<T> WriteOnce<T> {
    /// An unset cell.
    pub fn new() -> Self {
        Self(None)
    }

    /// The stored value, if set.
    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    /// Whether the cell has been written.
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Store `value` unless the cell is already set.
    pub fn set(&mut self, value: T) -> Result<(), AlreadySet> {
        if self.0.is_some() {
            return Err(AlreadySet);
        }
        self.0 = Some(value);
        Ok(())
    }
}

impl<T> Default for WriteOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A challenge request handed to the engine by a collaborator flow
/// (direct challenge, belt challenge, tournament match, daily challenge).
#[derive(Debug, Clone)]
pub struct NewDebate {
    pub topic: String,
    pub category: String,
    pub challenger_id: UserId,
    pub challenger_position: Position,
    /// Pre-bound opponent; `None` for an open challenge.
    pub opponent_id: Option<UserId>,
    pub total_rounds: u32,
    pub round_duration: Duration,
    pub visibility: Visibility,
}

/// One participant's submission for one round. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub id: StatementId,
    pub debate_id: DebateId,
    pub author_id: UserId,
    pub round: u32,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Statement {
    pub fn new(
        debate_id: DebateId,
        author_id: UserId,
        round: u32,
        content: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: StatementId::generate(),
            debate_id,
            author_id,
            round,
            content,
            created_at,
        }
    }
}
