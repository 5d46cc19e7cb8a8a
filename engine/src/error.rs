//! Caller-facing errors of the debate engine.
//!
//! Single-debate operations fail fast with one of these; batch operations
//! (sweep, appeal processing) collect them per debate into their summaries.

use crate::debate::{DebateId, TransitionError, UserId};
use crate::state::StoreError;

/// Why a debate cannot be appealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Ineligibility {
    #[error("debate has not finished")]
    DebateNotFinished,

    #[error("verdict is still pending")]
    VerdictPending,

    #[error("requester is not a participant")]
    NotParticipant,

    #[error("debate has reached its appeal limit")]
    AppealLimitReached,
}

/// Error type for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("debate not found: {0}")]
    DebateNotFound(DebateId),

    #[error("round {round} is closed: {reason}")]
    RoundClosed { round: u32, reason: String },

    #[error("statement for round {round} already submitted by {author_id}")]
    DuplicateSubmission { author_id: UserId, round: u32 },

    #[error("{0} is not a participant of this debate")]
    NotParticipant(UserId),

    #[error("not eligible for appeal: {0}")]
    NotEligible(Ineligibility),

    #[error("monthly appeal quota exceeded for {0}")]
    QuotaExceeded(UserId),

    #[error("debate {0} is already under appeal or resolved")]
    AlreadyAppealed(DebateId),

    #[error("debate {0} has no open appeal")]
    NoOpenAppeal(DebateId),

    #[error("invalid debate: {0}")]
    InvalidDebate(String),

    #[error("invalid statement: {0}")]
    InvalidStatement(String),

    #[error("not allowed: {0}")]
    NotAllowed(String),

    #[error("debate {0} was modified concurrently")]
    ConcurrentModification(DebateId),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Precondition failures never mutate state and are safe to show users.
    pub fn is_precondition(&self) -> bool {
        !matches!(
            self,
            EngineError::Store(_) | EngineError::ConcurrentModification(_)
        )
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
