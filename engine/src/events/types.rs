//! Event types for debate lifecycle notifications
//!
//! These events drive the pub/sub hook and are persisted for replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::debate::{DebateId, DebateStatus, JudgeId, StatementId, UserId};
use crate::judging::Decision;

/// Unique identifier for events
pub type EventId = String;

/// All debate lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DebateEvent {
    /// A challenge was created and is waiting for an opponent
    DebateCreated {
        debate_id: DebateId,
        challenger_id: UserId,
        opponent_id: Option<UserId>,
        total_rounds: u32,
        timestamp: DateTime<Utc>,
    },

    /// The opponent accepted; round 1 is open
    DebateAccepted {
        debate_id: DebateId,
        opponent_id: UserId,
        round_deadline: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// A participant submitted a statement
    StatementSubmitted {
        debate_id: DebateId,
        statement_id: StatementId,
        author_id: UserId,
        round: u32,
        timestamp: DateTime<Utc>,
    },

    /// The sweep moved a debate to its next round
    RoundAdvanced {
        debate_id: DebateId,
        from_round: u32,
        to_round: u32,
        round_deadline: DateTime<Utc>,
        /// Both sides had submitted before the deadline
        early: bool,
        timestamp: DateTime<Utc>,
    },

    /// The final round was resolved
    DebateEnded {
        debate_id: DebateId,
        status: DebateStatus,
        statements: u32,
        timestamp: DateTime<Utc>,
    },

    /// A judge's verdict was persisted
    VerdictRecorded {
        debate_id: DebateId,
        judge_id: JudgeId,
        pass: u32,
        decision: Decision,
        timestamp: DateTime<Utc>,
    },

    /// A judge call failed or timed out; the judge is left out of the vote
    JudgeFailed {
        debate_id: DebateId,
        judge_id: JudgeId,
        pass: u32,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// The original pass produced an aggregate decision
    VerdictReady {
        debate_id: DebateId,
        pass: u32,
        winner_id: Option<UserId>,
        verdicts: u32,
        timestamp: DateTime<Utc>,
    },

    /// A participant appealed the verdict
    AppealRequested {
        debate_id: DebateId,
        requested_by: UserId,
        pass: u32,
        appeal_count: u32,
        timestamp: DateTime<Utc>,
    },

    /// A worker claimed the appeal
    AppealProcessing {
        debate_id: DebateId,
        pass: u32,
        reclaimed: bool,
        timestamp: DateTime<Utc>,
    },

    /// The appeal pass produced an aggregate
    AppealResolved {
        debate_id: DebateId,
        pass: u32,
        original_winner_id: Option<UserId>,
        winner_id: Option<UserId>,
        flipped: bool,
        timestamp: DateTime<Utc>,
    },

    /// The appeal was rejected on policy grounds before adjudication
    AppealDenied {
        debate_id: DebateId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A waiting challenge was deleted by its creator
    DebateDeleted {
        debate_id: DebateId,
        deleted_by: UserId,
        timestamp: DateTime<Utc>,
    },
}

impl DebateEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DebateEvent::DebateCreated { timestamp, .. } => *timestamp,
            DebateEvent::DebateAccepted { timestamp, .. } => *timestamp,
            DebateEvent::StatementSubmitted { timestamp, .. } => *timestamp,
            DebateEvent::RoundAdvanced { timestamp, .. } => *timestamp,
            DebateEvent::DebateEnded { timestamp, .. } => *timestamp,
            DebateEvent::VerdictRecorded { timestamp, .. } => *timestamp,
            DebateEvent::JudgeFailed { timestamp, .. } => *timestamp,
            DebateEvent::VerdictReady { timestamp, .. } => *timestamp,
            DebateEvent::AppealRequested { timestamp, .. } => *timestamp,
            DebateEvent::AppealProcessing { timestamp, .. } => *timestamp,
            DebateEvent::AppealResolved { timestamp, .. } => *timestamp,
            DebateEvent::AppealDenied { timestamp, .. } => *timestamp,
            DebateEvent::DebateDeleted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            DebateEvent::DebateCreated { .. } => "debate_created",
            DebateEvent::DebateAccepted { .. } => "debate_accepted",
            DebateEvent::StatementSubmitted { .. } => "statement_submitted",
            DebateEvent::RoundAdvanced { .. } => "round_advanced",
            DebateEvent::DebateEnded { .. } => "debate_ended",
            DebateEvent::VerdictRecorded { .. } => "verdict_recorded",
            DebateEvent::JudgeFailed { .. } => "judge_failed",
            DebateEvent::VerdictReady { .. } => "verdict_ready",
            DebateEvent::AppealRequested { .. } => "appeal_requested",
            DebateEvent::AppealProcessing { .. } => "appeal_processing",
            DebateEvent::AppealResolved { .. } => "appeal_resolved",
            DebateEvent::AppealDenied { .. } => "appeal_denied",
            DebateEvent::DebateDeleted { .. } => "debate_deleted",
        }
    }

    /// The debate this event concerns
    pub fn debate_id(&self) -> &DebateId {
        match self {
            DebateEvent::DebateCreated { debate_id, .. }
            | DebateEvent::DebateAccepted { debate_id, .. }
            | DebateEvent::StatementSubmitted { debate_id, .. }
            | DebateEvent::RoundAdvanced { debate_id, .. }
            | DebateEvent::DebateEnded { debate_id, .. }
            | DebateEvent::VerdictRecorded { debate_id, .. }
            | DebateEvent::JudgeFailed { debate_id, .. }
            | DebateEvent::VerdictReady { debate_id, .. }
            | DebateEvent::AppealRequested { debate_id, .. }
            | DebateEvent::AppealProcessing { debate_id, .. }
            | DebateEvent::AppealResolved { debate_id, .. }
            | DebateEvent::AppealDenied { debate_id, .. }
            | DebateEvent::DebateDeleted { debate_id, .. } => debate_id,
        }
    }

    /// Whether this is one of the transitions the notification system fans out
    pub fn is_notification(&self) -> bool {
        matches!(
            self,
            DebateEvent::DebateAccepted { .. }
                | DebateEvent::RoundAdvanced { .. }
                | DebateEvent::DebateEnded { .. }
                | DebateEvent::VerdictReady { .. }
                | DebateEvent::AppealResolved { .. }
                | DebateEvent::AppealDenied { .. }
        )
    }

    /// Create a new unique event ID
    pub fn new_id() -> EventId {
        uuid::Uuid::new_v4().to_string()
    }
}
