//! Debate data model and lifecycle state machine.
//!
//! # Lifecycle
//!
//! ```text
//! Waiting ──accept──▶ Active ──final round──▶ Completed ◀──────────┐
//!                     │  ▲        │                │      (denied) │
//!                     └──┘        └─▶ VerdictReady ─┴─▶ Appealed ───┤
//!                  (next round)       (deferred)     (appeal)       │
//!                                                                   ▼
//!                                                                Resolved
//! ```
//!
//! Every change goes through one of the transition methods on [`Debate`];
//! storage applies the result with a conditional write.

pub mod state;
pub mod types;

pub use state::{AppealStatus, Debate, DebateState, DebateStatus, LifecycleStamp, TransitionError};
pub use types::{
    AlreadySet, DebateId, JudgeId, NewDebate, Position, Side, Statement, StatementId, UserId,
    VerdictId, Visibility, WriteOnce,
};
