//! Debate Engine Library
//!
//! This library provides the lifecycle of a structured two-party debate:
//! - A guarded state machine from challenge to final or appealed verdict
//! - An expiry sweep that advances rounds and is safe to run concurrently
//! - A verdict engine that fans out to a judge panel and aggregates by vote
//! - An appeal pipeline that re-adjudicates while keeping the original result
//!
//! # Features
//!
//! ## Lifecycle
//! - `create_debate` / `accept_debate`: open a challenge and start round 1
//! - `submit_statement`: one statement per participant per round
//! - `sweep_expired_rounds`: advance or end every resolved round
//!
//! ## Judging
//! - `drain_pending_verdicts`: adjudicate ended debates still without a verdict
//! - `verdicts`: verdict rows grouped by adjudication pass
//!
//! ## Appeals
//! - `request_appeal`: participant appeal, quota and ceiling checked
//! - `process_appeals` / `retrigger_appeal`: run appeal passes, reclaim stuck ones
//! - `deny_appeal`: policy rejection before adjudication
//!
//! # Usage
//!
//! ```ignore
//! let engine = DebateEngine::new(
//!     MemoryStore::new().shared(),
//!     adjudicator,
//!     panel,
//!     Arc::new(SystemClock),
//!     EngineConfig::from_env(),
//!     Arc::new(MonthlyAppealQuota::new(3)),
//! );
//! let summary = engine.sweep_expired_rounds().await;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod appeal;
pub mod clock;
pub mod config;
pub mod debate;
pub mod error;
pub mod events;
pub mod judging;
pub mod service;
pub mod state;
pub mod sweep;

// Re-export the facade
pub use service::{DebateEngine, VerdictSheet};

// Re-export key debate types
pub use debate::{
    AppealStatus, Debate, DebateId, DebateState, DebateStatus, JudgeId, NewDebate, Position, Side,
    Statement, StatementId, UserId, Visibility,
};

// Re-export error and config types
pub use config::{AdjudicationMode, ConfigError, EngineConfig};
pub use error::{EngineError, EngineResult, Ineligibility};

// Re-export clock types
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};

// Re-export key judging types
pub use judging::{
    AdjudicationRequest, Adjudicator, AdjudicatorError, Decision, Judge, JudgePanel, JudgeRuling,
    SharedAdjudicator, Verdict,
};

// Re-export appeal types
pub use appeal::{
    AppealOutcome, AppealQuota, AppealState, AppealSummary, MonthlyAppealQuota, SharedQuota,
    UnlimitedQuota,
};

// Re-export sweep types
pub use sweep::{ItemError, SweepSummary};

// Re-export key state types
pub use state::{CasOutcome, DebateStore, MemoryStore, SharedStore, StoreError, VerdictWrite};
#[cfg(feature = "persistent")]
pub use state::StateStore;

// Re-export key event types
pub use events::{DebateEvent, EventBus, EventFilter, EventHistory, SharedEventBus};
