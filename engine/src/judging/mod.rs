//! Verdict engine
//!
//! Invokes every judge of the panel for one adjudication pass, persists
//! each verdict as it arrives, and aggregates the pass by plurality.
//!
//! # Flow
//!
//! ```text
//! Debate (ended) ──▶ AdjudicationRequest ──┬──▶ judge 1 ──▶ Verdict ─┐
//!                                          ├──▶ judge 2 ──▶ Verdict ─┼──▶ aggregate()
//!                                          └──▶ judge n ──▶ (failed) ┘
//! ```
//!
//! Pass 0 is the original judging; each appeal opens the next pass.

pub mod adjudicator;
pub mod engine;
pub mod types;
pub mod voting;

pub use adjudicator::{Adjudicator, AdjudicatorError};
pub use engine::{AdjudicationReport, SharedAdjudicator, VerdictEngine};
pub use types::{
    AdjudicationRequest, Decision, Judge, JudgePanel, JudgeRuling, Participant, TranscriptRound,
    Verdict,
};
pub use voting::{aggregate, Aggregate};
