//! Storage seam for debates, statements, verdicts and event history
//!
//! Debate rows are the unit of contention. Every mutation of an existing
//! debate goes through [`DebateStore::compare_and_swap_debate`], a single
//! conditional write with the expected [`LifecycleStamp`] embedded in it.
//! Statements and verdicts are append-only: they are only ever inserted
//! if absent, never updated, and each insert is predicated on the owning
//! debate under the same lock as the conditional write.

use std::sync::Arc;

use crate::debate::{Debate, DebateId, DebateStatus, LifecycleStamp, Statement};
use crate::events::DebateEvent;
use crate::judging::Verdict;

/// Error type for state store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[cfg(feature = "persistent")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Key already exists: {0}")]
    Duplicate(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Round closed: {0}")]
    RoundClosed(String),

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),
}

/// Result type for state store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared reference to a debate store
pub type SharedStore = Arc<dyn DebateStore>;

/// Outcome of a conditional debate write.
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// The write was applied. Carries the stored version, revision bumped.
    Swapped(Debate),
    /// The stored version no longer matches the expectation. Carries the
    /// current version, or `None` if the debate is gone.
    Conflict(Option<Debate>),
}

impl CasOutcome {
    pub fn is_swapped(&self) -> bool {
        matches!(self, CasOutcome::Swapped(_))
    }
}

/// Outcome of a verdict insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictWrite {
    /// Stored; the owning debate's revision was bumped.
    Inserted,
    /// The judge already has a verdict for the pass.
    Exists,
    /// The pass no longer takes verdicts (decided, superseded, denied or
    /// the debate is gone). Nothing was written.
    PassClosed,
}

/// Persistence for the debate engine.
///
/// Implementations must make `compare_and_swap_debate`, `delete_debate_if`,
/// `insert_statement` and `insert_verdict` atomic with respect to each
/// other and to themselves: two concurrent callers with the same
/// expectation or key can never both succeed, and an insert never lands
/// against a debate version other than the one it was checked against.
pub trait DebateStore: Send + Sync {
    /// Insert a new debate. Fails with [`StoreError::Duplicate`] if the id exists.
    fn insert_debate(&self, debate: &Debate) -> StoreResult<()>;

    fn get_debate(&self, debate_id: &DebateId) -> StoreResult<Option<Debate>>;

    /// All debates whose status is one of `statuses`.
    fn debates_with_status(&self, statuses: &[DebateStatus]) -> StoreResult<Vec<Debate>>;

    /// Replace the stored debate with `next` iff its current stamp equals
    /// `expected`. The store assigns `next.revision`.
    fn compare_and_swap_debate(
        &self,
        expected: &LifecycleStamp,
        next: &Debate,
    ) -> StoreResult<CasOutcome>;

    /// Remove a debate together with its statements and verdicts iff its
    /// current stamp equals `expected`. `Swapped` carries the removed
    /// version.
    fn delete_debate_if(
        &self,
        debate_id: &DebateId,
        expected: &LifecycleStamp,
    ) -> StoreResult<CasOutcome>;

    /// Insert a statement unless one exists for (debate, author, round).
    ///
    /// Fails with [`StoreError::RoundClosed`] unless the debate is ACTIVE,
    /// on `statement.round`, and its deadline is after
    /// `statement.created_at`.
    fn insert_statement(&self, statement: &Statement) -> StoreResult<()>;

    /// Statements of a debate, ordered by round then creation time.
    fn statements_for(&self, debate_id: &DebateId) -> StoreResult<Vec<Statement>>;

    /// Insert a verdict unless one exists for (debate, pass, judge) or the
    /// pass is closed (see [`Debate::accepts_verdicts`]).
    ///
    /// A successful insert bumps the debate's revision, so a decision
    /// aggregated from an older set of verdicts loses its conditional write.
    fn insert_verdict(&self, verdict: &Verdict) -> StoreResult<VerdictWrite>;

    /// Every verdict of a debate, ordered by pass.
    fn verdicts_for(&self, debate_id: &DebateId) -> StoreResult<Vec<Verdict>>;

    /// Verdicts of one adjudication pass.
    fn verdicts_for_pass(&self, debate_id: &DebateId, pass: u32) -> StoreResult<Vec<Verdict>> {
        Ok(self
            .verdicts_for(debate_id)?
            .into_iter()
            .filter(|v| v.pass == pass)
            .collect())
    }

    /// Store an event in the history.
    fn put_event(&self, timestamp_nanos: i64, event_id: &str, event: &DebateEvent)
        -> StoreResult<()>;

    /// Events with `start_nanos <= timestamp <= end_nanos`, oldest first.
    fn events_between(&self, start_nanos: i64, end_nanos: i64)
        -> StoreResult<Vec<(i64, DebateEvent)>>;

    /// Delete events older than `timestamp_nanos`. Returns the number removed.
    fn prune_events_before(&self, timestamp_nanos: i64) -> StoreResult<usize>;
}

/// Decide a conditional write against the currently stored version.
///
/// Returns `Ok(Some(stored))` with the revision-bumped value to write,
/// `Ok(None)` on a stamp mismatch, and an integrity error for writes no
/// expectation could make legal.
pub(crate) fn prepare_swap(
    current: &Debate,
    expected: &LifecycleStamp,
    next: &Debate,
) -> StoreResult<Option<Debate>> {
    if current.stamp() != *expected {
        return Ok(None);
    }
    if next.id != current.id {
        return Err(StoreError::Integrity(format!(
            "swap of debate {} with value for {}",
            current.id, next.id
        )));
    }
    if current.original_winner.is_set() && next.original_winner != current.original_winner {
        return Err(StoreError::Integrity(format!(
            "original winner of debate {} is already set",
            current.id
        )));
    }
    if next.current_round < current.current_round {
        return Err(StoreError::Integrity(format!(
            "debate {} round would move back from {} to {}",
            current.id, current.current_round, next.current_round
        )));
    }

    let mut stored = next.clone();
    stored.revision = current.revision + 1;
    Ok(Some(stored))
}

/// Check a statement against the stored debate it belongs to.
pub(crate) fn check_statement(current: Option<&Debate>, statement: &Statement) -> StoreResult<()> {
    let Some(debate) = current else {
        return Err(StoreError::NotFound(statement.debate_id.to_string()));
    };
    if !debate.accepts_statement(statement.round, statement.created_at) {
        return Err(StoreError::RoundClosed(format!(
            "debate {} is {} on round {}, statement is for round {}",
            debate.id, debate.status, debate.current_round, statement.round
        )));
    }
    Ok(())
}

/// The debate version to store alongside an accepted verdict, or `None`
/// when its pass is closed.
pub(crate) fn prepare_verdict(current: Option<&Debate>, verdict: &Verdict) -> Option<Debate> {
    let debate = current?;
    if !debate.accepts_verdicts(verdict.pass) {
        return None;
    }
    let mut stored = debate.clone();
    stored.revision += 1;
    Some(stored)
}
