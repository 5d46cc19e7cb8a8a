//! Expiry sweep worker
//!
//! Advances or ends every ACTIVE debate whose round is resolved, then
//! retries adjudication for debates whose verdict is still pending.
//!
//! A sweep holds no lock across debates. Each debate is moved with one
//! conditional write predicated on the version the sweep read, so
//! overlapping sweeps can never advance the same round twice: the loser's
//! write conflicts and is counted as contended, not as an error. A sweep
//! interrupted midway leaves every debate it already moved in its new
//! state, and the next sweep picks up the rest.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::config::AdjudicationMode;
use crate::debate::{Debate, DebateId, DebateStatus, Side};
use crate::error::EngineResult;
use crate::events::{DebateEvent, SharedEventBus};
use crate::judging::VerdictEngine;
use crate::state::{CasOutcome, SharedStore};

/// Debates adjudicated concurrently in the pending-verdict phase
const ADJUDICATION_CONCURRENCY: usize = 4;

/// A per-debate failure collected during a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    /// `None` when the failure was not tied to one debate (e.g. listing).
    pub debate_id: Option<DebateId>,
    pub error: String,
}

impl ItemError {
    pub(crate) fn new(debate_id: Option<&DebateId>, error: impl ToString) -> Self {
        Self {
            debate_id: debate_id.cloned(),
            error: error.to_string(),
        }
    }
}

/// Counts for one sweep invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    /// Debates whose round was resolved (expired or both sides submitted)
    pub processed: usize,
    /// Rounds advanced
    pub advanced: usize,
    /// Debates moved past their final round
    pub completed: usize,
    /// Debates that received their original decision
    pub adjudicated: usize,
    /// Ended debates still without any verdict
    pub verdicts_pending: usize,
    /// Writes lost to a concurrent worker (benign)
    pub contended: usize,
    pub errors: Vec<ItemError>,
}

impl SweepSummary {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

enum RoundOutcome {
    Advanced,
    Ended(Debate),
    Contended,
}

enum DecisionOutcome {
    Decided,
    Pending,
    /// A concurrent worker recorded the decision first.
    Contended,
}

/// Scans for resolved rounds and pending verdicts.
pub struct ExpirySweeper {
    store: SharedStore,
    event_bus: SharedEventBus,
    verdicts: Arc<VerdictEngine>,
    clock: SharedClock,
    mode: AdjudicationMode,
}

impl ExpirySweeper {
    pub fn new(
        store: SharedStore,
        event_bus: SharedEventBus,
        verdicts: Arc<VerdictEngine>,
        clock: SharedClock,
        mode: AdjudicationMode,
    ) -> Self {
        Self {
            store,
            event_bus,
            verdicts,
            clock,
            mode,
        }
    }

    /// Run one sweep. Never fails as a whole; per-debate failures are in
    /// the summary.
    pub async fn sweep(&self) -> SweepSummary {
        let now = self.clock.now();
        let mut summary = SweepSummary::default();
        let mut ended_now = HashSet::new();

        match self.store.debates_with_status(&[DebateStatus::Active]) {
            Ok(active) => {
                for debate in active {
                    self.sweep_one(&debate, now, &mut summary, &mut ended_now);
                }
            }
            Err(e) => {
                warn!("Failed to list active debates: {}", e);
                summary.errors.push(ItemError::new(None, e));
            }
        }

        // Deferred debates that ended in this sweep wait for the next drain.
        let skip = match self.mode {
            AdjudicationMode::Inline => HashSet::new(),
            AdjudicationMode::Deferred => ended_now,
        };
        self.drain(&skip, &mut summary).await;

        info!(
            processed = summary.processed,
            advanced = summary.advanced,
            completed = summary.completed,
            adjudicated = summary.adjudicated,
            pending = summary.verdicts_pending,
            contended = summary.contended,
            errors = summary.error_count(),
            "Sweep finished"
        );
        summary
    }

    /// Adjudicate every ended debate whose verdict is still pending.
    pub async fn drain_pending_verdicts(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();
        self.drain(&HashSet::new(), &mut summary).await;
        summary
    }

    fn sweep_one(
        &self,
        debate: &Debate,
        now: DateTime<Utc>,
        summary: &mut SweepSummary,
        ended_now: &mut HashSet<DebateId>,
    ) {
        let early = if debate.is_round_due(now) {
            false
        } else {
            match self.both_submitted(debate) {
                Ok(true) => true,
                Ok(false) => return,
                Err(e) => {
                    summary.errors.push(ItemError::new(Some(&debate.id), e));
                    return;
                }
            }
        };

        summary.processed += 1;
        match self.resolve_round(debate, now, early) {
            Ok(RoundOutcome::Advanced) => summary.advanced += 1,
            Ok(RoundOutcome::Ended(stored)) => {
                summary.completed += 1;
                ended_now.insert(stored.id);
            }
            Ok(RoundOutcome::Contended) => summary.contended += 1,
            Err(e) => {
                warn!(debate_id = %debate.id, "Failed to resolve round: {}", e);
                summary.errors.push(ItemError::new(Some(&debate.id), e));
            }
        }
    }

    /// Whether both participants submitted for the current round.
    fn both_submitted(&self, debate: &Debate) -> EngineResult<bool> {
        let statements = self.store.statements_for(&debate.id)?;
        let submitted = |side: Side| {
            debate.participant(side).is_some_and(|user| {
                statements
                    .iter()
                    .any(|s| s.round == debate.current_round && s.author_id == *user)
            })
        };
        Ok(submitted(Side::Challenger) && submitted(Side::Opponent))
    }

    /// Advance or end the round with a write conditioned on `debate`'s stamp.
    ///
    /// A silent side does not hold the round open: the round advances
    /// whether one, both or neither participant submitted.
    fn resolve_round(&self, debate: &Debate, now: DateTime<Utc>, early: bool) -> EngineResult<RoundOutcome> {
        if !debate.is_final_round() {
            let next = debate.round_advanced(now)?;
            return match self.store.compare_and_swap_debate(&debate.stamp(), &next)? {
                CasOutcome::Swapped(stored) => {
                    debug!(
                        debate_id = %debate.id,
                        round = stored.current_round,
                        early,
                        "Round advanced"
                    );
                    let _ = self.event_bus.publish(DebateEvent::RoundAdvanced {
                        debate_id: stored.id.clone(),
                        from_round: debate.current_round,
                        to_round: stored.current_round,
                        round_deadline: stored.round_deadline.unwrap_or(now),
                        early,
                        timestamp: now,
                    });
                    Ok(RoundOutcome::Advanced)
                }
                CasOutcome::Conflict(_) => {
                    debug!(debate_id = %debate.id, "Round already resolved by another worker");
                    Ok(RoundOutcome::Contended)
                }
            };
        }

        let to = match self.mode {
            AdjudicationMode::Inline => DebateStatus::Completed,
            AdjudicationMode::Deferred => DebateStatus::VerdictReady,
        };
        let next = debate.ended(to, now)?;
        match self.store.compare_and_swap_debate(&debate.stamp(), &next)? {
            CasOutcome::Swapped(stored) => {
                let statements = self.store.statements_for(&stored.id)?.len() as u32;
                info!(debate_id = %stored.id, status = %stored.status, statements, early, "Debate ended");
                let _ = self.event_bus.publish(DebateEvent::DebateEnded {
                    debate_id: stored.id.clone(),
                    status: stored.status,
                    statements,
                    timestamp: now,
                });
                Ok(RoundOutcome::Ended(stored))
            }
            CasOutcome::Conflict(_) => {
                debug!(debate_id = %debate.id, "Debate already ended by another worker");
                Ok(RoundOutcome::Contended)
            }
        }
    }

    async fn drain(&self, skip: &HashSet<DebateId>, summary: &mut SweepSummary) {
        let pending: Vec<Debate> = match self
            .store
            .debates_with_status(&[DebateStatus::Completed, DebateStatus::VerdictReady])
        {
            Ok(debates) => debates
                .into_iter()
                .filter(|d| d.verdict_pending() && !skip.contains(&d.id))
                .collect(),
            Err(e) => {
                warn!("Failed to list debates awaiting verdicts: {}", e);
                summary.errors.push(ItemError::new(None, e));
                return;
            }
        };

        let results: Vec<(DebateId, EngineResult<DecisionOutcome>)> = stream::iter(pending)
            .map(|debate| async move {
                let result = self.adjudicate_original(&debate).await;
                (debate.id, result)
            })
            .buffer_unordered(ADJUDICATION_CONCURRENCY)
            .collect()
            .await;

        for (debate_id, result) in results {
            match result {
                Ok(DecisionOutcome::Decided) => summary.adjudicated += 1,
                Ok(DecisionOutcome::Pending) => summary.verdicts_pending += 1,
                Ok(DecisionOutcome::Contended) => summary.contended += 1,
                Err(e) => {
                    warn!(debate_id = %debate_id, "Adjudication failed: {}", e);
                    summary.errors.push(ItemError::new(Some(&debate_id), e));
                }
            }
        }
    }

    async fn adjudicate_original(&self, debate: &Debate) -> EngineResult<DecisionOutcome> {
        let report = self
            .verdicts
            .adjudicate(&debate.id, debate.adjudication_pass)
            .await?;
        if report.is_pending() {
            warn!(
                debate_id = %debate.id,
                failed = report.failed.len(),
                "No judge produced a verdict; debate stays pending"
            );
            return Ok(DecisionOutcome::Pending);
        }

        match self.verdicts.record_original_decision(&debate.id)? {
            Some(_) => Ok(DecisionOutcome::Decided),
            None => Ok(DecisionOutcome::Contended),
        }
    }
}
