//! Verdict engine: fan out to the judge panel, persist, aggregate
//!
//! One invocation covers one adjudication pass of one debate. It is safe
//! to re-run for the same pass at any time: judges that already have a
//! verdict for the pass are not called again, and verdict inserts are
//! insert-if-absent, so overlapping invocations never duplicate a row.
//!
//! A pass stops taking verdicts the moment its aggregate is applied to the
//! debate. A judge that answers later is discarded, so the applied winner
//! always equals the aggregate of the stored rows.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::adjudicator::{Adjudicator, AdjudicatorError};
use super::types::{AdjudicationRequest, Judge, JudgePanel, Verdict};
use super::voting::{aggregate, Aggregate};
use crate::clock::SharedClock;
use crate::debate::{Debate, DebateId, JudgeId};
use crate::error::{EngineError, EngineResult};
use crate::events::{DebateEvent, SharedEventBus};
use crate::state::{CasOutcome, SharedStore, VerdictWrite};

/// Shared reference to an adjudicator
pub type SharedAdjudicator = Arc<dyn Adjudicator>;

/// Conditional-write attempts before giving up on a contended debate
const MAX_DECISION_ATTEMPTS: usize = 3;

/// What happened to each judge during one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjudicationReport {
    pub debate_id: DebateId,
    pub pass: u32,
    /// Judges whose verdict this invocation persisted
    pub produced: Vec<JudgeId>,
    /// Judges that already had a verdict for the pass
    pub reused: Vec<JudgeId>,
    /// Judges whose call failed, with the reason
    pub failed: Vec<(JudgeId, String)>,
    /// Judges that answered after the pass had closed
    pub discarded: Vec<JudgeId>,
    /// Aggregate over every verdict of the pass; `None` while it has none
    pub aggregate: Option<Aggregate>,
}

impl AdjudicationReport {
    /// No verdict exists for the pass yet.
    pub fn is_pending(&self) -> bool {
        self.aggregate.is_none()
    }
}

enum JudgeOutcome {
    Produced(JudgeId),
    Reused(JudgeId),
    Failed(JudgeId, String),
    Discarded(JudgeId),
}

/// Invokes the judge panel for one adjudication pass.
pub struct VerdictEngine {
    store: SharedStore,
    event_bus: SharedEventBus,
    adjudicator: SharedAdjudicator,
    panel: JudgePanel,
    clock: SharedClock,
    judge_timeout: Duration,
}

impl VerdictEngine {
    pub fn new(
        store: SharedStore,
        event_bus: SharedEventBus,
        adjudicator: SharedAdjudicator,
        panel: JudgePanel,
        clock: SharedClock,
        judge_timeout: Duration,
    ) -> Self {
        Self {
            store,
            event_bus,
            adjudicator,
            panel,
            clock,
            judge_timeout,
        }
    }

    pub fn panel(&self) -> &JudgePanel {
        &self.panel
    }

    /// Produce the missing verdicts of `pass` and aggregate the pass.
    pub async fn adjudicate(&self, debate_id: &DebateId, pass: u32) -> EngineResult<AdjudicationReport> {
        let debate = self
            .store
            .get_debate(debate_id)?
            .ok_or_else(|| EngineError::DebateNotFound(debate_id.clone()))?;

        if !debate.status.has_ended() {
            return Err(EngineError::NotAllowed(format!(
                "debate {} is {} and cannot be adjudicated",
                debate_id, debate.status
            )));
        }
        if pass != debate.adjudication_pass {
            return Err(EngineError::NotAllowed(format!(
                "pass {} is not the current pass {} of debate {}",
                pass, debate.adjudication_pass, debate_id
            )));
        }

        let existing = self.store.verdicts_for_pass(debate_id, pass)?;
        let missing = self.panel.missing_from(&existing);

        let mut report = AdjudicationReport {
            debate_id: debate_id.clone(),
            pass,
            produced: Vec::new(),
            reused: existing.iter().map(|v| v.judge_id.clone()).collect(),
            failed: Vec::new(),
            discarded: Vec::new(),
            aggregate: None,
        };

        if !debate.accepts_verdicts(pass) {
            debug!(debate_id = %debate_id, pass, "Pass is closed; not invoking judges");
        } else if !missing.is_empty() {
            let statements = self.store.statements_for(debate_id)?;
            let request = AdjudicationRequest::build(&debate, &statements, pass).ok_or_else(|| {
                EngineError::InvalidDebate(format!("debate {} has no opponent", debate_id))
            })?;

            if request.is_silent() {
                info!(debate_id = %debate_id, pass, "Adjudicating a debate with no statements");
            }
            info!(
                debate_id = %debate_id,
                pass,
                judges = missing.len(),
                already = report.reused.len(),
                "Invoking judges"
            );

            let outcomes = join_all(
                missing
                    .iter()
                    .map(|judge| self.run_judge(&debate, judge, &request)),
            )
            .await;

            for outcome in outcomes {
                match outcome {
                    JudgeOutcome::Produced(id) => report.produced.push(id),
                    JudgeOutcome::Reused(id) => report.reused.push(id),
                    JudgeOutcome::Failed(id, reason) => report.failed.push((id, reason)),
                    JudgeOutcome::Discarded(id) => report.discarded.push(id),
                }
            }
        }

        let verdicts = self.store.verdicts_for_pass(debate_id, pass)?;
        report.aggregate = aggregate(&verdicts);

        debug!(
            debate_id = %debate_id,
            pass,
            produced = report.produced.len(),
            failed = report.failed.len(),
            pending = report.is_pending(),
            "Adjudication pass finished"
        );
        Ok(report)
    }

    /// Call one judge under the timeout and persist its verdict on return.
    async fn run_judge(&self, debate: &Debate, judge: &Judge, request: &AdjudicationRequest) -> JudgeOutcome {
        let pass = request.pass;
        let result = match tokio::time::timeout(
            self.judge_timeout,
            self.adjudicator.score(judge, request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AdjudicatorError::Timeout(self.judge_timeout)),
        };

        let now = self.clock.now();
        let ruling = match result {
            Ok(ruling) => ruling,
            Err(e) => {
                warn!(debate_id = %debate.id, judge = %judge.id, pass, "Judge failed: {}", e);
                let _ = self.event_bus.publish(DebateEvent::JudgeFailed {
                    debate_id: debate.id.clone(),
                    judge_id: judge.id.clone(),
                    pass,
                    error: e.to_string(),
                    timestamp: now,
                });
                return JudgeOutcome::Failed(judge.id.clone(), e.to_string());
            }
        };

        let verdict = Verdict::from_ruling(debate, &judge.id, pass, ruling, now);
        match self.store.insert_verdict(&verdict) {
            Ok(VerdictWrite::Inserted) => {
                debug!(debate_id = %debate.id, judge = %judge.id, pass, decision = %verdict.decision, "Verdict persisted");
                let _ = self.event_bus.publish(DebateEvent::VerdictRecorded {
                    debate_id: debate.id.clone(),
                    judge_id: judge.id.clone(),
                    pass,
                    decision: verdict.decision,
                    timestamp: now,
                });
                JudgeOutcome::Produced(judge.id.clone())
            }
            // Another invocation persisted this judge first.
            Ok(VerdictWrite::Exists) => JudgeOutcome::Reused(judge.id.clone()),
            Ok(VerdictWrite::PassClosed) => {
                debug!(debate_id = %debate.id, judge = %judge.id, pass, "Pass closed before the verdict arrived; discarded");
                JudgeOutcome::Discarded(judge.id.clone())
            }
            Err(e) => {
                warn!(debate_id = %debate.id, judge = %judge.id, pass, "Failed to persist verdict: {}", e);
                JudgeOutcome::Failed(judge.id.clone(), e.to_string())
            }
        }
    }

    /// Apply the aggregate of the current pass to a debate whose verdict is
    /// pending. Returns the updated debate, or `None` when there is nothing
    /// to apply (no verdicts yet, or already decided by someone else).
    ///
    /// The aggregate is taken from the store on every attempt. A verdict
    /// landing in between bumps the revision and forces a re-read.
    pub fn record_original_decision(&self, debate_id: &DebateId) -> EngineResult<Option<Debate>> {
        for _ in 0..MAX_DECISION_ATTEMPTS {
            let debate = self
                .store
                .get_debate(debate_id)?
                .ok_or_else(|| EngineError::DebateNotFound(debate_id.clone()))?;
            if !debate.verdict_pending() {
                return Ok(None);
            }

            let pass = debate.adjudication_pass;
            let verdicts = self.store.verdicts_for_pass(debate_id, pass)?;
            let Some(agg) = aggregate(&verdicts) else {
                return Ok(None);
            };

            let next = debate.decided(pass, agg.winner_id.clone())?;
            match self.store.compare_and_swap_debate(&debate.stamp(), &next)? {
                CasOutcome::Swapped(stored) => {
                    info!(
                        debate_id = %debate_id,
                        pass,
                        winner = ?stored.winner_id,
                        verdicts = agg.verdicts,
                        "Verdict ready"
                    );
                    let _ = self.event_bus.publish(DebateEvent::VerdictReady {
                        debate_id: debate_id.clone(),
                        pass,
                        winner_id: stored.winner_id.clone(),
                        verdicts: agg.verdicts,
                        timestamp: self.clock.now(),
                    });
                    return Ok(Some(stored));
                }
                CasOutcome::Conflict(None) => {
                    return Err(EngineError::DebateNotFound(debate_id.clone()));
                }
                CasOutcome::Conflict(Some(_)) => {
                    debug!(debate_id = %debate_id, "Decision write contended, re-reading");
                }
            }
        }
        Err(EngineError::ConcurrentModification(debate_id.clone()))
    }
}
