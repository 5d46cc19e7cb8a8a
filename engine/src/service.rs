//! Debate engine facade
//!
//! [`DebateEngine`] wires the store, clock, event bus, verdict engine,
//! sweep worker and appeal pipeline together and exposes the operations
//! the rest of the platform calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::appeal::{AppealOutcome, AppealPipeline, AppealState, AppealSummary, SharedQuota};
use crate::clock::SharedClock;
use crate::config::EngineConfig;
use crate::debate::{
    Debate, DebateId, DebateState, DebateStatus, NewDebate, Statement, StatementId, UserId,
};
use crate::error::{EngineError, EngineResult};
use crate::events::{DebateEvent, EventBus, EventFilter, EventHistory, FilteredReceiver, SharedEventBus};
use crate::judging::{JudgePanel, SharedAdjudicator, Verdict, VerdictEngine};
use crate::state::{CasOutcome, SharedStore, StoreError};
use crate::sweep::{ExpirySweeper, SweepSummary};

/// Verdicts of one debate, partitioned by adjudication pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerdictSheet {
    pub debate_id: DebateId,
    /// Pass 0
    pub original: Vec<Verdict>,
    /// Pass number to verdicts, one entry per appeal pass that has any
    pub appeals: BTreeMap<u32, Vec<Verdict>>,
    /// When the latest appeal was filed
    pub appealed_at: Option<DateTime<Utc>>,
}

impl VerdictSheet {
    fn from_verdicts(debate: &Debate, verdicts: Vec<Verdict>) -> Self {
        let mut original = Vec::new();
        let mut appeals: BTreeMap<u32, Vec<Verdict>> = BTreeMap::new();
        for verdict in verdicts {
            if verdict.pass == 0 {
                original.push(verdict);
            } else {
                appeals.entry(verdict.pass).or_default().push(verdict);
            }
        }
        Self {
            debate_id: debate.id.clone(),
            original,
            appeals,
            appealed_at: debate.appealed_at,
        }
    }

    /// Verdicts of the most recent appeal pass, if any.
    pub fn latest_appeal(&self) -> Option<&[Verdict]> {
        self.appeals.values().next_back().map(Vec::as_slice)
    }

    pub fn total(&self) -> usize {
        self.original.len() + self.appeals.values().map(Vec::len).sum::<usize>()
    }
}

/// Entry point for every debate operation.
pub struct DebateEngine {
    store: SharedStore,
    event_bus: SharedEventBus,
    clock: SharedClock,
    config: EngineConfig,
    verdicts: Arc<VerdictEngine>,
    sweeper: ExpirySweeper,
    appeals: AppealPipeline,
}

impl DebateEngine {
    /// Build an engine. Events are persisted through `store`.
    pub fn new(
        store: SharedStore,
        adjudicator: SharedAdjudicator,
        panel: JudgePanel,
        clock: SharedClock,
        config: EngineConfig,
        quota: SharedQuota,
    ) -> Self {
        let event_bus = EventBus::with_persistence(store.clone()).shared();
        let verdicts = Arc::new(VerdictEngine::new(
            store.clone(),
            event_bus.clone(),
            adjudicator,
            panel,
            clock.clone(),
            config.judge_timeout(),
        ));
        let sweeper = ExpirySweeper::new(
            store.clone(),
            event_bus.clone(),
            verdicts.clone(),
            clock.clone(),
            config.adjudication_mode,
        );
        let appeals = AppealPipeline::new(
            store.clone(),
            event_bus.clone(),
            verdicts.clone(),
            quota,
            clock.clone(),
            config.max_appeals_per_debate,
            config.stuck_appeal_after(),
        );

        info!(
            judges = verdicts.panel().len(),
            mode = ?config.adjudication_mode,
            "Debate engine ready"
        );

        Self {
            store,
            event_bus,
            clock,
            config,
            verdicts,
            sweeper,
            appeals,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn event_bus(&self) -> &SharedEventBus {
        &self.event_bus
    }

    /// Subscribe to transition events.
    pub fn subscribe(&self) -> broadcast::Receiver<DebateEvent> {
        self.event_bus.subscribe()
    }

    /// Subscribe to the transition events matching `filter`.
    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        self.event_bus.subscribe_filtered(filter)
    }

    /// Query interface over persisted events.
    pub fn history(&self) -> EventHistory {
        EventHistory::new(self.store.clone())
    }

    fn load(&self, debate_id: &DebateId) -> EngineResult<Debate> {
        self.store
            .get_debate(debate_id)?
            .ok_or_else(|| EngineError::DebateNotFound(debate_id.clone()))
    }

    // =========================================================================
    // Challenge lifecycle
    // =========================================================================

    fn validate_new(&self, request: &NewDebate) -> EngineResult<()> {
        if request.topic.trim().is_empty() {
            return Err(EngineError::InvalidDebate("topic is empty".into()));
        }
        if request.opponent_id.as_ref() == Some(&request.challenger_id) {
            return Err(EngineError::InvalidDebate(
                "challenger cannot debate themselves".into(),
            ));
        }
        if request.total_rounds == 0 || request.total_rounds > self.config.max_total_rounds {
            return Err(EngineError::InvalidDebate(format!(
                "total_rounds must be between 1 and {}, got {}",
                self.config.max_total_rounds, request.total_rounds
            )));
        }
        let (min, max) = (self.config.min_round_duration(), self.config.max_round_duration());
        if request.round_duration < min || request.round_duration > max {
            return Err(EngineError::InvalidDebate(format!(
                "round_duration must be between {}s and {}s, got {}s",
                min.num_seconds(),
                max.num_seconds(),
                request.round_duration.num_seconds()
            )));
        }
        Ok(())
    }

    /// Create a WAITING debate.
    pub fn create_debate(&self, request: NewDebate) -> EngineResult<DebateId> {
        self.validate_new(&request)?;
        let now = self.clock.now();
        let debate = Debate::new(request, now);
        self.store.insert_debate(&debate)?;

        info!(
            debate_id = %debate.id,
            challenger = %debate.challenger_id,
            rounds = debate.total_rounds,
            "Debate created"
        );
        let _ = self.event_bus.publish(DebateEvent::DebateCreated {
            debate_id: debate.id.clone(),
            challenger_id: debate.challenger_id.clone(),
            opponent_id: debate.opponent_id.clone(),
            total_rounds: debate.total_rounds,
            timestamp: now,
        });
        Ok(debate.id)
    }

    /// Accept a challenge: WAITING → ACTIVE with round 1 open.
    pub fn accept_debate(&self, debate_id: &DebateId, opponent_id: &UserId) -> EngineResult<DebateState> {
        let now = self.clock.now();
        let debate = self.load(debate_id)?;
        if debate.status != DebateStatus::Waiting {
            return Err(EngineError::NotAllowed(format!(
                "debate {} is {} and cannot be accepted",
                debate_id, debate.status
            )));
        }
        if let Some(bound) = &debate.opponent_id {
            if bound != opponent_id {
                return Err(EngineError::NotParticipant(opponent_id.clone()));
            }
        }

        let next = debate.activated(opponent_id.clone(), now)?;
        let stored = match self.store.compare_and_swap_debate(&debate.stamp(), &next)? {
            CasOutcome::Swapped(stored) => stored,
            CasOutcome::Conflict(_) => {
                return Err(EngineError::ConcurrentModification(debate_id.clone()))
            }
        };

        let deadline = stored.round_deadline.unwrap_or(now);
        info!(debate_id = %debate_id, opponent = %opponent_id, deadline = %deadline, "Debate accepted");
        let _ = self.event_bus.publish(DebateEvent::DebateAccepted {
            debate_id: debate_id.clone(),
            opponent_id: opponent_id.clone(),
            round_deadline: deadline,
            timestamp: now,
        });
        Ok(stored.state())
    }

    /// Submit a participant's statement for the open round.
    pub fn submit_statement(
        &self,
        debate_id: &DebateId,
        author_id: &UserId,
        round: u32,
        content: &str,
    ) -> EngineResult<StatementId> {
        let now = self.clock.now();
        let debate = self.load(debate_id)?;

        if debate.status != DebateStatus::Active {
            return Err(EngineError::RoundClosed {
                round,
                reason: format!("debate is {}", debate.status),
            });
        }
        if !debate.is_participant(author_id) {
            return Err(EngineError::NotParticipant(author_id.clone()));
        }
        if round != debate.current_round {
            return Err(EngineError::RoundClosed {
                round,
                reason: format!("current round is {}", debate.current_round),
            });
        }
        if debate.is_round_due(now) {
            return Err(EngineError::RoundClosed {
                round,
                reason: "deadline has passed".into(),
            });
        }

        let content = content.trim();
        if content.is_empty() {
            return Err(EngineError::InvalidStatement("statement is empty".into()));
        }
        let chars = content.chars().count();
        if chars > self.config.max_statement_chars {
            return Err(EngineError::InvalidStatement(format!(
                "statement is {} characters, limit is {}",
                chars, self.config.max_statement_chars
            )));
        }

        let statement = Statement::new(
            debate_id.clone(),
            author_id.clone(),
            round,
            content.to_string(),
            now,
        );
        // The store re-checks the round under its lock: a sweep may have
        // closed it since the read above.
        match self.store.insert_statement(&statement) {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(EngineError::DuplicateSubmission {
                    author_id: author_id.clone(),
                    round,
                })
            }
            Err(StoreError::RoundClosed(reason)) => {
                debug!(debate_id = %debate_id, author = %author_id, round, "Round closed before the statement landed");
                return Err(EngineError::RoundClosed { round, reason });
            }
            Err(StoreError::NotFound(_)) => {
                return Err(EngineError::DebateNotFound(debate_id.clone()))
            }
            Err(e) => return Err(e.into()),
        }

        debug!(debate_id = %debate_id, author = %author_id, round, "Statement submitted");
        let _ = self.event_bus.publish(DebateEvent::StatementSubmitted {
            debate_id: debate_id.clone(),
            statement_id: statement.id.clone(),
            author_id: author_id.clone(),
            round,
            timestamp: now,
        });
        Ok(statement.id)
    }

    /// Delete a WAITING challenge and everything attached to it. Only the
    /// challenger may do this.
    pub fn delete_debate(&self, debate_id: &DebateId, requester: &UserId) -> EngineResult<()> {
        let debate = self.load(debate_id)?;
        if debate.challenger_id != *requester {
            return Err(EngineError::NotAllowed(format!(
                "only the creator may delete debate {}",
                debate_id
            )));
        }
        if debate.status != DebateStatus::Waiting {
            return Err(EngineError::NotAllowed(format!(
                "debate {} is {}; only waiting challenges can be deleted",
                debate_id, debate.status
            )));
        }

        match self.store.delete_debate_if(debate_id, &debate.stamp())? {
            CasOutcome::Swapped(_) => {}
            CasOutcome::Conflict(None) => {
                return Err(EngineError::DebateNotFound(debate_id.clone()))
            }
            CasOutcome::Conflict(Some(current)) if current.status != DebateStatus::Waiting => {
                return Err(EngineError::NotAllowed(format!(
                    "debate {} is {}; only waiting challenges can be deleted",
                    debate_id, current.status
                )))
            }
            CasOutcome::Conflict(Some(_)) => {
                return Err(EngineError::ConcurrentModification(debate_id.clone()))
            }
        }

        info!(debate_id = %debate_id, requester = %requester, "Debate deleted");
        let _ = self.event_bus.publish(DebateEvent::DebateDeleted {
            debate_id: debate_id.clone(),
            deleted_by: requester.clone(),
            timestamp: self.clock.now(),
        });
        Ok(())
    }

    // =========================================================================
    // Batch triggers
    // =========================================================================

    /// Resolve due rounds and retry pending verdicts. Safe to run on any
    /// cadence and concurrently with itself.
    pub async fn sweep_expired_rounds(&self) -> SweepSummary {
        self.sweeper.sweep().await
    }

    /// Adjudicate every ended debate still waiting for its verdict.
    pub async fn drain_pending_verdicts(&self) -> SweepSummary {
        self.sweeper.drain_pending_verdicts().await
    }

    // =========================================================================
    // Appeals
    // =========================================================================

    pub fn request_appeal(
        &self,
        debate_id: &DebateId,
        requester: &UserId,
        reason: &str,
    ) -> EngineResult<AppealState> {
        self.appeals.request(debate_id, requester, reason)
    }

    pub async fn process_appeal(&self, debate_id: &DebateId) -> EngineResult<AppealOutcome> {
        self.appeals.process(debate_id).await
    }

    pub async fn process_appeals(&self) -> AppealSummary {
        self.appeals.process_pending().await
    }

    pub async fn retrigger_appeal(&self, debate_id: &DebateId) -> EngineResult<AppealOutcome> {
        self.appeals.retrigger(debate_id).await
    }

    pub fn deny_appeal(&self, debate_id: &DebateId, reason: &str) -> EngineResult<AppealState> {
        self.appeals.deny(debate_id, reason)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get_debate(&self, debate_id: &DebateId) -> EngineResult<Debate> {
        self.load(debate_id)
    }

    pub fn get_debate_state(&self, debate_id: &DebateId) -> EngineResult<DebateState> {
        Ok(self.load(debate_id)?.state())
    }

    pub fn statements(&self, debate_id: &DebateId) -> EngineResult<Vec<Statement>> {
        self.load(debate_id)?;
        Ok(self.store.statements_for(debate_id)?)
    }

    pub fn verdicts(&self, debate_id: &DebateId) -> EngineResult<VerdictSheet> {
        let debate = self.load(debate_id)?;
        let verdicts = self.store.verdicts_for(debate_id)?;
        Ok(VerdictSheet::from_verdicts(&debate, verdicts))
    }

    pub fn panel(&self) -> &JudgePanel {
        self.verdicts.panel()
    }
}
