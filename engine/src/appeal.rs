//! Appeal / re-adjudication pipeline
//!
//! An appeal opens a new adjudication pass on a decided debate. The
//! original decision stays on record: `original_winner` is captured at the
//! first decision and no later write can replace it, so a flip is always
//! observable as `original_winner != winner_id`.
//!
//! ```text
//! request ──▶ APPEALED/PENDING ──claim──▶ APPEALED/PROCESSING ──aggregate──▶ RESOLVED
//!                    │                          │   ▲
//!                    └────────── deny ──────────┤   └── reclaim when stuck
//!                                               ▼
//!                                     COMPLETED/DENIED
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::debate::{AppealStatus, Debate, DebateId, DebateStatus, UserId};
use crate::error::{EngineError, EngineResult, Ineligibility};
use crate::events::{DebateEvent, SharedEventBus};
use crate::judging::{aggregate, VerdictEngine};
use crate::state::{CasOutcome, SharedStore};
use crate::sweep::ItemError;

/// Appeals processed concurrently by one batch
const APPEAL_CONCURRENCY: usize = 4;

/// Conditional-write attempts when resolving a contended appeal
const MAX_RESOLVE_ATTEMPTS: usize = 3;

// ============================================================================
// Quota
// ============================================================================

/// Shared reference to an appeal quota
pub type SharedQuota = Arc<dyn AppealQuota>;

/// Per-user appeal allowance, owned by an external collaborator.
pub trait AppealQuota: Send + Sync {
    /// Appeals `user` may still file in the period containing `now`.
    fn remaining(&self, user: &UserId, now: DateTime<Utc>) -> u32;

    /// Use one appeal. Returns `false` if none is left.
    fn consume(&self, user: &UserId, now: DateTime<Utc>) -> bool;

    /// Give back an appeal consumed at `consumed_at`.
    fn refund(&self, user: &UserId, consumed_at: DateTime<Utc>);
}

/// Fixed number of appeals per user per calendar month (UTC).
#[derive(Debug)]
pub struct MonthlyAppealQuota {
    limit: u32,
    used: Mutex<HashMap<(UserId, i32, u32), u32>>,
}

impl MonthlyAppealQuota {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            used: Mutex::new(HashMap::new()),
        }
    }

    fn period(user: &UserId, at: DateTime<Utc>) -> (UserId, i32, u32) {
        (user.clone(), at.year(), at.month())
    }
}

impl AppealQuota for MonthlyAppealQuota {
    fn remaining(&self, user: &UserId, now: DateTime<Utc>) -> u32 {
        let used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        let count = used.get(&Self::period(user, now)).copied().unwrap_or(0);
        self.limit.saturating_sub(count)
    }

    fn consume(&self, user: &UserId, now: DateTime<Utc>) -> bool {
        let mut used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        let count = used.entry(Self::period(user, now)).or_insert(0);
        if *count >= self.limit {
            return false;
        }
        *count += 1;
        true
    }

    fn refund(&self, user: &UserId, consumed_at: DateTime<Utc>) {
        let mut used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = used.get_mut(&Self::period(user, consumed_at)) {
            *count = count.saturating_sub(1);
        }
    }
}

/// No limit at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlimitedQuota;

impl AppealQuota for UnlimitedQuota {
    fn remaining(&self, _user: &UserId, _now: DateTime<Utc>) -> u32 {
        u32::MAX
    }

    fn consume(&self, _user: &UserId, _now: DateTime<Utc>) -> bool {
        true
    }

    fn refund(&self, _user: &UserId, _consumed_at: DateTime<Utc>) {}
}

// ============================================================================
// Pipeline
// ============================================================================

/// Appeal fields of a debate, as returned to the appellant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppealState {
    pub debate_id: DebateId,
    pub status: DebateStatus,
    pub appeal_status: Option<AppealStatus>,
    pub appeal_count: u32,
    pub adjudication_pass: u32,
    pub appealed_at: Option<DateTime<Utc>>,
    pub appealed_by: Option<UserId>,
    pub original_winner_id: Option<UserId>,
    pub winner_id: Option<UserId>,
}

impl From<&Debate> for AppealState {
    fn from(debate: &Debate) -> Self {
        Self {
            debate_id: debate.id.clone(),
            status: debate.status,
            appeal_status: debate.appeal_status,
            appeal_count: debate.appeal_count,
            adjudication_pass: debate.adjudication_pass,
            appealed_at: debate.appealed_at,
            appealed_by: debate.appealed_by.clone(),
            original_winner_id: debate.original_winner_id().cloned(),
            winner_id: debate.winner_id.clone(),
        }
    }
}

/// Result of processing one appeal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealOutcome {
    /// The appeal pass produced an aggregate.
    Resolved {
        winner_id: Option<UserId>,
        original_winner_id: Option<UserId>,
        flipped: bool,
    },
    /// No judge produced a verdict; the appeal stays PROCESSING.
    Pending,
    /// Another worker holds or finished the appeal.
    Busy,
}

/// Counts for one batch of appeal processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppealSummary {
    pub processed: usize,
    pub resolved: usize,
    pub flipped: usize,
    pub pending: usize,
    pub busy: usize,
    pub errors: Vec<ItemError>,
}

/// Validates appeal requests and re-runs adjudication for them.
pub struct AppealPipeline {
    store: SharedStore,
    event_bus: SharedEventBus,
    verdicts: Arc<VerdictEngine>,
    quota: SharedQuota,
    clock: SharedClock,
    max_appeals_per_debate: u32,
    stuck_after: Duration,
}

impl AppealPipeline {
    pub fn new(
        store: SharedStore,
        event_bus: SharedEventBus,
        verdicts: Arc<VerdictEngine>,
        quota: SharedQuota,
        clock: SharedClock,
        max_appeals_per_debate: u32,
        stuck_after: Duration,
    ) -> Self {
        Self {
            store,
            event_bus,
            verdicts,
            quota,
            clock,
            max_appeals_per_debate,
            stuck_after,
        }
    }

    fn load(&self, debate_id: &DebateId) -> EngineResult<Debate> {
        self.store
            .get_debate(debate_id)?
            .ok_or_else(|| EngineError::DebateNotFound(debate_id.clone()))
    }

    /// Preconditions in order; the first failure wins.
    fn check_eligibility(&self, debate: &Debate, requester: &UserId, now: DateTime<Utc>) -> EngineResult<()> {
        match debate.status {
            DebateStatus::Waiting | DebateStatus::Active => {
                return Err(EngineError::NotEligible(Ineligibility::DebateNotFinished))
            }
            DebateStatus::Appealed | DebateStatus::Resolved => {
                return Err(EngineError::AlreadyAppealed(debate.id.clone()))
            }
            DebateStatus::VerdictReady | DebateStatus::Completed => {}
        }
        if debate.verdict_pending() {
            return Err(EngineError::NotEligible(Ineligibility::VerdictPending));
        }
        if !debate.is_participant(requester) {
            return Err(EngineError::NotEligible(Ineligibility::NotParticipant));
        }
        if self.quota.remaining(requester, now) == 0 {
            return Err(EngineError::QuotaExceeded(requester.clone()));
        }
        if debate.appeal_count >= self.max_appeals_per_debate {
            return Err(EngineError::NotEligible(Ineligibility::AppealLimitReached));
        }
        Ok(())
    }

    /// File an appeal. Fails fast with the first unmet precondition and
    /// never mutates anything in that case.
    pub fn request(&self, debate_id: &DebateId, requester: &UserId, reason: &str) -> EngineResult<AppealState> {
        let now = self.clock.now();
        let debate = self.load(debate_id)?;
        self.check_eligibility(&debate, requester, now)?;

        let next = debate.appealed(requester.clone(), reason, now)?;
        if !self.quota.consume(requester, now) {
            return Err(EngineError::QuotaExceeded(requester.clone()));
        }

        let stored = match self.store.compare_and_swap_debate(&debate.stamp(), &next) {
            Ok(CasOutcome::Swapped(stored)) => stored,
            Ok(CasOutcome::Conflict(_)) => {
                self.quota.refund(requester, now);
                return Err(EngineError::ConcurrentModification(debate_id.clone()));
            }
            Err(e) => {
                self.quota.refund(requester, now);
                return Err(e.into());
            }
        };

        info!(
            debate_id = %debate_id,
            requester = %requester,
            pass = stored.adjudication_pass,
            appeal_count = stored.appeal_count,
            "Appeal requested"
        );
        let _ = self.event_bus.publish(DebateEvent::AppealRequested {
            debate_id: debate_id.clone(),
            requested_by: requester.clone(),
            pass: stored.adjudication_pass,
            appeal_count: stored.appeal_count,
            timestamp: now,
        });

        Ok(AppealState::from(&stored))
    }

    /// Whether a PROCESSING claim is old enough to be taken over.
    fn is_stuck(&self, debate: &Debate, now: DateTime<Utc>) -> bool {
        debate.appeal_status == Some(AppealStatus::Processing)
            && debate
                .appeal_claimed_at
                .map_or(true, |claimed| claimed + self.stuck_after <= now)
    }

    /// Claim the appeal for this worker. `None` means another worker
    /// holds a fresh claim or won the race.
    fn claim(&self, debate: &Debate, force: bool, now: DateTime<Utc>) -> EngineResult<Option<Debate>> {
        let open = debate.status == DebateStatus::Appealed
            && debate.appeal_status.is_some_and(AppealStatus::is_open);
        if !open {
            return Err(EngineError::NoOpenAppeal(debate.id.clone()));
        }

        let reclaimed = debate.appeal_status == Some(AppealStatus::Processing);
        if reclaimed && !force && !self.is_stuck(debate, now) {
            debug!(debate_id = %debate.id, "Appeal claimed by another worker");
            return Ok(None);
        }

        let next = debate.appeal_claimed(now)?;
        match self.store.compare_and_swap_debate(&debate.stamp(), &next)? {
            CasOutcome::Swapped(stored) => {
                if reclaimed {
                    warn!(debate_id = %debate.id, "Reclaiming stuck appeal");
                }
                let _ = self.event_bus.publish(DebateEvent::AppealProcessing {
                    debate_id: stored.id.clone(),
                    pass: stored.adjudication_pass,
                    reclaimed,
                    timestamp: now,
                });
                Ok(Some(stored))
            }
            CasOutcome::Conflict(_) => Ok(None),
        }
    }

    /// Claim, re-adjudicate and resolve one appeal.
    pub async fn process(&self, debate_id: &DebateId) -> EngineResult<AppealOutcome> {
        let debate = self.load(debate_id)?;
        self.run(debate, false).await
    }

    /// Force-reclaim a stuck appeal and process it again. Judges that
    /// already ruled on the appeal pass are not called twice.
    pub async fn retrigger(&self, debate_id: &DebateId) -> EngineResult<AppealOutcome> {
        let debate = self.load(debate_id)?;
        self.run(debate, true).await
    }

    async fn run(&self, debate: Debate, force: bool) -> EngineResult<AppealOutcome> {
        let Some(claimed) = self.claim(&debate, force, self.clock.now())? else {
            return Ok(AppealOutcome::Busy);
        };

        let pass = claimed.adjudication_pass;
        let report = self.verdicts.adjudicate(&claimed.id, pass).await?;
        if report.is_pending() {
            warn!(
                debate_id = %claimed.id,
                pass,
                failed = report.failed.len(),
                "Appeal pass has no verdicts; appeal stays processing"
            );
            return Ok(AppealOutcome::Pending);
        }

        self.resolve(&claimed.id, pass)
    }

    /// Apply the aggregate of the appeal pass, read from the store on every
    /// attempt so a verdict persisted by an overlapping worker is counted.
    fn resolve(&self, debate_id: &DebateId, pass: u32) -> EngineResult<AppealOutcome> {
        for _ in 0..MAX_RESOLVE_ATTEMPTS {
            // The claim may have been denied or resolved meanwhile.
            let current = self.load(debate_id)?;
            if current.appeal_status != Some(AppealStatus::Processing) || current.adjudication_pass != pass {
                return Ok(AppealOutcome::Busy);
            }
            let verdicts = self.store.verdicts_for_pass(debate_id, pass)?;
            let Some(agg) = aggregate(&verdicts) else {
                return Ok(AppealOutcome::Pending);
            };

            let now = self.clock.now();
            let next = current.appeal_resolved(pass, agg.winner_id.clone(), now)?;
            match self.store.compare_and_swap_debate(&current.stamp(), &next)? {
                CasOutcome::Swapped(stored) => {
                    let flipped = stored.flipped();
                    info!(
                        debate_id = %stored.id,
                        pass,
                        original = ?stored.original_winner_id(),
                        winner = ?stored.winner_id,
                        verdicts = agg.verdicts,
                        flipped,
                        "Appeal resolved"
                    );
                    let _ = self.event_bus.publish(DebateEvent::AppealResolved {
                        debate_id: stored.id.clone(),
                        pass,
                        original_winner_id: stored.original_winner_id().cloned(),
                        winner_id: stored.winner_id.clone(),
                        flipped,
                        timestamp: now,
                    });
                    return Ok(AppealOutcome::Resolved {
                        winner_id: stored.winner_id.clone(),
                        original_winner_id: stored.original_winner_id().cloned(),
                        flipped,
                    });
                }
                CasOutcome::Conflict(None) => {
                    return Err(EngineError::DebateNotFound(debate_id.clone()));
                }
                CasOutcome::Conflict(Some(_)) => {
                    debug!(debate_id = %debate_id, pass, "Appeal resolution contended, re-reading");
                }
            }
        }
        Err(EngineError::ConcurrentModification(debate_id.clone()))
    }

    /// Process every PENDING appeal and every PROCESSING appeal whose claim
    /// is older than the stuck threshold.
    pub async fn process_pending(&self) -> AppealSummary {
        let now = self.clock.now();
        let mut summary = AppealSummary::default();

        let candidates: Vec<Debate> = match self.store.debates_with_status(&[DebateStatus::Appealed]) {
            Ok(debates) => debates
                .into_iter()
                .filter(|d| d.appeal_status == Some(AppealStatus::Pending) || self.is_stuck(d, now))
                .collect(),
            Err(e) => {
                warn!("Failed to list appealed debates: {}", e);
                summary.errors.push(ItemError::new(None, e));
                return summary;
            }
        };

        let results: Vec<(DebateId, EngineResult<AppealOutcome>)> = stream::iter(candidates)
            .map(|debate| async move {
                let id = debate.id.clone();
                (id, self.run(debate, false).await)
            })
            .buffer_unordered(APPEAL_CONCURRENCY)
            .collect()
            .await;

        for (debate_id, result) in results {
            summary.processed += 1;
            match result {
                Ok(AppealOutcome::Resolved { flipped, .. }) => {
                    summary.resolved += 1;
                    if flipped {
                        summary.flipped += 1;
                    }
                }
                Ok(AppealOutcome::Pending) => summary.pending += 1,
                Ok(AppealOutcome::Busy) => summary.busy += 1,
                Err(e) => {
                    warn!(debate_id = %debate_id, "Appeal processing failed: {}", e);
                    summary.errors.push(ItemError::new(Some(&debate_id), e));
                }
            }
        }

        info!(
            processed = summary.processed,
            resolved = summary.resolved,
            flipped = summary.flipped,
            pending = summary.pending,
            errors = summary.errors.len(),
            "Appeal batch finished"
        );
        summary
    }

    /// Reject an open appeal on policy grounds. The debate returns to
    /// COMPLETED with its winner unchanged and the quota is refunded.
    pub fn deny(&self, debate_id: &DebateId, reason: &str) -> EngineResult<AppealState> {
        let now = self.clock.now();
        let debate = self.load(debate_id)?;
        let open = debate.status == DebateStatus::Appealed
            && debate.appeal_status.is_some_and(AppealStatus::is_open);
        if !open {
            return Err(EngineError::NoOpenAppeal(debate_id.clone()));
        }

        let next = debate.appeal_denied(reason, now)?;
        let stored = match self.store.compare_and_swap_debate(&debate.stamp(), &next)? {
            CasOutcome::Swapped(stored) => stored,
            CasOutcome::Conflict(_) => {
                return Err(EngineError::ConcurrentModification(debate_id.clone()))
            }
        };

        if let (Some(by), Some(at)) = (&debate.appealed_by, debate.appealed_at) {
            self.quota.refund(by, at);
        }

        info!(debate_id = %debate_id, reason, "Appeal denied");
        let _ = self.event_bus.publish(DebateEvent::AppealDenied {
            debate_id: debate_id.clone(),
            reason: reason.to_string(),
            timestamp: now,
        });

        Ok(AppealState::from(&stored))
    }
}
