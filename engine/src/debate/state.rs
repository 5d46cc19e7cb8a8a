//! Debate state machine: statuses, appeal statuses, and the guarded
//! transitions that produce each next version of a [`Debate`].
//!
//! Transitions are pure: each method takes `&self` and returns the next
//! value, leaving persistence (and the conditional write that guards it)
//! to the caller.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::types::{DebateId, NewDebate, Position, Side, UserId, Visibility, WriteOnce};

/// Lifecycle status of a debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateStatus {
    /// Created, waiting for the opponent to accept.
    Waiting,
    /// Rounds in progress; a round deadline is always set.
    Active,
    /// All rounds done, adjudication deferred to a later drain.
    VerdictReady,
    /// All rounds done. The verdict may still be pending.
    Completed,
    /// An appeal is pending or being processed.
    Appealed,
    /// Appeal re-adjudicated. Terminal.
    Resolved,
}

impl DebateStatus {
    /// Valid transitions from this status. Self-loops are field updates
    /// that keep the status (round advance, decision recorded, appeal claim).
    pub fn valid_transitions(self) -> &'static [DebateStatus] {
        match self {
            Self::Waiting => &[Self::Active],
            Self::Active => &[Self::Active, Self::VerdictReady, Self::Completed],
            Self::VerdictReady => &[Self::Completed, Self::Appealed],
            Self::Completed => &[Self::Completed, Self::Appealed],
            Self::Appealed => &[Self::Appealed, Self::Resolved, Self::Completed],
            Self::Resolved => &[],
        }
    }

    /// Whether all rounds have been played.
    pub fn has_ended(self) -> bool {
        matches!(
            self,
            Self::VerdictReady | Self::Completed | Self::Appealed | Self::Resolved
        )
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        self.valid_transitions().is_empty()
    }
}

impl std::fmt::Display for DebateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Active => write!(f, "active"),
            Self::VerdictReady => write!(f, "verdict_ready"),
            Self::Completed => write!(f, "completed"),
            Self::Appealed => write!(f, "appealed"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

/// Progress of the latest appeal on a debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealStatus {
    Pending,
    Processing,
    Resolved,
    Denied,
}

impl AppealStatus {
    /// Whether `from -> to` is a legal appeal transition. `None` means no
    /// appeal has been filed yet.
    pub fn can_transition(from: Option<AppealStatus>, to: AppealStatus) -> bool {
        use AppealStatus::*;
        matches!(
            (from, to),
            (None, Pending)
                | (Some(Denied), Pending)
                | (Some(Pending), Processing)
                | (Some(Pending), Denied)
                | (Some(Processing), Processing)
                | (Some(Processing), Resolved)
                | (Some(Processing), Denied)
        )
    }

    /// Whether the appeal is still waiting for an outcome.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl std::fmt::Display for AppealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Resolved => write!(f, "resolved"),
            Self::Denied => write!(f, "denied"),
        }
    }
}

/// Error for rejected transitions. Never leaves partial state behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("invalid transition {from} → {to}: {reason}")]
    Status {
        from: DebateStatus,
        to: DebateStatus,
        reason: String,
    },

    #[error("invalid appeal transition {from:?} → {to}")]
    Appeal {
        from: Option<AppealStatus>,
        to: AppealStatus,
    },

    #[error("guard failed in {status}: {reason}")]
    Guard { status: DebateStatus, reason: String },
}

/// The lifecycle fields a conditional write is predicated on.
///
/// Every successful write bumps `revision`, so two writers holding the same
/// stamp can never both succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleStamp {
    pub status: DebateStatus,
    pub current_round: u32,
    pub appeal_status: Option<AppealStatus>,
    pub adjudication_pass: u32,
    pub revision: u64,
}

/// The debate aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debate {
    pub id: DebateId,
    pub topic: String,
    pub category: String,
    pub visibility: Visibility,

    pub challenger_id: UserId,
    pub challenger_position: Position,
    pub opponent_id: Option<UserId>,

    pub status: DebateStatus,
    /// 1-based; never decreases.
    pub current_round: u32,
    pub total_rounds: u32,
    pub round_duration_secs: i64,
    /// Set iff `status == Active`.
    pub round_deadline: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,

    /// `None` is a tie (or no decision yet, see `decided_pass`).
    pub winner_id: Option<UserId>,
    /// Captured with the first decision; a captured `None` is a tie.
    pub original_winner: WriteOnce<Option<UserId>>,
    /// 0 is the original judging, n the n-th appeal.
    pub adjudication_pass: u32,
    /// Pass whose aggregate was last applied to `winner_id`.
    pub decided_pass: Option<u32>,

    pub appeal_count: u32,
    pub appeal_status: Option<AppealStatus>,
    pub appealed_at: Option<DateTime<Utc>>,
    pub appealed_by: Option<UserId>,
    pub appeal_reason: Option<String>,
    pub appeal_claimed_at: Option<DateTime<Utc>>,
    pub appeal_resolved_at: Option<DateTime<Utc>>,
    pub denial_reason: Option<String>,

    /// Bumped by the store on every successful conditional write.
    pub revision: u64,
}

impl Debate {
    /// Build a WAITING debate from a validated creation request.
    pub fn new(request: NewDebate, now: DateTime<Utc>) -> Self {
        Self {
            id: DebateId::generate(),
            topic: request.topic,
            category: request.category,
            visibility: request.visibility,
            challenger_id: request.challenger_id,
            challenger_position: request.challenger_position,
            opponent_id: request.opponent_id,
            status: DebateStatus::Waiting,
            current_round: 1,
            total_rounds: request.total_rounds,
            round_duration_secs: request.round_duration.num_seconds(),
            round_deadline: None,
            created_at: now,
            started_at: None,
            ended_at: None,
            winner_id: None,
            original_winner: WriteOnce::new(),
            adjudication_pass: 0,
            decided_pass: None,
            appeal_count: 0,
            appeal_status: None,
            appealed_at: None,
            appealed_by: None,
            appeal_reason: None,
            appeal_claimed_at: None,
            appeal_resolved_at: None,
            denial_reason: None,
            revision: 0,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Stamp for conditional writes predicated on this version.
    pub fn stamp(&self) -> LifecycleStamp {
        LifecycleStamp {
            status: self.status,
            current_round: self.current_round,
            appeal_status: self.appeal_status,
            adjudication_pass: self.adjudication_pass,
            revision: self.revision,
        }
    }

    pub fn round_duration(&self) -> Duration {
        Duration::seconds(self.round_duration_secs)
    }

    /// Whether the current round's deadline has passed at `now`.
    pub fn is_round_due(&self, now: DateTime<Utc>) -> bool {
        self.status == DebateStatus::Active
            && self.round_deadline.is_some_and(|deadline| deadline <= now)
    }

    /// Whether the current round is the last one.
    pub fn is_final_round(&self) -> bool {
        self.current_round >= self.total_rounds
    }

    /// Which seat `user` occupies, if any.
    pub fn side_of(&self, user: &UserId) -> Option<Side> {
        if *user == self.challenger_id {
            Some(Side::Challenger)
        } else if self.opponent_id.as_ref() == Some(user) {
            Some(Side::Opponent)
        } else {
            None
        }
    }

    pub fn is_participant(&self, user: &UserId) -> bool {
        self.side_of(user).is_some()
    }

    /// The user seated on `side`.
    pub fn participant(&self, side: Side) -> Option<&UserId> {
        match side {
            Side::Challenger => Some(&self.challenger_id),
            Side::Opponent => self.opponent_id.as_ref(),
        }
    }

    /// The stance argued from `side`.
    pub fn position_of(&self, side: Side) -> Position {
        match side {
            Side::Challenger => self.challenger_position,
            Side::Opponent => self.challenger_position.opposite(),
        }
    }

    /// Ended with no decision applied yet.
    pub fn verdict_pending(&self) -> bool {
        matches!(
            self.status,
            DebateStatus::VerdictReady | DebateStatus::Completed
        ) && self.decided_pass.is_none()
    }

    /// Whether a statement for `round` written at `at` lands in the open round.
    pub fn accepts_statement(&self, round: u32, at: DateTime<Utc>) -> bool {
        self.status == DebateStatus::Active
            && round == self.current_round
            && self.round_deadline.is_some_and(|deadline| at < deadline)
    }

    /// Whether a verdict for `pass` may still be persisted.
    ///
    /// Only the current pass takes verdicts, only while it is being
    /// adjudicated, and never once its aggregate has been applied: the
    /// applied winner must stay derivable from the stored rows.
    pub fn accepts_verdicts(&self, pass: u32) -> bool {
        if pass != self.adjudication_pass || self.decided_pass == Some(pass) {
            return false;
        }
        if pass == 0 {
            matches!(
                self.status,
                DebateStatus::VerdictReady | DebateStatus::Completed
            )
        } else {
            self.status == DebateStatus::Appealed
                && self.appeal_status == Some(AppealStatus::Processing)
        }
    }

    /// Winner captured with the first decision (`None` for a tie or when
    /// nothing has been decided yet).
    pub fn original_winner_id(&self) -> Option<&UserId> {
        self.original_winner.get().and_then(|w| w.as_ref())
    }

    /// Whether an appeal changed the outcome.
    pub fn flipped(&self) -> bool {
        match self.original_winner.get() {
            Some(original) => *original != self.winner_id,
            None => false,
        }
    }

    /// Structural invariants that must hold for every persisted version.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let active = self.status == DebateStatus::Active;
        if active != self.round_deadline.is_some() {
            errors.push(format!(
                "round_deadline is {} while status is {}",
                if self.round_deadline.is_some() {
                    "set"
                } else {
                    "unset"
                },
                self.status
            ));
        }
        if self.current_round == 0 || self.current_round > self.total_rounds {
            errors.push(format!(
                "current_round {} outside 1..={}",
                self.current_round, self.total_rounds
            ));
        }
        if self.status != DebateStatus::Waiting && self.opponent_id.is_none() {
            errors.push(format!("status {} without an opponent", self.status));
        }
        if self.decided_pass.is_some() && !self.original_winner.is_set() {
            errors.push("decision recorded without an original winner".to_string());
        }
        if self.appeal_status.is_some() && self.appealed_at.is_none() {
            errors.push("appeal status set without appealed_at".to_string());
        }

        errors
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Single guarded dispatcher every status change goes through.
    fn transition(&self, to: DebateStatus, reason: &str) -> Result<Debate, TransitionError> {
        if !self.status.valid_transitions().contains(&to) {
            return Err(TransitionError::Status {
                from: self.status,
                to,
                reason: format!(
                    "{} (allowed: {:?})",
                    reason,
                    self.status.valid_transitions()
                ),
            });
        }
        let mut next = self.clone();
        next.status = to;
        Ok(next)
    }

    fn set_appeal_status(&mut self, to: AppealStatus) -> Result<(), TransitionError> {
        if !AppealStatus::can_transition(self.appeal_status, to) {
            return Err(TransitionError::Appeal {
                from: self.appeal_status,
                to,
            });
        }
        self.appeal_status = Some(to);
        Ok(())
    }

    fn guard(&self, ok: bool, reason: impl Into<String>) -> Result<(), TransitionError> {
        if ok {
            Ok(())
        } else {
            Err(TransitionError::Guard {
                status: self.status,
                reason: reason.into(),
            })
        }
    }

    /// WAITING → ACTIVE: the opponent accepted; round 1 starts now.
    pub fn activated(&self, opponent: UserId, now: DateTime<Utc>) -> Result<Debate, TransitionError> {
        self.guard(
            opponent != self.challenger_id,
            "challenger cannot accept their own challenge",
        )?;
        if let Some(bound) = &self.opponent_id {
            self.guard(
                *bound == opponent,
                format!("challenge is bound to {}", bound),
            )?;
        }

        let mut next = self.transition(DebateStatus::Active, "challenge accepted")?;
        next.opponent_id = Some(opponent);
        next.current_round = 1;
        next.round_deadline = Some(now + self.round_duration());
        next.started_at = Some(now);
        Ok(next)
    }

    /// ACTIVE → ACTIVE with the next round open.
    pub fn round_advanced(&self, now: DateTime<Utc>) -> Result<Debate, TransitionError> {
        self.guard(
            !self.is_final_round(),
            format!("round {} is the final round", self.current_round),
        )?;
        let mut next = self.transition(DebateStatus::Active, "round resolved")?;
        next.current_round += 1;
        next.round_deadline = Some(now + self.round_duration());
        Ok(next)
    }

    /// ACTIVE → COMPLETED (inline adjudication) or VERDICT_READY (deferred).
    pub fn ended(&self, to: DebateStatus, now: DateTime<Utc>) -> Result<Debate, TransitionError> {
        self.guard(
            matches!(to, DebateStatus::Completed | DebateStatus::VerdictReady),
            format!("{} is not an end-of-rounds status", to),
        )?;
        self.guard(
            self.status == DebateStatus::Active && self.is_final_round(),
            format!(
                "round {}/{} is not the final round",
                self.current_round, self.total_rounds
            ),
        )?;
        let mut next = self.transition(to, "final round resolved")?;
        next.round_deadline = None;
        next.ended_at = Some(now);
        Ok(next)
    }

    /// Record the original-pass aggregate. VERDICT_READY moves to COMPLETED.
    pub fn decided(&self, pass: u32, winner: Option<UserId>) -> Result<Debate, TransitionError> {
        self.guard(
            self.decided_pass.is_none(),
            "a decision is already recorded",
        )?;
        self.guard(
            pass == self.adjudication_pass,
            format!(
                "pass {} is not the current pass {}",
                pass, self.adjudication_pass
            ),
        )?;
        let mut next = self.transition(DebateStatus::Completed, "verdict recorded")?;
        if !next.original_winner.is_set() {
            // Cannot fail: checked just above.
            let _ = next.original_winner.set(winner.clone());
        }
        next.winner_id = winner;
        next.decided_pass = Some(pass);
        Ok(next)
    }

    /// COMPLETED/VERDICT_READY → APPEALED(PENDING), opening a new pass.
    pub fn appealed(
        &self,
        by: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Debate, TransitionError> {
        let mut next = self.transition(DebateStatus::Appealed, "appeal requested")?;
        next.set_appeal_status(AppealStatus::Pending)?;
        if !next.original_winner.is_set() {
            let _ = next.original_winner.set(self.winner_id.clone());
        }
        next.appeal_count += 1;
        next.adjudication_pass += 1;
        next.appealed_at = Some(now);
        next.appealed_by = Some(by);
        next.appeal_reason = Some(reason.to_string());
        next.appeal_claimed_at = None;
        next.appeal_resolved_at = None;
        next.denial_reason = None;
        Ok(next)
    }

    /// APPEALED(PENDING|PROCESSING) → APPEALED(PROCESSING), claimed at `now`.
    pub fn appeal_claimed(&self, now: DateTime<Utc>) -> Result<Debate, TransitionError> {
        let mut next = self.transition(DebateStatus::Appealed, "appeal claimed")?;
        next.set_appeal_status(AppealStatus::Processing)?;
        next.appeal_claimed_at = Some(now);
        Ok(next)
    }

    /// APPEALED(PROCESSING) → RESOLVED with the appeal pass aggregate.
    pub fn appeal_resolved(
        &self,
        pass: u32,
        winner: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<Debate, TransitionError> {
        self.guard(
            pass == self.adjudication_pass,
            format!(
                "pass {} is not the appeal pass {}",
                pass, self.adjudication_pass
            ),
        )?;
        let mut next = self.transition(DebateStatus::Resolved, "appeal re-adjudicated")?;
        next.set_appeal_status(AppealStatus::Resolved)?;
        next.winner_id = winner;
        next.decided_pass = Some(pass);
        next.appeal_resolved_at = Some(now);
        Ok(next)
    }

    /// APPEALED(PENDING|PROCESSING) → COMPLETED(DENIED). The winner stands.
    pub fn appeal_denied(&self, reason: &str, now: DateTime<Utc>) -> Result<Debate, TransitionError> {
        let mut next = self.transition(DebateStatus::Completed, "appeal denied")?;
        next.set_appeal_status(AppealStatus::Denied)?;
        next.denial_reason = Some(reason.to_string());
        next.appeal_resolved_at = Some(now);
        Ok(next)
    }

    /// One-line summary for logs and the CLI.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] round {}/{} | pass {} | appeal={} | debate={}",
            self.status,
            self.current_round,
            self.total_rounds,
            self.adjudication_pass,
            self.appeal_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.id
        )
    }

    /// Read model handed to feeds, profiles and notifications.
    pub fn state(&self) -> DebateState {
        DebateState {
            debate_id: self.id.clone(),
            status: self.status,
            current_round: self.current_round,
            total_rounds: self.total_rounds,
            round_deadline: self.round_deadline,
            winner_id: self.winner_id.clone(),
            original_winner_id: self.original_winner_id().cloned(),
            appeal_status: self.appeal_status,
            appeal_count: self.appeal_count,
            adjudication_pass: self.adjudication_pass,
            verdict_pending: self.verdict_pending(),
            flipped: self.flipped(),
        }
    }
}

/// Read-only snapshot of a debate's lifecycle.
///
/// `winner_id == None` is ambiguous on its own: check `verdict_pending`
/// to tell a judged tie from a debate still waiting for its verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateState {
    pub debate_id: DebateId,
    pub status: DebateStatus,
    pub current_round: u32,
    pub total_rounds: u32,
    pub round_deadline: Option<DateTime<Utc>>,
    pub winner_id: Option<UserId>,
    pub original_winner_id: Option<UserId>,
    pub appeal_status: Option<AppealStatus>,
    pub appeal_count: u32,
    pub adjudication_pass: u32,
    pub verdict_pending: bool,
    pub flipped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn waiting(rounds: u32) -> Debate {
        Debate::new(
            NewDebate {
                topic: "Cats make better companions than dogs".to_string(),
                category: "society".to_string(),
                challenger_id: UserId::from("alice"),
                challenger_position: Position::For,
                opponent_id: None,
                total_rounds: rounds,
                round_duration: Duration::hours(1),
                visibility: Visibility::Public,
            },
            t0(),
        )
    }

    fn active(rounds: u32) -> Debate {
        waiting(rounds)
            .activated(UserId::from("bob"), t0())
            .unwrap()
    }

    #[test]
    fn test_new_debate() {
        let debate = waiting(3);
        assert_eq!(debate.status, DebateStatus::Waiting);
        assert_eq!(debate.current_round, 1);
        assert!(debate.round_deadline.is_none());
        assert!(debate.invariant_violations().is_empty());
    }

    #[test]
    fn test_activation_sets_first_deadline() {
        let debate = active(3);
        assert_eq!(debate.status, DebateStatus::Active);
        assert_eq!(debate.current_round, 1);
        assert_eq!(debate.round_deadline, Some(t0() + Duration::hours(1)));
        assert_eq!(debate.position_of(Side::Opponent), Position::Against);
        assert!(debate.invariant_violations().is_empty());
    }

    #[test]
    fn test_activation_rejects_self_accept_and_wrong_opponent() {
        let debate = waiting(3);
        assert!(matches!(
            debate.activated(UserId::from("alice"), t0()),
            Err(TransitionError::Guard { .. })
        ));

        let mut bound = waiting(3);
        bound.opponent_id = Some(UserId::from("carol"));
        assert!(bound.activated(UserId::from("bob"), t0()).is_err());
        assert!(bound.activated(UserId::from("carol"), t0()).is_ok());
    }

    #[test]
    fn test_round_advance_until_final() {
        let debate = active(2);
        let later = t0() + Duration::hours(1);
        let round2 = debate.round_advanced(later).unwrap();
        assert_eq!(round2.current_round, 2);
        assert_eq!(round2.round_deadline, Some(later + Duration::hours(1)));

        let err = round2.round_advanced(later).unwrap_err();
        assert!(matches!(err, TransitionError::Guard { .. }));
    }

    #[test]
    fn test_end_clears_deadline() {
        let debate = active(1);
        let ended = debate
            .ended(DebateStatus::Completed, t0() + Duration::hours(1))
            .unwrap();
        assert_eq!(ended.status, DebateStatus::Completed);
        assert!(ended.round_deadline.is_none());
        assert!(ended.verdict_pending());
        assert!(ended.invariant_violations().is_empty());

        // Not the final round yet.
        assert!(active(2).ended(DebateStatus::Completed, t0()).is_err());
        // Not an end status.
        assert!(active(1).ended(DebateStatus::Resolved, t0()).is_err());
    }

    #[test]
    fn test_decision_moves_verdict_ready_to_completed() {
        let ended = active(1)
            .ended(DebateStatus::VerdictReady, t0())
            .unwrap();
        let decided = ended.decided(0, Some(UserId::from("bob"))).unwrap();
        assert_eq!(decided.status, DebateStatus::Completed);
        assert_eq!(decided.winner_id, Some(UserId::from("bob")));
        assert_eq!(decided.original_winner_id(), Some(&UserId::from("bob")));
        assert!(!decided.verdict_pending());

        assert!(decided.decided(0, None).is_err());
    }

    #[test]
    fn test_appeal_cycle_preserves_original_winner() {
        let decided = active(1)
            .ended(DebateStatus::Completed, t0())
            .unwrap()
            .decided(0, Some(UserId::from("bob")))
            .unwrap();

        let appealed = decided
            .appealed(UserId::from("alice"), "judges ignored my rebuttal", t0())
            .unwrap();
        assert_eq!(appealed.status, DebateStatus::Appealed);
        assert_eq!(appealed.appeal_status, Some(AppealStatus::Pending));
        assert_eq!(appealed.adjudication_pass, 1);
        assert_eq!(appealed.appeal_count, 1);

        let claimed = appealed.appeal_claimed(t0()).unwrap();
        assert_eq!(claimed.appeal_status, Some(AppealStatus::Processing));

        let resolved = claimed
            .appeal_resolved(1, Some(UserId::from("alice")), t0())
            .unwrap();
        assert_eq!(resolved.status, DebateStatus::Resolved);
        assert_eq!(resolved.winner_id, Some(UserId::from("alice")));
        assert_eq!(resolved.original_winner_id(), Some(&UserId::from("bob")));
        assert!(resolved.flipped());
        assert!(resolved.status.is_terminal());
    }

    #[test]
    fn test_denied_appeal_returns_to_completed() {
        let appealed = active(1)
            .ended(DebateStatus::Completed, t0())
            .unwrap()
            .decided(0, None)
            .unwrap()
            .appealed(UserId::from("bob"), "tie is unfair", t0())
            .unwrap();

        let denied = appealed.appeal_denied("abusive appeal", t0()).unwrap();
        assert_eq!(denied.status, DebateStatus::Completed);
        assert_eq!(denied.appeal_status, Some(AppealStatus::Denied));
        assert!(!denied.flipped());

        // A later appeal opens pass 2 and keeps the captured tie.
        let again = denied
            .appealed(UserId::from("bob"), "second try", t0())
            .unwrap();
        assert_eq!(again.adjudication_pass, 2);
        assert_eq!(again.original_winner.get(), Some(&None));
    }

    #[test]
    fn test_statement_window() {
        let debate = active(2);
        let deadline = t0() + Duration::hours(1);
        assert!(debate.accepts_statement(1, t0()));
        assert!(!debate.accepts_statement(2, t0()));
        assert!(!debate.accepts_statement(1, deadline));

        let round2 = debate.round_advanced(deadline).unwrap();
        assert!(!round2.accepts_statement(1, deadline));
        assert!(round2.accepts_statement(2, deadline));

        assert!(!waiting(2).accepts_statement(1, t0()));
    }

    #[test]
    fn test_verdict_window_closes_with_decision() {
        assert!(!active(1).accepts_verdicts(0));

        let ended = active(1).ended(DebateStatus::VerdictReady, t0()).unwrap();
        assert!(ended.accepts_verdicts(0));
        assert!(!ended.accepts_verdicts(1));

        let decided = ended.decided(0, Some(UserId::from("bob"))).unwrap();
        assert!(!decided.accepts_verdicts(0));

        // Appeal passes take verdicts only while claimed.
        let appealed = decided
            .appealed(UserId::from("alice"), "recount", t0())
            .unwrap();
        assert!(!appealed.accepts_verdicts(0));
        assert!(!appealed.accepts_verdicts(1));
        let claimed = appealed.appeal_claimed(t0()).unwrap();
        assert!(claimed.accepts_verdicts(1));

        let denied = claimed.appeal_denied("policy", t0()).unwrap();
        assert!(!denied.accepts_verdicts(1));
        let resolved = claimed.appeal_resolved(1, None, t0()).unwrap();
        assert!(!resolved.accepts_verdicts(1));
    }

    #[test]
    fn test_invalid_transitions_fail_closed() {
        let debate = waiting(3);
        let err = debate
            .appealed(UserId::from("alice"), "early", t0())
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Status {
                from: DebateStatus::Waiting,
                to: DebateStatus::Appealed,
                ..
            }
        ));
        assert!(debate.round_advanced(t0()).is_err());
        assert!(debate.appeal_claimed(t0()).is_err());
    }

    #[test]
    fn test_appeal_status_table() {
        assert!(AppealStatus::can_transition(None, AppealStatus::Pending));
        assert!(!AppealStatus::can_transition(None, AppealStatus::Resolved));
        assert!(!AppealStatus::can_transition(
            Some(AppealStatus::Pending),
            AppealStatus::Resolved
        ));
        assert!(!AppealStatus::can_transition(
            Some(AppealStatus::Resolved),
            AppealStatus::Pending
        ));
    }

    #[test]
    fn test_invariant_violation_detected() {
        let mut debate = active(2);
        debate.round_deadline = None;
        assert_eq!(debate.invariant_violations().len(), 1);
    }

    #[test]
    fn test_status_line() {
        let line = active(3).status_line();
        assert!(line.contains("[active]"));
        assert!(line.contains("round 1/3"));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(DebateStatus::VerdictReady.to_string(), "verdict_ready");
        assert_eq!(AppealStatus::Processing.to_string(), "processing");
    }
}
