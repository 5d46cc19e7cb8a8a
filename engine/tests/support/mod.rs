//! Shared fixtures for the engine integration tests: a scripted judge
//! panel, a manual clock and an engine wired to an in-memory store.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use debate_engine::debate::{Debate, DebateStatus, LifecycleStamp, Statement};
use debate_engine::state::StoreResult;
use debate_engine::{
    AdjudicationMode, AdjudicationRequest, Adjudicator, AdjudicatorError, CasOutcome,
    DebateEngine, DebateEvent, DebateId, DebateStore, Decision, EngineConfig, Judge, JudgePanel,
    JudgeRuling, ManualClock, MemoryStore, MonthlyAppealQuota, NewDebate, Position, SharedStore,
    UserId, Verdict, VerdictWrite, Visibility,
};

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
}

pub fn alice() -> UserId {
    UserId::from(ALICE)
}

pub fn bob() -> UserId {
    UserId::from(BOB)
}

pub fn panel() -> JudgePanel {
    JudgePanel::new(vec![
        Judge::new("logician", "The Logician", "weighs the validity of arguments"),
        Judge::new("rhetorician", "The Rhetorician", "weighs persuasion and clarity"),
        Judge::new("skeptic", "The Skeptic", "weighs evidence and sourcing"),
    ])
}

/// Deterministic judges. Each judge answers with its scripted decision;
/// judges without a script fail the call. Answers can be delayed (tokio
/// time, so paused-clock tests stay instant) and single calls can be made
/// to fail up front.
#[derive(Default)]
pub struct ScriptedJudges {
    decisions: Mutex<HashMap<String, Decision>>,
    requests: Mutex<Vec<(String, AdjudicationRequest)>>,
    delays: Mutex<HashMap<String, StdDuration>>,
    failures: Mutex<HashMap<String, u32>>,
}

impl ScriptedJudges {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every judge of the default panel answers `decision`.
    pub fn unanimous(decision: Decision) -> Arc<Self> {
        let judges = Self::new();
        judges.set_all(decision);
        judges
    }

    pub fn set(&self, judge: &str, decision: Decision) {
        self.decisions
            .lock()
            .unwrap()
            .insert(judge.to_string(), decision);
    }

    pub fn set_all(&self, decision: Decision) {
        for judge in ["logician", "rhetorician", "skeptic"] {
            self.set(judge, decision);
        }
    }

    /// `judge` takes `delay` before each answer.
    pub fn delay(&self, judge: &str, delay: StdDuration) {
        self.delays.lock().unwrap().insert(judge.to_string(), delay);
    }

    /// The next `calls` calls to `judge` fail immediately.
    pub fn fail_next(&self, judge: &str, calls: u32) {
        self.failures.lock().unwrap().insert(judge.to_string(), calls);
    }

    /// Every subsequent call fails.
    pub fn fail_all(&self) {
        self.decisions.lock().unwrap().clear();
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<AdjudicationRequest> {
        self.requests.lock().unwrap().last().map(|(_, r)| r.clone())
    }
}

#[async_trait]
impl Adjudicator for ScriptedJudges {
    async fn score(
        &self,
        judge: &Judge,
        request: &AdjudicationRequest,
    ) -> Result<JudgeRuling, AdjudicatorError> {
        self.requests
            .lock()
            .unwrap()
            .push((judge.id.to_string(), request.clone()));

        let fail_now = match self.failures.lock().unwrap().get_mut(judge.id.as_str()) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        };
        if fail_now {
            return Err(AdjudicatorError::Request("judge endpoint reset".into()));
        }
        let delay = self.delays.lock().unwrap().get(judge.id.as_str()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let decision = self.decisions.lock().unwrap().get(judge.id.as_str()).copied();
        match decision {
            Some(decision) => Ok(JudgeRuling {
                challenger_score: if decision == Decision::Challenger { 8.0 } else { 5.0 },
                opponent_score: if decision == Decision::Opponent { 8.0 } else { 5.0 },
                decision,
                rationale: format!("{} favours {}", judge.name, decision),
            }),
            None => Err(AdjudicatorError::Request("judge endpoint unavailable".into())),
        }
    }
}

pub struct Harness {
    pub engine: Arc<DebateEngine>,
    pub store: SharedStore,
    pub clock: Arc<ManualClock>,
    pub judges: Arc<ScriptedJudges>,
}

impl Harness {
    pub fn new(judges: Arc<ScriptedJudges>) -> Self {
        Self::with_config(judges, EngineConfig::default())
    }

    pub fn deferred(judges: Arc<ScriptedJudges>) -> Self {
        Self::with_config(
            judges,
            EngineConfig {
                adjudication_mode: AdjudicationMode::Deferred,
                ..Default::default()
            },
        )
    }

    pub fn with_config(judges: Arc<ScriptedJudges>, config: EngineConfig) -> Self {
        Self::with_store(judges, config, MemoryStore::new().shared())
    }

    pub fn with_store(judges: Arc<ScriptedJudges>, config: EngineConfig, store: SharedStore) -> Self {
        let clock = ManualClock::shared(t0());
        let quota = Arc::new(MonthlyAppealQuota::new(config.monthly_appeal_limit));
        let engine = Arc::new(DebateEngine::new(
            store.clone(),
            judges.clone(),
            panel(),
            clock.clone(),
            config,
            quota,
        ));
        Self {
            engine,
            store,
            clock,
            judges,
        }
    }

    /// Create and accept an alice-vs-bob debate; round 1 is open.
    pub fn active_debate(&self, rounds: u32) -> DebateId {
        let id = self
            .engine
            .create_debate(NewDebate {
                topic: "Remote work is better for productivity".into(),
                category: "work".into(),
                challenger_id: alice(),
                challenger_position: Position::For,
                opponent_id: Some(bob()),
                total_rounds: rounds,
                round_duration: Duration::hours(1),
                visibility: Visibility::Public,
            })
            .unwrap();
        self.engine.accept_debate(&id, &bob()).unwrap();
        id
    }

    /// Both sides submit for the current round.
    pub fn both_submit(&self, id: &DebateId) {
        let round = self.engine.get_debate_state(id).unwrap().current_round;
        self.engine
            .submit_statement(id, &alice(), round, &format!("Alice, round {}", round))
            .unwrap();
        self.engine
            .submit_statement(id, &bob(), round, &format!("Bob, round {}", round))
            .unwrap();
    }

    /// Play a one-round debate to its original decision.
    pub async fn decided_debate(&self) -> DebateId {
        let id = self.active_debate(1);
        self.both_submit(&id);
        self.engine.sweep_expired_rounds().await;
        id
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

type Hook = Box<dyn FnOnce(&MemoryStore) + Send>;

/// In-memory store that runs a one-shot hook right before a statement
/// insert or a delete, standing in for another worker whose write commits
/// between the caller's read and its own write.
#[derive(Default)]
pub struct InterleavedStore {
    inner: MemoryStore,
    before_statement: Mutex<Option<Hook>>,
    before_delete: Mutex<Option<Hook>>,
}

impl InterleavedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn before_statement(&self, hook: impl FnOnce(&MemoryStore) + Send + 'static) {
        *self.before_statement.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn before_delete(&self, hook: impl FnOnce(&MemoryStore) + Send + 'static) {
        *self.before_delete.lock().unwrap() = Some(Box::new(hook));
    }

    fn fire(&self, slot: &Mutex<Option<Hook>>) {
        let hook = slot.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(&self.inner);
        }
    }
}

impl DebateStore for InterleavedStore {
    fn insert_debate(&self, debate: &Debate) -> StoreResult<()> {
        self.inner.insert_debate(debate)
    }

    fn get_debate(&self, debate_id: &DebateId) -> StoreResult<Option<Debate>> {
        self.inner.get_debate(debate_id)
    }

    fn debates_with_status(&self, statuses: &[DebateStatus]) -> StoreResult<Vec<Debate>> {
        self.inner.debates_with_status(statuses)
    }

    fn compare_and_swap_debate(&self, expected: &LifecycleStamp, next: &Debate) -> StoreResult<CasOutcome> {
        self.inner.compare_and_swap_debate(expected, next)
    }

    fn delete_debate_if(&self, debate_id: &DebateId, expected: &LifecycleStamp) -> StoreResult<CasOutcome> {
        self.fire(&self.before_delete);
        self.inner.delete_debate_if(debate_id, expected)
    }

    fn insert_statement(&self, statement: &Statement) -> StoreResult<()> {
        self.fire(&self.before_statement);
        self.inner.insert_statement(statement)
    }

    fn statements_for(&self, debate_id: &DebateId) -> StoreResult<Vec<Statement>> {
        self.inner.statements_for(debate_id)
    }

    fn insert_verdict(&self, verdict: &Verdict) -> StoreResult<VerdictWrite> {
        self.inner.insert_verdict(verdict)
    }

    fn verdicts_for(&self, debate_id: &DebateId) -> StoreResult<Vec<Verdict>> {
        self.inner.verdicts_for(debate_id)
    }

    fn put_event(&self, timestamp_nanos: i64, event_id: &str, event: &DebateEvent) -> StoreResult<()> {
        self.inner.put_event(timestamp_nanos, event_id, event)
    }

    fn events_between(&self, start_nanos: i64, end_nanos: i64) -> StoreResult<Vec<(i64, DebateEvent)>> {
        self.inner.events_between(start_nanos, end_nanos)
    }

    fn prune_events_before(&self, timestamp_nanos: i64) -> StoreResult<usize> {
        self.inner.prune_events_before(timestamp_nanos)
    }
}
