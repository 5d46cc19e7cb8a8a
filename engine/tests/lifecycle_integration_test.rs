//! Debate lifecycle integration tests: creation, statements, the expiry
//! sweep and original adjudication, driven by scripted judges and a
//! manual clock (no LLM calls, no wall-clock sleeps).

mod support;

use std::time::Duration as StdDuration;

use chrono::Duration;
use debate_engine::judging::aggregate;
use debate_engine::{
    DebateEvent, DebateStatus, DebateStore, Decision, EngineConfig, EngineError, EventFilter,
    NewDebate, Position, UserId, Visibility,
};
use support::{alice, bob, t0, Harness, InterleavedStore, ScriptedJudges};

// ── Early completion ──────────────────────────────────────────────

#[tokio::test]
async fn test_both_submitted_finalizes_before_deadline() {
    let h = Harness::new(ScriptedJudges::unanimous(Decision::Opponent));
    let id = h.active_debate(1);
    h.both_submit(&id);

    // Still well inside the one-hour round.
    h.advance(Duration::minutes(5));
    let summary = h.engine.sweep_expired_rounds().await;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.adjudicated, 1);
    assert_eq!(summary.error_count(), 0);

    let state = h.engine.get_debate_state(&id).unwrap();
    assert_eq!(state.status, DebateStatus::Completed);
    assert_eq!(state.winner_id, Some(bob()));
    assert_eq!(state.original_winner_id, Some(bob()));
    assert!(!state.verdict_pending);
    assert!(state.round_deadline.is_none());

    let sheet = h.engine.verdicts(&id).unwrap();
    assert_eq!(sheet.original.len(), 3);
    assert!(sheet.appeals.is_empty());
    assert_eq!(h.judges.calls(), 3);
}

#[tokio::test]
async fn test_one_sided_round_waits_for_deadline() {
    let h = Harness::new(ScriptedJudges::unanimous(Decision::Tie));
    let id = h.active_debate(2);
    h.engine
        .submit_statement(&id, &alice(), 1, "Commutes waste hours every week.")
        .unwrap();

    let summary = h.engine.sweep_expired_rounds().await;
    assert_eq!(summary.processed, 0);
    assert_eq!(h.engine.get_debate_state(&id).unwrap().current_round, 1);
}

// ── Silent rounds still advance ───────────────────────────────────

#[tokio::test]
async fn test_silent_side_does_not_stall_rounds() {
    let h = Harness::new(ScriptedJudges::unanimous(Decision::Challenger));
    let id = h.active_debate(3);

    h.both_submit(&id);
    let summary = h.engine.sweep_expired_rounds().await;
    assert_eq!(summary.advanced, 1);
    assert_eq!(h.engine.get_debate_state(&id).unwrap().current_round, 2);

    // Round 2: only the challenger speaks.
    h.engine
        .submit_statement(&id, &alice(), 2, "Focus time is measurable.")
        .unwrap();
    h.advance(Duration::hours(1));
    let summary = h.engine.sweep_expired_rounds().await;
    assert_eq!(summary.advanced, 1);
    assert_eq!(h.engine.get_debate_state(&id).unwrap().current_round, 3);

    // Round 3: nobody speaks.
    h.advance(Duration::hours(1));
    let summary = h.engine.sweep_expired_rounds().await;
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.adjudicated, 1);

    let request = h.judges.last_request().unwrap();
    assert_eq!(request.rounds.len(), 3);
    assert_eq!(request.rounds[1].challenger.as_deref(), Some("Focus time is measurable."));
    assert_eq!(request.rounds[1].opponent, None);
    assert_eq!(request.rounds[1].text(debate_engine::Side::Opponent), "");
    assert!(request.rounds[2].challenger.is_none() && request.rounds[2].opponent.is_none());

    let state = h.engine.get_debate_state(&id).unwrap();
    assert_eq!(state.winner_id, Some(alice()));
}

#[tokio::test]
async fn test_wholly_silent_debate_is_still_adjudicated() {
    let h = Harness::new(ScriptedJudges::unanimous(Decision::Tie));
    let id = h.active_debate(1);

    h.advance(Duration::hours(2));
    let summary = h.engine.sweep_expired_rounds().await;
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.adjudicated, 1);

    // A judged tie: no winner, but verdicts exist.
    let state = h.engine.get_debate_state(&id).unwrap();
    assert_eq!(state.winner_id, None);
    assert!(!state.verdict_pending);
    assert_eq!(h.engine.verdicts(&id).unwrap().original.len(), 3);
}

// ── Judge failures and retries ────────────────────────────────────

#[tokio::test]
async fn test_all_judges_failing_leaves_verdict_pending() {
    let judges = ScriptedJudges::new();
    let h = Harness::new(judges.clone());
    let id = h.active_debate(1);
    h.both_submit(&id);

    let summary = h.engine.sweep_expired_rounds().await;
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.adjudicated, 0);
    assert_eq!(summary.verdicts_pending, 1);
    assert_eq!(summary.error_count(), 0);

    let state = h.engine.get_debate_state(&id).unwrap();
    assert_eq!(state.status, DebateStatus::Completed);
    assert_eq!(state.winner_id, None);
    assert!(state.verdict_pending);
    assert_eq!(h.engine.verdicts(&id).unwrap().total(), 0);

    // Judges recover; the next sweep retries the pending pass.
    judges.set_all(Decision::Challenger);
    let summary = h.engine.sweep_expired_rounds().await;
    assert_eq!(summary.adjudicated, 1);

    let state = h.engine.get_debate_state(&id).unwrap();
    assert_eq!(state.winner_id, Some(alice()));
    assert_eq!(state.original_winner_id, Some(alice()));
    assert_eq!(h.engine.verdicts(&id).unwrap().original.len(), 3);
    assert_eq!(judges.calls(), 6);
}

#[tokio::test]
async fn test_partial_judge_failure_only_retries_missing_judges() {
    let judges = ScriptedJudges::new();
    judges.set("logician", Decision::Opponent);
    let h = Harness::new(judges.clone());
    let id = h.active_debate(1);
    h.both_submit(&id);

    h.engine.sweep_expired_rounds().await;
    // One verdict is enough to decide.
    let state = h.engine.get_debate_state(&id).unwrap();
    assert_eq!(state.winner_id, Some(bob()));
    assert_eq!(h.engine.verdicts(&id).unwrap().original.len(), 1);

    // Decided debates are not drained again.
    judges.set_all(Decision::Challenger);
    let summary = h.engine.drain_pending_verdicts().await;
    assert_eq!(summary.adjudicated, 0);
    assert_eq!(h.engine.get_debate_state(&id).unwrap().winner_id, Some(bob()));
}

// ── Deferred adjudication ─────────────────────────────────────────

#[tokio::test]
async fn test_deferred_mode_queues_adjudication() {
    let h = Harness::deferred(ScriptedJudges::unanimous(Decision::Opponent));
    let id = h.active_debate(1);
    h.both_submit(&id);

    let summary = h.engine.sweep_expired_rounds().await;
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.adjudicated, 0);
    assert_eq!(h.judges.calls(), 0);

    let state = h.engine.get_debate_state(&id).unwrap();
    assert_eq!(state.status, DebateStatus::VerdictReady);
    assert!(state.verdict_pending);

    let summary = h.engine.drain_pending_verdicts().await;
    assert_eq!(summary.adjudicated, 1);

    let state = h.engine.get_debate_state(&id).unwrap();
    assert_eq!(state.status, DebateStatus::Completed);
    assert_eq!(state.winner_id, Some(bob()));
}

#[tokio::test]
async fn test_deferred_mode_next_sweep_drains() {
    let h = Harness::deferred(ScriptedJudges::unanimous(Decision::Challenger));
    let id = h.active_debate(1);
    h.both_submit(&id);

    h.engine.sweep_expired_rounds().await;
    let summary = h.engine.sweep_expired_rounds().await;
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.adjudicated, 1);
    assert_eq!(
        h.engine.get_debate_state(&id).unwrap().status,
        DebateStatus::Completed
    );
}

// ── Sweep properties ──────────────────────────────────────────────

#[tokio::test]
async fn test_double_sweep_is_idempotent() {
    let h = Harness::new(ScriptedJudges::unanimous(Decision::Tie));
    let ids: Vec<_> = (0..3).map(|_| h.active_debate(3)).collect();

    h.advance(Duration::hours(1));
    let first = h.engine.sweep_expired_rounds().await;
    assert_eq!(first.advanced, 3);

    let second = h.engine.sweep_expired_rounds().await;
    assert_eq!(second.processed, 0);
    assert_eq!(second.advanced, 0);

    for id in &ids {
        assert_eq!(h.engine.get_debate_state(id).unwrap().current_round, 2);
    }
}

#[tokio::test]
async fn test_rounds_are_monotonic_and_deadlines_track_status() {
    let h = Harness::new(ScriptedJudges::unanimous(Decision::Opponent));
    let id = h.active_debate(4);

    let mut last_round = 1;
    for step in 0..8 {
        if step % 3 == 0 {
            h.advance(Duration::minutes(20));
        } else {
            h.advance(Duration::minutes(45));
        }
        h.engine.sweep_expired_rounds().await;

        let state = h.engine.get_debate_state(&id).unwrap();
        assert!(state.current_round >= last_round);
        last_round = state.current_round;

        match state.status {
            DebateStatus::Active => assert!(state.round_deadline.is_some()),
            _ => assert!(state.round_deadline.is_none()),
        }
    }

    let state = h.engine.get_debate_state(&id).unwrap();
    assert_eq!(state.status, DebateStatus::Completed);
    assert_eq!(state.current_round, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_sweeps_advance_each_round_once() {
    let h = Harness::new(ScriptedJudges::unanimous(Decision::Challenger));
    let ids: Vec<_> = (0..12).map(|_| h.active_debate(3)).collect();
    h.advance(Duration::hours(1));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.sweep_expired_rounds().await })
        })
        .collect();

    let mut advanced = 0;
    for handle in handles {
        let summary = handle.await.unwrap();
        assert_eq!(summary.error_count(), 0);
        advanced += summary.advanced;
    }

    assert_eq!(advanced, ids.len());
    for id in &ids {
        assert_eq!(h.engine.get_debate_state(id).unwrap().current_round, 2);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_sweeps_never_duplicate_verdicts() {
    let h = Harness::new(ScriptedJudges::unanimous(Decision::Opponent));
    let ids: Vec<_> = (0..6)
        .map(|_| {
            let id = h.active_debate(1);
            h.both_submit(&id);
            id
        })
        .collect();

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.sweep_expired_rounds().await })
        })
        .collect();

    let mut completed = 0;
    for handle in handles {
        completed += handle.await.unwrap().completed;
    }
    assert_eq!(completed, ids.len());

    for id in &ids {
        let state = h.engine.get_debate_state(id).unwrap();
        assert_eq!(state.status, DebateStatus::Completed);
        assert_eq!(state.winner_id, Some(bob()));
        assert_eq!(h.engine.verdicts(id).unwrap().original.len(), 3);
    }
}

#[tokio::test(start_paused = true)]
async fn test_late_verdict_after_decision_is_discarded() {
    // The logician fails fast in the first drain and answers slowly in the
    // second, after the first drain has already applied its decision.
    let judges = ScriptedJudges::new();
    judges.set("logician", Decision::Challenger);
    judges.set("rhetorician", Decision::Challenger);
    judges.set("skeptic", Decision::Opponent);
    judges.fail_next("logician", 1);
    judges.delay("logician", StdDuration::from_millis(30));
    judges.delay("rhetorician", StdDuration::from_millis(10));
    judges.delay("skeptic", StdDuration::from_millis(10));

    let h = Harness::deferred(judges);
    let id = h.active_debate(1);
    h.both_submit(&id);
    h.engine.sweep_expired_rounds().await;
    assert_eq!(
        h.engine.get_debate_state(&id).unwrap().status,
        DebateStatus::VerdictReady
    );

    let (first, second) = tokio::join!(
        h.engine.drain_pending_verdicts(),
        h.engine.drain_pending_verdicts()
    );
    assert_eq!(first.adjudicated + second.adjudicated, 1);
    assert_eq!(first.error_count() + second.error_count(), 0);

    let state = h.engine.get_debate_state(&id).unwrap();
    let sheet = h.engine.verdicts(&id).unwrap();
    assert_eq!(state.status, DebateStatus::Completed);
    assert_eq!(sheet.original.len(), 2);
    assert!(state.winner_id.is_none());
    assert_eq!(
        aggregate(&sheet.original).map(|agg| agg.winner_id),
        Some(state.winner_id.clone())
    );
    assert_eq!(h.judges.calls(), 6);
}

// ── Statements ────────────────────────────────────────────────────

#[tokio::test]
async fn test_statement_preconditions() {
    let h = Harness::new(ScriptedJudges::unanimous(Decision::Tie));
    let id = h.active_debate(2);

    let err = h
        .engine
        .submit_statement(&id, &UserId::from("mallory"), 1, "hi")
        .unwrap_err();
    assert!(matches!(err, EngineError::NotParticipant(_)));

    let err = h.engine.submit_statement(&id, &alice(), 2, "early").unwrap_err();
    assert!(matches!(err, EngineError::RoundClosed { round: 2, .. }));

    let err = h.engine.submit_statement(&id, &alice(), 1, "   ").unwrap_err();
    assert!(matches!(err, EngineError::InvalidStatement(_)));

    let too_long = "x".repeat(h.engine.config().max_statement_chars + 1);
    let err = h.engine.submit_statement(&id, &alice(), 1, &too_long).unwrap_err();
    assert!(matches!(err, EngineError::InvalidStatement(_)));

    h.engine.submit_statement(&id, &alice(), 1, "opening").unwrap();
    let err = h.engine.submit_statement(&id, &alice(), 1, "again").unwrap_err();
    assert!(matches!(err, EngineError::DuplicateSubmission { round: 1, .. }));
    assert!(err.is_precondition());

    assert_eq!(h.engine.statements(&id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_late_submission_rejected_before_sweep() {
    let h = Harness::new(ScriptedJudges::unanimous(Decision::Tie));
    let id = h.active_debate(2);

    h.advance(Duration::hours(1) + Duration::seconds(1));
    let err = h
        .engine
        .submit_statement(&id, &bob(), 1, "sorry I'm late")
        .unwrap_err();
    assert!(matches!(err, EngineError::RoundClosed { round: 1, .. }));
    assert!(h.engine.statements(&id).unwrap().is_empty());
}

#[tokio::test]
async fn test_statement_on_waiting_debate_rejected() {
    let h = Harness::new(ScriptedJudges::unanimous(Decision::Tie));
    let id = h
        .engine
        .create_debate(NewDebate {
            topic: "Tabs beat spaces".into(),
            category: "tech".into(),
            challenger_id: alice(),
            challenger_position: Position::Against,
            opponent_id: None,
            total_rounds: 2,
            round_duration: Duration::hours(1),
            visibility: Visibility::Unlisted,
        })
        .unwrap();

    let err = h.engine.submit_statement(&id, &alice(), 1, "hello").unwrap_err();
    assert!(matches!(err, EngineError::RoundClosed { .. }));
}

#[tokio::test]
async fn test_statement_refused_when_round_advances_underneath() {
    let store = InterleavedStore::new();
    let h = Harness::with_store(
        ScriptedJudges::unanimous(Decision::Tie),
        EngineConfig::default(),
        store.clone(),
    );
    let id = h.active_debate(2);

    // A sweep advances the round after the submission read round 1.
    let hooked = id.clone();
    store.before_statement(move |inner| {
        let current = inner.get_debate(&hooked).unwrap().unwrap();
        let next = current.round_advanced(t0() + Duration::minutes(30)).unwrap();
        assert!(inner
            .compare_and_swap_debate(&current.stamp(), &next)
            .unwrap()
            .is_swapped());
    });

    let err = h
        .engine
        .submit_statement(&id, &alice(), 1, "Offices exist for a reason.")
        .unwrap_err();
    assert!(matches!(err, EngineError::RoundClosed { round: 1, .. }));
    assert_eq!(h.engine.get_debate_state(&id).unwrap().current_round, 2);
    assert!(h.engine.statements(&id).unwrap().is_empty());

    // The new round takes statements normally.
    h.engine
        .submit_statement(&id, &alice(), 2, "Offices exist for a reason.")
        .unwrap();
}

#[tokio::test]
async fn test_statement_refused_when_debate_ends_underneath() {
    let store = InterleavedStore::new();
    let h = Harness::with_store(
        ScriptedJudges::unanimous(Decision::Opponent),
        EngineConfig::default(),
        store.clone(),
    );
    let id = h.active_debate(1);

    let hooked = id.clone();
    store.before_statement(move |inner| {
        let current = inner.get_debate(&hooked).unwrap().unwrap();
        let next = current
            .ended(DebateStatus::Completed, t0() + Duration::minutes(59))
            .unwrap();
        inner.compare_and_swap_debate(&current.stamp(), &next).unwrap();
    });

    let err = h
        .engine
        .submit_statement(&id, &bob(), 1, "One last point.")
        .unwrap_err();
    assert!(matches!(err, EngineError::RoundClosed { .. }));

    // The transcript the judges see stays the one that existed at the end.
    h.engine.drain_pending_verdicts().await;
    assert!(h.engine.statements(&id).unwrap().is_empty());
    assert!(h.judges.last_request().unwrap().is_silent());
}

// ── Creation, acceptance, deletion ────────────────────────────────

fn open_challenge(rounds: u32, duration: Duration) -> NewDebate {
    NewDebate {
        topic: "Nuclear power is green".into(),
        category: "energy".into(),
        challenger_id: alice(),
        challenger_position: Position::For,
        opponent_id: None,
        total_rounds: rounds,
        round_duration: duration,
        visibility: Visibility::Public,
    }
}

#[tokio::test]
async fn test_create_validation() {
    let h = Harness::new(ScriptedJudges::new());

    let err = h
        .engine
        .create_debate(open_challenge(0, Duration::hours(1)))
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidDebate(_)));

    let err = h
        .engine
        .create_debate(open_challenge(3, Duration::seconds(5)))
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidDebate(_)));

    let mut request = open_challenge(3, Duration::hours(1));
    request.opponent_id = Some(alice());
    assert!(matches!(
        h.engine.create_debate(request),
        Err(EngineError::InvalidDebate(_))
    ));

    let mut request = open_challenge(3, Duration::hours(1));
    request.topic = " ".into();
    assert!(matches!(
        h.engine.create_debate(request),
        Err(EngineError::InvalidDebate(_))
    ));
}

#[tokio::test]
async fn test_open_challenge_binds_acceptor() {
    let h = Harness::new(ScriptedJudges::new());
    let id = h
        .engine
        .create_debate(open_challenge(2, Duration::hours(1)))
        .unwrap();

    assert!(h.engine.accept_debate(&id, &alice()).is_err());

    let state = h.engine.accept_debate(&id, &bob()).unwrap();
    assert_eq!(state.status, DebateStatus::Active);
    assert_eq!(state.current_round, 1);
    assert_eq!(state.round_deadline, Some(support::t0() + Duration::hours(1)));

    let debate = h.engine.get_debate(&id).unwrap();
    assert_eq!(debate.opponent_id, Some(bob()));

    let err = h
        .engine
        .accept_debate(&id, &UserId::from("carol"))
        .unwrap_err();
    assert!(matches!(err, EngineError::NotAllowed(_)));
}

#[tokio::test]
async fn test_bound_challenge_rejects_other_acceptor() {
    let h = Harness::new(ScriptedJudges::new());
    let mut request = open_challenge(2, Duration::hours(1));
    request.opponent_id = Some(bob());
    let id = h.engine.create_debate(request).unwrap();

    let err = h
        .engine
        .accept_debate(&id, &UserId::from("carol"))
        .unwrap_err();
    assert!(matches!(err, EngineError::NotParticipant(_)));
    assert_eq!(
        h.engine.get_debate_state(&id).unwrap().status,
        DebateStatus::Waiting
    );
}

#[tokio::test]
async fn test_delete_waiting_challenge() {
    let h = Harness::new(ScriptedJudges::new());
    let id = h
        .engine
        .create_debate(open_challenge(2, Duration::hours(1)))
        .unwrap();

    let err = h.engine.delete_debate(&id, &bob()).unwrap_err();
    assert!(matches!(err, EngineError::NotAllowed(_)));

    h.engine.delete_debate(&id, &alice()).unwrap();
    assert!(matches!(
        h.engine.get_debate_state(&id),
        Err(EngineError::DebateNotFound(_))
    ));

    let started = h.active_debate(2);
    let err = h.engine.delete_debate(&started, &alice()).unwrap_err();
    assert!(matches!(err, EngineError::NotAllowed(_)));
}

#[tokio::test]
async fn test_delete_loses_to_concurrent_accept() {
    let store = InterleavedStore::new();
    let h = Harness::with_store(ScriptedJudges::new(), EngineConfig::default(), store.clone());
    let id = h
        .engine
        .create_debate(open_challenge(2, Duration::hours(1)))
        .unwrap();

    // Bob accepts after the delete read the debate as WAITING.
    let hooked = id.clone();
    store.before_delete(move |inner| {
        let current = inner.get_debate(&hooked).unwrap().unwrap();
        let next = current.activated(bob(), t0()).unwrap();
        assert!(inner
            .compare_and_swap_debate(&current.stamp(), &next)
            .unwrap()
            .is_swapped());
    });

    let err = h.engine.delete_debate(&id, &alice()).unwrap_err();
    assert!(matches!(err, EngineError::NotAllowed(_)));

    let state = h.engine.get_debate_state(&id).unwrap();
    assert_eq!(state.status, DebateStatus::Active);
    h.engine
        .submit_statement(&id, &alice(), 1, "Glad you showed up.")
        .unwrap();
}

// ── Event hook ────────────────────────────────────────────────────

#[tokio::test]
async fn test_transitions_publish_events() {
    let h = Harness::new(ScriptedJudges::unanimous(Decision::Challenger));
    let mut rx = h.engine.subscribe();

    let id = h.active_debate(2);
    h.both_submit(&id);
    h.engine.sweep_expired_rounds().await;
    h.advance(Duration::hours(1));
    h.engine.sweep_expired_rounds().await;

    let mut types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.debate_id(), &id);
        types.push(event.event_type());
    }

    for expected in [
        "debate_created",
        "debate_accepted",
        "statement_submitted",
        "round_advanced",
        "debate_ended",
        "verdict_recorded",
        "verdict_ready",
    ] {
        assert!(types.contains(&expected), "missing {}", expected);
    }

    // Persisted history mirrors the broadcast.
    let history = h.engine.history().debate_history(&id).unwrap();
    assert!(history
        .iter()
        .any(|e| matches!(e, DebateEvent::RoundAdvanced { early: true, .. })));
}

#[tokio::test]
async fn test_filtered_subscription_sees_one_debate() {
    let h = Harness::new(ScriptedJudges::unanimous(Decision::Opponent));
    let other = h.active_debate(1);
    let watched = h.active_debate(1);
    let mut rx = h
        .engine
        .subscribe_filtered(EventFilter::new().debate(&watched).notifications());

    h.both_submit(&other);
    h.both_submit(&watched);
    h.engine.sweep_expired_rounds().await;

    let ended = rx.recv().await.unwrap();
    assert_eq!(ended.debate_id(), &watched);
    assert_eq!(ended.event_type(), "debate_ended");
    let ready = rx.recv().await.unwrap();
    assert_eq!(ready.debate_id(), &watched);
    assert_eq!(ready.event_type(), "verdict_ready");
}
