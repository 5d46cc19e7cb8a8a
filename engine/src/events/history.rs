//! Event history
//!
//! Queries over persisted events for audit and debugging.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::bus::EventFilter;
use super::types::DebateEvent;
use crate::debate::DebateId;
use crate::state::{SharedStore, StoreError};

/// Error type for history operations
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Event history manager for querying and pruning
pub struct EventHistory {
    store: SharedStore,
}

impl EventHistory {
    /// Create a new event history manager
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Get all events in a time range
    pub fn get_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> HistoryResult<Vec<DebateEvent>> {
        let start_nanos = start.timestamp_nanos_opt().unwrap_or(0);
        let end_nanos = end.timestamp_nanos_opt().unwrap_or(i64::MAX);

        let events: Vec<DebateEvent> = self
            .store
            .events_between(start_nanos, end_nanos)?
            .into_iter()
            .map(|(_, event)| event)
            .collect();

        debug!(count = events.len(), "Retrieved events from history");
        Ok(events)
    }

    /// Full recorded history of one debate, oldest first
    pub fn debate_history(&self, debate_id: &DebateId) -> HistoryResult<Vec<DebateEvent>> {
        Ok(self
            .store
            .events_between(0, i64::MAX)?
            .into_iter()
            .map(|(_, event)| event)
            .filter(|e| e.debate_id() == debate_id)
            .collect())
    }

    /// Events in a time range that match `filter`
    pub fn get_matching(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &EventFilter,
    ) -> HistoryResult<Vec<DebateEvent>> {
        let mut events = self.get_events(start, end)?;
        events.retain(|e| filter.matches(e));
        Ok(events)
    }

    /// Prune old events to manage storage
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> HistoryResult<usize> {
        let cutoff_nanos = cutoff.timestamp_nanos_opt().unwrap_or(0);
        let count = self.store.prune_events_before(cutoff_nanos)?;

        info!(count, cutoff = %cutoff, "Pruned old events");
        Ok(count)
    }

    /// Get event statistics for the matching events of a time range
    pub fn get_stats(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &EventFilter,
    ) -> HistoryResult<EventStats> {
        let events = self.get_matching(start, end, filter)?;
        Ok(EventStats::from_events(&events))
    }
}

/// Aggregate statistics for events
#[derive(Debug, Default, serde::Serialize)]
pub struct EventStats {
    pub total_events: usize,
    pub events_by_type: HashMap<String, usize>,
    pub unique_debates: usize,
    pub rounds_advanced: usize,
    pub verdicts_recorded: usize,
    pub judge_failures: usize,
    pub appeals: usize,
    pub flips: usize,
}

impl EventStats {
    pub fn from_events(events: &[DebateEvent]) -> Self {
        let mut stats = Self::default();
        let mut debates = HashSet::new();

        for event in events {
            stats.total_events += 1;
            *stats
                .events_by_type
                .entry(event.event_type().to_string())
                .or_insert(0) += 1;
            debates.insert(event.debate_id().clone());

            match event {
                DebateEvent::RoundAdvanced { .. } => stats.rounds_advanced += 1,
                DebateEvent::VerdictRecorded { .. } => stats.verdicts_recorded += 1,
                DebateEvent::JudgeFailed { .. } => stats.judge_failures += 1,
                DebateEvent::AppealRequested { .. } => stats.appeals += 1,
                DebateEvent::AppealResolved { flipped: true, .. } => stats.flips += 1,
                _ => {}
            }
        }

        stats.unique_debates = debates.len();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::{JudgeId, UserId};
    use crate::events::EventBus;
    use crate::judging::Decision;
    use crate::state::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn sample_events() -> Vec<DebateEvent> {
        vec![
            DebateEvent::RoundAdvanced {
                debate_id: DebateId::from("d-1"),
                from_round: 1,
                to_round: 2,
                round_deadline: t(60),
                early: false,
                timestamp: t(0),
            },
            DebateEvent::VerdictRecorded {
                debate_id: DebateId::from("d-1"),
                judge_id: JudgeId::from("logician"),
                pass: 0,
                decision: Decision::Opponent,
                timestamp: t(1),
            },
            DebateEvent::JudgeFailed {
                debate_id: DebateId::from("d-2"),
                judge_id: JudgeId::from("rhetorician"),
                pass: 0,
                error: "timeout".to_string(),
                timestamp: t(2),
            },
            DebateEvent::AppealResolved {
                debate_id: DebateId::from("d-1"),
                pass: 1,
                original_winner_id: Some(UserId::from("bob")),
                winner_id: Some(UserId::from("alice")),
                flipped: true,
                timestamp: t(3),
            },
        ]
    }

    #[test]
    fn test_event_stats() {
        let stats = EventStats::from_events(&sample_events());

        assert_eq!(stats.total_events, 4);
        assert_eq!(stats.unique_debates, 2);
        assert_eq!(stats.rounds_advanced, 1);
        assert_eq!(stats.judge_failures, 1);
        assert_eq!(stats.flips, 1);
    }

    #[test]
    fn test_debate_history_and_range() {
        let store = MemoryStore::new().shared();
        let bus = EventBus::with_persistence(store.clone());
        for event in sample_events() {
            bus.publish(event).unwrap();
        }

        let history = EventHistory::new(store);
        assert_eq!(history.debate_history(&DebateId::from("d-1")).unwrap().len(), 3);
        assert_eq!(history.get_events(t(1), t(2)).unwrap().len(), 2);

        assert_eq!(history.prune_before(t(2)).unwrap(), 2);
        assert_eq!(history.get_events(t(0), t(10)).unwrap().len(), 2);
    }

    #[test]
    fn test_stats_for_one_debate() {
        let store = MemoryStore::new().shared();
        let bus = EventBus::with_persistence(store.clone());
        for event in sample_events() {
            bus.publish(event).unwrap();
        }

        let history = EventHistory::new(store);
        let filter = EventFilter::new().debate(&DebateId::from("d-1"));
        let events = history.get_matching(t(0), t(10), &filter).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events.first().map(|e| e.event_type()), Some("round_advanced"));

        let stats = history.get_stats(t(0), t(10), &filter).unwrap();
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.unique_debates, 1);
    }
}
