//! In-memory debate store
//!
//! A single `RwLock` guards all tables, so every conditional write and
//! insert-if-absent is atomic. Keys follow [`super::schema::keys`] and the
//! tables are ordered maps, matching the RocksDB iteration order.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::schema::keys;
use super::store::{
    check_statement, prepare_swap, prepare_verdict, CasOutcome, DebateStore, SharedStore,
    StoreError, StoreResult, VerdictWrite,
};
use crate::debate::{Debate, DebateId, DebateStatus, LifecycleStamp, Statement};
use crate::events::DebateEvent;
use crate::judging::Verdict;

#[derive(Debug, Default)]
struct Tables {
    debates: BTreeMap<String, Debate>,
    statements: BTreeMap<String, Statement>,
    verdicts: BTreeMap<String, Verdict>,
    events: BTreeMap<String, (i64, DebateEvent)>,
}

/// Volatile store used by default and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedStore {
        Arc::new(self)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StoreError::LockPoisoned)
    }
}

fn scan<'a, T>(table: &'a BTreeMap<String, T>, prefix: &'a str) -> impl Iterator<Item = &'a T> + 'a {
    table
        .range(prefix.to_string()..)
        .take_while(move |(k, _)| k.starts_with(prefix))
        .map(|(_, v)| v)
}

impl DebateStore for MemoryStore {
    fn insert_debate(&self, debate: &Debate) -> StoreResult<()> {
        let key = keys::debate(debate.id.as_str());
        let mut tables = self.write()?;
        if tables.debates.contains_key(&key) {
            return Err(StoreError::Duplicate(key));
        }
        tables.debates.insert(key, debate.clone());
        Ok(())
    }

    fn get_debate(&self, debate_id: &DebateId) -> StoreResult<Option<Debate>> {
        let key = keys::debate(debate_id.as_str());
        Ok(self.read()?.debates.get(&key).cloned())
    }

    fn debates_with_status(&self, statuses: &[DebateStatus]) -> StoreResult<Vec<Debate>> {
        Ok(self
            .read()?
            .debates
            .values()
            .filter(|d| statuses.contains(&d.status))
            .cloned()
            .collect())
    }

    fn compare_and_swap_debate(
        &self,
        expected: &LifecycleStamp,
        next: &Debate,
    ) -> StoreResult<CasOutcome> {
        let key = keys::debate(next.id.as_str());
        let mut tables = self.write()?;
        let Some(current) = tables.debates.get(&key) else {
            return Ok(CasOutcome::Conflict(None));
        };

        match prepare_swap(current, expected, next)? {
            Some(stored) => {
                tables.debates.insert(key, stored.clone());
                Ok(CasOutcome::Swapped(stored))
            }
            None => Ok(CasOutcome::Conflict(Some(current.clone()))),
        }
    }

    fn delete_debate_if(
        &self,
        debate_id: &DebateId,
        expected: &LifecycleStamp,
    ) -> StoreResult<CasOutcome> {
        let key = keys::debate(debate_id.as_str());
        let mut tables = self.write()?;
        let Some(current) = tables.debates.get(&key) else {
            return Ok(CasOutcome::Conflict(None));
        };
        if current.stamp() != *expected {
            return Ok(CasOutcome::Conflict(Some(current.clone())));
        }

        let removed = current.clone();
        tables.debates.remove(&key);
        let stmt_prefix = keys::statement_prefix(debate_id.as_str());
        tables.statements.retain(|k, _| !k.starts_with(&stmt_prefix));
        let verdict_prefix = keys::verdict_prefix(debate_id.as_str());
        tables.verdicts.retain(|k, _| !k.starts_with(&verdict_prefix));

        Ok(CasOutcome::Swapped(removed))
    }

    fn insert_statement(&self, statement: &Statement) -> StoreResult<()> {
        let key = keys::statement(
            statement.debate_id.as_str(),
            statement.round,
            statement.author_id.as_str(),
        );
        let mut tables = self.write()?;
        let debate_key = keys::debate(statement.debate_id.as_str());
        check_statement(tables.debates.get(&debate_key), statement)?;
        if tables.statements.contains_key(&key) {
            return Err(StoreError::Duplicate(key));
        }
        tables.statements.insert(key, statement.clone());
        Ok(())
    }

    fn statements_for(&self, debate_id: &DebateId) -> StoreResult<Vec<Statement>> {
        let prefix = keys::statement_prefix(debate_id.as_str());
        let tables = self.read()?;
        let mut statements: Vec<Statement> = scan(&tables.statements, &prefix).cloned().collect();
        statements.sort_by(|a, b| (a.round, a.created_at).cmp(&(b.round, b.created_at)));
        Ok(statements)
    }

    fn insert_verdict(&self, verdict: &Verdict) -> StoreResult<VerdictWrite> {
        let key = keys::verdict(
            verdict.debate_id.as_str(),
            verdict.pass,
            verdict.judge_id.as_str(),
        );
        let debate_key = keys::debate(verdict.debate_id.as_str());
        let mut tables = self.write()?;
        if tables.verdicts.contains_key(&key) {
            return Ok(VerdictWrite::Exists);
        }
        let Some(debate) = prepare_verdict(tables.debates.get(&debate_key), verdict) else {
            return Ok(VerdictWrite::PassClosed);
        };
        tables.debates.insert(debate_key, debate);
        tables.verdicts.insert(key, verdict.clone());
        Ok(VerdictWrite::Inserted)
    }

    fn verdicts_for(&self, debate_id: &DebateId) -> StoreResult<Vec<Verdict>> {
        let prefix = keys::verdict_prefix(debate_id.as_str());
        let tables = self.read()?;
        Ok(scan(&tables.verdicts, &prefix).cloned().collect())
    }

    fn verdicts_for_pass(&self, debate_id: &DebateId, pass: u32) -> StoreResult<Vec<Verdict>> {
        let prefix = keys::verdict_pass_prefix(debate_id.as_str(), pass);
        let tables = self.read()?;
        Ok(scan(&tables.verdicts, &prefix).cloned().collect())
    }

    fn put_event(
        &self,
        timestamp_nanos: i64,
        event_id: &str,
        event: &DebateEvent,
    ) -> StoreResult<()> {
        let key = keys::event(timestamp_nanos, event_id);
        self.write()?
            .events
            .insert(key, (timestamp_nanos, event.clone()));
        Ok(())
    }

    fn events_between(
        &self,
        start_nanos: i64,
        end_nanos: i64,
    ) -> StoreResult<Vec<(i64, DebateEvent)>> {
        let start_key = keys::event(start_nanos, "");
        let tables = self.read()?;
        Ok(tables
            .events
            .range(start_key..)
            .map(|(_, entry)| entry)
            .take_while(|(ts, _)| *ts <= end_nanos)
            .cloned()
            .collect())
    }

    fn prune_events_before(&self, timestamp_nanos: i64) -> StoreResult<usize> {
        let mut tables = self.write()?;
        let before = tables.events.len();
        tables.events.retain(|_, (ts, _)| *ts >= timestamp_nanos);
        Ok(before - tables.events.len())
    }
}
