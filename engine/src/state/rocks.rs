//! RocksDB-backed debate store
//!
//! Provides persistent storage with column families for logical data separation.
//! Uses bincode for efficient binary serialization internally; events are
//! stored as JSON for debuggability.
//!
//! Plain reads share the lock. Conditional writes and inserts-if-absent take
//! it exclusively, so the read-compare-write sequence cannot interleave.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB,
};
use serde::{de::DeserializeOwned, Serialize};

use super::schema::{self, keys, ALL_CFS};
use super::store::{
    check_statement, prepare_swap, prepare_verdict, CasOutcome, DebateStore, SharedStore,
    StoreError, StoreResult, VerdictWrite,
};
use crate::debate::{Debate, DebateId, DebateStatus, LifecycleStamp, Statement};
use crate::events::DebateEvent;
use crate::judging::Verdict;

/// RocksDB-backed persistent state store
pub struct StateStore {
    db: RwLock<DB>,
    path: PathBuf,
}

impl StateStore {
    /// Open or create a state store at the given path
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &path, cf_descriptors)?;

        Ok(Self {
            db: RwLock::new(db),
            path,
        })
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedStore {
        Arc::new(self)
    }

    /// Get the database path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    // =========================================================================
    // Generic operations (caller holds the lock)
    // =========================================================================

    fn cf<'a>(db: &'a DB, cf_name: &str) -> StoreResult<&'a ColumnFamily> {
        db.cf_handle(cf_name)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(cf_name.to_string()))
    }

    fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
        bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(value, _)| value)
            .map_err(|e| StoreError::Deserialization(e.to_string()))
    }

    fn put<T: Serialize>(db: &DB, cf_name: &str, key: &str, value: &T) -> StoreResult<()> {
        let cf = Self::cf(db, cf_name)?;
        db.put_cf(cf, key.as_bytes(), Self::encode(value)?)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(db: &DB, cf_name: &str, key: &str) -> StoreResult<Option<T>> {
        let cf = Self::cf(db, cf_name)?;
        match db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn exists(db: &DB, cf_name: &str, key: &str) -> StoreResult<bool> {
        let cf = Self::cf(db, cf_name)?;
        Ok(db.get_cf(cf, key.as_bytes())?.is_some())
    }

    /// Keys and values under a prefix, in key order
    fn scan_prefix(db: &DB, cf_name: &str, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let cf = Self::cf(db, cf_name)?;
        let iter = db.iterator_cf(cf, IteratorMode::From(prefix.as_bytes(), Direction::Forward));

        let mut entries = Vec::new();
        for result in iter {
            let (key, value) = result?;
            let key_str = String::from_utf8(key.to_vec())
                .map_err(|e| StoreError::Deserialization(e.to_string()))?;
            if !key_str.starts_with(prefix) {
                break;
            }
            entries.push((key_str, value.to_vec()));
        }
        Ok(entries)
    }

    fn scan_values<T: DeserializeOwned>(db: &DB, cf_name: &str, prefix: &str) -> StoreResult<Vec<T>> {
        Self::scan_prefix(db, cf_name, prefix)?
            .into_iter()
            .map(|(_, bytes)| Self::decode(&bytes))
            .collect()
    }

    fn delete_prefix(db: &DB, cf_name: &str, prefix: &str) -> StoreResult<usize> {
        let cf = Self::cf(db, cf_name)?;
        let keys = Self::scan_prefix(db, cf_name, prefix)?;
        let count = keys.len();
        for (key, _) in keys {
            db.delete_cf(cf, key.as_bytes())?;
        }
        Ok(count)
    }
}

impl DebateStore for StateStore {
    fn insert_debate(&self, debate: &Debate) -> StoreResult<()> {
        let key = keys::debate(debate.id.as_str());
        let db = self.db.write().map_err(|_| StoreError::LockPoisoned)?;
        if Self::exists(&db, schema::CF_DEBATES, &key)? {
            return Err(StoreError::Duplicate(key));
        }
        Self::put(&db, schema::CF_DEBATES, &key, debate)
    }

    fn get_debate(&self, debate_id: &DebateId) -> StoreResult<Option<Debate>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        Self::get(&db, schema::CF_DEBATES, &keys::debate(debate_id.as_str()))
    }

    fn debates_with_status(&self, statuses: &[DebateStatus]) -> StoreResult<Vec<Debate>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let debates: Vec<Debate> =
            Self::scan_values(&db, schema::CF_DEBATES, keys::DEBATE_PREFIX)?;
        Ok(debates
            .into_iter()
            .filter(|d| statuses.contains(&d.status))
            .collect())
    }

    fn compare_and_swap_debate(
        &self,
        expected: &LifecycleStamp,
        next: &Debate,
    ) -> StoreResult<CasOutcome> {
        let key = keys::debate(next.id.as_str());
        let db = self.db.write().map_err(|_| StoreError::LockPoisoned)?;
        let Some(current) = Self::get::<Debate>(&db, schema::CF_DEBATES, &key)? else {
            return Ok(CasOutcome::Conflict(None));
        };

        match prepare_swap(&current, expected, next)? {
            Some(stored) => {
                Self::put(&db, schema::CF_DEBATES, &key, &stored)?;
                Ok(CasOutcome::Swapped(stored))
            }
            None => Ok(CasOutcome::Conflict(Some(current))),
        }
    }

    fn delete_debate_if(
        &self,
        debate_id: &DebateId,
        expected: &LifecycleStamp,
    ) -> StoreResult<CasOutcome> {
        let key = keys::debate(debate_id.as_str());
        let db = self.db.write().map_err(|_| StoreError::LockPoisoned)?;
        let Some(current) = Self::get::<Debate>(&db, schema::CF_DEBATES, &key)? else {
            return Ok(CasOutcome::Conflict(None));
        };
        if current.stamp() != *expected {
            return Ok(CasOutcome::Conflict(Some(current)));
        }

        Self::delete_prefix(
            &db,
            schema::CF_STATEMENTS,
            &keys::statement_prefix(debate_id.as_str()),
        )?;
        Self::delete_prefix(
            &db,
            schema::CF_VERDICTS,
            &keys::verdict_prefix(debate_id.as_str()),
        )?;
        let cf = Self::cf(&db, schema::CF_DEBATES)?;
        db.delete_cf(cf, key.as_bytes())?;
        Ok(CasOutcome::Swapped(current))
    }

    fn insert_statement(&self, statement: &Statement) -> StoreResult<()> {
        let key = keys::statement(
            statement.debate_id.as_str(),
            statement.round,
            statement.author_id.as_str(),
        );
        let db = self.db.write().map_err(|_| StoreError::LockPoisoned)?;
        let debate: Option<Debate> = Self::get(
            &db,
            schema::CF_DEBATES,
            &keys::debate(statement.debate_id.as_str()),
        )?;
        check_statement(debate.as_ref(), statement)?;
        if Self::exists(&db, schema::CF_STATEMENTS, &key)? {
            return Err(StoreError::Duplicate(key));
        }
        Self::put(&db, schema::CF_STATEMENTS, &key, statement)
    }

    fn statements_for(&self, debate_id: &DebateId) -> StoreResult<Vec<Statement>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut statements: Vec<Statement> = Self::scan_values(
            &db,
            schema::CF_STATEMENTS,
            &keys::statement_prefix(debate_id.as_str()),
        )?;
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
        let db = self.db.write().map_err(|_| StoreError::LockPoisoned)?;
        if Self::exists(&db, schema::CF_VERDICTS, &key)? {
            return Ok(VerdictWrite::Exists);
        }
        let current: Option<Debate> = Self::get(&db, schema::CF_DEBATES, &debate_key)?;
        let Some(debate) = prepare_verdict(current.as_ref(), verdict) else {
            return Ok(VerdictWrite::PassClosed);
        };

        // Verdict row and revision bump land together.
        let mut batch = WriteBatch::default();
        batch.put_cf(
            Self::cf(&db, schema::CF_VERDICTS)?,
            key.as_bytes(),
            Self::encode(verdict)?,
        );
        batch.put_cf(
            Self::cf(&db, schema::CF_DEBATES)?,
            debate_key.as_bytes(),
            Self::encode(&debate)?,
        );
        db.write(batch)?;
        Ok(VerdictWrite::Inserted)
    }

    fn verdicts_for(&self, debate_id: &DebateId) -> StoreResult<Vec<Verdict>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        Self::scan_values(
            &db,
            schema::CF_VERDICTS,
            &keys::verdict_prefix(debate_id.as_str()),
        )
    }

    fn verdicts_for_pass(&self, debate_id: &DebateId, pass: u32) -> StoreResult<Vec<Verdict>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        Self::scan_values(
            &db,
            schema::CF_VERDICTS,
            &keys::verdict_pass_prefix(debate_id.as_str(), pass),
        )
    }

    fn put_event(
        &self,
        timestamp_nanos: i64,
        event_id: &str,
        event: &DebateEvent,
    ) -> StoreResult<()> {
        let key = keys::event(timestamp_nanos, event_id);
        let bytes =
            serde_json::to_vec(event).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let cf = Self::cf(&db, schema::CF_EVENTS)?;
        db.put_cf(cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    fn events_between(
        &self,
        start_nanos: i64,
        end_nanos: i64,
    ) -> StoreResult<Vec<(i64, DebateEvent)>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let cf = Self::cf(&db, schema::CF_EVENTS)?;

        let start_key = keys::event(start_nanos, "");
        let iter = db.iterator_cf(
            cf,
            IteratorMode::From(start_key.as_bytes(), Direction::Forward),
        );

        let mut events = Vec::new();
        for result in iter {
            let (key, value) = result?;
            let key_str = String::from_utf8(key.to_vec())
                .map_err(|e| StoreError::Deserialization(e.to_string()))?;

            if let Some(ts) = keys::parse_event_timestamp(&key_str) {
                if ts > end_nanos {
                    break;
                }
                let event: DebateEvent = serde_json::from_slice(&value)
                    .map_err(|e| StoreError::Deserialization(e.to_string()))?;
                events.push((ts, event));
            }
        }

        Ok(events)
    }

    fn prune_events_before(&self, timestamp_nanos: i64) -> StoreResult<usize> {
        let db = self.db.write().map_err(|_| StoreError::LockPoisoned)?;
        let cf = Self::cf(&db, schema::CF_EVENTS)?;

        let end_key = keys::event(timestamp_nanos, "");
        let mut keys_to_delete = Vec::new();
        for result in db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = result?;
            if key.as_ref() >= end_key.as_bytes() {
                break;
            }
            keys_to_delete.push(key.to_vec());
        }

        let count = keys_to_delete.len();
        for key in keys_to_delete {
            db.delete_cf(cf, key)?;
        }
        Ok(count)
    }
}
