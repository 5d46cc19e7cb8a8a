//! Persistence for debates, statements, verdicts and event history
//!
//! # Architecture
//!
//! Storage sits behind the [`DebateStore`] trait. Two implementations ship:
//!
//! - [`MemoryStore`]: ordered maps under one lock. The default, and what
//!   the tests run against.
//! - `StateStore` (feature `persistent`): RocksDB with one column family
//!   per data type, sharing a single database instance:
//!   - `debates`: Debate aggregates, one row per debate
//!   - `statements`: append-only round statements
//!   - `verdicts`: append-only judge verdicts, keyed by adjudication pass
//!   - `events`: event history for replay
//!
//! # Usage
//!
//! ```ignore
//! use debate_engine::state::{DebateStore, StateStore};
//!
//! let store = StateStore::open("./arena-state")?.shared();
//! let waiting = store.debates_with_status(&[DebateStatus::Waiting])?;
//! ```

pub mod memory;
#[cfg(feature = "persistent")]
pub mod rocks;
pub mod schema;
pub mod store;

pub use memory::MemoryStore;
#[cfg(feature = "persistent")]
pub use rocks::StateStore;
pub use store::{CasOutcome, DebateStore, SharedStore, StoreError, StoreResult, VerdictWrite};
