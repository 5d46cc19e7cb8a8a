//! Transition notification hook
//!
//! This module provides the pub/sub messaging that tells collaborators
//! (notifications, feeds) about debate transitions, and persists event
//! history for audit.
//!
//! # Architecture
//!
//! 1. **Event Types** (`types.rs`): one variant per lifecycle transition,
//!    from challenge creation to appeal resolution.
//!
//! 2. **Event Bus** (`bus.rs`): Tokio broadcast-based pub/sub with
//!    optional persistence to the debate store.
//!
//! 3. **Event History** (`history.rs`): Range queries, per-debate history, statistics and pruning.
//!
//! # Event Flow
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Engine     │────▶│  Event Bus   │────▶│  Subscribers │
//! │  (publish)   │     │  (broadcast) │     │   (recv)     │
//! └──────────────┘     └──────┬───────┘     └──────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │ DebateStore  │
//!                      │  (persist)   │
//!                      └──────────────┘
//! ```
//!
//! The engine publishes after its conditional write has landed and ignores
//! publish errors: a transition never waits on, or fails because of,
//! notification delivery.

pub mod bus;
pub mod history;
pub mod types;

pub use bus::{
    EventBus, EventBusError, EventBusResult, EventFilter, FilteredReceiver, SharedEventBus,
};
pub use history::{EventHistory, EventStats, HistoryError, HistoryResult};
pub use types::{DebateEvent, EventId};
