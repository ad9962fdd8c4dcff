//! # Questlog Core Library
//!
//! This library provides the core business logic for the Questlog daily
//! progression engine. It implements a CLI-first philosophy where all
//! operations are available via a standalone CLI binary, with any server
//! or GUI surface being a thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Progression Math**: Pure level-curve, award, and penalty rules
//! - **Live Path**: Synchronous recording of actions, awards, and sales
//!   with streak claiming
//! - **Reconciliation**: An idempotent overnight job that seals each
//!   user's previous local day, guarded by write-once summaries and
//!   daily marker events
//! - **Storage**: SQLite-backed profiles, stats, completions, and the
//!   append-only event ledger, plus TOML-based configuration
//!
//! ## Key Components
//!
//! - [`ProgressEngine`]: Live progression entry points
//! - [`ReconciliationEngine`]: Daily settlement job
//! - [`Store`]: Persistence for all progression state
//! - [`EngineConfig`]: Operator configuration management

pub mod calendar;
pub mod error;
pub mod events;
pub mod notify;
pub mod player;
pub mod progress;
pub mod progression;
pub mod reconcile;
pub mod storage;
pub mod streak;

pub use calendar::LocalCalendar;
pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::{EventType, LedgerEvent};
pub use notify::{Nudge, NudgeKind};
pub use player::{Completion, DailySummary, Profile, Stats};
pub use progress::{ActivityOutcome, AwardOutcome, ProgressEngine, SaleOutcome};
pub use progression::LevelProgress;
pub use reconcile::{ReconcileConfig, ReconciliationEngine, RunReport};
pub use storage::{EngineConfig, ProgressStore, Store};
pub use streak::{StreakDisplay, StreakState};
