mod config;
pub mod database;
pub mod migrations;

pub use config::{EngineConfig, WatchConfig};
pub use database::Store;

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::error::StorageError;
use crate::events::{EventType, LedgerEvent};
use crate::player::{Completion, DailySummary, Profile, Stats};

/// Returns `~/.config/questlog[-dev]/` based on QUESTLOG_ENV.
///
/// Set QUESTLOG_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("QUESTLOG_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("questlog-dev")
    } else {
        base_dir.join("questlog")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Ledger-derived lifetime totals, used to rebuild a stats row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventTotals {
    /// Sum of positive XP amounts.
    pub xp_earned: u64,
    /// Sum of negative XP amounts, as a positive number.
    pub xp_lost: u64,
    /// Net gold across all events.
    pub gold: i64,
    /// Gold earned through sale events.
    pub income: i64,
}

/// Persistence seam between the engines and the backing database.
///
/// The `commit_*` methods group a ledger append with its aggregate
/// update into one atomic unit; either everything lands or nothing
/// does. Methods returning `bool` report whether the write happened:
/// `false` means the row's idempotency key was already claimed, which
/// callers treat as an already-done no-op.
pub trait ProgressStore {
    /// Insert a new profile together with its zeroed stats row.
    fn create_profile(&self, profile: &Profile) -> Result<(), StorageError>;
    fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StorageError>;
    fn update_profile(&self, profile: &Profile) -> Result<(), StorageError>;
    fn get_stats(&self, user_id: &str) -> Result<Option<Stats>, StorageError>;
    fn update_stats(&self, stats: &Stats) -> Result<(), StorageError>;
    /// All known user ids, in stable order.
    fn list_user_ids(&self) -> Result<Vec<String>, StorageError>;

    /// Append one ledger event. Returns `false` without writing when
    /// the event is a daily marker already present for that user-day.
    fn append_event(&self, event: &LedgerEvent) -> Result<bool, StorageError>;
    fn find_event(
        &self,
        user_id: &str,
        event_type: EventType,
        date: NaiveDate,
    ) -> Result<Option<LedgerEvent>, StorageError>;
    /// Lifetime XP/gold totals replayed from the ledger.
    fn sum_event_totals(&self, user_id: &str) -> Result<EventTotals, StorageError>;

    /// Insert a completion batch. Returns `false` when its client_ref
    /// was already used for this user.
    fn record_completion(&self, completion: &Completion) -> Result<bool, StorageError>;
    /// Actions done on one local day.
    fn sum_completions(&self, user_id: &str, date: NaiveDate) -> Result<i64, StorageError>;
    /// Actions done across all days.
    fn total_completions(&self, user_id: &str) -> Result<i64, StorageError>;
    /// Sale income recorded on one local day.
    fn sum_income(&self, user_id: &str, date: NaiveDate) -> Result<i64, StorageError>;

    /// Seal a (user, day). Returns `false` when the day is already
    /// sealed; the existing summary is left untouched.
    fn insert_summary(&self, summary: &DailySummary) -> Result<bool, StorageError>;
    fn find_summary(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySummary>, StorageError>;

    /// Atomically append an award event and store the updated stats.
    fn commit_award(&self, event: &LedgerEvent, stats: &Stats) -> Result<(), StorageError>;
    /// Atomically insert a completion with its award event and the
    /// updated stats. Returns `false` (writing nothing, completion
    /// included) when the completion's client_ref was already used.
    fn commit_activity(
        &self,
        completion: &Completion,
        event: &LedgerEvent,
        stats: &Stats,
    ) -> Result<bool, StorageError>;
    /// Atomically append a streak marker and store the updated profile.
    /// Returns `false` (writing nothing) when the marker already exists.
    fn commit_streak(&self, marker: &LedgerEvent, profile: &Profile) -> Result<bool, StorageError>;
    /// Atomically append penalty events and store profile and stats.
    /// Returns `false` (writing nothing) when the first event's marker
    /// already exists.
    fn commit_penalty(
        &self,
        events: &[LedgerEvent],
        profile: &Profile,
        stats: &Stats,
    ) -> Result<bool, StorageError>;
}
