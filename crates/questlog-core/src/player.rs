//! Persistent player records.
//!
//! A player is a [`Profile`] row (identity, settings, streak state) plus
//! a [`Stats`] row (lifetime aggregates). Both are mutated only through
//! the engine entry points; raw activity lands in [`Completion`] rows
//! and the event ledger, and each closed day is sealed by a write-once
//! [`DailySummary`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::progression::{level_curve, LevelProgress};

/// Default daily actions target for new profiles.
pub const DEFAULT_DAILY_TARGET: i64 = 3;

/// Default flat XP penalty for a missed day.
pub const DEFAULT_PENALTY_XP: u32 = 100;

/// Per-user settings and streak state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    /// IANA zone name, e.g. "Asia/Tokyo". May fail to resolve; day
    /// boundaries then fall back to the engine's default zone.
    pub timezone: String,
    /// Actions per local day needed to avoid a miss. At least 1.
    pub daily_actions_target: i64,
    /// Flat XP deducted per missed day.
    pub penalty_xp: u32,
    pub streak_current: u32,
    pub streak_best: u32,
    /// Missed days since the last completed day or level penalty.
    pub consecutive_misses: u32,
    /// Most recent local day with any activity.
    pub last_activity_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(user_id: &str, timezone: &str, daily_actions_target: i64, penalty_xp: u32) -> Self {
        Self {
            user_id: user_id.to_string(),
            timezone: timezone.to_string(),
            daily_actions_target: daily_actions_target.max(1),
            penalty_xp,
            streak_current: 0,
            streak_best: 0,
            consecutive_misses: 0,
            last_activity_date: None,
            created_at: Utc::now(),
        }
    }
}

/// Lifetime aggregates for one player.
///
/// `level` and `current_xp` are projections of the XP totals through the
/// level curve. They are stored for cheap reads but recomputed on every
/// XP change, never nudged up or down in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub user_id: String,
    pub level: u32,
    pub current_xp: u64,
    pub total_xp_earned: u64,
    pub total_xp_lost: u64,
    pub gold: i64,
    pub total_actions: u64,
    pub total_income: i64,
}

impl Stats {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            level: 1,
            current_xp: 0,
            total_xp_earned: 0,
            total_xp_lost: 0,
            gold: 0,
            total_actions: 0,
            total_income: 0,
        }
    }

    /// Net lifetime XP. Lost XP can never push this below zero.
    pub fn net_xp(&self) -> u64 {
        self.total_xp_earned.saturating_sub(self.total_xp_lost)
    }

    /// Recompute `level` and `current_xp` from the XP totals.
    pub fn recompute_level(&mut self) -> LevelProgress {
        let progress = level_curve(self.net_xp());
        self.level = progress.level;
        self.current_xp = progress.current_xp;
        progress
    }
}

/// One recorded batch of completed actions.
///
/// Immutable once inserted. `client_ref` is a caller-supplied key that
/// lets offline clients replay a submission without double-counting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub id: String,
    pub user_id: String,
    /// Local day the work belongs to, in the user's zone.
    pub completion_date: NaiveDate,
    pub done_count: i64,
    pub client_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Completion {
    pub fn new(
        user_id: &str,
        completion_date: NaiveDate,
        done_count: i64,
        client_ref: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            completion_date,
            done_count,
            client_ref: client_ref.map(str::to_string),
            created_at: Utc::now(),
        }
    }
}

/// Write-once seal over one closed (user, local day).
///
/// Inserting the summary is the commit point of the reconciliation job;
/// once a row exists the day is settled and is never revisited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub user_id: String,
    pub summary_date: NaiveDate,
    pub actions_done: i64,
    pub actions_target: i64,
    pub income: i64,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl DailySummary {
    pub fn new(
        user_id: &str,
        summary_date: NaiveDate,
        actions_done: i64,
        actions_target: i64,
        income: i64,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            summary_date,
            actions_done,
            actions_target,
            income,
            completed: actions_done >= actions_target,
            created_at: Utc::now(),
        }
    }
}
