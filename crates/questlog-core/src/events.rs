//! Append-only ledger events.
//!
//! Every XP or gold movement is recorded as a [`LedgerEvent`] before the
//! aggregate rows are touched, so the ledger can always reproduce the
//! aggregates. Events are never updated or deleted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of ledger event.
///
/// Awardable kinds carry caller-initiated XP/gold. Marker kinds are
/// written by the engines and may appear at most once per user and
/// local day, which is what makes the daily jobs safe to re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A completed action, recorded through the activity path.
    Action,
    /// A one-off task award.
    Task,
    /// Income; its gold amount also counts toward daily income.
    Sale,
    /// A bonus award outside the normal action flow.
    PerkBonus,
    /// Daily streak marker, at most one per user-day.
    StreakCheckin,
    /// Daily miss penalty marker, at most one per user-day.
    PenaltyMiss,
    /// Level-reset adjustment accompanying a threshold penalty.
    LevelReset,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Action => "action",
            EventType::Task => "task",
            EventType::Sale => "sale",
            EventType::PerkBonus => "perk_bonus",
            EventType::StreakCheckin => "streak_checkin",
            EventType::PenaltyMiss => "penalty_miss",
            EventType::LevelReset => "level_reset",
        }
    }

    pub fn parse(s: &str) -> Option<EventType> {
        match s {
            "action" => Some(EventType::Action),
            "task" => Some(EventType::Task),
            "sale" => Some(EventType::Sale),
            "perk_bonus" => Some(EventType::PerkBonus),
            "streak_checkin" => Some(EventType::StreakCheckin),
            "penalty_miss" => Some(EventType::PenaltyMiss),
            "level_reset" => Some(EventType::LevelReset),
            _ => None,
        }
    }

    /// Whether (user, type, date) is a uniqueness key for this kind.
    pub fn is_daily_marker(&self) -> bool {
        matches!(
            self,
            EventType::StreakCheckin | EventType::PenaltyMiss | EventType::LevelReset
        )
    }

    /// Whether callers may award XP/gold through this kind directly.
    pub fn is_awardable(&self) -> bool {
        matches!(
            self,
            EventType::Action | EventType::Task | EventType::Sale | EventType::PerkBonus
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable row of the event ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub id: String,
    pub user_id: String,
    pub event_type: EventType,
    /// Signed XP delta. Negative for penalties and resets.
    pub xp_amount: i64,
    /// Signed gold delta.
    pub gold_amount: i64,
    /// Local calendar day the event belongs to, in the user's zone.
    pub event_date: NaiveDate,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEvent {
    pub fn new(
        user_id: &str,
        event_type: EventType,
        xp_amount: i64,
        gold_amount: i64,
        event_date: NaiveDate,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            event_type,
            xp_amount,
            gold_amount,
            event_date,
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}
