//! Day-streak state machine.
//!
//! A streak counts consecutive local days with at least one completed
//! action. The same continuity rule drives both the live path (first
//! activity of a day) and the overnight reconciliation pass: a day
//! extends the chain exactly when the day before it was the last day
//! with activity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::day_before;
use crate::player::Profile;

/// Derived streak condition as of a given local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakState {
    /// No activity ever recorded.
    NoActivity,
    /// Activity recorded today; the chain is safe.
    Alive,
    /// Last activity was yesterday; today is still open.
    AtRisk,
    /// Two or more days have passed; the next activity starts over.
    Broken,
}

/// Streak condition for `today` given the last day with activity.
pub fn streak_state(last_activity: Option<NaiveDate>, today: NaiveDate) -> StreakState {
    match last_activity {
        None => StreakState::NoActivity,
        Some(d) if d >= today => StreakState::Alive,
        Some(d) if d == day_before(today) => StreakState::AtRisk,
        Some(_) => StreakState::Broken,
    }
}

/// Read-model of a player's streak for display surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakDisplay {
    /// Live count; reads as 0 once the chain is broken, even before the
    /// stored counter is reset.
    pub current: u32,
    pub best: u32,
    pub state: StreakState,
    pub is_at_risk: bool,
}

pub fn streak_display(profile: &Profile, today: NaiveDate) -> StreakDisplay {
    let state = streak_state(profile.last_activity_date, today);
    let current = match state {
        StreakState::Alive | StreakState::AtRisk => profile.streak_current,
        StreakState::NoActivity | StreakState::Broken => 0,
    };
    StreakDisplay {
        current,
        best: profile.streak_best,
        state,
        is_at_risk: state == StreakState::AtRisk,
    }
}

/// What recording activity on a day does to the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakTransition {
    /// The day (or a later one) already counted; nothing changes.
    AlreadyCounted,
    /// Unbroken chain; carries the new current count.
    Extended(u32),
    /// First activity ever, or a gap of two or more days.
    Started,
}

/// Evaluate activity on `activity_date` against the chain.
///
/// `last_activity` never moves backwards: activity on a day at or
/// before the recorded last day is a no-op.
pub fn advance(
    last_activity: Option<NaiveDate>,
    current: u32,
    activity_date: NaiveDate,
) -> StreakTransition {
    match last_activity {
        Some(d) if d >= activity_date => StreakTransition::AlreadyCounted,
        Some(d) if d == day_before(activity_date) => StreakTransition::Extended(current + 1),
        _ => StreakTransition::Started,
    }
}

/// Apply activity on `activity_date` to the profile's streak fields.
///
/// Returns the new current streak, or `None` when the day had already
/// counted. `streak_best` only ever grows.
pub fn apply(profile: &mut Profile, activity_date: NaiveDate) -> Option<u32> {
    let next = match advance(
        profile.last_activity_date,
        profile.streak_current,
        activity_date,
    ) {
        StreakTransition::AlreadyCounted => return None,
        StreakTransition::Extended(n) => n,
        StreakTransition::Started => 1,
    };
    profile.streak_current = next;
    profile.streak_best = profile.streak_best.max(next);
    profile.last_activity_date = Some(activity_date);
    Some(next)
}
