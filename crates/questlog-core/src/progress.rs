//! Live progression entry points.
//!
//! [`ProgressEngine`] handles everything that happens the moment a user
//! acts: recording completions, awarding XP and gold, claiming the
//! day's streak extension, and answering read queries. The ledger row
//! always lands together with the aggregate update; the overnight pass
//! in [`crate::reconcile`] settles whatever the live path cannot know
//! yet (misses, penalties, days that ended quietly).

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::calendar::LocalCalendar;
use crate::error::{CoreError, Result, ValidationError};
use crate::events::{EventType, LedgerEvent};
use crate::notify::{decide, Nudge};
use crate::player::{Completion, Profile, Stats};
use crate::progression::{day_multiplier, scale_award, ACTION_GOLD, ACTION_XP};
use crate::storage::ProgressStore;
use crate::streak::{self, streak_display, StreakDisplay};

/// Result of recording completed actions.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityOutcome {
    pub user_id: String,
    pub date: NaiveDate,
    pub count: i64,
    pub xp_awarded: i64,
    pub gold_awarded: i64,
    pub multiplier: f64,
    pub level: u32,
    pub leveled_up: bool,
    pub streak: StreakDisplay,
    pub streak_extended: bool,
    /// True when the client_ref had been used before; nothing was
    /// written and the award fields are zero.
    pub deduplicated: bool,
}

/// Result of a direct XP award.
#[derive(Debug, Clone, Serialize)]
pub struct AwardOutcome {
    pub user_id: String,
    pub event_type: EventType,
    pub date: NaiveDate,
    pub xp_awarded: i64,
    pub multiplier: f64,
    pub level: u32,
    pub current_xp: u64,
    pub leveled_up: bool,
}

/// Result of recording sale income.
#[derive(Debug, Clone, Serialize)]
pub struct SaleOutcome {
    pub user_id: String,
    pub date: NaiveDate,
    pub gold_awarded: i64,
    pub gold_total: i64,
    pub income_total: i64,
}

/// Engine for the live progression path.
pub struct ProgressEngine {
    calendar: LocalCalendar,
}

impl Default for ProgressEngine {
    fn default() -> Self {
        Self::new(LocalCalendar::default())
    }
}

impl ProgressEngine {
    pub fn new(calendar: LocalCalendar) -> Self {
        Self { calendar }
    }

    /// Record `count` completed actions for today and award XP/gold.
    ///
    /// The completion, its award event and the stats update land in
    /// one transaction; a failed call leaves the `client_ref`
    /// unclaimed. The first activity of a user's local day also
    /// extends (or restarts) their streak. A previously seen
    /// `client_ref` makes the whole call a no-op reported through
    /// [`ActivityOutcome::deduplicated`].
    pub fn record_activity<S: ProgressStore>(
        &self,
        store: &S,
        user_id: &str,
        count: i64,
        client_ref: Option<&str>,
    ) -> Result<ActivityOutcome> {
        self.record_activity_at(store, user_id, count, client_ref, Utc::now())
    }

    pub fn record_activity_at<S: ProgressStore>(
        &self,
        store: &S,
        user_id: &str,
        count: i64,
        client_ref: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ActivityOutcome> {
        if count < 1 {
            return Err(ValidationError::InvalidValue {
                field: "count".to_string(),
                message: format!("must be at least 1, got {count}"),
            }
            .into());
        }
        let (mut profile, mut stats) = load_player(store, user_id)?;
        let today = self.calendar.local_date(&profile.timezone, now);

        // The multiplier sees the day's total including this batch, so
        // the award that crosses the overshoot line already benefits.
        let done_today = store.sum_completions(user_id, today)? + count;
        let multiplier = day_multiplier(done_today, profile.daily_actions_target);
        let xp = scale_award(ACTION_XP * count, multiplier);
        let gold = ACTION_GOLD * count;

        let level_before = stats.level;
        stats.total_xp_earned += xp as u64;
        stats.gold += gold;
        stats.total_actions += count as u64;
        let progress = stats.recompute_level();

        let completion = Completion::new(user_id, today, count, client_ref);
        let event = LedgerEvent::new(
            user_id,
            EventType::Action,
            xp,
            gold,
            today,
            format!("completed {count} action(s)"),
        );
        if !store.commit_activity(&completion, &event, &stats)? {
            debug!(user = user_id, ?client_ref, "completion replayed, skipping award");
            return Ok(ActivityOutcome {
                user_id: user_id.to_string(),
                date: today,
                count: 0,
                xp_awarded: 0,
                gold_awarded: 0,
                multiplier: 1.0,
                level: level_before,
                leveled_up: false,
                streak: streak_display(&profile, today),
                streak_extended: false,
                deduplicated: true,
            });
        }

        let streak_extended = match self.claim_streak(store, &mut profile, today) {
            Ok(extended) => extended,
            Err(e) => {
                // Reconciliation claims the marker for any day the
                // live path leaves unclaimed.
                warn!(user = user_id, error = %e, "streak claim failed after award");
                false
            }
        };
        debug!(
            user = user_id,
            count, xp, gold, multiplier, streak_extended, "activity recorded"
        );

        Ok(ActivityOutcome {
            user_id: user_id.to_string(),
            date: today,
            count,
            xp_awarded: xp,
            gold_awarded: gold,
            multiplier,
            level: progress.level,
            leveled_up: progress.level > level_before,
            streak: streak_display(&profile, today),
            streak_extended,
            deduplicated: false,
        })
    }

    /// Claim the streak marker for `day` if nobody has yet.
    ///
    /// On success `profile` reflects the persisted streak fields.
    fn claim_streak<S: ProgressStore>(
        &self,
        store: &S,
        profile: &mut Profile,
        day: NaiveDate,
    ) -> Result<bool> {
        if store
            .find_event(&profile.user_id, EventType::StreakCheckin, day)?
            .is_some()
        {
            return Ok(false);
        }
        let mut updated = profile.clone();
        if streak::apply(&mut updated, day).is_none() {
            return Ok(false);
        }
        let marker = LedgerEvent::new(
            &profile.user_id,
            EventType::StreakCheckin,
            0,
            0,
            day,
            "daily check-in",
        );
        if store.commit_streak(&marker, &updated)? {
            *profile = updated;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Award XP outside the normal action flow (tasks, perks).
    ///
    /// The day multiplier applies here too, based on actions completed
    /// so far today.
    pub fn award_xp<S: ProgressStore>(
        &self,
        store: &S,
        user_id: &str,
        event_type: EventType,
        amount: i64,
        reason: &str,
    ) -> Result<AwardOutcome> {
        self.award_xp_at(store, user_id, event_type, amount, reason, Utc::now())
    }

    pub fn award_xp_at<S: ProgressStore>(
        &self,
        store: &S,
        user_id: &str,
        event_type: EventType,
        amount: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AwardOutcome> {
        if amount <= 0 {
            return Err(ValidationError::NonPositiveAmount(amount).into());
        }
        if !event_type.is_awardable() {
            return Err(ValidationError::ReservedEventType(event_type.as_str().to_string()).into());
        }
        let (profile, mut stats) = load_player(store, user_id)?;
        let today = self.calendar.local_date(&profile.timezone, now);

        let done_today = store.sum_completions(user_id, today)?;
        let multiplier = day_multiplier(done_today, profile.daily_actions_target);
        let xp = scale_award(amount, multiplier);

        let level_before = stats.level;
        stats.total_xp_earned += xp as u64;
        let progress = stats.recompute_level();

        let event = LedgerEvent::new(user_id, event_type, xp, 0, today, reason);
        store.commit_award(&event, &stats)?;
        debug!(user = user_id, kind = %event_type, xp, "xp awarded");

        Ok(AwardOutcome {
            user_id: user_id.to_string(),
            event_type,
            date: today,
            xp_awarded: xp,
            multiplier,
            level: progress.level,
            current_xp: progress.current_xp,
            leveled_up: progress.level > level_before,
        })
    }

    /// Record sale income. Gold only; sales never carry XP.
    pub fn record_sale<S: ProgressStore>(
        &self,
        store: &S,
        user_id: &str,
        amount: i64,
        description: &str,
    ) -> Result<SaleOutcome> {
        self.record_sale_at(store, user_id, amount, description, Utc::now())
    }

    pub fn record_sale_at<S: ProgressStore>(
        &self,
        store: &S,
        user_id: &str,
        amount: i64,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<SaleOutcome> {
        if amount <= 0 {
            return Err(ValidationError::NonPositiveAmount(amount).into());
        }
        let (profile, mut stats) = load_player(store, user_id)?;
        let today = self.calendar.local_date(&profile.timezone, now);

        stats.gold += amount;
        stats.total_income += amount;

        let event = LedgerEvent::new(user_id, EventType::Sale, 0, amount, today, description);
        store.commit_award(&event, &stats)?;
        debug!(user = user_id, amount, "sale recorded");

        Ok(SaleOutcome {
            user_id: user_id.to_string(),
            date: today,
            gold_awarded: amount,
            gold_total: stats.gold,
            income_total: stats.total_income,
        })
    }

    /// The user's streak as of their current local day.
    pub fn streak<S: ProgressStore>(&self, store: &S, user_id: &str) -> Result<StreakDisplay> {
        self.streak_at(store, user_id, Utc::now())
    }

    pub fn streak_at<S: ProgressStore>(
        &self,
        store: &S,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<StreakDisplay> {
        let profile = load_profile(store, user_id)?;
        let today = self.calendar.local_date(&profile.timezone, now);
        Ok(streak_display(&profile, today))
    }

    /// The nudge due for the user right now, if any.
    pub fn notification<S: ProgressStore>(
        &self,
        store: &S,
        user_id: &str,
    ) -> Result<Option<Nudge>> {
        self.notification_at(store, user_id, Utc::now())
    }

    pub fn notification_at<S: ProgressStore>(
        &self,
        store: &S,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Nudge>> {
        let profile = load_profile(store, user_id)?;
        let hour = self.calendar.local_hour(&profile.timezone, now);
        let today = self.calendar.local_date(&profile.timezone, now);
        let done_today = store.sum_completions(user_id, today)?;
        Ok(decide(hour, done_today, profile.daily_actions_target))
    }

    /// Rebuild the stats row by replaying the ledger and completions.
    ///
    /// The ledger is the source of truth; this repairs a stats row that
    /// has drifted or been lost.
    pub fn rebuild_stats<S: ProgressStore>(&self, store: &S, user_id: &str) -> Result<Stats> {
        load_profile(store, user_id)?;
        let totals = store.sum_event_totals(user_id)?;
        let actions = store.total_completions(user_id)?;

        let mut stats = Stats::new(user_id);
        stats.total_xp_earned = totals.xp_earned;
        stats.total_xp_lost = totals.xp_lost;
        stats.gold = totals.gold;
        stats.total_income = totals.income;
        stats.total_actions = actions.max(0) as u64;
        stats.recompute_level();

        store.update_stats(&stats)?;
        debug!(user = user_id, level = stats.level, "stats rebuilt from ledger");
        Ok(stats)
    }
}

fn load_profile<S: ProgressStore>(store: &S, user_id: &str) -> Result<Profile> {
    store
        .get_profile(user_id)?
        .ok_or_else(|| CoreError::UnknownUser(user_id.to_string()))
}

fn load_player<S: ProgressStore>(store: &S, user_id: &str) -> Result<(Profile, Stats)> {
    let profile = load_profile(store, user_id)?;
    let stats = store
        .get_stats(user_id)?
        .ok_or_else(|| CoreError::UnknownUser(user_id.to_string()))?;
    Ok((profile, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;

    fn engine() -> ProgressEngine {
        ProgressEngine::default()
    }

    fn store_with_user(user_id: &str) -> Store {
        let store = Store::open_memory().unwrap();
        store
            .create_profile(&Profile::new(user_id, "UTC", 3, 100))
            .unwrap();
        store
    }

    #[test]
    fn record_activity_rejects_zero_count() {
        let store = store_with_user("u1");
        let err = engine()
            .record_activity(&store, "u1", 0, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn award_rejects_non_positive_amounts() {
        let store = store_with_user("u1");
        let err = engine()
            .award_xp(&store, "u1", EventType::Task, 0, "nothing")
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::NonPositiveAmount(0))
        ));
        assert!(engine()
            .award_xp(&store, "u1", EventType::Task, -50, "negative")
            .is_err());
    }

    #[test]
    fn award_rejects_marker_kinds() {
        let store = store_with_user("u1");
        for kind in [
            EventType::StreakCheckin,
            EventType::PenaltyMiss,
            EventType::LevelReset,
        ] {
            let err = engine().award_xp(&store, "u1", kind, 10, "sneaky").unwrap_err();
            assert!(matches!(
                err,
                CoreError::Validation(ValidationError::ReservedEventType(_))
            ));
        }
    }

    #[test]
    fn unknown_user_is_reported() {
        let store = Store::open_memory().unwrap();
        let err = engine().record_activity(&store, "ghost", 1, None).unwrap_err();
        assert!(matches!(err, CoreError::UnknownUser(_)));
        assert!(engine().streak(&store, "ghost").is_err());
        assert!(engine().notification(&store, "ghost").is_err());
    }

    #[test]
    fn sale_rejects_non_positive_amounts() {
        let store = store_with_user("u1");
        assert!(engine().record_sale(&store, "u1", 0, "free").is_err());
        assert!(engine().record_sale(&store, "u1", -10, "refund").is_err());
    }
}
