//! Daily reconciliation job.
//!
//! Settles the previous local day for every user: seals it with a
//! write-once [`DailySummary`], extends or restarts the streak, and
//! applies miss penalties. The scheduler may fire the job any number
//! of times; the summary row and the daily marker events make every
//! mutation an insert-if-absent, so re-runs change nothing.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::calendar::LocalCalendar;
use crate::error::CoreError;
use crate::events::{EventType, LedgerEvent};
use crate::player::DailySummary;
use crate::progression::{cumulative_xp_for, penalty_for};
use crate::storage::ProgressStore;
use crate::streak;

/// Reconciliation configuration.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Zone applied when a profile's zone name fails to resolve.
    pub default_timezone: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            default_timezone: "UTC".to_string(),
        }
    }
}

/// Counters from one reconciliation run. Reporting only; correctness
/// never depends on them.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Users whose day was settled by this run.
    pub processed: u64,
    /// Users that received a miss penalty.
    pub penalized: u64,
    /// Users whose streak was extended or restarted.
    pub streaks_updated: u64,
    /// Users skipped because their day was already settled.
    pub skipped: u64,
    /// Users or steps that failed and were left for the next run.
    pub failed: u64,
    pub ran_at: DateTime<Utc>,
}

impl RunReport {
    fn new(ran_at: DateTime<Utc>) -> Self {
        Self {
            processed: 0,
            penalized: 0,
            streaks_updated: 0,
            skipped: 0,
            failed: 0,
            ran_at,
        }
    }

    /// Human-readable summary of the run.
    pub fn message(&self) -> String {
        format!(
            "Settled {} user-day(s): {} penalized, {} streak(s) updated, {} skipped, {} failed",
            self.processed, self.penalized, self.streaks_updated, self.skipped, self.failed
        )
    }
}

/// What one user's pass produced.
enum UserOutcome {
    /// A summary already sealed the day.
    AlreadySettled,
    /// Profile disappeared between listing and processing.
    Missing,
    Settled {
        streak_updated: bool,
        penalized: bool,
        step_errors: u64,
    },
}

/// Engine that settles closed days.
pub struct ReconciliationEngine {
    calendar: LocalCalendar,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::with_config(ReconcileConfig::default())
    }

    pub fn with_config(config: ReconcileConfig) -> Self {
        Self {
            calendar: LocalCalendar::from_zone_name(&config.default_timezone),
        }
    }

    /// Settle the previous local day for every user.
    ///
    /// Each user is an independent unit of work: a failure is logged,
    /// counted, and never aborts the loop.
    pub fn run<S: ProgressStore>(&self, store: &S, as_of: DateTime<Utc>) -> RunReport {
        let mut report = RunReport::new(as_of);
        let user_ids = match store.list_user_ids() {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "reconciliation aborted: cannot list users");
                report.failed += 1;
                return report;
            }
        };
        info!(users = user_ids.len(), as_of = %as_of, "daily reconciliation started");

        for user_id in &user_ids {
            match self.reconcile_user(store, user_id, as_of) {
                Ok(UserOutcome::AlreadySettled) | Ok(UserOutcome::Missing) => {
                    report.skipped += 1;
                }
                Ok(UserOutcome::Settled {
                    streak_updated,
                    penalized,
                    step_errors,
                }) => {
                    report.processed += 1;
                    if streak_updated {
                        report.streaks_updated += 1;
                    }
                    if penalized {
                        report.penalized += 1;
                    }
                    report.failed += step_errors;
                }
                Err(e) => {
                    error!(user = %user_id, error = %e, "user reconciliation failed, continuing");
                    report.failed += 1;
                }
            }
        }

        info!(
            processed = report.processed,
            penalized = report.penalized,
            streaks_updated = report.streaks_updated,
            skipped = report.skipped,
            failed = report.failed,
            "daily reconciliation finished"
        );
        report
    }

    fn reconcile_user<S: ProgressStore>(
        &self,
        store: &S,
        user_id: &str,
        as_of: DateTime<Utc>,
    ) -> Result<UserOutcome, CoreError> {
        let Some(profile) = store.get_profile(user_id)? else {
            return Ok(UserOutcome::Missing);
        };
        let summary_date = self.calendar.previous_date(&profile.timezone, as_of);
        if store.find_summary(user_id, summary_date)?.is_some() {
            return Ok(UserOutcome::AlreadySettled);
        }

        let actions_done = store.sum_completions(user_id, summary_date)?;
        let income = store.sum_income(user_id, summary_date)?;
        let summary = DailySummary::new(
            user_id,
            summary_date,
            actions_done,
            profile.daily_actions_target,
            income,
        );

        // The summary insert is the commit point. If it errors, this
        // user keeps an unsettled day and the next run retries; if it
        // reports the row as existing, a concurrent run won the day.
        if !store.insert_summary(&summary)? {
            return Ok(UserOutcome::AlreadySettled);
        }

        let mut streak_updated = false;
        let mut penalized = false;
        let mut step_errors = 0;

        if actions_done > 0 {
            match self.streak_step(store, user_id, summary_date) {
                Ok(updated) => streak_updated = updated,
                Err(e) => {
                    warn!(user = %user_id, date = %summary_date, error = %e, "streak step failed, skipping");
                    step_errors += 1;
                }
            }
        }

        if summary.completed {
            match self.clear_misses(store, user_id) {
                Ok(()) => {}
                Err(e) => {
                    warn!(user = %user_id, date = %summary_date, error = %e, "miss counter reset failed, skipping");
                    step_errors += 1;
                }
            }
        } else {
            match self.penalty_step(store, user_id, summary_date) {
                Ok(applied) => penalized = applied,
                Err(e) => {
                    warn!(user = %user_id, date = %summary_date, error = %e, "penalty step failed, skipping");
                    step_errors += 1;
                }
            }
        }

        Ok(UserOutcome::Settled {
            streak_updated,
            penalized,
            step_errors,
        })
    }

    /// Extend or restart the streak for a day that had activity.
    ///
    /// The check-in marker is queried first (fail-closed: a query error
    /// skips the step rather than risking a double count) and claimed
    /// atomically with the profile write.
    fn streak_step<S: ProgressStore>(
        &self,
        store: &S,
        user_id: &str,
        summary_date: NaiveDate,
    ) -> Result<bool, CoreError> {
        if store
            .find_event(user_id, EventType::StreakCheckin, summary_date)?
            .is_some()
        {
            return Ok(false);
        }
        // Fresh read: the live path may have advanced the profile since
        // the top of the user loop.
        let Some(mut profile) = store.get_profile(user_id)? else {
            return Ok(false);
        };
        if streak::apply(&mut profile, summary_date).is_none() {
            return Ok(false);
        }
        let marker = LedgerEvent::new(
            user_id,
            EventType::StreakCheckin,
            0,
            0,
            summary_date,
            "daily check-in (reconciled)",
        );
        Ok(store.commit_streak(&marker, &profile)?)
    }

    /// A completed day ends any run of misses.
    fn clear_misses<S: ProgressStore>(&self, store: &S, user_id: &str) -> Result<(), CoreError> {
        let Some(mut profile) = store.get_profile(user_id)? else {
            return Ok(());
        };
        if profile.consecutive_misses != 0 {
            profile.consecutive_misses = 0;
            store.update_profile(&profile)?;
        }
        Ok(())
    }

    /// Apply the miss penalty for a day below target.
    ///
    /// Every miss costs `penalty_xp` and zeroes the streak. The miss
    /// that reaches the threshold also drops one level: net XP is cut
    /// down to the lower level's floor through a level_reset ledger
    /// event, so the stored aggregates and a ledger replay agree.
    fn penalty_step<S: ProgressStore>(
        &self,
        store: &S,
        user_id: &str,
        summary_date: NaiveDate,
    ) -> Result<bool, CoreError> {
        if store
            .find_event(user_id, EventType::PenaltyMiss, summary_date)?
            .is_some()
        {
            return Ok(false);
        }
        let Some(mut profile) = store.get_profile(user_id)? else {
            return Ok(false);
        };
        let Some(mut stats) = store.get_stats(user_id)? else {
            return Ok(false);
        };

        let misses = profile.consecutive_misses + 1;
        let penalty = penalty_for(misses, profile.penalty_xp);

        let mut events = vec![LedgerEvent::new(
            user_id,
            EventType::PenaltyMiss,
            -(penalty.xp_penalty as i64),
            0,
            summary_date,
            format!("missed daily target (miss {misses})"),
        )];
        stats.total_xp_lost += penalty.xp_penalty as u64;
        let after_xp = stats.recompute_level();

        profile.streak_current = 0;
        if penalty.level_penalty {
            let target_level = after_xp.level.saturating_sub(1).max(1);
            let floor = cumulative_xp_for(target_level);
            let reset_loss = stats.net_xp().saturating_sub(floor);
            if reset_loss > 0 {
                events.push(LedgerEvent::new(
                    user_id,
                    EventType::LevelReset,
                    -(reset_loss as i64),
                    0,
                    summary_date,
                    format!("level reset to {target_level}"),
                ));
                stats.total_xp_lost += reset_loss;
                stats.recompute_level();
            }
            profile.consecutive_misses = 0;
        } else {
            profile.consecutive_misses = misses;
        }

        let applied = store.commit_penalty(&events, &profile, &stats)?;
        if applied {
            info!(
                user = %user_id,
                date = %summary_date,
                xp_penalty = penalty.xp_penalty,
                level_penalty = penalty.level_penalty,
                "miss penalty applied"
            );
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_message_lists_all_counters() {
        let mut report = RunReport::new(Utc::now());
        report.processed = 5;
        report.penalized = 2;
        report.streaks_updated = 3;
        report.skipped = 1;
        let msg = report.message();
        assert!(msg.contains("5 user-day(s)"));
        assert!(msg.contains("2 penalized"));
        assert!(msg.contains("3 streak(s)"));
        assert!(msg.contains("1 skipped"));
        assert!(msg.contains("0 failed"));
    }

    #[test]
    fn config_defaults_to_utc() {
        assert_eq!(ReconcileConfig::default().default_timezone, "UTC");
    }
}
