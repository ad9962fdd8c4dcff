//! SQLite-backed progression storage.
//!
//! Provides persistent storage for:
//! - Player profiles and lifetime stats
//! - The append-only XP/gold event ledger
//! - Completion batches and write-once daily summaries

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CoreError, StorageError};
use crate::events::{EventType, LedgerEvent};
use crate::player::{Completion, DailySummary, Profile, Stats};

use super::{data_dir, migrations, EventTotals, ProgressStore};

const DATE_FMT: &str = "%Y-%m-%d";

/// SQLite database holding all progression state.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open the database at `~/.config/questlog/questlog.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("questlog.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: PathBuf::from(path),
            source,
        })?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (for tests and embedders).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS profiles (
                    user_id              TEXT PRIMARY KEY,
                    timezone             TEXT NOT NULL,
                    daily_actions_target INTEGER NOT NULL,
                    penalty_xp           INTEGER NOT NULL,
                    streak_current       INTEGER NOT NULL DEFAULT 0,
                    streak_best          INTEGER NOT NULL DEFAULT 0,
                    consecutive_misses   INTEGER NOT NULL DEFAULT 0,
                    last_activity_date   TEXT,
                    created_at           TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS stats (
                    user_id         TEXT PRIMARY KEY,
                    level           INTEGER NOT NULL DEFAULT 1,
                    current_xp      INTEGER NOT NULL DEFAULT 0,
                    total_xp_earned INTEGER NOT NULL DEFAULT 0,
                    total_xp_lost   INTEGER NOT NULL DEFAULT 0,
                    gold            INTEGER NOT NULL DEFAULT 0,
                    total_actions   INTEGER NOT NULL DEFAULT 0,
                    total_income    INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS events (
                    id          TEXT PRIMARY KEY,
                    user_id     TEXT NOT NULL,
                    event_type  TEXT NOT NULL,
                    xp_amount   INTEGER NOT NULL,
                    gold_amount INTEGER NOT NULL DEFAULT 0,
                    event_date  TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    created_at  TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS completions (
                    id              TEXT PRIMARY KEY,
                    user_id         TEXT NOT NULL,
                    completion_date TEXT NOT NULL,
                    done_count      INTEGER NOT NULL,
                    created_at      TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS daily_summaries (
                    user_id        TEXT NOT NULL,
                    summary_date   TEXT NOT NULL,
                    actions_done   INTEGER NOT NULL,
                    actions_target INTEGER NOT NULL,
                    income         INTEGER NOT NULL DEFAULT 0,
                    completed      INTEGER NOT NULL,
                    created_at     TEXT NOT NULL,
                    PRIMARY KEY (user_id, summary_date)
                );

                -- Indexes for the daily queries
                CREATE INDEX IF NOT EXISTS idx_events_user_date
                    ON events(user_id, event_date);
                CREATE INDEX IF NOT EXISTS idx_completions_user_date
                    ON completions(user_id, completion_date);

                -- Marker kinds may appear at most once per user-day; the
                -- engines rely on this for safe re-runs.
                CREATE UNIQUE INDEX IF NOT EXISTS idx_events_daily_marker
                    ON events(user_id, event_type, event_date)
                    WHERE event_type IN ('streak_checkin', 'penalty_miss', 'level_reset');",
            )
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        migrations::migrate(&self.conn)
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        Ok(())
    }
}

// ── Row mapping ──────────────────────────────────────────────────────

fn date_str(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

fn parse_date(idx: usize, s: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_datetime_fallback(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let last_activity: Option<String> = row.get(7)?;
    let last_activity_date = match last_activity {
        Some(s) => Some(parse_date(7, &s)?),
        None => None,
    };
    let created_at: String = row.get(8)?;
    Ok(Profile {
        user_id: row.get(0)?,
        timezone: row.get(1)?,
        daily_actions_target: row.get(2)?,
        penalty_xp: row.get(3)?,
        streak_current: row.get(4)?,
        streak_best: row.get(5)?,
        consecutive_misses: row.get(6)?,
        last_activity_date,
        created_at: parse_datetime_fallback(&created_at),
    })
}

fn row_to_stats(row: &rusqlite::Row<'_>) -> rusqlite::Result<Stats> {
    Ok(Stats {
        user_id: row.get(0)?,
        level: row.get(1)?,
        current_xp: row.get(2)?,
        total_xp_earned: row.get(3)?,
        total_xp_lost: row.get(4)?,
        gold: row.get(5)?,
        total_actions: row.get(6)?,
        total_income: row.get(7)?,
    })
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEvent> {
    let type_str: String = row.get(2)?;
    let event_type = EventType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown event type: {type_str}").into(),
        )
    })?;
    let event_date: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    Ok(LedgerEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        event_type,
        xp_amount: row.get(3)?,
        gold_amount: row.get(4)?,
        event_date: parse_date(5, &event_date)?,
        description: row.get(6)?,
        created_at: parse_datetime_fallback(&created_at),
    })
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailySummary> {
    let summary_date: String = row.get(1)?;
    let created_at: String = row.get(6)?;
    Ok(DailySummary {
        user_id: row.get(0)?,
        summary_date: parse_date(1, &summary_date)?,
        actions_done: row.get(2)?,
        actions_target: row.get(3)?,
        income: row.get(4)?,
        completed: row.get(5)?,
        created_at: parse_datetime_fallback(&created_at),
    })
}

// ── Shared writes ────────────────────────────────────────────────────
// Free functions over &Connection so the transactional commit_* methods
// and the plain trait methods reuse the same statements.

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn insert_event(conn: &Connection, event: &LedgerEvent) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO events (id, user_id, event_type, xp_amount, gold_amount,
                             event_date, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event.id,
            event.user_id,
            event.event_type.as_str(),
            event.xp_amount,
            event.gold_amount,
            date_str(event.event_date),
            event.description,
            event.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn insert_completion(conn: &Connection, completion: &Completion) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO completions (id, user_id, completion_date, done_count,
                                  client_ref, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            completion.id,
            completion.user_id,
            date_str(completion.completion_date),
            completion.done_count,
            completion.client_ref,
            completion.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn store_profile(conn: &Connection, profile: &Profile) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE profiles
         SET timezone = ?2, daily_actions_target = ?3, penalty_xp = ?4,
             streak_current = ?5, streak_best = ?6, consecutive_misses = ?7,
             last_activity_date = ?8
         WHERE user_id = ?1",
        params![
            profile.user_id,
            profile.timezone,
            profile.daily_actions_target,
            profile.penalty_xp,
            profile.streak_current,
            profile.streak_best,
            profile.consecutive_misses,
            profile.last_activity_date.map(date_str),
        ],
    )?;
    Ok(())
}

fn store_stats(conn: &Connection, stats: &Stats) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE stats
         SET level = ?2, current_xp = ?3, total_xp_earned = ?4, total_xp_lost = ?5,
             gold = ?6, total_actions = ?7, total_income = ?8
         WHERE user_id = ?1",
        params![
            stats.user_id,
            stats.level,
            stats.current_xp,
            stats.total_xp_earned,
            stats.total_xp_lost,
            stats.gold,
            stats.total_actions,
            stats.total_income,
        ],
    )?;
    Ok(())
}

// ── ProgressStore impl ───────────────────────────────────────────────

impl ProgressStore for Store {
    fn create_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO profiles (user_id, timezone, daily_actions_target, penalty_xp,
                                   streak_current, streak_best, consecutive_misses,
                                   last_activity_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                profile.user_id,
                profile.timezone,
                profile.daily_actions_target,
                profile.penalty_xp,
                profile.streak_current,
                profile.streak_best,
                profile.consecutive_misses,
                profile.last_activity_date.map(date_str),
                profile.created_at.to_rfc3339(),
            ],
        )?;
        let stats = Stats::new(&profile.user_id);
        tx.execute(
            "INSERT INTO stats (user_id, level, current_xp, total_xp_earned, total_xp_lost,
                                gold, total_actions, total_income)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                stats.user_id,
                stats.level,
                stats.current_xp,
                stats.total_xp_earned,
                stats.total_xp_lost,
                stats.gold,
                stats.total_actions,
                stats.total_income,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StorageError> {
        let profile = self
            .conn
            .query_row(
                "SELECT user_id, timezone, daily_actions_target, penalty_xp,
                        streak_current, streak_best, consecutive_misses,
                        last_activity_date, created_at
                 FROM profiles WHERE user_id = ?1",
                params![user_id],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    fn update_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        store_profile(&self.conn, profile)?;
        Ok(())
    }

    fn get_stats(&self, user_id: &str) -> Result<Option<Stats>, StorageError> {
        let stats = self
            .conn
            .query_row(
                "SELECT user_id, level, current_xp, total_xp_earned, total_xp_lost,
                        gold, total_actions, total_income
                 FROM stats WHERE user_id = ?1",
                params![user_id],
                row_to_stats,
            )
            .optional()?;
        Ok(stats)
    }

    fn update_stats(&self, stats: &Stats) -> Result<(), StorageError> {
        store_stats(&self.conn, stats)?;
        Ok(())
    }

    fn list_user_ids(&self) -> Result<Vec<String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM profiles ORDER BY user_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn append_event(&self, event: &LedgerEvent) -> Result<bool, StorageError> {
        match insert_event(&self.conn, event) {
            Ok(()) => Ok(true),
            Err(e) if event.event_type.is_daily_marker() && is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn find_event(
        &self,
        user_id: &str,
        event_type: EventType,
        date: NaiveDate,
    ) -> Result<Option<LedgerEvent>, StorageError> {
        let event = self
            .conn
            .query_row(
                "SELECT id, user_id, event_type, xp_amount, gold_amount,
                        event_date, description, created_at
                 FROM events
                 WHERE user_id = ?1 AND event_type = ?2 AND event_date = ?3
                 LIMIT 1",
                params![user_id, event_type.as_str(), date_str(date)],
                row_to_event,
            )
            .optional()?;
        Ok(event)
    }

    fn sum_event_totals(&self, user_id: &str) -> Result<EventTotals, StorageError> {
        let (earned, lost, gold, income) = self.conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN xp_amount > 0 THEN xp_amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN xp_amount < 0 THEN -xp_amount ELSE 0 END), 0),
                COALESCE(SUM(gold_amount), 0),
                COALESCE(SUM(CASE WHEN event_type = 'sale' AND gold_amount > 0
                                  THEN gold_amount ELSE 0 END), 0)
             FROM events WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )?;
        Ok(EventTotals {
            xp_earned: earned.max(0) as u64,
            xp_lost: lost.max(0) as u64,
            gold,
            income,
        })
    }

    fn record_completion(&self, completion: &Completion) -> Result<bool, StorageError> {
        match insert_completion(&self.conn, completion) {
            Ok(()) => Ok(true),
            Err(e) if completion.client_ref.is_some() && is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn sum_completions(&self, user_id: &str, date: NaiveDate) -> Result<i64, StorageError> {
        let total = self.conn.query_row(
            "SELECT COALESCE(SUM(done_count), 0) FROM completions
             WHERE user_id = ?1 AND completion_date = ?2",
            params![user_id, date_str(date)],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(total)
    }

    fn total_completions(&self, user_id: &str) -> Result<i64, StorageError> {
        let total = self.conn.query_row(
            "SELECT COALESCE(SUM(done_count), 0) FROM completions WHERE user_id = ?1",
            params![user_id],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(total)
    }

    fn sum_income(&self, user_id: &str, date: NaiveDate) -> Result<i64, StorageError> {
        let total = self.conn.query_row(
            "SELECT COALESCE(SUM(gold_amount), 0) FROM events
             WHERE user_id = ?1 AND event_date = ?2
               AND event_type = 'sale' AND gold_amount > 0",
            params![user_id, date_str(date)],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(total)
    }

    fn insert_summary(&self, summary: &DailySummary) -> Result<bool, StorageError> {
        let result = self.conn.execute(
            "INSERT INTO daily_summaries (user_id, summary_date, actions_done,
                                          actions_target, income, completed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                summary.user_id,
                date_str(summary.summary_date),
                summary.actions_done,
                summary.actions_target,
                summary.income,
                summary.completed,
                summary.created_at.to_rfc3339(),
            ],
        );
        match result {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn find_summary(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySummary>, StorageError> {
        let summary = self
            .conn
            .query_row(
                "SELECT user_id, summary_date, actions_done, actions_target,
                        income, completed, created_at
                 FROM daily_summaries
                 WHERE user_id = ?1 AND summary_date = ?2",
                params![user_id, date_str(date)],
                row_to_summary,
            )
            .optional()?;
        Ok(summary)
    }

    fn commit_award(&self, event: &LedgerEvent, stats: &Stats) -> Result<(), StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        insert_event(&tx, event)?;
        store_stats(&tx, stats)?;
        tx.commit()?;
        Ok(())
    }

    fn commit_activity(
        &self,
        completion: &Completion,
        event: &LedgerEvent,
        stats: &Stats,
    ) -> Result<bool, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        if let Err(e) = insert_completion(&tx, completion) {
            if completion.client_ref.is_some() && is_unique_violation(&e) {
                // Replayed client_ref; dropping tx rolls back.
                return Ok(false);
            }
            return Err(e.into());
        }
        insert_event(&tx, event)?;
        store_stats(&tx, stats)?;
        tx.commit()?;
        Ok(true)
    }

    fn commit_streak(&self, marker: &LedgerEvent, profile: &Profile) -> Result<bool, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        if let Err(e) = insert_event(&tx, marker) {
            if is_unique_violation(&e) {
                // Another writer claimed the day; dropping tx rolls back.
                return Ok(false);
            }
            return Err(e.into());
        }
        store_profile(&tx, profile)?;
        tx.commit()?;
        Ok(true)
    }

    fn commit_penalty(
        &self,
        events: &[LedgerEvent],
        profile: &Profile,
        stats: &Stats,
    ) -> Result<bool, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        for event in events {
            if let Err(e) = insert_event(&tx, event) {
                if is_unique_violation(&e) {
                    return Ok(false);
                }
                return Err(e.into());
            }
        }
        store_profile(&tx, profile)?;
        store_stats(&tx, stats)?;
        tx.commit()?;
        Ok(true)
    }
}
