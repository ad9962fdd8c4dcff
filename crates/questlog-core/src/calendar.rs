//! Local-day resolution.
//!
//! Every date-keyed decision in the engine (streaks, daily summaries,
//! penalties, notification windows) is made against the user's local
//! calendar day, not UTC. A profile stores an IANA zone name; resolving
//! it can fail, in which case the configured default zone applies.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Resolves UTC instants into per-user local days and hours.
#[derive(Debug, Clone, Copy)]
pub struct LocalCalendar {
    default_tz: Tz,
}

impl LocalCalendar {
    pub fn new(default_tz: Tz) -> Self {
        Self { default_tz }
    }

    /// Build a calendar from a configured zone name, falling back to
    /// UTC when the name itself does not resolve.
    pub fn from_zone_name(name: &str) -> Self {
        let default_tz = match name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(zone = name, "unknown default timezone, using UTC");
                Tz::UTC
            }
        };
        Self { default_tz }
    }

    pub fn default_zone(&self) -> Tz {
        self.default_tz
    }

    /// Resolve a profile's zone name, logging and substituting the
    /// default zone when the name is not a known IANA identifier.
    fn resolve(&self, zone_name: &str) -> Tz {
        match zone_name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(
                    zone = zone_name,
                    fallback = %self.default_tz,
                    "unknown timezone on profile, using default"
                );
                self.default_tz
            }
        }
    }

    /// The local calendar date of `now` in the given zone.
    pub fn local_date(&self, zone_name: &str, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.resolve(zone_name)).date_naive()
    }

    /// The local calendar date immediately before `now`'s local date.
    pub fn previous_date(&self, zone_name: &str, now: DateTime<Utc>) -> NaiveDate {
        day_before(self.local_date(zone_name, now))
    }

    /// The local hour of day (0..=23) of `now` in the given zone.
    pub fn local_hour(&self, zone_name: &str, now: DateTime<Utc>) -> u32 {
        now.with_timezone(&self.resolve(zone_name)).hour()
    }
}

impl Default for LocalCalendar {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

/// The calendar day before `date`.
pub fn day_before(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}
