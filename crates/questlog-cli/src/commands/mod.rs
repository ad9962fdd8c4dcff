pub mod activity;
pub mod config;
pub mod notify;
pub mod profile;
pub mod reconcile;
pub mod stats;
pub mod streak;

use questlog_core::storage::EngineConfig;
use questlog_core::{LocalCalendar, ProgressEngine};

/// Engine for the live commands. Resolves local days with the
/// configured fallback zone so they agree with the reconciliation job.
pub(crate) fn live_engine() -> ProgressEngine {
    let config = EngineConfig::load_or_default();
    ProgressEngine::new(LocalCalendar::from_zone_name(&config.defaults.timezone))
}
