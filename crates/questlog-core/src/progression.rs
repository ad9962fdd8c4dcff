//! Progression math: level curve, award scaling, and miss penalties.
//!
//! Everything in this module is a pure function of its inputs. Persistent
//! state (profiles, stats, the event ledger) lives in [`crate::storage`];
//! the engines in [`crate::progress`] and [`crate::reconcile`] call into
//! here and write the results back.

use serde::{Deserialize, Serialize};

/// XP needed to advance from level 1 to level 2.
pub const BASE_LEVEL_XP: u64 = 500;

/// Additional XP needed per level beyond the base.
pub const LEVEL_XP_STEP: u64 = 250;

/// XP granted per completed action before the day multiplier.
pub const ACTION_XP: i64 = 10;

/// Gold granted per completed action. Gold is never multiplied.
pub const ACTION_GOLD: i64 = 5;

/// Fraction of the daily target at which the bonus multiplier kicks in.
pub const OVERSHOOT_RATIO: f64 = 1.2;

/// Multiplier applied to XP awards once [`OVERSHOOT_RATIO`] is reached.
pub const OVERSHOOT_MULTIPLIER: f64 = 1.5;

/// Consecutive missed days at which a miss also costs a level.
pub const LEVEL_PENALTY_MISSES: u32 = 3;

/// Position on the level curve derived from net lifetime XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    /// Current level, starting at 1.
    pub level: u32,
    /// XP accumulated toward the next level.
    pub current_xp: u64,
}

/// XP required to advance from `level` to `level + 1`.
pub fn xp_requirement(level: u32) -> u64 {
    BASE_LEVEL_XP + LEVEL_XP_STEP * level as u64
}

/// Total XP consumed by the curve to stand at the start of `level`
/// with zero progress.
pub fn cumulative_xp_for(level: u32) -> u64 {
    (1..level).map(xp_requirement).sum()
}

/// Derive level and within-level progress from net lifetime XP.
///
/// Level and current XP are always recomputed from the net total, never
/// adjusted incrementally, so stored aggregates cannot drift from the
/// curve.
pub fn level_curve(net_xp: u64) -> LevelProgress {
    let mut level = 1u32;
    let mut remaining = net_xp;
    loop {
        let needed = xp_requirement(level);
        if remaining < needed {
            break;
        }
        remaining -= needed;
        level += 1;
    }
    LevelProgress {
        level,
        current_xp: remaining,
    }
}

/// Multiplier for XP awards given the day's completed actions so far.
///
/// Returns [`OVERSHOOT_MULTIPLIER`] once `actions_done / target` reaches
/// [`OVERSHOOT_RATIO`], otherwise 1.0. The ratio is evaluated at the
/// moment of each award, so early awards on an overshoot day keep their
/// unmultiplied value.
pub fn day_multiplier(actions_done: i64, target: i64) -> f64 {
    if target <= 0 {
        return 1.0;
    }
    if actions_done as f64 / target as f64 >= OVERSHOOT_RATIO {
        OVERSHOOT_MULTIPLIER
    } else {
        1.0
    }
}

/// Scale an XP amount by the day multiplier, rounding to nearest.
pub fn scale_award(amount: i64, multiplier: f64) -> i64 {
    (amount as f64 * multiplier).round() as i64
}

/// Outcome of evaluating a missed day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Penalty {
    /// Flat XP deduction, taken on every miss.
    pub xp_penalty: u32,
    /// Whether this miss also costs a level.
    pub level_penalty: bool,
}

/// Penalty for a missed day given the miss count including this one.
///
/// The XP deduction applies on every miss. The level deduction applies
/// once the count reaches [`LEVEL_PENALTY_MISSES`]; the caller resets
/// the count after applying it.
pub fn penalty_for(consecutive_misses: u32, penalty_xp: u32) -> Penalty {
    Penalty {
        xp_penalty: penalty_xp,
        level_penalty: consecutive_misses >= LEVEL_PENALTY_MISSES,
    }
}
