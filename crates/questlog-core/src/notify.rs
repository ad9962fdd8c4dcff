//! Daily nudge decisions.
//!
//! Pure decision logic only: given a local hour and the day's progress,
//! decide whether a nudge is due and what it should say. Delivery is the
//! caller's concern.

use serde::{Deserialize, Serialize};

/// Kind of daily nudge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeKind {
    /// Morning encouragement.
    Encourage,
    /// Evening progress report.
    Status,
    /// Late-evening warning, only while the target is unmet.
    LastChance,
}

/// A nudge that should be delivered now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nudge {
    pub kind: NudgeKind,
    pub message: String,
}

/// Decide the nudge for a local hour and the day's progress so far.
///
/// Morning (07..=09) encourages, evening (18..=20) reports status, and
/// late evening (21..=23) warns only while the target is still unmet.
/// All other hours are quiet.
pub fn decide(local_hour: u32, actions_done: i64, target: i64) -> Option<Nudge> {
    let remaining = (target - actions_done).max(0);
    match local_hour {
        7..=9 => Some(Nudge {
            kind: NudgeKind::Encourage,
            message: format!("A new day: {target} actions to go. Start small."),
        }),
        18..=20 => Some(Nudge {
            kind: NudgeKind::Status,
            message: if remaining == 0 {
                format!("{actions_done}/{target} done. Target met, streak safe.")
            } else {
                format!("{actions_done}/{target} done so far. {remaining} to go.")
            },
        }),
        21..=23 if remaining > 0 => Some(Nudge {
            kind: NudgeKind::LastChance,
            message: format!("{remaining} more before midnight or the streak takes the hit."),
        }),
        _ => None,
    }
}
