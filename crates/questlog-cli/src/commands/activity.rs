//! Activity recording and award commands.

use clap::Subcommand;
use questlog_core::events::EventType;
use questlog_core::storage::Store;

#[derive(Subcommand)]
pub enum ActivityAction {
    /// Record completed actions for today
    Record {
        /// User id
        user_id: String,
        /// Number of actions completed (default: 1)
        #[arg(long, default_value = "1")]
        count: i64,
        /// Client-supplied replay key for offline sync
        #[arg(long)]
        client_ref: Option<String>,
    },
    /// Award XP outside the action flow
    Award {
        /// User id
        user_id: String,
        /// XP amount
        amount: i64,
        /// Event kind: task or perk_bonus (default: task)
        #[arg(long, default_value = "task")]
        kind: String,
        /// Reason recorded in the ledger
        #[arg(long, default_value = "manual award")]
        reason: String,
    },
    /// Record sale income
    Sale {
        /// User id
        user_id: String,
        /// Gold amount
        amount: i64,
        /// Description recorded in the ledger
        #[arg(long, default_value = "sale")]
        description: String,
    },
}

pub fn run(action: ActivityAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;
    let engine = super::live_engine();

    match action {
        ActivityAction::Record {
            user_id,
            count,
            client_ref,
        } => {
            let outcome =
                engine.record_activity(&store, &user_id, count, client_ref.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        ActivityAction::Award {
            user_id,
            amount,
            kind,
            reason,
        } => {
            let event_type =
                EventType::parse(&kind).ok_or(format!("unknown event kind: {kind}"))?;
            let outcome = engine.award_xp(&store, &user_id, event_type, amount, &reason)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        ActivityAction::Sale {
            user_id,
            amount,
            description,
        } => {
            let outcome = engine.record_sale(&store, &user_id, amount, &description)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }
    Ok(())
}
