use clap::Subcommand;
use questlog_core::storage::{ProgressStore, Store};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Show a player's lifetime stats
    Show {
        /// User id
        user_id: String,
    },
    /// Rebuild the stats row from the event ledger
    Rebuild {
        /// User id
        user_id: String,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;

    match action {
        StatsAction::Show { user_id } => match store.get_stats(&user_id)? {
            Some(stats) => println!("{}", serde_json::to_string_pretty(&stats)?),
            None => println!("Stats not found: {user_id}"),
        },
        StatsAction::Rebuild { user_id } => {
            let stats = super::live_engine().rebuild_stats(&store, &user_id)?;
            println!("Stats rebuilt:");
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
