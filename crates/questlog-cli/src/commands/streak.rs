use clap::Subcommand;
use questlog_core::storage::Store;

#[derive(Subcommand)]
pub enum StreakAction {
    /// Current and best streak
    Show {
        /// User id
        user_id: String,
    },
}

pub fn run(action: StreakAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;

    match action {
        StreakAction::Show { user_id } => {
            let display = super::live_engine().streak(&store, &user_id)?;
            println!("{}", serde_json::to_string_pretty(&display)?);
        }
    }
    Ok(())
}
