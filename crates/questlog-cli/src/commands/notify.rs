use clap::Subcommand;
use questlog_core::storage::Store;

#[derive(Subcommand)]
pub enum NotifyAction {
    /// The nudge due for the user right now, if any
    Check {
        /// User id
        user_id: String,
    },
}

pub fn run(action: NotifyAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;

    match action {
        NotifyAction::Check { user_id } => {
            match super::live_engine().notification(&store, &user_id)? {
                Some(nudge) => println!("{}", serde_json::to_string_pretty(&nudge)?),
                None => println!("no nudge due"),
            }
        }
    }
    Ok(())
}
