//! Profile management commands.

use clap::Subcommand;
use questlog_core::player::Profile;
use questlog_core::storage::{EngineConfig, ProgressStore, Store};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Create a new profile
    Create {
        /// User id
        user_id: String,
        /// IANA timezone (e.g. "Asia/Tokyo"); defaults from config
        #[arg(long)]
        timezone: Option<String>,
        /// Actions per day needed to avoid a miss; defaults from config
        #[arg(long)]
        target: Option<i64>,
        /// XP lost per missed day; defaults from config
        #[arg(long)]
        penalty_xp: Option<u32>,
    },
    /// Show a profile
    Show {
        /// User id
        user_id: String,
    },
    /// Change a profile's timezone
    SetTimezone {
        /// User id
        user_id: String,
        /// IANA timezone
        timezone: String,
    },
    /// Change a profile's daily actions target
    SetTarget {
        /// User id
        user_id: String,
        /// Actions per day, at least 1
        target: i64,
    },
}

pub fn run(action: ProfileAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;

    match action {
        ProfileAction::Create {
            user_id,
            timezone,
            target,
            penalty_xp,
        } => {
            let config = EngineConfig::load_or_default();
            let timezone = timezone.unwrap_or(config.defaults.timezone);
            if timezone.parse::<chrono_tz::Tz>().is_err() {
                return Err(format!("unknown timezone: {timezone}").into());
            }
            let profile = Profile::new(
                &user_id,
                &timezone,
                target.unwrap_or(config.defaults.daily_actions_target),
                penalty_xp.unwrap_or(config.defaults.penalty_xp),
            );
            store.create_profile(&profile)?;
            println!("Profile created: {user_id}");
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        ProfileAction::Show { user_id } => match store.get_profile(&user_id)? {
            Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
            None => println!("Profile not found: {user_id}"),
        },
        ProfileAction::SetTimezone { user_id, timezone } => {
            if timezone.parse::<chrono_tz::Tz>().is_err() {
                return Err(format!("unknown timezone: {timezone}").into());
            }
            let mut profile = store
                .get_profile(&user_id)?
                .ok_or(format!("Profile not found: {user_id}"))?;
            profile.timezone = timezone;
            store.update_profile(&profile)?;
            println!("Profile updated:");
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        ProfileAction::SetTarget { user_id, target } => {
            if target < 1 {
                return Err(format!("target must be at least 1, got {target}").into());
            }
            let mut profile = store
                .get_profile(&user_id)?
                .ok_or(format!("Profile not found: {user_id}"))?;
            profile.daily_actions_target = target;
            store.update_profile(&profile)?;
            println!("Profile updated:");
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
    }
    Ok(())
}
