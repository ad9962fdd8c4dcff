use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "questlog-cli", version, about = "Questlog CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Profile management
    Profile {
        #[command(subcommand)]
        action: commands::profile::ProfileAction,
    },
    /// Record actions, awards and sales
    Activity {
        #[command(subcommand)]
        action: commands::activity::ActivityAction,
    },
    /// Streak display
    Streak {
        #[command(subcommand)]
        action: commands::streak::StreakAction,
    },
    /// Player statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Notification checks
    Notify {
        #[command(subcommand)]
        action: commands::notify::NotifyAction,
    },
    /// Daily reconciliation
    Reconcile {
        #[command(subcommand)]
        action: commands::reconcile::ReconcileAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    // Logs go to stderr so command output stays parseable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Profile { action } => commands::profile::run(action),
        Commands::Activity { action } => commands::activity::run(action),
        Commands::Streak { action } => commands::streak::run(action),
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Notify { action } => commands::notify::run(action),
        Commands::Reconcile { action } => commands::reconcile::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
