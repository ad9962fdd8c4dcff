//! Daily reconciliation commands.

use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use questlog_core::storage::{EngineConfig, Store};
use questlog_core::{ReconcileConfig, ReconciliationEngine};

#[derive(Subcommand)]
pub enum ReconcileAction {
    /// Settle the previous day for every user
    Run {
        /// Settle as of this instant (RFC 3339) instead of now
        #[arg(long)]
        as_of: Option<String>,
    },
    /// Keep settling on a fixed interval
    Watch {
        /// Minutes between runs; defaults from config
        #[arg(long)]
        interval_mins: Option<u64>,
    },
}

pub fn run(action: ReconcileAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;
    let config = EngineConfig::load_or_default();
    let engine = ReconciliationEngine::with_config(ReconcileConfig {
        default_timezone: config.defaults.timezone.clone(),
    });

    match action {
        ReconcileAction::Run { as_of } => {
            let as_of = match as_of {
                Some(s) => DateTime::parse_from_rfc3339(&s)?.with_timezone(&Utc),
                None => Utc::now(),
            };
            let report = engine.run(&store, as_of);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ReconcileAction::Watch { interval_mins } => {
            let mins = interval_mins.unwrap_or(config.watch.interval_mins).max(1);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let mut ticker = tokio::time::interval(Duration::from_secs(mins * 60));
                loop {
                    ticker.tick().await;
                    let report = engine.run(&store, Utc::now());
                    println!("{}", report.message());
                }
            });
        }
    }
    Ok(())
}
