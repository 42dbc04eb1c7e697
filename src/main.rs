//! # FIT Notifier
//!
//! Logs into the FIT student portal, finds announcements that were not seen
//! on earlier runs and emails them to one recipient.
//!
//! ## Usage
//!
//! ```sh
//! fit_notifier            # normal scheduled run
//! fit_notifier --trial    # resend everything currently listed, keep history
//! ```
//!
//! ## Architecture
//!
//! A single run is a straight line:
//! 1. **Load**: read the ids already delivered ([`store`])
//! 2. **Login**: replay the portal's login form ([`portal`])
//! 3. **Fetch & extract**: parse the news list into records ([`extract`])
//! 4. **Diff**: keep records whose id is new ([`diff`])
//! 5. **Notify**: email one digest ([`notify`])
//! 6. **Persist**: record the delivered ids ([`store`])
//!
//! Runs must not overlap; schedule one at a time.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod diff;
mod error;
mod extract;
mod models;
mod notify;
mod pipeline;
mod portal;
mod store;
mod utils;

use cli::Cli;
use config::Config;
use models::RunMode;
use notify::{Notifier, SmtpMailer};
use portal::PortalClient;
use store::SeenStore;

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(format!("info,{}=debug", env!("CARGO_CRATE_NAME")))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let start_time = std::time::Instant::now();
    info!(trial = args.trial, "fit_notifier starting up");

    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => debug!("No .env file"),
        Err(e) => warn!(error = %e, "Ignoring unreadable .env file"),
    }

    let config = Config::from_env()?;
    let mode = RunMode::from_trial_flag(args.trial);

    let portal = PortalClient::new(&config.settings.portal)?;
    let notifier = Notifier::new(
        SmtpMailer::new(&config.mail, &config.settings.smtp),
        &config.settings.smtp,
    );
    let store = SeenStore::new(&config.settings.state_file, mode);
    debug!(state_file = %store.path().display(), "Using state file");

    match pipeline::run(&config, mode, &portal, &notifier, &store).await {
        Ok(summary) => {
            info!(
                fetched = summary.fetched,
                new = summary.new,
                delivered = summary.delivered,
                persisted = summary.persisted,
                elapsed_ms = start_time.elapsed().as_millis() as u64,
                "Run complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Run aborted");
            Err(e.into())
        }
    }
}
