//! Command-line interface definitions.
//!
//! The notifier is meant to run from a scheduler, so the surface is two
//! switches. Credentials and settings come from the environment; see
//! [`crate::config`].

use clap::Parser;

/// Email new FIT student-portal announcements.
///
/// # Examples
///
/// ```sh
/// # Normal scheduled run
/// fit_notifier
///
/// # Preview what is on the portal right now without touching history
/// fit_notifier --trial --verbose
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Treat every announcement on the page as new and do not update the state file
    #[arg(short, long)]
    pub trial: bool,

    /// Log debug output
    #[arg(short, long)]
    pub verbose: bool,
}
