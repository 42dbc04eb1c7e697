//! One notifier run: login → fetch → extract → diff → notify → persist.
//!
//! Every step finishes before the next starts. Any failure before delivery
//! aborts the run with a [`RunError`] and leaves the state file as it was.
//! A failed delivery is logged and the run completes, but the new ids are
//! **not** recorded, so the next run tries them again.

use crate::config::Config;
use crate::diff::select_pending;
use crate::error::RunError;
use crate::extract::extract;
use crate::models::RunMode;
use crate::notify::{Delivery, Mailer, Notifier};
use crate::portal::PortalClient;
use crate::store::SeenStore;
use tracing::{error, info, instrument};

/// What a completed run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Announcements found on the page.
    pub fetched: usize,
    /// Announcements selected for delivery.
    pub new: usize,
    /// Whether an email was accepted by the transport.
    pub delivered: bool,
    /// Whether the state file was rewritten.
    pub persisted: bool,
}

/// Execute one complete notifier run.
///
/// # Arguments
///
/// * `config` - Credentials and settings assembled at startup
/// * `mode` - [`RunMode::Trial`] delivers everything and skips persistence
/// * `portal` - Client used for the login and the single page fetch
/// * `notifier` - Renders and delivers the digest
/// * `store` - Delivery history, read at the start and written at the end
///
/// # Returns
///
/// A [`RunSummary`] when the run completed, including runs whose email
/// failed. A [`RunError`] when it was aborted by a config, login, fetch or
/// state-file failure; the state file is then left as it was.
#[instrument(level = "info", skip_all, fields(mode = ?mode))]
pub async fn run<M: Mailer>(
    config: &Config,
    mode: RunMode,
    portal: &PortalClient,
    notifier: &Notifier<M>,
    store: &SeenStore,
) -> Result<RunSummary, RunError> {
    let mut seen = store.load().await?;

    let session = portal.authenticate(&config.portal).await.inspect_err(|e| {
        error!(error = %e, "Login failed");
    })?;
    let html = portal.fetch_page(session).await?;

    let records = extract(&html, config.settings.portal.link_base());
    let mut summary = RunSummary {
        fetched: records.len(),
        ..RunSummary::default()
    };

    let pending = select_pending(records, &seen, mode);
    summary.new = pending.len();
    if pending.is_empty() {
        info!(fetched = summary.fetched, "No new notifications found");
        return Ok(summary);
    }
    info!(count = pending.len(), "Found {} new notifications", pending.len());

    match notifier.notify(&pending).await {
        Ok(Delivery::Sent { .. }) => summary.delivered = true,
        Ok(Delivery::Skipped) => {}
        Err(e) => {
            error!(error = %e, "Failed to send email; leaving them unmarked for the next run");
            return Ok(summary);
        }
    }

    if !mode.is_trial() {
        seen.extend(pending.into_iter().map(|r| r.id));
        store.save(&seen).await?;
        summary.persisted = true;
    }
    Ok(summary)
}
