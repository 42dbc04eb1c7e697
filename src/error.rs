//! Failure taxonomy for a single notifier run.
//!
//! Each pipeline stage has its own error type so the operator output says
//! exactly where a run stopped. [`RunError`] is the umbrella that `main`
//! sees; everything in it aborts the run before the state file is touched.
//! [`TransportFailure`] is deliberately *not* part of [`RunError`]: delivery
//! problems are reported and the run still completes.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthFailure {
    /// The login page GET or the credential POST did not complete.
    #[error("login request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The portal answered the login exchange with a non-2xx status.
    #[error("portal answered HTTP {status} at {url} during login")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The login page contains no `<form>`.
    #[error("no login form found on {url}")]
    MissingLoginForm { url: String },

    /// The post-login page lacks the success marker.
    #[error("login rejected: marker {marker:?} not present in post-login page")]
    Rejected { marker: String },
}

#[derive(Debug, Error)]
pub enum FetchFailure {
    /// The announcements GET did not complete.
    #[error("announcements request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The announcements page answered with a non-2xx status.
    #[error("portal answered HTTP {status} at {url} while fetching announcements")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

#[derive(Debug, Error)]
pub enum TransportFailure {
    /// Sender or recipient is not a valid address (empty when unset).
    #[error("invalid mailbox {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    /// The HTML body template failed to render.
    #[error("failed to render email: {0}")]
    Render(#[from] handlebars::RenderError),

    /// lettre rejected the assembled message.
    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    /// Connecting, STARTTLS, login or sending failed.
    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("SMTP task did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum PersistenceFailure {
    /// The state file exists but could not be read.
    #[error("cannot read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file is not a JSON array of strings.
    #[error("state file {path} is corrupt (expected a JSON array of strings): {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot could not be written or moved into place.
    #[error("cannot write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The base URL plus a page path does not form a valid URL.
    #[error("invalid portal base URL {url:?}: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// reqwest could not build the portal client.
    #[error("cannot build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Anything that aborts a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthFailure),

    #[error(transparent)]
    Fetch(#[from] FetchFailure),

    #[error(transparent)]
    Persistence(#[from] PersistenceFailure),
}
