//! Runtime configuration, built once at process start.
//!
//! Secrets come from the process environment (optionally seeded from a
//! `.env` file by `main`). Non-secret deployment knobs such as the portal URL,
//! form field names and SMTP relay live in [`Settings`], which defaults to the
//! FIT portal and can be overridden by a YAML file named in
//! `FIT_NOTIFIER_SETTINGS`.
//!
//! Components never read the environment themselves; they receive the parts
//! of [`Config`] they need by reference.

use crate::error::ConfigError;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Environment variable naming an optional YAML settings file.
pub const SETTINGS_ENV: &str = "FIT_NOTIFIER_SETTINGS";

/// Everything a run needs, assembled once in `main`.
#[derive(Debug, Clone)]
pub struct Config {
    pub portal: PortalCredentials,
    pub mail: MailCredentials,
    pub settings: Settings,
}

/// Student portal login.
#[derive(Clone, Default)]
pub struct PortalCredentials {
    pub student_id: String,
    pub password: String,
}

/// SMTP identity plus the single recipient.
#[derive(Clone, Default)]
pub struct MailCredentials {
    pub sender_email: String,
    pub sender_password: String,
    pub recipient_email: String,
}

// Hand-written so passwords never reach the logs through `?config`.
impl std::fmt::Debug for PortalCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalCredentials")
            .field("student_id", &self.student_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl std::fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailCredentials")
            .field("sender_email", &self.sender_email)
            .field("sender_password", &"<redacted>")
            .field("recipient_email", &self.recipient_email)
            .finish()
    }
}

/// Non-secret settings; every key is optional in the YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub portal: PortalSettings,
    pub smtp: SmtpSettings,
    /// Where the seen-set JSON array is kept.
    pub state_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            portal: PortalSettings::default(),
            smtp: SmtpSettings::default(),
            state_file: PathBuf::from("seen_notifications.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalSettings {
    /// Base of the student area; relative announcement links are appended to it.
    pub base_url: String,
    pub login_path: String,
    pub news_path: String,
    pub username_field: String,
    pub password_field: String,
    pub submit_field: String,
    pub submit_value: String,
    /// Text that only appears on the page after a successful login.
    pub success_marker: String,
    pub user_agent: String,
    /// Per-request timeout; `None` keeps the transport default.
    pub timeout_secs: Option<u64>,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.fit.ba/student".to_string(),
            login_path: "default.aspx".to_string(),
            news_path: "default.aspx".to_string(),
            username_field: "txtBrojDosijea".to_string(),
            password_field: "txtLozinka".to_string(),
            submit_field: "btnPrijava".to_string(),
            submit_value: "Prijava".to_string(),
            success_marker: "Obavijesti".to_string(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: None,
        }
    }
}

impl PortalSettings {
    /// Base URL without a trailing slash, as used for link concatenation.
    pub fn link_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn login_url(&self) -> Result<Url, ConfigError> {
        self.page_url(&self.login_path)
    }

    pub fn news_url(&self) -> Result<Url, ConfigError> {
        self.page_url(&self.news_path)
    }

    fn page_url(&self, page: &str) -> Result<Url, ConfigError> {
        let raw = format!("{}/{}", self.link_base(), page.trim_start_matches('/'));
        Url::parse(&raw).map_err(|source| ConfigError::BaseUrl { url: raw, source })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub subject_prefix: String,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            subject_prefix: "New FIT Notifications".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded settings file");
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes as unit, not as an empty map.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// Missing secrets become empty strings and a warning; they surface later
    /// as a login or SMTP failure rather than blocking startup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| match lookup(key) {
            Some(v) => v,
            None => {
                warn!(variable = key, "Environment variable not set");
                String::new()
            }
        };

        let settings = match lookup(SETTINGS_ENV) {
            Some(path) if !path.is_empty() => Settings::from_file(Path::new(&path))?,
            _ => Settings::default(),
        };
        // Fail on a bad base URL now rather than half-way through a login.
        settings.portal.login_url()?;
        settings.portal.news_url()?;

        let config = Config {
            portal: PortalCredentials {
                student_id: var("STUDENT_ID"),
                password: var("PASSWORD"),
            },
            mail: MailCredentials {
                sender_email: var("SENDER_EMAIL"),
                sender_password: var("SENDER_PASSWORD"),
                recipient_email: var("RECIPIENT_EMAIL"),
            },
            settings,
        };
        debug!(?config, "Configuration assembled");
        Ok(config)
    }
}
