//! Email digest of new announcements.
//!
//! One run sends at most one message: a header with the generation time,
//! then one block per announcement. The message is `multipart/alternative`
//! with a plain-text body and an HTML body rendered through handlebars, which
//! escapes all announcement text.
//!
//! Delivery goes through the [`Mailer`] trait. [`SmtpMailer`] is the real
//! transport (STARTTLS relay with login); tests substitute a recorder.

use crate::config::{MailCredentials, SmtpSettings};
use crate::error::TransportFailure;
use crate::models::NotificationRecord;
use chrono::{Local, NaiveDateTime};
use handlebars::Handlebars;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, info, instrument};

const HEADING: &str = "New notifications from FIT:";
const SEPARATOR_WIDTH: usize = 50;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

const HTML_TEMPLATE: &str = r#"<html>
<body style="font-family: sans-serif">
<h2>{{heading}}</h2>
<p style="color: #666">Generated: {{generated}}</p>
{{#each records}}
<div style="margin-bottom: 1.5em">
  <h3>{{#if link}}<a href="{{link}}">{{title}}</a>{{else}}{{title}}{{/if}}</h3>
  <p>
    <b>Date:</b> {{date}}<br/>
    <b>Subject:</b> {{subject}}<br/>
    <b>Author:</b> {{author}}
  </p>
  <p>{{abstract}}</p>
</div>
<hr/>
{{/each}}
</body>
</html>
"#;

static TEMPLATES: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut hb = Handlebars::new();
    hb.set_strict_mode(true);
    hb.register_template_string("digest", HTML_TEMPLATE)
        .expect("static digest template must compile");
    hb
});

/// A rendered message, ready for any transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub subject: String,
    pub plain: String,
    pub html: String,
}

#[derive(Serialize)]
struct HtmlContext<'a> {
    heading: &'a str,
    generated: &'a str,
    records: &'a [NotificationRecord],
}

/// Render `records` into one message.
pub fn render_digest(
    records: &[NotificationRecord],
    generated_at: NaiveDateTime,
    subject_prefix: &str,
) -> Result<Digest, TransportFailure> {
    let generated = generated_at.format(TIMESTAMP_FORMAT).to_string();
    let subject = format!("{subject_prefix} - {generated}");

    let mut plain = format!("{HEADING}\nGenerated: {generated}\n\n");
    for r in records {
        plain.push_str(&format!(
            "Title: {}\nDate: {}\nSubject: {}\nAuthor: {}\nAbstract: {}\nLink: {}\n\n{}\n\n",
            r.title,
            r.date,
            r.subject,
            r.author,
            r.summary,
            r.link,
            "-".repeat(SEPARATOR_WIDTH),
        ));
    }

    let html = TEMPLATES.render(
        "digest",
        &HtmlContext {
            heading: HEADING,
            generated: &generated,
            records,
        },
    )?;

    Ok(Digest {
        subject,
        plain,
        html,
    })
}

/// Something that can deliver a [`Digest`] to the configured recipient.
pub trait Mailer {
    async fn send(&self, digest: &Digest) -> Result<(), TransportFailure>;
}

/// SMTP delivery with STARTTLS and login.
///
/// Addresses and the relay are resolved on each send so that bad or missing
/// settings show up as a delivery failure of this run instead of a startup
/// error.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    credentials: MailCredentials,
    smtp: SmtpSettings,
}

impl SmtpMailer {
    pub fn new(credentials: &MailCredentials, smtp: &SmtpSettings) -> Self {
        Self {
            credentials: credentials.clone(),
            smtp: smtp.clone(),
        }
    }

    fn build_message(&self, digest: &Digest) -> Result<Message, TransportFailure> {
        let message = Message::builder()
            .from(mailbox(&self.credentials.sender_email)?)
            .to(mailbox(&self.credentials.recipient_email)?)
            .subject(digest.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                digest.plain.clone(),
                digest.html.clone(),
            ))?;
        Ok(message)
    }
}

fn mailbox(address: &str) -> Result<Mailbox, TransportFailure> {
    address
        .parse::<Mailbox>()
        .map_err(|source| TransportFailure::Address {
            address: address.to_string(),
            source,
        })
}

impl Mailer for SmtpMailer {
    #[instrument(level = "info", skip_all, fields(host = %self.smtp.host, port = self.smtp.port))]
    async fn send(&self, digest: &Digest) -> Result<(), TransportFailure> {
        let message = self.build_message(digest)?;
        let transport = SmtpTransport::starttls_relay(&self.smtp.host)?
            .port(self.smtp.port)
            .credentials(Credentials::new(
                self.credentials.sender_email.clone(),
                self.credentials.sender_password.clone(),
            ))
            .build();

        // lettre's SmtpTransport blocks; keep it off the runtime worker.
        let response = tokio::task::spawn_blocking(move || transport.send(&message)).await??;
        debug!(code = %response.code(), "SMTP server accepted message");
        Ok(())
    }
}

/// Outcome of a notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Nothing to send.
    Skipped,
    Sent { count: usize },
}

/// Turns new records into one email and hands it to a [`Mailer`].
pub struct Notifier<M> {
    mailer: M,
    subject_prefix: String,
}

impl<M: Mailer> Notifier<M> {
    /// Create a notifier that sends through `mailer`.
    ///
    /// # Arguments
    ///
    /// * `mailer` - The transport; [`SmtpMailer`] in production
    /// * `smtp` - Supplies the subject prefix
    pub fn new(mailer: M, smtp: &SmtpSettings) -> Self {
        Self {
            mailer,
            subject_prefix: smtp.subject_prefix.clone(),
        }
    }

    #[cfg(test)]
    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    /// Email `records` as one digest. Sends nothing for an empty slice.
    #[instrument(level = "info", skip_all, fields(count = records.len()))]
    pub async fn notify(&self, records: &[NotificationRecord]) -> Result<Delivery, TransportFailure> {
        if records.is_empty() {
            debug!("No records; skipping email");
            return Ok(Delivery::Skipped);
        }

        let digest = render_digest(records, Local::now().naive_local(), &self.subject_prefix)?;
        self.mailer.send(&digest).await?;
        info!(subject = %digest.subject, "Email sent successfully");
        Ok(Delivery::Sent {
            count: records.len(),
        })
    }
}
