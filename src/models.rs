//! Data models for portal announcements and delivery history.
//!
//! This module defines the core data structures used throughout the application:
//! - [`NotificationRecord`]: One announcement scraped from the portal news list
//! - [`SeenSet`]: Identifiers of announcements that were already delivered
//! - [`RunMode`]: Whether history is honoured (normal) or bypassed (trial)
//!
//! Only a record's `id` ever leaves the process; the record itself is rebuilt
//! from the portal page on every run.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One announcement from the portal's news listing.
///
/// Every field except `title` may be empty but is never absent, so callers can
/// format or compare fields without special-casing missing ones.
///
/// # Identity
///
/// The `id` is `"{title}_{date}"`, or just the title when the date is empty.
/// It is computed once in [`NotificationRecord::new`] and is the sole basis of
/// "new vs seen". Two distinct items with the same title and date share an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRecord {
    /// Announcement headline (the text of the title link).
    pub title: String,
    /// Publication date exactly as the portal prints it.
    pub date: String,
    /// Course the announcement belongs to.
    pub subject: String,
    /// Author's display name from the `mailto:` link.
    pub author: String,
    /// Short teaser text shown under the headline.
    #[serde(rename = "abstract")]
    pub summary: String,
    /// Absolute link to the full announcement.
    pub link: String,
    /// Stable identity derived from title and date.
    pub id: String,
}

impl NotificationRecord {
    pub fn new(
        title: String,
        date: String,
        subject: String,
        author: String,
        summary: String,
        link: String,
    ) -> Self {
        let id = record_id(&title, &date);
        Self {
            title,
            date,
            subject,
            author,
            summary,
            link,
            id,
        }
    }
}

/// Derive the identity of an announcement.
pub fn record_id(title: &str, date: &str) -> String {
    if date.is_empty() {
        title.to_string()
    } else {
        format!("{title}_{date}")
    }
}

/// Identifiers of announcements already delivered to the recipient.
///
/// Membership checks go through a hash index; the backing vector keeps
/// insertion order so the state file is written in the order ids were first
/// seen. Inserting an id twice is a no-op.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SeenSet {
    order: Vec<String>,
    index: HashSet<String>,
}

impl SeenSet {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Was `id` already delivered?
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Record `id` as delivered. Returns `false` if it was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.index.insert(id.clone()) {
            self.order.push(id);
            true
        } else {
            false
        }
    }

    pub fn extend<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            self.insert(id);
        }
    }

    /// Number of distinct ids.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for SeenSet {
    fn from(ids: Vec<String>) -> Self {
        let mut set = SeenSet::new();
        set.extend(ids);
        set
    }
}

impl From<SeenSet> for Vec<String> {
    fn from(set: SeenSet) -> Self {
        set.order
    }
}

/// Set equality; ordering is irrelevant to history.
impl PartialEq for SeenSet {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for SeenSet {}

/// How a run treats delivery history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Filter against history and persist newly delivered ids.
    #[default]
    Normal,
    /// Treat every fetched record as new; never read or write history.
    Trial,
}

impl RunMode {
    pub fn from_trial_flag(trial: bool) -> Self {
        if trial { RunMode::Trial } else { RunMode::Normal }
    }

    pub fn is_trial(self) -> bool {
        matches!(self, RunMode::Trial)
    }
}
