//! Announcement extraction from the portal news page.
//!
//! The portal renders its news list as:
//!
//! ```html
//! <ul class="newslist">
//!   <li>
//!     <a class="linkButton" href="News.aspx?id=1">Title</a>
//!     <span id="lblDatum">12.06.2024 10:15</span>
//!     <span id="lblPredmet">Programiranje II</span>
//!     <a class="meta" href="mailto:prof@fit.ba">Prof. Name</a>
//!     <div class="abstract">Teaser text</div>
//!   </li>
//! </ul>
//! ```
//!
//! Items without a title link are skipped. Every other field falls back to an
//! empty string. Text is trimmed but otherwise kept verbatim so ids match
//! those already stored in existing state files.

use crate::models::NotificationRecord;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static ITEM: Lazy<Selector> = Lazy::new(|| selector("ul.newslist li"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("a.linkButton"));
static DATE: Lazy<Selector> = Lazy::new(|| selector("span#lblDatum"));
static SUBJECT: Lazy<Selector> = Lazy::new(|| selector("span#lblPredmet"));
static AUTHOR: Lazy<Selector> = Lazy::new(|| selector(r#"a.meta[href^="mailto:"]"#));
static ABSTRACT: Lazy<Selector> = Lazy::new(|| selector("div.abstract"));

/// Parse every announcement on the page, in document order.
///
/// # Arguments
///
/// * `html` - The raw announcements page
/// * `link_base` - Prefix for the title link's `href`, joined with `/`
#[instrument(level = "info", skip_all, fields(bytes = html.len()))]
pub fn extract(html: &str, link_base: &str) -> Vec<NotificationRecord> {
    let document = Html::parse_document(html);

    let records: Vec<NotificationRecord> = document
        .select(&ITEM)
        .filter_map(|item| extract_item(item, link_base))
        .collect();

    debug!(count = records.len(), "Extracted announcements");
    records
}

fn extract_item(item: ElementRef<'_>, link_base: &str) -> Option<NotificationRecord> {
    let title_elem = item.select(&TITLE).next()?;

    let link = match title_elem.value().attr("href") {
        Some(href) if !href.is_empty() => format!("{link_base}/{href}"),
        _ => String::new(),
    };

    Some(NotificationRecord::new(
        element_text(title_elem),
        text_or_default(item, &DATE),
        text_or_default(item, &SUBJECT),
        text_or_default(item, &AUTHOR),
        text_or_default(item, &ABSTRACT),
        link,
    ))
}

/// Trimmed text of the first match of `sel` under `item`, or `""`.
fn text_or_default(item: ElementRef<'_>, sel: &Selector) -> String {
    item.select(sel).next().map(element_text).unwrap_or_default()
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
