//! Month page scanning.
//!
//! Each archive month page lists its documents with an anchor whose visible
//! text is the site's "download PDF" phrase. Only those anchors are kept;
//! everything else on the page (navigation, attachments, images) is ignored.

use std::collections::HashSet;

use scraper::{ElementRef, Html};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::ScrapeConfig;
use crate::discovery::{Period, parse_selector};
use crate::error_log::{ErrorLog, ErrorScope};
use crate::fetch::Transport;

/// One document found on a month page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    /// Absolute document URL.
    pub url: String,
    /// Anchor text as shown on the page.
    pub label: String,
    /// Surrounding context (title attribute or enclosing element text).
    pub description: Option<String>,
    /// Archive month the link was found under.
    pub period: Period,
    /// Legislature the page belongs to.
    pub legislature: u32,
}

/// Anchor found by [`extract_links`], before legislature and period are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
    /// Absolute URL.
    pub url: String,
    /// Anchor text, whitespace-normalised.
    pub label: String,
    /// Surrounding context, if any.
    pub description: Option<String>,
}

/// Fetches one month page and returns its document links.
///
/// A 404 is an expected absence and yields no links and no error entry.
/// Transport failures and other statuses are recorded in `errors`.
#[instrument(skip(transport, config, errors), fields(period = %period))]
pub async fn scan_period(
    transport: &dyn Transport,
    config: &ScrapeConfig,
    legislature: u32,
    period: Period,
    errors: &ErrorLog,
) -> Vec<DocumentLink> {
    let url = config.month_url(legislature, period);

    let page = match transport.get_page(&url).await {
        Ok(page) => page,
        Err(e) => {
            warn!(url = %url, error = %e, "failed to fetch month page");
            errors.record(ErrorScope::Scan, &url, &e);
            return Vec::new();
        }
    };

    if page.is_not_found() {
        debug!(url = %url, "no archive page for period (404)");
        return Vec::new();
    }
    if !page.is_success() {
        warn!(url = %url, status = page.status, "unexpected status for month page");
        errors.record(
            ErrorScope::Scan,
            &url,
            format!("HTTP {} fetching month page", page.status),
        );
        return Vec::new();
    }

    let base = if page.final_url.is_empty() {
        url.as_str()
    } else {
        page.final_url.as_str()
    };
    let links: Vec<DocumentLink> = extract_links(&page.body, base, &config.download_label)
        .into_iter()
        .map(|raw| DocumentLink {
            url: raw.url,
            label: raw.label,
            description: raw.description,
            period,
            legislature,
        })
        .collect();

    if links.is_empty() {
        debug!(url = %url, "month page has no download links");
    } else {
        info!(
            legislature,
            year = period.year,
            month = period.month,
            links = links.len(),
            "scanned month page"
        );
    }
    links
}

/// Extracts anchors whose text equals `label`, resolved against `base_url`.
///
/// Text is compared after trimming, collapsing inner whitespace and
/// lowercasing both sides. Links are returned in page order, once each.
#[must_use]
pub fn extract_links(html: &str, base_url: &str, label: &str) -> Vec<RawLink> {
    let wanted = normalize_text(label);
    let Some(anchors) = parse_selector("a[href]") else {
        return Vec::new();
    };
    let base = Url::parse(base_url).ok();
    if base.is_none() {
        warn!(base_url, "month page URL is not absolute; relative links will be dropped");
    }

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&anchors) {
        let text = collapse_whitespace(&anchor.text().collect::<String>());
        if text.to_lowercase() != wanted {
            continue;
        }
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        let Some(url) = resolve_href(base.as_ref(), href) else {
            debug!(href, "skipping unresolvable download link");
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        links.push(RawLink {
            url,
            description: describe(anchor, &wanted),
            label: text,
        });
    }
    links
}

fn resolve_href(base: Option<&Url>, href: &str) -> Option<String> {
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Title attribute, else the parent element's text with the label removed.
fn describe(anchor: ElementRef<'_>, normalized_label: &str) -> Option<String> {
    if let Some(title) = anchor.value().attr("title") {
        let title = collapse_whitespace(title);
        if !title.is_empty() && title.to_lowercase() != normalized_label {
            return Some(title);
        }
    }

    let parent = anchor.parent().and_then(ElementRef::wrap)?;
    let own = collapse_whitespace(&anchor.text().collect::<String>());
    let context = collapse_whitespace(&parent.text().collect::<String>());
    let context = collapse_whitespace(&context.replacen(&own, " ", 1));
    let context = context.trim_matches(|c: char| c == '-' || c == '|' || c == ':' || c.is_whitespace());
    (!context.is_empty()).then(|| context.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_text(text: &str) -> String {
    collapse_whitespace(text).to_lowercase()
}
