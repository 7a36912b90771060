//! Archive period discovery.
//!
//! A legislature's index page lists, per year, the months that have an
//! archive page. Only months the page positively offers are returned: links
//! carrying an `annomese=YYYYMM` parameter, or enabled month controls
//! (`data-mese`) inside a year block (`data-anno`). Months shown as disabled
//! are skipped, and nothing is ever inferred from a year alone.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

use crate::config::ScrapeConfig;
use crate::error_log::{ErrorLog, ErrorScope};
use crate::fetch::Transport;

/// `annomese=YYYYMM` inside an href.
#[allow(clippy::expect_used)]
static ANNOMESE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[?&;])annomese=(\d{4})(\d{2})(?:$|[&#;])")
        .expect("annomese regex is valid") // Static pattern, safe to panic
});

/// A (year, month) with a confirmed archive page. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    /// Calendar year.
    pub year: i32,
    /// Month, 1..=12.
    pub month: u8,
}

impl Period {
    /// Creates a period. Callers validate the month.
    #[must_use]
    pub fn new(year: i32, month: u8) -> Self {
        Self { year, month }
    }

    /// Builds a period only when `month` is a real month.
    #[must_use]
    pub fn checked(year: i32, month: u32) -> Option<Self> {
        let month = u8::try_from(month).ok().filter(|m| (1..=12).contains(m))?;
        Some(Self::new(year, month))
    }

    /// `YYYYMM`, as used by the `annomese` query parameter.
    #[must_use]
    pub fn annomese(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Fetches the legislature index page and returns its available periods.
///
/// Never fails: transport errors and unexpected statuses are recorded in
/// `errors` and yield an empty set, so other legislatures still run.
#[instrument(skip(transport, config, errors))]
pub async fn discover_periods(
    transport: &dyn Transport,
    config: &ScrapeConfig,
    legislature: u32,
    errors: &ErrorLog,
) -> BTreeSet<Period> {
    let url = config.index_url(legislature);
    debug!(url = %url, "fetching legislature index");

    let page = match transport.get_page(&url).await {
        Ok(page) => page,
        Err(e) => {
            warn!(url = %url, error = %e, "failed to fetch legislature index");
            errors.record(ErrorScope::Discovery, &url, &e);
            return BTreeSet::new();
        }
    };

    if page.is_not_found() {
        info!(url = %url, legislature, "no archive index for legislature (404)");
        return BTreeSet::new();
    }
    if !page.is_success() {
        warn!(url = %url, status = page.status, "unexpected status for legislature index");
        errors.record(
            ErrorScope::Discovery,
            &url,
            format!("HTTP {} fetching index page", page.status),
        );
        return BTreeSet::new();
    }

    let periods = extract_periods(&page.body);
    if periods.is_empty() {
        warn!(url = %url, legislature, "index page lists no archive periods; markup may have changed");
    } else {
        info!(legislature, periods = periods.len(), "discovered archive periods");
    }
    periods
}

/// Extracts confirmed periods from index page markup.
#[must_use]
pub fn extract_periods(html: &str) -> BTreeSet<Period> {
    let document = Html::parse_document(html);
    let mut periods = BTreeSet::new();

    if let Some(links) = parse_selector("a[href]") {
        for link in document.select(&links) {
            if is_disabled(link) {
                continue;
            }
            if let Some(period) = link.value().attr("href").and_then(period_from_href) {
                periods.insert(period);
            }
        }
    }

    if let Some(tagged) = parse_selector("[data-annomese]") {
        for element in document.select(&tagged) {
            if is_disabled(element) {
                continue;
            }
            if let Some(period) = element
                .value()
                .attr("data-annomese")
                .and_then(period_from_annomese)
            {
                periods.insert(period);
            }
        }
    }

    if let (Some(years), Some(months)) = (parse_selector("[data-anno]"), parse_selector("[data-mese]"))
    {
        for year_block in document.select(&years) {
            let Some(year) = year_block
                .value()
                .attr("data-anno")
                .and_then(|raw| raw.trim().parse::<i32>().ok())
            else {
                continue;
            };
            for control in year_block.select(&months) {
                if is_disabled(control) || !belongs_to(control, year_block) {
                    continue;
                }
                if let Some(period) = control
                    .value()
                    .attr("data-mese")
                    .and_then(|raw| raw.trim().parse::<u32>().ok())
                    .and_then(|month| Period::checked(year, month))
                {
                    periods.insert(period);
                }
            }
        }
    }

    debug!(count = periods.len(), "extracted periods from index page");
    periods
}

fn period_from_href(href: &str) -> Option<Period> {
    let captures = ANNOMESE_PATTERN.captures(href)?;
    let year = captures.get(1)?.as_str().parse().ok()?;
    let month = captures.get(2)?.as_str().parse().ok()?;
    Period::checked(year, month)
}

fn period_from_annomese(raw: &str) -> Option<Period> {
    let raw = raw.trim();
    if raw.len() != 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = raw[..4].parse().ok()?;
    let month = raw[4..].parse().ok()?;
    Period::checked(year, month)
}

/// True when the control is greyed out rather than selectable.
fn is_disabled(element: ElementRef<'_>) -> bool {
    let value = element.value();
    value.attr("disabled").is_some()
        || value
            .attr("aria-disabled")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        || value
            .classes()
            .any(|class| class.eq_ignore_ascii_case("disabled") || class.eq_ignore_ascii_case("inactive"))
}

/// True when `control`'s nearest `data-anno` ancestor is `year_block`, so a
/// month nested in an inner year block is not claimed by the outer one.
fn belongs_to(control: ElementRef<'_>, year_block: ElementRef<'_>) -> bool {
    control
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().attr("data-anno").is_some())
        .is_some_and(|nearest| nearest.id() == year_block.id())
}

pub(crate) fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!(selector = css, error = %e, "invalid CSS selector");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const YEAR_BLOCK_FIXTURE: &str = r#"
        <html><body>
          <div class="calendario">
            <div class="anno" data-anno="2022">
              <h3>2022</h3>
              <a data-mese="1" class="mese disabled">gennaio</a>
              <a data-mese="3" class="mese" href="/leg19/210?commissione=21&amp;annomese=202203&amp;view=f">marzo</a>
              <span data-mese="5" aria-disabled="true">maggio</span>
              <a data-mese="7" class="mese" href="?commissione=21&amp;annomese=202207">luglio</a>
              <button data-mese="9" disabled>settembre</button>
            </div>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_only_confirmed_months_are_returned() {
        let periods = extract_periods(YEAR_BLOCK_FIXTURE);
        let expected: BTreeSet<Period> = [Period::new(2022, 3), Period::new(2022, 7)]
            .into_iter()
            .collect();
        assert_eq!(periods, expected);
    }

    #[test]
    fn test_month_controls_without_links() {
        let html = r#"
            <div data-anno="2021"><li data-mese="11">nov</li><li data-mese="12">dic</li></div>
            <div data-anno="2023"><li data-mese="2">feb</li><li data-mese="13">??</li></div>
        "#;
        let periods: Vec<Period> = extract_periods(html).into_iter().collect();
        assert_eq!(
            periods,
            vec![
                Period::new(2021, 11),
                Period::new(2021, 12),
                Period::new(2023, 2)
            ]
        );
    }

    #[test]
    fn test_links_and_data_attributes_are_deduplicated() {
        let html = r#"
            <a href="/leg19/210?annomese=202306&view=f">giugno</a>
            <a href="/leg19/210?view=f&annomese=202306">giugno (bis)</a>
            <option data-annomese="202306">giugno</option>
            <option data-annomese="202401">gennaio</option>
        "#;
        let periods: Vec<Period> = extract_periods(html).into_iter().collect();
        assert_eq!(periods, vec![Period::new(2023, 6), Period::new(2024, 1)]);
    }

    #[test]
    fn test_year_without_months_yields_nothing() {
        let html = r#"<div data-anno="2020"><h3>2020</h3></div><a href="/leg19/210?anno=2020">2020</a>"#;
        assert!(extract_periods(html).is_empty());
    }

    #[test]
    fn test_malformed_values_are_ignored() {
        let html = r#"
            <a href="?annomese=202200">zero</a>
            <a href="?annomese=2022071">too long</a>
            <a href="?xannomese=202207">wrong param</a>
            <div data-anno="abcd"><a data-mese="4">apr</a></div>
            <span data-annomese="2022-07">dash</span>
        "#;
        assert!(extract_periods(html).is_empty());
    }

    #[test]
    fn test_nested_year_blocks_do_not_leak_months() {
        let html = r#"
            <div data-anno="2022">
              <a data-mese="1">gen</a>
              <div data-anno="2023"><a data-mese="2">feb</a></div>
            </div>
        "#;
        let periods: Vec<Period> = extract_periods(html).into_iter().collect();
        assert_eq!(periods, vec![Period::new(2022, 1), Period::new(2023, 2)]);
    }

    #[test]
    fn test_period_ordering_and_formatting() {
        assert!(Period::new(2021, 12) < Period::new(2022, 1));
        assert_eq!(Period::new(2023, 6).annomese(), "202306");
        assert_eq!(Period::new(2023, 6).to_string(), "2023-06");
        assert!(Period::checked(2023, 0).is_none());
        assert!(Period::checked(2023, 13).is_none());
    }
}
