//! Output path resolution.
//!
//! Layout: `<output_root>/leg<N>/<category>/<year>/<date>_<commission>_<stem>.pdf`.
//! Everything here is pure; directories are created by the download engine
//! right before writing.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

use crate::classify::Category;
use crate::scanner::DocumentLink;

/// `data20230629` style marker in camera.it file names.
#[allow(clippy::expect_used)]
static DATE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)data(\d{4})(\d{2})(\d{2})").expect("date marker regex is valid") // Static pattern, safe to panic
});

/// Date placeholder when a URL carries no usable date.
pub const UNKNOWN_DATE: &str = "unknown";

const MAX_SLUG_CHARS: usize = 80;
const HASH_STEM_CHARS: usize = 12;

/// Lowercase ASCII slug: alphanumerics kept, every other run becomes one `-`.
#[must_use]
pub fn slugify(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = true;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            prev_sep = false;
        } else if !prev_sep {
            out.push('-');
            prev_sep = true;
        }
    }
    let trimmed = out.trim_end_matches('-');
    let truncated: String = trimmed.chars().take(MAX_SLUG_CHARS).collect();
    truncated.trim_end_matches('-').to_string()
}

/// Document date from the `dataYYYYMMDD` marker, if it is a real calendar date.
#[must_use]
pub fn document_date(url: &str) -> Option<NaiveDate> {
    let name = file_name(url);
    let captures = DATE_MARKER.captures(&name)?;
    let year = captures.get(1)?.as_str().parse().ok()?;
    let month = captures.get(2)?.as_str().parse().ok()?;
    let day = captures.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Builds the destination path for one document.
///
/// The same inputs always give the same path. Distinct URLs on the same
/// date get distinct names through the file stem.
#[must_use]
pub fn resolve_destination(
    output_root: &Path,
    commission: u32,
    link: &DocumentLink,
    category: Category,
) -> PathBuf {
    let date = document_date(&link.url);
    let year = date.map_or(link.period.year, |d| d.year());
    let date_part = date.map_or_else(
        || UNKNOWN_DATE.to_string(),
        |d| d.format("%Y-%m-%d").to_string(),
    );

    let filename = format!(
        "{date_part}_{}_{}.pdf",
        slugify(&format!("commissione {commission}")),
        file_stem_slug(&link.url)
    );

    output_root
        .join(format!("leg{}", link.legislature))
        .join(category.dir_name())
        .join(year.to_string())
        .join(filename)
}

/// `destination` with the URL hash appended to its stem, for a document whose
/// natural path is already taken by a different URL.
#[must_use]
pub fn disambiguate(destination: &Path, url: &str) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!("{stem}-{}.pdf", url_hash(url)))
}

/// Slug of the URL's file stem. A short URL hash replaces an empty stem and
/// is appended when the URL has a query.
fn file_stem_slug(url: &str) -> String {
    let name = file_name(url);
    let stem = match name.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("pdf") => stem,
        _ => name.as_str(),
    };
    let slug = slugify(stem);
    if slug.is_empty() {
        url_hash(url)
    } else if has_query(url) {
        format!("{slug}-{}", url_hash(url))
    } else {
        slug
    }
}

fn url_hash(url: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    digest[..HASH_STEM_CHARS].to_string()
}

fn has_query(url: &str) -> bool {
    Url::parse(url).map_or_else(
        |_| url.contains('?'),
        |parsed| parsed.query().is_some_and(|q| !q.is_empty()),
    )
}

/// Last non-empty path segment, percent-decoded.
fn file_name(url: &str) -> String {
    let path = Url::parse(url).map_or_else(
        |_| {
            url.split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string()
        },
        |parsed| parsed.path().to_string(),
    );
    let segment = path
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default();
    urlencoding::decode(segment).map_or_else(|_| segment.to_string(), |s| s.into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::discovery::Period;

    fn link(url: &str) -> DocumentLink {
        DocumentLink {
            url: url.to_string(),
            label: "Scarica PDF".to_string(),
            description: None,
            period: Period::new(2023, 6),
            legislature: 19,
        }
    }

    const BULLETIN: &str = "https://documenti.camera.it/leg19/resoconti/commissioni/bollettini/pdf/2023/06/29/leg.19.bol0136.data20230629.com21.pdf";

    #[test]
    fn test_layout_and_filename() {
        let path = resolve_destination(Path::new("pdfs"), 21, &link(BULLETIN), Category::Bollettini);
        assert_eq!(
            path,
            PathBuf::from(
                "pdfs/leg19/bollettini/2023/2023-06-29_commissione-21_leg-19-bol0136-data20230629-com21.pdf"
            )
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let first = resolve_destination(Path::new("/out"), 21, &link(BULLETIN), Category::Bollettini);
        let second = resolve_destination(Path::new("/out"), 21, &link(BULLETIN), Category::Bollettini);
        assert_eq!(first.to_string_lossy(), second.to_string_lossy());
    }

    #[test]
    fn test_same_date_different_documents_do_not_collide() {
        let a = link("https://documenti.camera.it/x/leg.19.stencomm.data20230627.U1.com21.0001.pdf");
        let b = link("https://documenti.camera.it/x/leg.19.stencomm.data20230627.U1.com21.0002.pdf");
        let root = Path::new("pdfs");
        assert_ne!(
            resolve_destination(root, 21, &a, Category::Stenografici),
            resolve_destination(root, 21, &b, Category::Stenografici)
        );
    }

    #[test]
    fn test_missing_date_falls_back_to_period_year() {
        let path = resolve_destination(
            Path::new("pdfs"),
            21,
            &link("https://www.camera.it/allegati/Relazione%20annuale.pdf"),
            Category::Other,
        );
        assert_eq!(
            path,
            PathBuf::from("pdfs/leg19/other/2023/unknown_commissione-21_relazione-annuale.pdf")
        );
    }

    #[test]
    fn test_date_year_wins_over_period_year() {
        let mut doc = link("https://documenti.camera.it/x/leg.19.bol0001.data20221230.com21.pdf");
        doc.period = Period::new(2023, 1);
        let path = resolve_destination(Path::new("pdfs"), 21, &doc, Category::Bollettini);
        assert!(path.starts_with("pdfs/leg19/bollettini/2022"));
    }

    #[test]
    fn test_query_and_empty_stem_use_url_hash() {
        let a = resolve_destination(Path::new("p"), 21, &link("https://www.camera.it/pdf?id=1"), Category::Other);
        let b = resolve_destination(Path::new("p"), 21, &link("https://www.camera.it/pdf?id=2"), Category::Other);
        assert_ne!(a, b);
        assert!(a.to_string_lossy().contains("unknown_commissione-21_pdf-"));

        let c = resolve_destination(Path::new("p"), 21, &link("https://www.camera.it/"), Category::Other);
        let name = c.file_name().unwrap().to_string_lossy().into_owned();
        let hash = name.trim_start_matches("unknown_commissione-21_").trim_end_matches(".pdf");
        assert_eq!(hash.len(), HASH_STEM_CHARS);
        assert!(hash.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_invalid_calendar_date_is_unknown() {
        assert!(document_date("https://x.example/leg.19.bol.data20230231.pdf").is_none());
        assert_eq!(
            document_date("https://x.example/leg.19.bol.data20230630.pdf"),
            NaiveDate::from_ymd_opt(2023, 6, 30)
        );
    }

    #[test]
    fn test_disambiguate_appends_url_hash() {
        let first = "https://documenti.camera.it/a/allegato.pdf";
        let second = "https://documenti.camera.it/b/allegato.pdf";
        let base = resolve_destination(Path::new("pdfs"), 21, &link(second), Category::Other);
        assert_eq!(
            base,
            resolve_destination(Path::new("pdfs"), 21, &link(first), Category::Other)
        );

        let moved = disambiguate(&base, second);
        assert_eq!(moved.parent(), base.parent());
        assert_eq!(
            moved.file_name().unwrap().to_str().unwrap(),
            format!("unknown_commissione-21_allegato-{}.pdf", url_hash(second))
        );
        assert_ne!(moved, disambiguate(&base, first));
        assert_eq!(moved, disambiguate(&base, second));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Commissione 21"), "commissione-21");
        assert_eq!(slugify("  --Già__vista!! "), "gi-vista");
        assert_eq!(slugify("../../etc/passwd"), "etc-passwd");
        assert_eq!(slugify(""), "");
        assert!(slugify(&"a".repeat(200)).len() <= MAX_SLUG_CHARS);
    }
}
