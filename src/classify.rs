//! Document categorisation from URL markers.
//!
//! The site encodes the document type in path segments, in the PDF file
//! name, and occasionally in a `tipo` query parameter. A [`Classifier`] holds
//! an ordered table of [`ClassifierRule`]s; the first rule whose marker
//! matches decides the [`Category`], and a URL nothing matches is
//! [`Category::Other`]. The table is plain data so it can be replaced from the
//! config file when the site changes its naming.

use std::fmt;

use serde::Deserialize;
use url::Url;

/// Document category, also the directory name under `leg<N>/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Verbatim transcript (`resoconto stenografico`).
    Stenografici,
    /// Summary bulletin (`bollettino`).
    Bollettini,
    /// Anything the rule table does not recognise.
    Other,
}

impl Category {
    /// Directory name used in the output layout.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Stenografici => "stenografici",
            Self::Bollettini => "bollettini",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A URL feature a rule looks for. Comparisons are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Marker {
    /// A path segment equal to `value`.
    PathSegment {
        /// Segment text.
        value: String,
    },
    /// The last path segment (the file name) contains `value`.
    FilenameContains {
        /// Substring to look for.
        value: String,
    },
    /// A query parameter named `name`, optionally with a specific value.
    QueryParam {
        /// Parameter name.
        name: String,
        /// Required value; any value matches when absent.
        #[serde(default)]
        value: Option<String>,
    },
}

impl Marker {
    fn matches(&self, parts: &UrlParts) -> bool {
        match self {
            Self::PathSegment { value } => {
                let value = value.to_lowercase();
                parts.segments.iter().any(|segment| *segment == value)
            }
            Self::FilenameContains { value } => parts.filename.contains(&value.to_lowercase()),
            Self::QueryParam { name, value } => {
                let name = name.to_lowercase();
                let value = value.as_ref().map(|v| v.to_lowercase());
                parts.query.iter().any(|(key, found)| {
                    *key == name && value.as_ref().is_none_or(|wanted| wanted == found)
                })
            }
        }
    }
}

/// One row of the rule table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClassifierRule {
    /// What to look for.
    pub marker: Marker,
    /// Category assigned when the marker matches.
    pub category: Category,
}

impl ClassifierRule {
    /// Convenience constructor.
    #[must_use]
    pub fn new(marker: Marker, category: Category) -> Self {
        Self { marker, category }
    }
}

/// Ordered rule table, evaluated top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    rules: Vec<ClassifierRule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl Classifier {
    /// Builds a classifier from an explicit rule table.
    #[must_use]
    pub fn new(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    /// The rule table in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// Maps a document URL to its category. Never fails.
    #[must_use]
    pub fn classify(&self, url: &str) -> Category {
        let parts = UrlParts::from_url(url);
        self.rules
            .iter()
            .find(|rule| rule.marker.matches(&parts))
            .map_or(Category::Other, |rule| rule.category)
    }
}

/// Rules matching the URLs camera.it publishes today, e.g.
/// `.../resoconti/commissioni/bollettini/pdf/2023/06/29/leg.19.bol0136.data20230629.com21.pdf`.
#[must_use]
pub fn default_rules() -> Vec<ClassifierRule> {
    let segment = |value: &str| Marker::PathSegment {
        value: value.to_string(),
    };
    let filename = |value: &str| Marker::FilenameContains {
        value: value.to_string(),
    };
    let tipo = |value: &str| Marker::QueryParam {
        name: "tipo".to_string(),
        value: Some(value.to_string()),
    };

    vec![
        ClassifierRule::new(segment("stenografici"), Category::Stenografici),
        ClassifierRule::new(filename("stencomm"), Category::Stenografici),
        ClassifierRule::new(tipo("stenografico"), Category::Stenografici),
        ClassifierRule::new(segment("bollettini"), Category::Bollettini),
        ClassifierRule::new(filename(".bol"), Category::Bollettini),
        ClassifierRule::new(tipo("bollettino"), Category::Bollettini),
    ]
}

/// Lowercased pieces of a URL the markers inspect.
struct UrlParts {
    segments: Vec<String>,
    filename: String,
    query: Vec<(String, String)>,
}

impl UrlParts {
    fn from_url(raw: &str) -> Self {
        let (path, query) = match Url::parse(raw) {
            Ok(parsed) => (
                parsed.path().to_string(),
                parsed.query().unwrap_or_default().to_string(),
            ),
            // Relative or malformed input: split by hand so classification stays total.
            Err(_) => {
                let without_fragment = raw.split('#').next().unwrap_or_default();
                match without_fragment.split_once('?') {
                    Some((path, query)) => (path.to_string(), query.to_string()),
                    None => (without_fragment.to_string(), String::new()),
                }
            }
        };

        let segments: Vec<String> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                urlencoding::decode(segment)
                    .map_or_else(|_| segment.to_lowercase(), |s| s.to_lowercase())
            })
            .collect();
        let filename = segments.last().cloned().unwrap_or_default();
        let query = url::form_urlencoded::parse(query.as_bytes())
            .map(|(key, value)| (key.to_lowercase(), value.to_lowercase()))
            .collect();

        Self {
            segments,
            filename,
            query,
        }
    }
}
