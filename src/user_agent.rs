//! User-Agent string shared by page and document requests.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/camera-pdfs";

/// Default User-Agent (identifies the tool and its version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("camera-pdfs/{version} (public-records-archiver; +{PROJECT_UA_URL})")
}
