//! Constants for the transport layer (timeouts).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default overall request timeout (2 minutes; commission PDFs are small).
pub const READ_TIMEOUT_SECS: u64 = 120;
