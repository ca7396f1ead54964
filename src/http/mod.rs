//! HTTP client module with status classification.

mod client;
mod status;

pub use client::{DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT_SECS, HttpClient};
pub use status::{HttpFailure, check_status, classify_status};
