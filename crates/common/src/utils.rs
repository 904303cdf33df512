//! Small shared utilities.

/// Current unix time in seconds.
pub fn timestamp_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
