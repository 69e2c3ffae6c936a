use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local};

pub fn utc_ns_now() -> u64 {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    d.as_secs() * 1_000_000_000 + d.subsec_nanos() as u64
}

/// ISO-8601 local time with second precision, colons swapped for dashes so
/// the result is a valid file name everywhere.
pub fn clip_stem(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S").to_string()
}
