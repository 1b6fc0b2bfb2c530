//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current UTC time in whole seconds since the epoch.
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
