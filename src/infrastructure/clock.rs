use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock in Unix milliseconds, shared by samples and session events
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
