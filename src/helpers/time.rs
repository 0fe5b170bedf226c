use chrono::{DateTime, Utc};
use std::time::SystemTime;

/// Nanoseconds since the Unix epoch, the resolution used for event origins
pub fn now_epoch_nanos() -> i64 {
    let now: DateTime<Utc> = SystemTime::now().into();
    now.timestamp_nanos_opt().unwrap_or(i64::MAX)
}
