use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds elapsed since the Unix epoch. Expirations and timer deadlines are both absolute
/// timestamps on this clock.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
