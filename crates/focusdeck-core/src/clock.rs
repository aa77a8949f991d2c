//! Wall-clock access.
//!
//! Both engines do their arithmetic on epoch milliseconds. Public engine
//! methods call [`now_ms`] and delegate to `*_at(now)` variants, which tests
//! (and deterministic replays) drive with explicit timestamps.

/// Current wall-clock time as milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
