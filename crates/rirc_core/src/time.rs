//! Wall-clock seconds. Liveness and reconnect timers are evaluated against wall time, with no
//! assumption of monotonicity beyond seconds granularity -- so this exposes seconds-since-epoch
//! rather than `Instant`, and the engine takes `now` as an explicit parameter (see
//! [`crate::engine::Engine::tick`]) so tests can drive the clock deterministically instead of
//! sleeping for real.

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
