use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::domain::Clock;

/// OS-backed clock. The first reading establishes the whole-second zero
/// reference and returns only the sub-second microseconds, so the first
/// value a caller sees may be non-zero. A last-value clamp keeps the
/// reading monotonic even if the system clock steps backward.
#[derive(Debug, Default)]
pub struct SystemClock {
    base_secs: OnceLock<u64>,
    last: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let base = *self.base_secs.get_or_init(|| now.as_secs());
        let raw =
            now.as_secs().saturating_sub(base) * 1_000_000 + u64::from(now.subsec_micros());
        let prev = self.last.fetch_max(raw, Ordering::AcqRel);
        raw.max(prev)
    }

    fn delay_micros(&self, micros: u64) {
        std::thread::sleep(Duration::from_micros(micros));
    }
}
