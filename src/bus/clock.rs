use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Millisecond time source handed to the sensor-driver core.
pub trait Clock {
    /// Current time in milliseconds, truncated to 32 bits
    fn millis(&self) -> u32;
}

/// Wall-clock anchored millisecond counter.
///
/// The epoch offset is sampled once; later readings advance with the
/// monotonic clock so they never step backwards when the system time is
/// adjusted. Readings wrap after ~49.7 days.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin_ms: u64,
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        let origin_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            origin_ms,
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn millis(&self) -> u32 {
        let elapsed = self.start.elapsed().as_millis() as u64;
        self.origin_ms.wrapping_add(elapsed) as u32
    }
}

/// Milliseconds from `since` to `now`, correct across a single wraparound.
pub fn elapsed_ms(since: u32, now: u32) -> u32 {
    now.wrapping_sub(since)
}
