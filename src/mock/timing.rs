use std::cell::Cell;

use embedded_hal::delay::DelayNs;

use crate::bus::Clock;

/// Delay that records requested durations instead of sleeping.
#[derive(Debug, Default, Clone)]
pub struct RecordingDelay {
    calls_us: Vec<u32>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requested delays in microseconds, oldest first
    pub fn calls_us(&self) -> &[u32] {
        &self.calls_us
    }

    pub fn total_us(&self) -> u64 {
        self.calls_us.iter().map(|&us| us as u64).sum()
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls_us.push(ns.div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.calls_us.push(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.calls_us.push(ms.saturating_mul(1_000));
    }
}

/// Manually advanced millisecond clock.
#[derive(Debug, Default)]
pub struct FakeClock {
    now: Cell<u32>,
}

impl FakeClock {
    pub fn new(start_ms: u32) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for FakeClock {
    fn millis(&self) -> u32 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::elapsed_ms;

    #[test]
    fn delay_records_in_microseconds() {
        let mut delay = RecordingDelay::new();
        delay.delay_us(150);
        delay.delay_ms(2);
        delay.delay_ns(1_001);
        assert_eq!(delay.calls_us(), &[150, 2_000, 2]);
        assert_eq!(delay.total_us(), 2_152);
    }

    #[test]
    fn clock_wraps_like_the_hardware_counter() {
        let clock = FakeClock::new(u32::MAX - 1);
        let start = clock.millis();
        clock.advance(3);
        assert_eq!(clock.millis(), 1);
        assert_eq!(elapsed_ms(start, clock.millis()), 3);
    }
}
