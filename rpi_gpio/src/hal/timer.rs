//! Timer Hardware Abstraction Layer.
//!
//! This module defines the microsecond clock the drivers use for settle
//! delays and for bounded polling of hardware status bits.

use core::ops::ControlFlow;
use core::time::Duration;
use std::time::Instant;

/// Free-running microsecond counter with blocking delays.
pub trait CountingTimer {
    /// Read the current timer counter value in microseconds.
    ///
    /// This is a free-running counter that increments continuously.
    fn now_us(&self) -> u64;

    /// Busy-wait delay for the specified number of microseconds.
    ///
    /// This blocks the CPU and should only be used for short delays.
    fn delay_us(&self, us: u32) {
        let start = self.now_us();
        let duration = us as u64;

        while self.now_us().wrapping_sub(start) < duration {
            core::hint::spin_loop();
        }
    }

    /// Call `step` until it breaks or `timeout` has elapsed.
    ///
    /// `step` returns how long to wait before it is called again. The wait
    /// is cut short at the deadline, and `step` always gets one last call
    /// after the final wait. Returns `true` if `step` broke out.
    fn poll_until<F>(&self, timeout: Duration, mut step: F) -> bool
    where
        F: FnMut() -> ControlFlow<(), Duration>,
    {
        let start = self.now_us();
        let limit = u64::try_from(timeout.as_micros()).unwrap_or(u64::MAX);

        loop {
            let wait = match step() {
                ControlFlow::Break(()) => return true,
                ControlFlow::Continue(wait) => wait,
            };

            let elapsed = self.now_us().wrapping_sub(start);
            if elapsed >= limit {
                return false;
            }

            let wait = u64::try_from(wait.as_micros())
                .unwrap_or(u64::MAX)
                .clamp(1, limit - elapsed);
            self.delay_us(u32::try_from(wait).unwrap_or(u32::MAX));
        }
    }
}

/// Waits at or above this length yield the thread instead of spinning.
const SLEEP_THRESHOLD_US: u32 = 100;

/// [`CountingTimer`] over the operating system's monotonic clock.
#[derive(Debug, Copy, Clone)]
pub struct MonotonicTimer {
    origin: Instant,
}

impl MonotonicTimer {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl CountingTimer for MonotonicTimer {
    fn now_us(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    fn delay_us(&self, us: u32) {
        if us >= SLEEP_THRESHOLD_US {
            std::thread::sleep(Duration::from_micros(us.into()));
            return;
        }

        let start = self.now_us();
        while self.now_us().wrapping_sub(start) < us as u64 {
            core::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    /// Counter that only advances when someone waits on it.
    struct FakeTimer {
        now: Cell<u64>,
    }

    impl CountingTimer for FakeTimer {
        fn now_us(&self) -> u64 {
            self.now.get()
        }

        fn delay_us(&self, us: u32) {
            self.now.set(self.now.get() + us as u64);
        }
    }

    #[test]
    fn poll_stops_as_soon_as_the_step_breaks() {
        let timer = FakeTimer { now: Cell::new(0) };
        let mut calls = 0;

        let done = timer.poll_until(Duration::from_millis(1), || {
            calls += 1;
            if calls == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(Duration::from_micros(10))
            }
        });

        assert!(done);
        assert_eq!(calls, 3);
        assert_eq!(timer.now_us(), 20);
    }

    #[test]
    fn poll_gives_up_at_the_deadline_after_one_last_check() {
        let timer = FakeTimer { now: Cell::new(0) };
        let mut calls = 0;

        let done = timer.poll_until(Duration::from_micros(25), || {
            calls += 1;
            ControlFlow::Continue(Duration::from_micros(10))
        });

        assert!(!done);
        // Waits of 10, 10 and a truncated 5, then the final check.
        assert_eq!(calls, 4);
        assert_eq!(timer.now_us(), 25);
    }

    #[test]
    fn monotonic_delay_waits_at_least_the_requested_time() {
        let timer = MonotonicTimer::new();
        let start = timer.now_us();
        timer.delay_us(250);
        assert!(timer.now_us() - start >= 250);
    }
}
