//! Monotonic timebase advanced by the 1 ms hardware tick.
//!
//! One periodic interrupt feeds every counter in the system: milliseconds,
//! seconds, the tachometer window, the high-level watchdog ticks and the
//! autowake minute counter. Everything is an atomic so the tick handler and
//! the main loop can touch it without a critical section.

use portable_atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU8, Ordering};

pub struct Timebase {
    millis: AtomicU32,
    seconds: AtomicU32,
    tach_pulses: AtomicU16,
    tach_window: AtomicU16,
    tach_ready: AtomicBool,
    wdg_ticks: AtomicU8,
    wake_minutes: AtomicU16,
}

impl Timebase {
    pub const fn new() -> Self {
        Self {
            millis: AtomicU32::new(0),
            seconds: AtomicU32::new(0),
            tach_pulses: AtomicU16::new(0),
            tach_window: AtomicU16::new(0),
            tach_ready: AtomicBool::new(false),
            wdg_ticks: AtomicU8::new(0),
            wake_minutes: AtomicU16::new(0),
        }
    }

    /// Advance by one millisecond. Interrupt context only.
    pub fn tick_1ms(&self) {
        let ms = self.millis.fetch_add(1, Ordering::Relaxed) + 1;
        if ms % 1000 == 0 {
            let s = self.seconds.fetch_add(1, Ordering::Relaxed) + 1;
            let ticks = self.wdg_ticks.load(Ordering::Relaxed);
            self.wdg_ticks
                .store(ticks.saturating_add(1), Ordering::Relaxed);
            let pulses = self.tach_pulses.swap(0, Ordering::Relaxed);
            if pulses > 0 {
                self.tach_window.store(pulses, Ordering::Relaxed);
                self.tach_ready.store(true, Ordering::Relaxed);
            }
            if s % 60 == 0 {
                self.wake_minutes.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Count one tachometer pulse. Interrupt context only.
    pub fn tach_pulse(&self) {
        self.tach_pulses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn now_ms(&self) -> u32 {
        self.millis.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn now_s(&self) -> u32 {
        self.seconds.load(Ordering::Relaxed)
    }

    /// Pulses counted in the last completed one-second window, if a window
    /// closed since the previous call.
    pub fn take_tach_window(&self) -> Option<u16> {
        if self.tach_ready.swap(false, Ordering::Relaxed) {
            Some(self.tach_window.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    /// Reset the watchdog tick counter (FEED command, or arming)
    pub fn feed_watchdog(&self) {
        self.wdg_ticks.store(0, Ordering::Relaxed);
    }

    /// True when the configured limit is nonzero and exceeded
    pub fn watchdog_expired(&self, limit_s: u8) -> bool {
        limit_s > 0 && self.wdg_ticks.load(Ordering::Relaxed) > limit_s
    }

    /// Minutes elapsed since the wake counter was last restarted
    pub fn wake_minutes(&self) -> u16 {
        self.wake_minutes.load(Ordering::Relaxed)
    }

    /// Restart the autowake minute counter (entering OFF, or enabling wake)
    pub fn restart_wake(&self) {
        self.wake_minutes.store(0, Ordering::Relaxed);
    }

    /// Advance the timebase by a whole number of milliseconds (tests)
    #[cfg(any(test, feature = "std"))]
    pub fn advance_ms(&self, ms: u32) {
        for _ in 0..ms {
            self.tick_1ms();
        }
    }
}

impl Default for Timebase {
    fn default() -> Self {
        Self::new()
    }
}
