//! Edge-triggered button classifier.
//!
//! The GPIO edge interrupt feeds raw press/release events in; the main loop
//! polls once per pass to batch finished clicks into the register map. Two
//! windows are involved: a per-press debounce-and-classify step on release,
//! and an inter-click spacing window that holds the batch open so a double
//! or triple click reaches the host as one count, not as separate events.
//! All state is atomic, in the style of a shared input block that both the
//! interrupt and the loop may touch.

use portable_atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};

use crate::regs::{RegisterFile, REG_BUTTONS};
use crate::types::{Button, STATUS_CLICK, STATUS_IRQ};

/// Minimum trusted press duration, ms
pub const DEBOUNCE_MS: u16 = 25;

/// Result of one classifier poll
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonPoll {
    /// Nothing to report
    Idle,
    /// A finished click burst was copied into the register map
    ClicksTransferred,
    /// The power button has been held past the hold threshold
    HardHold,
}

pub struct ButtonInput {
    /// Press start per button, ms timestamp, 0 = not pressed
    started: [AtomicU32; 2],
    /// Pending click counts, [button][short, long]
    clicks: [[AtomicU8; 2]; 2],
    /// Timestamp of the last classified release, 0 = none pending
    last_release: AtomicU32,
    short_ms: AtomicU16,
    space_ms: AtomicU16,
    hold_ms: AtomicU32,
}

impl ButtonInput {
    pub const fn new() -> Self {
        const Z8: AtomicU8 = AtomicU8::new(0);
        const Z32: AtomicU32 = AtomicU32::new(0);
        Self {
            started: [Z32; 2],
            clicks: [[Z8; 2], [Z8; 2]],
            last_release: AtomicU32::new(0),
            short_ms: AtomicU16::new(200),
            space_ms: AtomicU16::new(1200),
            hold_ms: AtomicU32::new(8000),
        }
    }

    /// Record a level change. Interrupt context only.
    ///
    /// `pressed` is the debounced-by-hardware line level: true on the
    /// falling (press) edge, false on the rising (release) edge.
    pub fn edge(&self, button: Button, pressed: bool, now_ms: u32) {
        let i = button.index();
        if pressed {
            if self.started[i].load(Ordering::Relaxed) == 0 {
                // 0 means "not pressed", so never record a press at 0
                self.started[i].store(now_ms.max(1), Ordering::Relaxed);
            }
        } else {
            let started = self.started[i].swap(0, Ordering::Relaxed);
            if started == 0 {
                return;
            }
            let duration = now_ms.wrapping_sub(started);
            if duration > DEBOUNCE_MS as u32 {
                let kind = if duration <= self.short_ms.load(Ordering::Relaxed) as u32 {
                    crate::types::CLICK_SHORT
                } else {
                    crate::types::CLICK_LONG
                };
                self.clicks[i][kind].fetch_add(1, Ordering::Relaxed);
                self.last_release.store(now_ms.max(1), Ordering::Relaxed);
            }
        }
    }

    /// Transfer step, called once per main-loop pass, never from interrupt
    /// context. `pwr_held` is the live level of the power button line.
    pub fn poll(&self, regs: &RegisterFile, now_ms: u32, pwr_held: bool) -> ButtonPoll {
        let last = self.last_release.load(Ordering::Relaxed);
        if last != 0 && now_ms.wrapping_sub(last) >= self.space_ms.load(Ordering::Relaxed) as u32 {
            for i in 0..2 {
                for k in 0..2 {
                    let n = self.clicks[i][k].swap(0, Ordering::Relaxed);
                    regs.store(REG_BUTTONS + i * 2 + k, n);
                }
            }
            self.last_release.store(0, Ordering::Relaxed);
            regs.set_status(STATUS_CLICK);
            return ButtonPoll::ClicksTransferred;
        }

        let started = self.started[Button::Pwr.index()].load(Ordering::Relaxed);
        if started != 0
            && pwr_held
            && now_ms.wrapping_sub(started) >= self.hold_ms.load(Ordering::Relaxed)
        {
            return ButtonPoll::HardHold;
        }

        ButtonPoll::Idle
    }

    /// Apply click timing configuration. The short-click ceiling is forced
    /// to at least twice the debounce so a debounced press can still
    /// classify as short. Returns the applied short time.
    pub fn set_timings(&self, short_ms: u16, space_ms: u16, hold_s: u8) -> u16 {
        let short = short_ms.max(2 * DEBOUNCE_MS);
        self.short_ms.store(short, Ordering::Relaxed);
        self.space_ms.store(space_ms, Ordering::Relaxed);
        self.hold_ms.store(hold_s as u32 * 1000, Ordering::Relaxed);
        short
    }

    /// Drop all pending presses and counts (state-machine transitions)
    pub fn reset(&self) {
        for i in 0..2 {
            self.started[i].store(0, Ordering::Relaxed);
            for k in 0..2 {
                self.clicks[i][k].store(0, Ordering::Relaxed);
            }
        }
        self.last_release.store(0, Ordering::Relaxed);
    }

    /// Pending (not yet transferred) click count, for tests
    pub fn pending(&self, button: Button, kind: usize) -> u8 {
        self.clicks[button.index()][kind].load(Ordering::Relaxed)
    }
}

impl Default for ButtonInput {
    fn default() -> Self {
        Self::new()
    }
}

/// Rising edge on the host request line: flag an interrupt for the host to
/// observe. Not part of the click logic.
pub fn request_signal(regs: &RegisterFile) {
    regs.set_status(STATUS_IRQ);
}
