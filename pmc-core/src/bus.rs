//! Register-exchange engine for the I2C peripheral interface.
//!
//! The hardware driver translates controller traffic into [`BusEvent`]s and
//! feeds them to [`BusEngine::handle`] from interrupt context. The engine
//! keeps the framing rule small: the first data byte after an address match
//! sets the register cursor, every later byte in the same transaction is a
//! register write, and every read clocks out the byte under the cursor. The
//! cursor auto-increments on both directions.
//!
//! Out-of-range cursors are clamped rather than faulted so a confused host
//! can never read or write outside the map: writes land in the RW window
//! and reads wrap to offset 0 (the auth byte is never readable).

use portable_atomic::{AtomicU32, AtomicU8, Ordering};

use crate::regs::{RegisterFile, FIRST_WREG, LAST_REG, REG_CMD_AUTH};

/// One bus-level event, as reported by the peripheral driver
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent {
    /// Our address matched, a transaction is opening
    Match,
    /// One data byte received from the controller
    Write(u8),
    /// The controller is clocking a byte out of us
    Read,
    /// Stop condition, transaction closed
    Stop,
    /// Controller NACKed our data, read transfer over
    Nack,
    /// Hardware error flags from the peripheral (bus error, overrun, ...)
    Error(u8),
}

/// Protocol position within a transaction
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum BusState {
    Idle = 0,
    /// Address matched, next write byte is the register cursor
    AddressMatched = 1,
    /// Cursor set, data bytes flow
    InTransaction = 2,
}

pub struct BusEngine {
    cursor: AtomicU8,
    state: AtomicU8,
    /// Latched error flags, consumed by the main loop
    last_error: AtomicU8,
    /// Millisecond timestamp of the last address match
    last_match_ms: AtomicU32,
}

impl BusEngine {
    pub const fn new() -> Self {
        Self {
            cursor: AtomicU8::new(0),
            state: AtomicU8::new(BusState::Idle as u8),
            last_error: AtomicU8::new(0),
            last_match_ms: AtomicU32::new(0),
        }
    }

    fn state(&self) -> BusState {
        match self.state.load(Ordering::Relaxed) {
            1 => BusState::AddressMatched,
            2 => BusState::InTransaction,
            _ => BusState::Idle,
        }
    }

    fn set_state(&self, s: BusState) {
        self.state.store(s as u8, Ordering::Relaxed);
    }

    /// Process one bus event. Interrupt context only.
    ///
    /// Returns the byte to clock out for a `Read` event, `None` otherwise.
    pub fn handle(&self, event: BusEvent, regs: &RegisterFile, now_ms: u32) -> Option<u8> {
        match event {
            BusEvent::Match => {
                self.set_state(BusState::AddressMatched);
                self.last_match_ms.store(now_ms, Ordering::Relaxed);
                None
            }
            BusEvent::Write(byte) => {
                if self.state() == BusState::AddressMatched {
                    self.cursor.store(byte, Ordering::Relaxed);
                    self.set_state(BusState::InTransaction);
                } else {
                    let offset = self.cursor.load(Ordering::Relaxed) as usize;
                    let offset = if (FIRST_WREG..=REG_CMD_AUTH).contains(&offset) {
                        offset
                    } else {
                        FIRST_WREG
                    };
                    regs.store(offset, byte);
                    self.cursor.store(offset as u8 + 1, Ordering::Relaxed);
                }
                None
            }
            BusEvent::Read => {
                let offset = self.cursor.load(Ordering::Relaxed) as usize;
                let offset = if offset <= LAST_REG { offset } else { 0 };
                let byte = regs.load(offset);
                self.cursor.store(offset as u8 + 1, Ordering::Relaxed);
                self.set_state(BusState::InTransaction);
                Some(byte)
            }
            BusEvent::Stop | BusEvent::Nack => {
                self.set_state(BusState::Idle);
                None
            }
            BusEvent::Error(flags) => {
                self.last_error.store(flags.max(1), Ordering::Relaxed);
                self.set_state(BusState::Idle);
                None
            }
        }
    }

    /// True while an address match is open and no stop has been seen
    pub fn in_transaction(&self) -> bool {
        self.state() != BusState::Idle
    }

    /// Consume the latched error flags, if any
    pub fn take_error(&self) -> Option<u8> {
        match self.last_error.swap(0, Ordering::Relaxed) {
            0 => None,
            flags => Some(flags),
        }
    }

    /// Timestamp of the most recent address match
    pub fn last_activity_ms(&self) -> u32 {
        self.last_match_ms.load(Ordering::Relaxed)
    }

    /// Refresh the activity timestamp without bus traffic (state changes,
    /// recovery) so stall detection restarts from now.
    pub fn touch(&self, now_ms: u32) {
        self.last_match_ms.store(now_ms, Ordering::Relaxed);
    }

    /// Drop transaction state, for error recovery alongside a peripheral
    /// re-init. Does not clear latched errors.
    pub fn reset(&self) {
        self.set_state(BusState::Idle);
        self.cursor.store(0, Ordering::Relaxed);
    }
}

impl Default for BusEngine {
    fn default() -> Self {
        Self::new()
    }
}
