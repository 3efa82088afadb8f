//! The register map shared between the bus interrupt context and the main
//! loop.
//!
//! The map is a flat byte array of atomics so that both contexts can poke
//! single bytes without locking. Multi-byte fields are big-endian on the
//! wire and may tear when read by the host mid-update; the host is expected
//! to re-read suspicious values.

use portable_atomic::{AtomicU8, Ordering};

use crate::crc::compute_crc8;
use crate::types::{PmcConfig, STATUS_FIXED, FLAG_FIXED};
use crate::{Command, DEVICE_MAGIC, FW_VERSION};

// Read-only telemetry section
pub const REG_ID: usize = 0;
pub const REG_VERSION: usize = 1;
pub const REG_STATUS: usize = 2;
pub const REG_FLAGS: usize = 3;
pub const REG_CONFIG_CRC: usize = 4;
/// 2x2 click-count matrix: [PWR][short,long], [AUX][short,long]
pub const REG_BUTTONS: usize = 5;
pub const REG_RPM: usize = 9;
pub const REG_ERR_COUNT: usize = 11;
pub const REG_UNIQUE_ID: usize = 12;

// Read-write configuration section
pub const REG_PWM_FREQ: usize = 24;
pub const REG_REV_DIVISOR: usize = 26;
pub const REG_WDG: usize = 27;
pub const REG_WAKE: usize = 28;
pub const REG_SHORT_MS: usize = 30;
pub const REG_SPACE_MS: usize = 32;
pub const REG_HOLD_S: usize = 34;
pub const REG_GRACE_S: usize = 35;
pub const REG_LED_MODE: usize = 36;
pub const REG_LED_VAL: usize = 37;
pub const REG_BUZZ_FREQ: usize = 38;
pub const REG_BUZZ_BEEP: usize = 39;
pub const REG_BUZZ_PAUSE: usize = 40;
pub const REG_BUZZ_COUNT: usize = 41;
pub const REG_FAN_VAL: usize = 42;
pub const REG_CMD: usize = 43;
pub const REG_CMD_AUTH: usize = 44;

/// First host-writable offset
pub const FIRST_WREG: usize = REG_PWM_FREQ;
/// Last offset in the auto-increment read range (the command byte)
pub const LAST_REG: usize = REG_CMD;
/// Total number of register bytes
pub const REG_COUNT: usize = REG_CMD_AUTH + 1;

/// The process-wide register file.
pub struct RegisterFile {
    bytes: [AtomicU8; REG_COUNT],
}

impl RegisterFile {
    pub const fn new() -> Self {
        const ZERO: AtomicU8 = AtomicU8::new(0);
        Self {
            bytes: [ZERO; REG_COUNT],
        }
    }

    /// Raw byte read, in-range offsets only
    #[inline]
    pub fn load(&self, offset: usize) -> u8 {
        self.bytes[offset].load(Ordering::Relaxed)
    }

    /// Raw byte write, in-range offsets only
    #[inline]
    pub fn store(&self, offset: usize, value: u8) {
        self.bytes[offset].store(value, Ordering::Relaxed)
    }

    /// Big-endian u16 field read
    pub fn load_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.load(offset), self.load(offset + 1)])
    }

    /// Big-endian u16 field write
    pub fn store_u16(&self, offset: usize, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.store(offset, hi);
        self.store(offset + 1, lo);
    }

    #[inline]
    pub fn set_status(&self, bits: u8) {
        self.bytes[REG_STATUS].fetch_or(bits, Ordering::Relaxed);
    }

    #[inline]
    pub fn clear_status(&self, bits: u8) {
        self.bytes[REG_STATUS].fetch_and(!bits, Ordering::Relaxed);
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.load(REG_STATUS)
    }

    /// Reset the status register to its fixed baseline
    pub fn reset_status(&self) {
        self.store(REG_STATUS, STATUS_FIXED);
    }

    #[inline]
    pub fn set_flags(&self, bits: u8) {
        self.bytes[REG_FLAGS].fetch_or(bits, Ordering::Relaxed);
    }

    #[inline]
    pub fn clear_flags(&self, bits: u8) {
        self.bytes[REG_FLAGS].fetch_and(!bits, Ordering::Relaxed);
    }

    #[inline]
    pub fn flags(&self) -> u8 {
        self.load(REG_FLAGS)
    }

    /// Take the command/auth pair, clearing the command slot first so a
    /// command fires at most once even if the host never rewrites it.
    pub fn take_command(&self) -> Command {
        let cmd = self.bytes[REG_CMD].swap(0, Ordering::Relaxed);
        let auth = self.load(REG_CMD_AUTH);
        Command::decode(cmd, auth)
    }

    /// Queue a command as the host would, auth byte included
    pub fn put_command(&self, cmd: Command) {
        let b = cmd.to_byte();
        self.store(REG_CMD_AUTH, b ^ DEVICE_MAGIC);
        self.store(REG_CMD, b);
    }

    /// CRC-8 over the RW configuration bytes, command slot excluded
    pub fn config_crc(&self) -> u8 {
        let mut buf = [0u8; LAST_REG - FIRST_WREG];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.load(FIRST_WREG + i);
        }
        compute_crc8(&buf)
    }

    /// Recompute and publish the configuration checksum register
    pub fn update_config_crc(&self) {
        self.store(REG_CONFIG_CRC, self.config_crc());
    }

    /// Load documented defaults and queue an authenticated `ACT` so the
    /// first loop pass derives the hardware timings from them.
    pub fn reset_defaults(&self, unique_id: &[u8; 12]) {
        for b in &self.bytes {
            b.store(0, Ordering::Relaxed);
        }
        let defaults = PmcConfig::default();
        self.store(REG_ID, DEVICE_MAGIC);
        self.store(REG_VERSION, FW_VERSION);
        self.store(REG_STATUS, STATUS_FIXED);
        self.store(REG_FLAGS, FLAG_FIXED);
        for (i, &b) in unique_id.iter().enumerate() {
            self.store(REG_UNIQUE_ID + i, b);
        }
        self.store_u16(REG_PWM_FREQ, defaults.pwm_freq);
        self.store(REG_REV_DIVISOR, defaults.rev_divisor);
        self.store_u16(REG_SHORT_MS, defaults.short_ms);
        self.store_u16(REG_SPACE_MS, defaults.space_ms);
        self.store(REG_HOLD_S, defaults.hold_s);
        self.store(REG_GRACE_S, defaults.grace_s);
        self.put_command(Command::Act);
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}
