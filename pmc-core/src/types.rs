//! Core data types for the power/fan/button controller

use crate::DEVICE_MAGIC;

/// Button identification
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    /// Power button (drives boot/shutdown/hard-hold logic)
    Pwr,
    /// Auxiliary button (reported to the host only)
    Aux,
}

impl Button {
    /// Index into the click-count matrix
    pub const fn index(&self) -> usize {
        match self {
            Button::Pwr => 0,
            Button::Aux => 1,
        }
    }
}

/// Click classification, second index of the click-count matrix
pub const CLICK_SHORT: usize = 0;
pub const CLICK_LONG: usize = 1;

/// Status register bits (offset 2)
pub const STATUS_CLICK: u8 = 1 << 0;
pub const STATUS_RPM: u8 = 1 << 1;
pub const STATUS_ERROR: u8 = 1 << 2;
pub const STATUS_RUNNING: u8 = 1 << 3;
pub const STATUS_WDG_EN: u8 = 1 << 4;
pub const STATUS_IRQ: u8 = 1 << 5;
/// bit7 reads 1 and bit6 reads 0 so the host can sanity-check a read
pub const STATUS_FIXED: u8 = 0x80;

/// Flags register bits (offset 3)
pub const FLAG_WAKE_IRQ_EN: u8 = 1 << 0;
pub const FLAG_WAKE_EN: u8 = 1 << 1;
pub const FLAG_OUT: u8 = 1 << 2;
pub const FLAG_FIXED: u8 = 0x80;

/// System-level state of the controller
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemState {
    /// Waiting for configuration and the boot notification
    Booting,
    /// Host is up and feeding the watchdog
    Running,
    /// Shutdown requested, counting down the grace time
    Shutdown,
    /// High-level watchdog fired, host power cut for a cooldown
    Wdog,
    /// Power output off, waiting for a wake source or the power button
    Off,
}

/// Host commands, decoded from the command/auth register pair.
///
/// A command byte is only accepted when the auth byte equals
/// `cmd XOR DEVICE_MAGIC`; anything else decodes to `Rejected` and is
/// silently dropped.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Nop,
    /// Apply the RW configuration registers to the hardware
    Act,
    /// Host finished booting
    Boot,
    /// Return to the booting state
    Init,
    /// Feed the high-level watchdog
    Feed,
    /// Immediate power cut
    Hard,
    /// Orderly shutdown (or boot, when already off)
    Shut,
    /// Clear click/rpm/irq/error status and the error counter
    Clear,
    /// Apply the fan duty register
    Fan,
    /// Apply the LED mode/value registers
    Led,
    /// Start a beep sequence from the buzzer registers
    Beep,
    /// Assert the auxiliary output
    OutSet,
    /// Deassert the auxiliary output
    OutClear,
    /// Immediate device reset
    Reset,
    /// Arm watchdog enforcement
    WdgArm,
    /// Disarm watchdog enforcement
    WdgDisarm,
    /// Enable autowake by timer
    WakeEnable,
    /// Disable autowake by timer
    WakeDisable,
    /// Enable wake by external request signal
    WakeIrqEnable,
    /// Disable wake by external request signal
    WakeIrqDisable,
    /// Unknown command byte or failed authentication
    Rejected,
}

impl Command {
    /// Decode a command/auth register pair.
    pub fn decode(cmd: u8, auth: u8) -> Command {
        if cmd == 0 {
            return Command::Nop;
        }
        if auth != cmd ^ DEVICE_MAGIC {
            return Command::Rejected;
        }
        match cmd {
            b'A' => Command::Act,
            b'B' => Command::Boot,
            b'I' => Command::Init,
            b'F' => Command::Feed,
            b'H' => Command::Hard,
            b'S' => Command::Shut,
            b'C' => Command::Clear,
            b'N' => Command::Fan,
            b'L' => Command::Led,
            b'Z' => Command::Beep,
            b'1' => Command::OutSet,
            b'0' => Command::OutClear,
            b'T' => Command::Reset,
            b'W' => Command::WdgArm,
            b'V' => Command::WdgDisarm,
            b'E' => Command::WakeEnable,
            b'D' => Command::WakeDisable,
            b'e' => Command::WakeIrqEnable,
            b'd' => Command::WakeIrqDisable,
            _ => Command::Rejected,
        }
    }

    /// Encode back to the raw command byte (tests and host tooling)
    pub const fn to_byte(&self) -> u8 {
        match self {
            Command::Nop => 0,
            Command::Act => b'A',
            Command::Boot => b'B',
            Command::Init => b'I',
            Command::Feed => b'F',
            Command::Hard => b'H',
            Command::Shut => b'S',
            Command::Clear => b'C',
            Command::Fan => b'N',
            Command::Led => b'L',
            Command::Beep => b'Z',
            Command::OutSet => b'1',
            Command::OutClear => b'0',
            Command::Reset => b'T',
            Command::WdgArm => b'W',
            Command::WdgDisarm => b'V',
            Command::WakeEnable => b'E',
            Command::WakeDisable => b'D',
            Command::WakeIrqEnable => b'e',
            Command::WakeIrqDisable => b'd',
            Command::Rejected => 0,
        }
    }
}

/// Boot-time register defaults
#[derive(Copy, Clone, Debug)]
pub struct PmcConfig {
    /// PWM frequency for fan and LED outputs, Hz
    pub pwm_freq: u16,
    /// Tachometer pulses per fan revolution
    pub rev_divisor: u8,
    /// Maximum duration of a short click, ms
    pub short_ms: u16,
    /// Idle window that closes a click burst, ms
    pub space_ms: u16,
    /// Continuous hold that forces power off, seconds
    pub hold_s: u8,
    /// Delay between shutdown request and power cut, seconds
    pub grace_s: u8,
}

impl Default for PmcConfig {
    fn default() -> Self {
        Self {
            pwm_freq: 25_000,
            rev_divisor: 2,
            short_ms: 200,
            space_ms: 1200,
            hold_s: 8,
            grace_s: 15,
        }
    }
}

impl PmcConfig {
    /// Create a configuration with validation
    pub fn new(
        pwm_freq: u16,
        rev_divisor: u8,
        short_ms: u16,
        space_ms: u16,
        hold_s: u8,
        grace_s: u8,
    ) -> Result<Self, &'static str> {
        if !(2..=62_500).contains(&pwm_freq) {
            return Err("PWM frequency must be between 2 and 62500 Hz");
        }
        if rev_divisor == 0 {
            return Err("Revolution divisor must be nonzero");
        }
        if short_ms < 2 * crate::buttons::DEBOUNCE_MS {
            return Err("Short click time must be at least twice the debounce");
        }
        if space_ms < short_ms {
            return Err("Space time must not be shorter than the short click time");
        }
        Ok(Self {
            pwm_freq,
            rev_divisor,
            short_ms,
            space_ms,
            hold_s,
            grace_s,
        })
    }
}
