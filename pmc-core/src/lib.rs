#![cfg_attr(not(feature = "std"), no_std)]

//! # PMC Core
//!
//! Core logic library for a small I2C power/fan/button controller.
//! Holds the register map, the interrupt-level bus protocol engine, the
//! button click classifier and the system state machine, all portable and
//! host-testable.

pub mod types;
pub mod crc;
pub mod regs;
pub mod timebase;
pub mod buttons;
pub mod bus;
pub mod led;
pub mod machine;
pub mod hal;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use types::*;
pub use regs::*;
pub use timebase::Timebase;
pub use buttons::{ButtonInput, ButtonPoll};
pub use bus::{BusEngine, BusEvent};
pub use led::{LedMode, LedSequencer};
pub use machine::{Shared, SystemMachine};
pub use hal::{Board, HalError};

/// Firmware version byte exposed at register offset 1
pub const FW_VERSION: u8 = 3;

/// Device marker byte and command authentication magic
pub const DEVICE_MAGIC: u8 = 0xAA;
