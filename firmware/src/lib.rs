#![no_std]

//! Firmware crate: CH32V003 board support and the embassy tasks that run
//! the portable controller core on it

pub use embassy_executor::Spawner;
pub use embassy_time::Duration;
pub use static_cell::StaticCell;

pub use pmc_core::*;

pub use crate::ch32v003_hardware::*;
pub use crate::tasks::*;

// CH32V003 hardware module
pub mod ch32v003_hardware;

// Time driver for embassy
mod time_driver;

// Embassy tasks module
pub mod tasks {
    use embassy_time::{Duration, Timer};

    use crate::ch32v003_hardware::{pwr_button_held, Ch32v003Board};
    use pmc_core::machine::{Shared, SystemMachine};

    /// Control-loop cadence, ms
    pub const CONTROL_INTERVAL_MS: u64 = 10;

    /// Millisecond tick feeding every counter in the shared state
    #[embassy_executor::task]
    pub async fn tick_task(shared: &'static Shared) {
        #[cfg(feature = "defmt")]
        defmt::info!("tick task started");
        loop {
            Timer::after(Duration::from_millis(1)).await;
            shared.timebase.tick_1ms();
        }
    }

    /// The control loop: drains what the interrupts collected and runs the
    /// state machine against the board.
    #[embassy_executor::task]
    pub async fn control_task(shared: &'static Shared, board: &'static mut Ch32v003Board) {
        #[cfg(feature = "defmt")]
        defmt::info!("control task started");
        let mut machine = SystemMachine::new();
        machine.start(shared, board);
        loop {
            Timer::after(Duration::from_millis(CONTROL_INTERVAL_MS)).await;
            machine.poll(shared, board, pwr_button_held());
        }
    }
}
