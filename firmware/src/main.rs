#![no_std]
#![no_main]

#[cfg(feature = "defmt")]
use defmt_rtt as _;

// RISC-V runtime
use riscv_rt as _;

// Panic handler
use panic_halt as _;

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use static_cell::StaticCell;

use pmc_core::machine::Shared;
use pmc_firmware::ch32v003_hardware::Ch32v003Board;
use pmc_firmware::tasks::{control_task, tick_task};

// Static resources
static SHARED: Shared = Shared::new();
static BOARD: StaticCell<Ch32v003Board> = StaticCell::new();

/// Main firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    #[cfg(feature = "defmt")]
    defmt::info!("power controller firmware starting");

    let board = BOARD.init(Ch32v003Board::new());
    if board.init().is_err() {
        // Nothing to fall back to before the bus is up
        panic!("board bring-up failed");
    }
    #[cfg(feature = "defmt")]
    defmt::info!("hardware initialized");

    spawner.must_spawn(tick_task(&SHARED));
    spawner.must_spawn(control_task(&SHARED, board));

    #[cfg(feature = "defmt")]
    defmt::info!("controller ready");

    // Main supervision loop
    loop {
        Timer::after(Duration::from_secs(1)).await;
        #[cfg(feature = "defmt")]
        defmt::trace!("heartbeat");
    }
}
