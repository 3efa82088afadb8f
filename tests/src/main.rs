// Host-side smoke run of the whole controller against the mock board

use pmc_core::regs::{REG_RPM, REG_WDG};
use pmc_core::test_utils::harness::Controller;
use pmc_core::test_utils::host_bus;
use pmc_core::types::SystemState;
use pmc_core::Command;

fn main() {
    println!("power controller smoke run");

    let mut c = Controller::new();
    assert_eq!(c.machine.state(), SystemState::Booting);
    println!("  cold start: booting, power on, pwm {} Hz", c.board.pwm_freq);

    host_bus::send_command(&c.shared.bus, &c.shared.regs, Command::Boot, c.now_ms());
    c.run_for(10);
    assert_eq!(c.machine.state(), SystemState::Running);
    println!("  host booted: running");

    // Spin the fan tach for a second of telemetry
    for _ in 0..100 {
        c.shared.timebase.tach_pulse();
    }
    c.run_for(1_000);
    println!("  fan telemetry: {} rpm", c.shared.regs.load_u16(REG_RPM));

    // Watchdog armed and starved
    c.shared.regs.store(REG_WDG, 2);
    host_bus::send_command(&c.shared.bus, &c.shared.regs, Command::WdgArm, c.now_ms());
    c.run_for(10);
    c.run_for(4_000);
    assert_eq!(c.machine.state(), SystemState::Wdog);
    println!("  watchdog starved: host power cycled");

    c.run_for(6_000);
    assert_eq!(c.machine.state(), SystemState::Booting);
    println!("  cooldown over: booting again");

    host_bus::send_command(&c.shared.bus, &c.shared.regs, Command::Boot, c.now_ms());
    c.run_for(10);
    host_bus::send_command(&c.shared.bus, &c.shared.regs, Command::Shut, c.now_ms());
    c.run_for(16_000);
    assert_eq!(c.machine.state(), SystemState::Off);
    println!("  orderly shutdown: off");

    println!("smoke run passed");
    println!();
    println!("run the scenario suites with: cargo test");
}
