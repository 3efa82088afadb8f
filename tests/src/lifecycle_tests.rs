//! Whole-controller life-cycle scenarios: boot, run, shutdown, watchdog
//! and the button paths a user actually exercises

#[cfg(test)]
mod tests {
    use pmc_core::regs::{REG_BUTTONS, REG_GRACE_S, REG_WAKE, REG_WDG};
    use pmc_core::test_utils::harness::Controller;
    use pmc_core::test_utils::host_bus;
    use pmc_core::types::{Button, SystemState, CLICK_LONG, CLICK_SHORT, STATUS_CLICK};
    use pmc_core::Command;

    fn send(c: &mut Controller, cmd: Command) {
        host_bus::send_command(&c.shared.bus, &c.shared.regs, cmd, c.now_ms());
        c.run_for(10);
    }

    #[test]
    fn full_power_cycle() {
        let mut c = Controller::new();
        assert_eq!(c.machine.state(), SystemState::Booting);
        assert!(c.board.power_on);

        send(&mut c, Command::Boot);
        assert_eq!(c.machine.state(), SystemState::Running);

        send(&mut c, Command::Shut);
        assert_eq!(c.machine.state(), SystemState::Shutdown);
        assert!(c.board.power_on); // grace period

        c.run_for(16_000);
        assert_eq!(c.machine.state(), SystemState::Off);
        assert!(!c.board.power_on);
        assert_eq!(c.board.fan_duty, 0);
    }

    #[test]
    fn shortened_grace_period_is_honored() {
        let mut c = Controller::new();
        send(&mut c, Command::Boot);
        c.shared.regs.store(REG_GRACE_S, 2);
        send(&mut c, Command::Shut);
        c.run_for(1_000);
        assert_eq!(c.machine.state(), SystemState::Shutdown);
        c.run_for(2_000);
        assert_eq!(c.machine.state(), SystemState::Off);
    }

    #[tokio::test]
    async fn watchdog_starvation_power_cycles_the_host() {
        let mut c = Controller::new();
        send(&mut c, Command::Boot);
        c.shared.regs.store(REG_WDG, 3);
        send(&mut c, Command::WdgArm);

        // Feeding on time keeps the host alive
        for _ in 0..3 {
            c.run_for(2_000);
            send(&mut c, Command::Feed);
        }
        assert_eq!(c.machine.state(), SystemState::Running);

        // A hung host stops feeding
        c.run_for(5_000);
        assert_eq!(c.machine.state(), SystemState::Wdog);
        assert!(!c.board.power_on);

        // Cooldown over, power comes back for a fresh boot
        c.run_for(6_000);
        assert_eq!(c.machine.state(), SystemState::Booting);
        assert!(c.board.power_on);
    }

    #[test]
    fn click_burst_reaches_the_host_registers() {
        let mut c = Controller::new();
        send(&mut c, Command::Boot);

        // Double short click on the auxiliary button
        c.click(Button::Aux, 100);
        c.run_for(300);
        c.click(Button::Aux, 100);
        c.run_for(1_500); // space window closes

        assert_eq!(c.shared.regs.load(REG_BUTTONS + 2 + CLICK_SHORT), 2);
        assert!(c.shared.regs.status() & STATUS_CLICK != 0);

        // Host acknowledges and the counts clear
        send(&mut c, Command::Clear);
        assert_eq!(c.shared.regs.load(REG_BUTTONS + 2 + CLICK_SHORT), 0);
        assert!(c.shared.regs.status() & STATUS_CLICK == 0);
    }

    #[test]
    fn hard_hold_cuts_power_even_with_a_hung_host() {
        let mut c = Controller::new();
        send(&mut c, Command::Boot);

        c.press(Button::Pwr);
        c.run_for(7_000);
        assert_eq!(c.machine.state(), SystemState::Running);
        c.run_for(2_000);
        assert_eq!(c.machine.state(), SystemState::Off);
        assert!(!c.board.power_on);
    }

    #[test]
    fn long_click_boots_from_off() {
        let mut c = Controller::new();
        send(&mut c, Command::Hard);
        assert_eq!(c.machine.state(), SystemState::Off);

        c.click(Button::Pwr, 400);
        c.run_for(1_500);
        assert_eq!(c.machine.state(), SystemState::Booting);
        assert!(c.board.power_on);
        // Boot entry wipes the click that woke us
        assert_eq!(c.shared.regs.load(REG_BUTTONS + CLICK_LONG), 0);
    }

    #[test]
    fn short_click_is_not_a_wake_source() {
        let mut c = Controller::new();
        send(&mut c, Command::Hard);
        c.click(Button::Pwr, 100);
        c.run_for(1_500);
        assert_eq!(c.machine.state(), SystemState::Off);
    }

    #[test]
    fn autowake_timer_boots_the_host() {
        let mut c = Controller::new();
        c.shared.regs.store_u16(REG_WAKE, 1);
        send(&mut c, Command::WakeEnable);
        send(&mut c, Command::Hard);
        assert_eq!(c.machine.state(), SystemState::Off);

        c.run_for(59_000);
        assert_eq!(c.machine.state(), SystemState::Off);
        c.run_for(2_000);
        assert_eq!(c.machine.state(), SystemState::Booting);
    }

    #[test]
    fn second_boot_after_shutdown_works() {
        let mut c = Controller::new();
        send(&mut c, Command::Boot);
        send(&mut c, Command::Shut);
        c.run_for(16_000);
        assert_eq!(c.machine.state(), SystemState::Off);

        // SHUT doubles as power-on when already off
        send(&mut c, Command::Shut);
        assert_eq!(c.machine.state(), SystemState::Booting);
        send(&mut c, Command::Boot);
        assert_eq!(c.machine.state(), SystemState::Running);
    }
}
