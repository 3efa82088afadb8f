//! Transport-error and bus-recovery scenarios

#[cfg(test)]
mod tests {
    use pmc_core::bus::BusEvent;
    use pmc_core::regs::REG_ERR_COUNT;
    use pmc_core::test_utils::harness::Controller;
    use pmc_core::test_utils::host_bus;
    use pmc_core::types::{SystemState, STATUS_ERROR};
    use pmc_core::Command;

    fn send(c: &mut Controller, cmd: Command) {
        host_bus::send_command(&c.shared.bus, &c.shared.regs, cmd, c.now_ms());
        c.run_for(10);
    }

    #[test]
    fn peripheral_error_counts_and_reinits() {
        let mut c = Controller::new();
        send(&mut c, Command::Boot);

        c.shared.bus.handle(BusEvent::Error(0x01), &c.shared.regs, c.now_ms());
        c.run_for(10);

        assert_eq!(c.shared.regs.load(REG_ERR_COUNT), 1);
        assert!(c.shared.regs.status() & STATUS_ERROR != 0);
        assert_eq!(c.board.bus_reinits, 1);
        // The system keeps running through a transport hiccup
        assert_eq!(c.machine.state(), SystemState::Running);
    }

    #[test]
    fn error_counter_accumulates_until_cleared() {
        let mut c = Controller::new();
        send(&mut c, Command::Boot);

        for _ in 0..3 {
            c.shared.bus.handle(BusEvent::Error(0x01), &c.shared.regs, c.now_ms());
            c.run_for(10);
        }
        assert_eq!(c.shared.regs.load(REG_ERR_COUNT), 3);

        send(&mut c, Command::Clear);
        assert_eq!(c.shared.regs.load(REG_ERR_COUNT), 0);
        assert!(c.shared.regs.status() & STATUS_ERROR == 0);
    }

    #[test]
    fn aborted_transaction_does_not_poison_the_next_one() {
        let mut c = Controller::new();
        // A transaction dies mid-flight
        c.shared.bus.handle(BusEvent::Match, &c.shared.regs, 0);
        c.shared.bus.handle(BusEvent::Write(0x10), &c.shared.regs, 0);
        c.shared.bus.handle(BusEvent::Error(0x02), &c.shared.regs, 0);
        c.run_for(10);

        // The next transaction works normally
        send(&mut c, Command::Boot);
        assert_eq!(c.machine.state(), SystemState::Running);
    }

    #[test]
    fn prolonged_bus_silence_resyncs_the_peripheral() {
        let mut c = Controller::new();
        send(&mut c, Command::Boot);

        c.run_for(11_000);
        assert_eq!(c.board.bus_reinits, 1);
        assert_eq!(c.board.reset_requests, 0);
        assert_eq!(c.machine.state(), SystemState::Running);

        // Traffic keeps the stall detector quiet
        for _ in 0..3 {
            c.run_for(5_000);
            send(&mut c, Command::Feed);
        }
        assert_eq!(c.board.bus_reinits, 1);
    }

    #[test]
    fn stuck_bus_escalates_to_device_reset() {
        let mut c = Controller::new();
        send(&mut c, Command::Boot);
        c.board.bus_stuck = true;

        c.run_for(11_000);
        assert_eq!(c.board.reset_requests, 1);
    }

    #[test]
    fn silence_while_off_is_not_an_error() {
        let mut c = Controller::new();
        send(&mut c, Command::Hard);
        c.run_for(60_000);
        assert_eq!(c.board.bus_reinits, 0);
        assert_eq!(c.shared.regs.load(REG_ERR_COUNT), 0);
    }
}
