//! Test utilities for host-side scenario testing

pub mod host_bus {
    //! Controller-side view of the register interface.
    //!
    //! Drives the protocol engine with the same event sequence a real I2C
    //! controller would produce, so scenario tests exercise the framing
    //! rules instead of poking registers directly.

    use crate::bus::{BusEngine, BusEvent};
    use crate::regs::{RegisterFile, REG_CMD};
    use crate::{Command, DEVICE_MAGIC};

    /// Register write transaction: address match, cursor byte, data, stop
    pub fn write(bus: &BusEngine, regs: &RegisterFile, cursor: u8, data: &[u8], now_ms: u32) {
        bus.handle(BusEvent::Match, regs, now_ms);
        bus.handle(BusEvent::Write(cursor), regs, now_ms);
        for &b in data {
            bus.handle(BusEvent::Write(b), regs, now_ms);
        }
        bus.handle(BusEvent::Stop, regs, now_ms);
    }

    /// Register read transaction with a repeated-start cursor set
    pub fn read(bus: &BusEngine, regs: &RegisterFile, cursor: u8, out: &mut [u8], now_ms: u32) {
        bus.handle(BusEvent::Match, regs, now_ms);
        bus.handle(BusEvent::Write(cursor), regs, now_ms);
        bus.handle(BusEvent::Match, regs, now_ms);
        for b in out.iter_mut() {
            *b = bus.handle(BusEvent::Read, regs, now_ms).unwrap_or(0);
        }
        bus.handle(BusEvent::Nack, regs, now_ms);
        bus.handle(BusEvent::Stop, regs, now_ms);
    }

    /// Queue an authenticated command the way host tooling does: one write
    /// transaction carrying the command byte and its auth byte.
    pub fn send_command(bus: &BusEngine, regs: &RegisterFile, cmd: Command, now_ms: u32) {
        let b = cmd.to_byte();
        write(bus, regs, REG_CMD as u8, &[b, b ^ DEVICE_MAGIC], now_ms);
    }
}

pub mod harness {
    //! Whole-controller simulation harness.
    //!
    //! Couples the shared state, the state machine and a recording board,
    //! and steps the millisecond tick and the control loop together the
    //! way the firmware tasks do.

    use crate::hal::mock::MockBoard;
    use crate::machine::{Shared, SystemMachine};
    use crate::types::Button;

    /// Control-loop cadence of the simulated firmware, ms
    pub const LOOP_INTERVAL_MS: u32 = 10;

    pub struct Controller {
        pub shared: Shared,
        pub machine: SystemMachine,
        pub board: MockBoard,
        /// Live level of the power button line
        pub pwr_held: bool,
    }

    impl Controller {
        /// Cold-started controller with the documented defaults applied
        pub fn new() -> Self {
            let mut c = Self {
                shared: Shared::new(),
                machine: SystemMachine::new(),
                board: MockBoard::new(),
                pwr_held: false,
            };
            c.board.unique_id = *b"PMC-TEST-ID!";
            c.machine.start(&c.shared, &mut c.board);
            c.step();
            c
        }

        /// One control-loop pass at the current time
        pub fn step(&mut self) {
            self.machine.poll(&self.shared, &mut self.board, self.pwr_held);
        }

        /// Advance wall-clock time, running the loop at its usual cadence
        pub fn run_for(&mut self, ms: u32) {
            let mut remaining = ms;
            while remaining > 0 {
                let slice = remaining.min(LOOP_INTERVAL_MS);
                self.shared.timebase.advance_ms(slice);
                self.step();
                remaining -= slice;
            }
        }

        pub fn now_ms(&self) -> u32 {
            self.shared.timebase.now_ms()
        }

        /// Press and release a button, then keep running until the click
        /// burst has been classified and transferred.
        pub fn click(&mut self, button: Button, duration_ms: u32) {
            self.press(button);
            self.run_for(duration_ms);
            self.release(button);
        }

        pub fn press(&mut self, button: Button) {
            if button == Button::Pwr {
                self.pwr_held = true;
            }
            self.shared.buttons.edge(button, true, self.now_ms());
        }

        pub fn release(&mut self, button: Button) {
            if button == Button::Pwr {
                self.pwr_held = false;
            }
            self.shared.buttons.edge(button, false, self.now_ms());
        }
    }

    impl Default for Controller {
        fn default() -> Self {
            Self::new()
        }
    }
}
