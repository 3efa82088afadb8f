//! System-level control loop: command dispatch, power sequencing and the
//! boot/run/shutdown/watchdog life cycle.
//!
//! Interrupt handlers only touch the shared atomics ([`Shared`]); every
//! decision and every hardware side effect happens here, in main-loop
//! context. One [`SystemMachine::poll`] pass drains the bus error latch,
//! executes at most one host command, refreshes telemetry, classifies
//! buttons and advances the state machine.

use crate::bus::BusEngine;
use crate::buttons::{ButtonInput, ButtonPoll};
use crate::hal::Board;
use crate::led::{LedMode, LedSequencer};
use crate::regs::{
    RegisterFile, REG_BUTTONS, REG_BUZZ_BEEP, REG_BUZZ_COUNT, REG_BUZZ_FREQ, REG_BUZZ_PAUSE,
    REG_ERR_COUNT, REG_FAN_VAL, REG_GRACE_S, REG_HOLD_S, REG_LED_MODE, REG_LED_VAL, REG_PWM_FREQ,
    REG_REV_DIVISOR, REG_RPM, REG_SHORT_MS, REG_SPACE_MS, REG_WAKE, REG_WDG,
};
use crate::timebase::Timebase;
use crate::types::{
    Command, SystemState, CLICK_LONG, FLAG_FIXED, FLAG_OUT, FLAG_WAKE_EN, FLAG_WAKE_IRQ_EN,
    STATUS_CLICK, STATUS_ERROR, STATUS_IRQ, STATUS_RPM, STATUS_RUNNING, STATUS_WDG_EN,
};

/// Host-power cooldown after a watchdog trip, seconds
const WDOG_COOLDOWN_S: u32 = 5;
/// Bus silence while running that triggers a peripheral resync, ms
const STALL_TIMEOUT_MS: u32 = 10_000;
/// Ceiling on waiting for an open bus transaction to finish, ms
const QUIESCE_MS: u32 = 5;
/// Iteration ceiling on the same wait, for clocks that only advance
/// between loop passes
const QUIESCE_SPINS: u32 = 5_000;

/// All state shared between interrupt context and the control loop.
/// Lives in a static; interrupt handlers feed it, [`SystemMachine`] drains
/// it.
pub struct Shared {
    pub regs: RegisterFile,
    pub buttons: ButtonInput,
    pub bus: BusEngine,
    pub timebase: Timebase,
}

impl Shared {
    pub const fn new() -> Self {
        Self {
            regs: RegisterFile::new(),
            buttons: ButtonInput::new(),
            bus: BusEngine::new(),
            timebase: Timebase::new(),
        }
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for the bus to leave any open transaction before an operation that
/// would yank state out from under the controller. Bounded so a wedged bus
/// cannot wedge us.
pub fn bus_quiesce(bus: &BusEngine, timebase: &Timebase) -> bool {
    let start = timebase.now_ms();
    let mut spins = 0u32;
    while bus.in_transaction() {
        spins += 1;
        if spins >= QUIESCE_SPINS || timebase.now_ms().wrapping_sub(start) >= QUIESCE_MS {
            return false;
        }
    }
    true
}

pub struct SystemMachine {
    state: SystemState,
    /// Second timestamp of the last state entry
    entered_s: u32,
    led: LedSequencer,
}

impl SystemMachine {
    pub const fn new() -> Self {
        Self {
            state: SystemState::Off,
            entered_s: 0,
            led: LedSequencer::new(),
        }
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    /// Cold start: load register defaults and begin the boot sequence.
    /// The defaults queue an authenticated ACT, so the first poll pass
    /// pushes the documented timings into the hardware.
    pub fn start(&mut self, shared: &Shared, board: &mut dyn Board) {
        shared.regs.reset_defaults(&board.unique_id());
        shared.regs.update_config_crc();
        self.transition(shared, board, SystemState::Booting);
    }

    /// One control-loop pass
    pub fn poll(&mut self, shared: &Shared, board: &mut dyn Board, pwr_held: bool) {
        let now_ms = shared.timebase.now_ms();

        if shared.bus.take_error().is_some() {
            self.bump_error(&shared.regs);
            shared.bus.reset();
            if board.reinit_bus().is_err() {
                self.bump_error(&shared.regs);
            }
        }

        // A poll can land between the command byte and the auth byte of a
        // single burst write; dispatch only once the transaction has
        // closed, the slot keeps the command for the next pass.
        if bus_quiesce(&shared.bus, &shared.timebase) {
            self.run_command(shared, board);
        }
        self.update_rpm(shared);

        let button = shared.buttons.poll(&shared.regs, now_ms, pwr_held);

        match self.state {
            SystemState::Booting | SystemState::Running => {
                if button == ButtonPoll::HardHold {
                    self.transition(shared, board, SystemState::Off);
                    return;
                }
            }
            _ => {}
        }

        match self.state {
            SystemState::Booting => {}
            SystemState::Running => {
                let limit = shared.regs.load(REG_WDG);
                if shared.regs.status() & STATUS_WDG_EN != 0
                    && shared.timebase.watchdog_expired(limit)
                {
                    self.transition(shared, board, SystemState::Wdog);
                } else {
                    self.check_stall(shared, board, now_ms);
                }
            }
            SystemState::Shutdown => {
                let grace = shared.regs.load(REG_GRACE_S) as u32;
                if shared.timebase.now_s().wrapping_sub(self.entered_s) > grace {
                    self.transition(shared, board, SystemState::Off);
                }
            }
            SystemState::Wdog => {
                if shared.timebase.now_s().wrapping_sub(self.entered_s) >= WDOG_COOLDOWN_S {
                    self.transition(shared, board, SystemState::Booting);
                }
            }
            SystemState::Off => {
                if self.wake_due(shared, button) {
                    self.transition(shared, board, SystemState::Booting);
                }
            }
        }

        self.led.tick(board, now_ms);
        board.poll_beep(now_ms);
    }

    /// Drain and execute at most one queued host command
    fn run_command(&mut self, shared: &Shared, board: &mut dyn Board) {
        let regs = &shared.regs;
        let now_ms = shared.timebase.now_ms();
        match regs.take_command() {
            Command::Nop | Command::Rejected => {}
            Command::Act => self.apply_config(shared, board),
            Command::Boot => {
                if self.state == SystemState::Booting {
                    self.transition(shared, board, SystemState::Running);
                }
            }
            Command::Init => {
                regs.store(crate::regs::REG_FLAGS, FLAG_FIXED);
                board.stop_beep();
                self.transition(shared, board, SystemState::Booting);
            }
            Command::Feed => shared.timebase.feed_watchdog(),
            Command::Hard => self.transition(shared, board, SystemState::Off),
            Command::Shut => {
                let next = if self.state == SystemState::Off {
                    SystemState::Booting
                } else {
                    SystemState::Shutdown
                };
                self.transition(shared, board, next);
            }
            Command::Clear => {
                regs.clear_status(STATUS_CLICK | STATUS_RPM | STATUS_IRQ | STATUS_ERROR);
                regs.store(REG_ERR_COUNT, 0);
                for i in 0..4 {
                    regs.store(REG_BUTTONS + i, 0);
                }
            }
            Command::Fan => board.set_fan_duty(regs.load(REG_FAN_VAL)),
            Command::Led => {
                let mode = LedMode::from_u8(regs.load(REG_LED_MODE));
                self.led.set_mode(board, mode, regs.load(REG_LED_VAL), now_ms);
            }
            Command::Beep => board.start_beep(
                regs.load(REG_BUZZ_FREQ),
                regs.load(REG_BUZZ_COUNT),
                regs.load(REG_BUZZ_BEEP),
                regs.load(REG_BUZZ_PAUSE),
            ),
            Command::OutSet => {
                board.drive_aux_output(true);
                regs.set_flags(FLAG_OUT);
            }
            Command::OutClear => {
                board.drive_aux_output(false);
                regs.clear_flags(FLAG_OUT);
            }
            Command::Reset => {
                bus_quiesce(&shared.bus, &shared.timebase);
                board.reset_device();
            }
            Command::WdgArm => {
                shared.timebase.feed_watchdog();
                regs.set_status(STATUS_WDG_EN);
            }
            Command::WdgDisarm => regs.clear_status(STATUS_WDG_EN),
            Command::WakeEnable => {
                shared.timebase.restart_wake();
                regs.set_flags(FLAG_WAKE_EN);
            }
            Command::WakeDisable => regs.clear_flags(FLAG_WAKE_EN),
            Command::WakeIrqEnable => regs.set_flags(FLAG_WAKE_IRQ_EN),
            Command::WakeIrqDisable => regs.clear_flags(FLAG_WAKE_IRQ_EN),
        }
    }

    /// ACT: push the RW configuration registers into the hardware, writing
    /// back every value the hardware or the classifier had to adjust, then
    /// republish the configuration checksum.
    fn apply_config(&mut self, shared: &Shared, board: &mut dyn Board) {
        let regs = &shared.regs;
        let now_ms = shared.timebase.now_ms();

        if regs.load(REG_REV_DIVISOR) == 0 {
            regs.store(REG_REV_DIVISOR, 2);
        }

        let pwm = regs.load_u16(REG_PWM_FREQ).clamp(2, 62_500);
        match board.set_pwm_frequency(pwm) {
            Ok(applied) => regs.store_u16(REG_PWM_FREQ, applied),
            Err(_) => self.bump_error(regs),
        }

        let applied_short = shared.buttons.set_timings(
            regs.load_u16(REG_SHORT_MS),
            regs.load_u16(REG_SPACE_MS),
            regs.load(REG_HOLD_S),
        );
        regs.store_u16(REG_SHORT_MS, applied_short);

        let mode = LedMode::from_u8(regs.load(REG_LED_MODE));
        self.led.set_mode(board, mode, regs.load(REG_LED_VAL), now_ms);
        board.set_fan_duty(regs.load(REG_FAN_VAL));

        if regs.load(REG_WDG) > 0 {
            shared.timebase.feed_watchdog();
            regs.set_status(STATUS_WDG_EN);
        } else {
            regs.clear_status(STATUS_WDG_EN);
        }

        regs.update_config_crc();
    }

    /// Fold the latest tachometer window into the RPM registers
    fn update_rpm(&self, shared: &Shared) {
        if let Some(pulses) = shared.timebase.take_tach_window() {
            let divisor = shared.regs.load(REG_REV_DIVISOR).max(1) as u32;
            let rpm = (pulses as u32 * 60 / divisor).min(u16::MAX as u32) as u16;
            shared.regs.store_u16(REG_RPM, rpm);
            shared.regs.set_status(STATUS_RPM);
        }
    }

    /// While the host is up it talks to us at least every few seconds. Ten
    /// seconds of bus silence means the peripheral lost sync (or the bus
    /// wedged): re-init it, or reset outright when the lines are stuck.
    fn check_stall(&mut self, shared: &Shared, board: &mut dyn Board, now_ms: u32) {
        if now_ms.wrapping_sub(shared.bus.last_activity_ms()) < STALL_TIMEOUT_MS {
            return;
        }
        if board.bus_stuck() {
            bus_quiesce(&shared.bus, &shared.timebase);
            board.reset_device();
            return;
        }
        self.bump_error(&shared.regs);
        shared.bus.reset();
        if board.reinit_bus().is_err() {
            self.bump_error(&shared.regs);
        }
        shared.bus.touch(now_ms);
    }

    fn bump_error(&self, regs: &RegisterFile) {
        let n = regs.load(REG_ERR_COUNT);
        regs.store(REG_ERR_COUNT, n.saturating_add(1));
        regs.set_status(STATUS_ERROR);
    }

    /// Wake sources while off: a long press of the power button, the
    /// autowake timer, or the external request line when armed.
    fn wake_due(&self, shared: &Shared, button: ButtonPoll) -> bool {
        let regs = &shared.regs;
        if button == ButtonPoll::ClicksTransferred && regs.load(REG_BUTTONS + CLICK_LONG) > 0 {
            return true;
        }
        let flags = regs.flags();
        if flags & FLAG_WAKE_EN != 0 {
            let wake = regs.load_u16(REG_WAKE);
            if wake > 0 && shared.timebase.wake_minutes() >= wake {
                return true;
            }
        }
        if flags & FLAG_WAKE_IRQ_EN != 0 && regs.status() & STATUS_IRQ != 0 {
            return true;
        }
        false
    }

    /// Switch state and apply the entry side effects
    fn transition(&mut self, shared: &Shared, board: &mut dyn Board, next: SystemState) {
        let regs = &shared.regs;
        let now_ms = shared.timebase.now_ms();
        self.state = next;
        self.entered_s = shared.timebase.now_s();
        // Neither the classifier state nor the click matrix survives a
        // transition; the click that caused one is consumed, not reported.
        shared.buttons.reset();
        for i in 0..4 {
            regs.store(REG_BUTTONS + i, 0);
        }
        match next {
            SystemState::Booting => {
                board.drive_power(true);
                board.set_fan_duty(255);
                regs.reset_status();
                shared.bus.touch(now_ms);
                self.led.set_mode(board, LedMode::Cycle, 255, now_ms);
            }
            SystemState::Running => {
                board.drive_power(true);
                regs.clear_status(STATUS_CLICK | STATUS_RPM);
                regs.set_status(STATUS_RUNNING);
                regs.store(REG_LED_MODE, LedMode::On as u8);
                shared.bus.touch(now_ms);
                self.led.set_mode(board, LedMode::On, 255, now_ms);
            }
            SystemState::Shutdown => {
                board.set_fan_duty(255);
                self.led.set_mode(board, LedMode::FastCycle, 255, now_ms);
            }
            SystemState::Wdog => {
                bus_quiesce(&shared.bus, &shared.timebase);
                board.drive_power(false);
                board.set_fan_duty(255);
                regs.clear_status(STATUS_RUNNING);
                self.led.set_mode(board, LedMode::FastBlink, 255, now_ms);
            }
            SystemState::Off => {
                bus_quiesce(&shared.bus, &shared.timebase);
                board.drive_power(false);
                board.set_fan_duty(0);
                board.stop_beep();
                regs.reset_status();
                shared.timebase.restart_wake();
                self.led.set_mode(board, LedMode::Off, 0, now_ms);
            }
        }
    }
}

impl Default for SystemMachine {
    fn default() -> Self {
        Self::new()
    }
}
