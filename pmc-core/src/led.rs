//! Status LED sequencer.
//!
//! The LED rides the same PWM block as the fan. Animated modes are stepped
//! from the main loop; manual mode leaves the duty entirely to the host.

use crate::hal::Board;

/// Host-selectable LED behavior (LED mode register)
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedMode {
    /// Duty follows the LED value register verbatim
    Manual = 0,
    On = 1,
    Off = 2,
    Blink = 3,
    FastBlink = 4,
    /// Triangle sweep of the duty cycle
    Cycle = 5,
    FastCycle = 6,
}

impl LedMode {
    pub fn from_u8(raw: u8) -> LedMode {
        match raw {
            1 => LedMode::On,
            2 => LedMode::Off,
            3 => LedMode::Blink,
            4 => LedMode::FastBlink,
            5 => LedMode::Cycle,
            6 => LedMode::FastCycle,
            _ => LedMode::Manual,
        }
    }
}

const BLINK_MS: u32 = 550;
const FAST_BLINK_MS: u32 = 175;
const CYCLE_STEP_MS: u32 = 8;
const FAST_CYCLE_STEP_MS: u32 = 2;

pub struct LedSequencer {
    mode: LedMode,
    /// On-phase duty for the blinking modes, full-scale cap for the sweeps
    value: u8,
    current: u8,
    rising: bool,
    last_step_ms: u32,
}

impl LedSequencer {
    pub const fn new() -> Self {
        Self {
            mode: LedMode::Off,
            value: 255,
            current: 0,
            rising: true,
            last_step_ms: 0,
        }
    }

    pub fn mode(&self) -> LedMode {
        self.mode
    }

    /// Switch mode and apply the immediate duty for the static modes
    pub fn set_mode(&mut self, board: &mut dyn Board, mode: LedMode, value: u8, now_ms: u32) {
        self.mode = mode;
        self.value = value;
        self.last_step_ms = now_ms;
        match mode {
            LedMode::Manual => board.set_led_duty(value),
            LedMode::On => board.set_led_duty(255),
            LedMode::Off => {
                self.current = 0;
                board.set_led_duty(0);
            }
            LedMode::Blink | LedMode::FastBlink => {
                self.current = value;
                board.set_led_duty(value);
            }
            LedMode::Cycle | LedMode::FastCycle => {
                self.current = 0;
                self.rising = true;
                board.set_led_duty(0);
            }
        }
    }

    /// Advance the animation, called once per main-loop pass
    pub fn tick(&mut self, board: &mut dyn Board, now_ms: u32) {
        let period = match self.mode {
            LedMode::Blink => BLINK_MS,
            LedMode::FastBlink => FAST_BLINK_MS,
            LedMode::Cycle => CYCLE_STEP_MS,
            LedMode::FastCycle => FAST_CYCLE_STEP_MS,
            _ => return,
        };
        if now_ms.wrapping_sub(self.last_step_ms) < period {
            return;
        }
        self.last_step_ms = now_ms;
        match self.mode {
            LedMode::Blink | LedMode::FastBlink => {
                self.current = if self.current == 0 { self.value } else { 0 };
                board.set_led_duty(self.current);
            }
            LedMode::Cycle | LedMode::FastCycle => {
                if self.rising {
                    self.current = self.current.saturating_add(1);
                    if self.current >= self.value.max(1) {
                        self.rising = false;
                    }
                } else {
                    self.current = self.current.saturating_sub(1);
                    if self.current == 0 {
                        self.rising = true;
                    }
                }
                board.set_led_duty(self.current);
            }
            _ => {}
        }
    }
}

impl Default for LedSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockBoard;

    #[test]
    fn mode_decoding_defaults_to_manual() {
        assert_eq!(LedMode::from_u8(0), LedMode::Manual);
        assert_eq!(LedMode::from_u8(3), LedMode::Blink);
        assert_eq!(LedMode::from_u8(6), LedMode::FastCycle);
        assert_eq!(LedMode::from_u8(200), LedMode::Manual);
    }

    #[test]
    fn static_modes_apply_immediately() {
        let mut board = MockBoard::new();
        let mut led = LedSequencer::new();
        led.set_mode(&mut board, LedMode::On, 0, 0);
        assert_eq!(board.led_duty, 255);
        led.set_mode(&mut board, LedMode::Manual, 42, 0);
        assert_eq!(board.led_duty, 42);
        led.set_mode(&mut board, LedMode::Off, 42, 0);
        assert_eq!(board.led_duty, 0);
    }

    #[test]
    fn blink_toggles_at_period() {
        let mut board = MockBoard::new();
        let mut led = LedSequencer::new();
        led.set_mode(&mut board, LedMode::Blink, 200, 0);
        assert_eq!(board.led_duty, 200);

        led.tick(&mut board, 500); // period not yet elapsed
        assert_eq!(board.led_duty, 200);
        led.tick(&mut board, 560);
        assert_eq!(board.led_duty, 0);
        led.tick(&mut board, 1120);
        assert_eq!(board.led_duty, 200);
    }

    #[test]
    fn cycle_sweeps_up_then_down() {
        let mut board = MockBoard::new();
        let mut led = LedSequencer::new();
        led.set_mode(&mut board, LedMode::Cycle, 3, 0);

        let mut now = 0;
        let mut seen = [0u8; 7];
        for slot in seen.iter_mut() {
            now += CYCLE_STEP_MS;
            led.tick(&mut board, now);
            *slot = board.led_duty;
        }
        assert_eq!(seen, [1, 2, 3, 2, 1, 0, 1]);
    }

    #[test]
    fn manual_mode_never_animates() {
        let mut board = MockBoard::new();
        let mut led = LedSequencer::new();
        led.set_mode(&mut board, LedMode::Manual, 99, 0);
        led.tick(&mut board, 10_000);
        assert_eq!(board.led_duty, 99);
    }
}
