//! Hardware abstraction for the power controller.
//!
//! Time never crosses this boundary as a type; the control loop hands the
//! board millisecond timestamps straight from the [`Timebase`](crate::Timebase).

/// Error types for HAL operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// GPIO operation failed
    GpioError,
    /// PWM timer configuration failed
    PwmError,
    /// Bus peripheral operation failed
    BusError,
    /// Hardware not initialized
    NotInitialized,
    /// Invalid configuration
    InvalidConfig,
}

#[cfg(feature = "std")]
impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::GpioError => write!(f, "GPIO operation failed"),
            HalError::PwmError => write!(f, "PWM timer configuration failed"),
            HalError::BusError => write!(f, "Bus peripheral operation failed"),
            HalError::NotInitialized => write!(f, "Hardware not initialized"),
            HalError::InvalidConfig => write!(f, "Invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

/// Everything the control loop asks of the board.
///
/// The loop owns the policy (when to cut power, what the LED shows); the
/// board owns the mechanism (which timer, which pin, which polarity). Side
/// effects that cannot fail on real hardware are plain calls; the ones
/// with a failure mode return a `Result`.
pub trait Board {
    /// Reprogram the shared fan/LED PWM base frequency. Returns the
    /// frequency actually achieved after prescaler rounding.
    fn set_pwm_frequency(&mut self, hz: u16) -> Result<u16, HalError>;

    /// Fan output duty, 0..=255
    fn set_fan_duty(&mut self, duty: u8);

    /// Status LED duty, 0..=255
    fn set_led_duty(&mut self, duty: u8);

    /// Start a beep pattern: frequency selector, repeat count, beep and
    /// pause lengths in tenths of a second.
    fn start_beep(&mut self, freq_sel: u8, count: u8, beep_tenths: u8, pause_tenths: u8);

    /// Silence the buzzer and drop any pending pattern
    fn stop_beep(&mut self);

    /// Advance the beep pattern, called once per loop pass
    fn poll_beep(&mut self, now_ms: u32);

    /// Host power rail control
    fn drive_power(&mut self, on: bool);

    /// Auxiliary open-drain output
    fn drive_aux_output(&mut self, on: bool);

    /// Full device reset, does not return on real hardware
    fn reset_device(&mut self);

    /// Re-initialize the bus peripheral after a transport error
    fn reinit_bus(&mut self) -> Result<(), HalError>;

    /// True when the bus lines are held in a state no transaction can
    /// recover from (SDA stuck low with no clock activity)
    fn bus_stuck(&self) -> bool;

    /// Factory-programmed unique device identifier
    fn unique_id(&self) -> [u8; 12];
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Recording board for host-side tests

    use super::*;

    /// Board double that records every side effect the control loop asks
    /// for, so tests can assert on the hardware-facing behavior.
    #[derive(Default)]
    pub struct MockBoard {
        pub pwm_freq: u16,
        pub fan_duty: u8,
        pub led_duty: u8,
        pub power_on: bool,
        pub aux_on: bool,
        pub beeping: bool,
        pub beep_params: (u8, u8, u8, u8),
        pub reset_requests: u32,
        pub bus_reinits: u32,
        pub bus_stuck: bool,
        pub unique_id: [u8; 12],
    }

    impl MockBoard {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Board for MockBoard {
        fn set_pwm_frequency(&mut self, hz: u16) -> Result<u16, HalError> {
            self.pwm_freq = hz;
            Ok(hz)
        }

        fn set_fan_duty(&mut self, duty: u8) {
            self.fan_duty = duty;
        }

        fn set_led_duty(&mut self, duty: u8) {
            self.led_duty = duty;
        }

        fn start_beep(&mut self, freq_sel: u8, count: u8, beep_tenths: u8, pause_tenths: u8) {
            self.beeping = true;
            self.beep_params = (freq_sel, count, beep_tenths, pause_tenths);
        }

        fn stop_beep(&mut self) {
            self.beeping = false;
        }

        fn poll_beep(&mut self, _now_ms: u32) {}

        fn drive_power(&mut self, on: bool) {
            self.power_on = on;
        }

        fn drive_aux_output(&mut self, on: bool) {
            self.aux_on = on;
        }

        fn reset_device(&mut self) {
            self.reset_requests += 1;
        }

        fn reinit_bus(&mut self) -> Result<(), HalError> {
            self.bus_reinits += 1;
            Ok(())
        }

        fn bus_stuck(&self) -> bool {
            self.bus_stuck
        }

        fn unique_id(&self) -> [u8; 12] {
            self.unique_id
        }
    }
}
