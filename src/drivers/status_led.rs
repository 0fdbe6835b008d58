//! Heartbeat LED driver.
//!
//! A single GPIO pulsed once per loop iteration.  Implements
//! [`embedded_hal::digital::OutputPin`] so the runtime drives it without
//! knowing the pin number.
//!
//! On ESP-IDF: writes the pin through hw_init.  On host/test: tracks
//! state in-memory only.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::drivers::hw_init;

pub struct HeartbeatLed {
    gpio: i32,
    lit: bool,
    pulses: u32,
}

impl HeartbeatLed {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            lit: false,
            pulses: 0,
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Rising edges since construction (wrapping).
    pub fn pulses(&self) -> u32 {
        self.pulses
    }
}

impl ErrorType for HeartbeatLed {
    type Error = Infallible;
}

impl OutputPin for HeartbeatLed {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        hw_init::gpio_write(self.gpio, true);
        if !self.lit {
            self.pulses = self.pulses.wrapping_add(1);
        }
        self.lit = true;
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        hw_init::gpio_write(self.gpio, false);
        self.lit = false;
        Ok(())
    }
}
