//! Peripheral drivers and hardware initialisation.

pub mod hw_init;
pub mod status_led;
pub mod watchdog;
