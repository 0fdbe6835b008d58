//! GPIO / ADC assignments for the monitor board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Health inputs, analog (ADC1)
// ---------------------------------------------------------------------------

/// Monitored sensor output.  ADC1 channel 4 (GPIO 5 on ESP32-S3).
pub const SENSOR_ADC_CHANNEL: u32 = 4;
/// Supply rail through a resistive divider.  ADC1 channel 5 (GPIO 6 on ESP32-S3).
pub const BATTERY_ADC_CHANNEL: u32 = 5;

/// The ESP32-S3 converts at 12 bits; readings are shifted down by this
/// many bits so health limits stay on the 10-bit reference scale.
pub const ADC_SCALE_SHIFT: u32 = 2;

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

/// Digital output: heartbeat LED (active HIGH).
pub const HEARTBEAT_LED_GPIO: i32 = 13;
