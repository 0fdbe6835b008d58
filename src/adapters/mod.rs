//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                 |
//! |----------------|--------------------|-----------------------------|
//! | `hardware`     | HealthSensorPort   | ESP32 ADC1                  |
//! |                | ClockPort          | (via `time`)                |
//! |                | WatchdogPort       | Task watchdog (TWDT)        |
//! |                | ResetCausePort     | `esp_reset_reason()`        |
//! |                | DelayNs            | FreeRTOS / ROM delay        |
//! | `log_sink`     | ReportSink         | Serial log output           |
//! | `nvs`          | ConfigPort         | NVS / in-memory store       |
//! |                | NvStoragePort      | NVS blob + RAM mirror       |
//! | `time`         | ClockPort          | ESP32 system timer          |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
