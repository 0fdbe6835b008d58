//! Health checks.
//!
//! Pure predicates over a reading and the configured limits.  Each one
//! returns the fault it detects, or `Ok(())`.  They hold no state; the
//! [`HealthScheduler`](crate::scheduler::HealthScheduler) owns the
//! timestamps and decides the order.

use core::fmt;

use crate::config::RuntimeConfig;
use crate::error::FaultKind;

/// The checks a scheduler pass runs, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheck {
    SensorValidity,
    VoltageFloor,
    Timing,
}

impl HealthCheck {
    /// Fixed pass order.  The first failing check ends the pass.
    pub const ORDER: [HealthCheck; 3] = [Self::SensorValidity, Self::VoltageFloor, Self::Timing];
}

impl fmt::Display for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorValidity => write!(f, "sensor validity"),
            Self::VoltageFloor => write!(f, "voltage floor"),
            Self::Timing => write!(f, "timing"),
        }
    }
}

/// Thresholds the checks compare against, lifted out of [`RuntimeConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthLimits {
    pub sensor_min: i16,
    pub sensor_max: i16,
    pub voltage_floor: i16,
    pub sensor_timeout_ms: u32,
    pub loop_budget_ms: u32,
}

impl HealthLimits {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            sensor_min: config.sensor_min,
            sensor_max: config.sensor_max,
            voltage_floor: config.voltage_floor,
            sensor_timeout_ms: config.sensor_timeout_ms,
            loop_budget_ms: config.loop_budget_ms,
        }
    }

    /// Sensor reading must lie in the closed interval `[sensor_min, sensor_max]`.
    pub fn check_sensor(&self, value: i16) -> Result<(), FaultKind> {
        if (self.sensor_min..=self.sensor_max).contains(&value) {
            Ok(())
        } else {
            Err(FaultKind::InvalidSensor)
        }
    }

    /// Battery reading must not drop below the floor.  The floor itself is fine.
    pub fn check_voltage(&self, battery: i16) -> Result<(), FaultKind> {
        if battery < self.voltage_floor {
            Err(FaultKind::LowVoltage)
        } else {
            Ok(())
        }
    }

    /// Budgets are exceeded only when strictly over the limit.
    /// Sensor staleness is checked before loop duration.
    pub fn check_timing(
        &self,
        since_sensor_update_ms: u32,
        since_loop_start_ms: u32,
    ) -> Result<(), FaultKind> {
        if since_sensor_update_ms > self.sensor_timeout_ms {
            return Err(FaultKind::SensorTimeout);
        }
        if since_loop_start_ms > self.loop_budget_ms {
            return Err(FaultKind::LoopStall);
        }
        Ok(())
    }
}
