//! Reset-cause decoding.
//!
//! The only module that knows the bit layout of the reset status byte.
//! The layout follows the classic MCU status register
//! (`PORF`/`EXTRF`/`BORF`/`WDRF` in bits 0–3); board adapters translate
//! their native reset reason into these bits before handing them over.
//!
//! Several bits can be latched at once after nested resets (e.g. a
//! brown-out during a watchdog restart).  [`ResetCause::primary`] picks one
//! with a fixed priority: watchdog, brown-out, power-on, external.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FaultKind;

const POWER_ON: u8 = 1 << 0;
const EXTERNAL: u8 = 1 << 1;
const BROWN_OUT: u8 = 1 << 2;
const WATCHDOG: u8 = 1 << 3;

const KNOWN_BITS: u8 = POWER_ON | EXTERNAL | BROWN_OUT | WATCHDOG;

/// Raw reset-cause bits as captured once at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResetCause(u8);

/// Decoded, single reason for the last restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    Watchdog,
    BrownOut,
    PowerOn,
    External,
    Unknown,
}

impl ResetCause {
    /// Wrap raw register bits.  Bits outside the known set are dropped.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & KNOWN_BITS)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_kind(kind: ResetKind) -> Self {
        Self(match kind {
            ResetKind::Watchdog => WATCHDOG,
            ResetKind::BrownOut => BROWN_OUT,
            ResetKind::PowerOn => POWER_ON,
            ResetKind::External => EXTERNAL,
            ResetKind::Unknown => 0,
        })
    }

    pub const fn is_watchdog(self) -> bool {
        self.0 & WATCHDOG != 0
    }

    pub const fn is_brown_out(self) -> bool {
        self.0 & BROWN_OUT != 0
    }

    pub const fn is_power_on(self) -> bool {
        self.0 & POWER_ON != 0
    }

    pub const fn is_external(self) -> bool {
        self.0 & EXTERNAL != 0
    }

    /// The single reason reported to the operator.
    pub const fn primary(self) -> ResetKind {
        if self.is_watchdog() {
            ResetKind::Watchdog
        } else if self.is_brown_out() {
            ResetKind::BrownOut
        } else if self.is_power_on() {
            ResetKind::PowerOn
        } else if self.is_external() {
            ResetKind::External
        } else {
            ResetKind::Unknown
        }
    }

    /// Fault implied by the restart itself, if any.
    ///
    /// A watchdog expiry is never raised by software; it is only visible
    /// here, after the fact.
    pub const fn implied_fault(self) -> Option<FaultKind> {
        if self.is_watchdog() {
            Some(FaultKind::WatchdogTimeout)
        } else {
            None
        }
    }
}

impl fmt::Display for ResetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Watchdog => write!(f, "WATCHDOG"),
            Self::BrownOut => write!(f, "BROWN-OUT"),
            Self::PowerOn => write!(f, "POWER-ON"),
            Self::External => write!(f, "EXTERNAL"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl fmt::Display for ResetCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.primary(), self.0)
    }
}
