//! Simulated time: a signed microsecond counter, newtype-wrapped so it can
//! never be confused with a plain byte count or node index.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Microseconds per simulated second.
pub const TIME_UNIT: i64 = 1000;

/// Sentinel for "not yet scheduled".
pub const UNDEFINED: SimTime = SimTime(i64::MIN);

/// A point (or duration) in simulated time, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(pub i64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub fn is_defined(self) -> bool {
        self != UNDEFINED
    }

    /// Convert a duration in whole seconds to simulated time.
    pub fn from_secs(secs: f64) -> SimTime {
        SimTime((secs * TIME_UNIT as f64).round() as i64)
    }

    /// Convert this duration back to seconds, for reporting.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / TIME_UNIT as f64
    }

    pub fn max(self, other: SimTime) -> SimTime {
        if self >= other {
            self
        } else {
            other
        }
    }

    pub fn min(self, other: SimTime) -> SimTime {
        if self <= other {
            self
        } else {
            other
        }
    }

    /// Saturating subtraction, clamped at zero. Used anywhere a remaining
    /// quantity must never go negative because of rounding.
    pub fn saturating_sub(self, other: SimTime) -> SimTime {
        if self.0 <= other.0 {
            SimTime::ZERO
        } else {
            SimTime(self.0 - other.0)
        }
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == UNDEFINED {
            write!(f, "undef")
        } else {
            write!(f, "{:.3}s", self.as_secs_f64())
        }
    }
}

impl Add for SimTime {
    type Output = SimTime;
    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        self.0 += rhs.0;
    }
}

impl Sub for SimTime {
    type Output = SimTime;
    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 - rhs.0)
    }
}

impl SubAssign for SimTime {
    fn sub_assign(&mut self, rhs: SimTime) {
        self.0 -= rhs.0;
    }
}
