//! Two-tier error model.
//!
//! Logic faults indicate a bug in the core (a broken invariant) and are
//! always unrecoverable. Workload conditions (faults, deferrals,
//! non-convergence) are never represented as errors: they are ordinary
//! state transitions handled by the event handlers themselves. The single
//! exception is [`SimError::IntervalTooBig`], the one condition a caller
//! can legitimately hit and recover from by choosing a smaller window.

use thiserror::Error;

/// Errors raised by the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// A core invariant was violated. This is always a bug, never a
    /// workload condition; callers should not attempt to recover from it.
    #[error("logic fault: {0}")]
    LogicFault(String),

    /// The statistics window requested from [`crate::trace::StatTrace`] is
    /// larger than the admissible interval of the trace.
    #[error("requested window of {window} exceeds admissible interval of {admissible}")]
    IntervalTooBig { window: i64, admissible: i64 },

    /// A config file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SimError>;

/// Aborts the process with a descriptive message. Used at every point the
/// source treats an invariant violation as an assertion failure: a
/// planner double-booking, a missing app in a terminal snapshot, a rate
/// epoch that drains more bytes than an app has left. These are bugs, so
/// they never return through `Result` — they panic immediately with
/// context attached, the same way `assert()` does in the original driver.
#[macro_export]
macro_rules! logic_fault {
    ($($arg:tt)*) => {
        panic!("logic fault: {}", format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_too_big_formats() {
        let e = SimError::IntervalTooBig {
            window: 100,
            admissible: 40,
        };
        assert!(e.to_string().contains("100"));
        assert!(e.to_string().contains("40"));
    }
}
