use std::cmp::Ordering;
use std::fmt;

use crate::errors::{ReactorError, Result};

/// An instant on the virtual timeline, in seconds since the clock was created.
///
/// Always finite and non-negative, so it can be totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VirtualTime(f64);

impl VirtualTime {
    pub const ZERO: VirtualTime = VirtualTime(0.0);

    pub fn seconds(self) -> f64 {
        self.0
    }

    /// `self + delta`. Callers validate `delta` first.
    pub(crate) fn after(self, delta: f64) -> VirtualTime {
        VirtualTime(self.0 + delta)
    }

    /// Seconds from `earlier` to `self`, clamped at zero.
    pub fn saturating_since(self, earlier: VirtualTime) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }
}

impl Eq for VirtualTime {}

impl PartialOrd for VirtualTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VirtualTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

fn is_valid_span(seconds: f64) -> bool {
    seconds.is_finite() && seconds >= 0.0
}

/// Validate a scheduling delay.
pub fn check_delay(delay: f64) -> Result<f64> {
    if is_valid_span(delay) {
        Ok(delay)
    } else {
        Err(ReactorError::InvalidDelay(delay))
    }
}

/// Validate an advancement step.
pub fn check_advance(by: f64) -> Result<f64> {
    if is_valid_span(by) {
        Ok(by)
    } else {
        Err(ReactorError::InvalidAdvance(by))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_and_non_finite_spans_are_rejected() {
        assert!(matches!(check_delay(-0.5), Err(ReactorError::InvalidDelay(_))));
        assert!(matches!(check_delay(f64::NAN), Err(ReactorError::InvalidDelay(_))));
        assert!(matches!(
            check_advance(f64::INFINITY),
            Err(ReactorError::InvalidAdvance(_))
        ));
        assert_eq!(check_delay(0.0).unwrap(), 0.0);
        assert_eq!(check_advance(2.5).unwrap(), 2.5);
    }

    #[test]
    fn virtual_time_orders_numerically() {
        let a = VirtualTime::ZERO.after(3.0);
        let b = VirtualTime::ZERO.after(5.0);
        assert!(a < b);
        assert_eq!(b.saturating_since(a), 2.0);
        assert_eq!(a.saturating_since(b), 0.0);
    }
}
