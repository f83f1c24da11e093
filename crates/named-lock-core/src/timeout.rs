//! Acquisition timeout modes.

use std::time::Duration;

/// How long `acquire_lock` keeps trying before giving up.
///
/// Converts from `Option<Duration>` the same way the rest of the API treats
/// timeouts:
///
/// - `None` - wait indefinitely
/// - `Some(Duration::ZERO)` - a single attempt
/// - `Some(duration)` - poll until `duration` has elapsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AcquireTimeout {
    /// Retry until the lock is granted.
    #[default]
    Indefinite,
    /// Exactly one attempt, no waiting.
    Immediate,
    /// Retry until the elapsed time reaches the bound.
    Bounded(Duration),
}

impl AcquireTimeout {
    pub fn is_indefinite(&self) -> bool {
        matches!(self, Self::Indefinite)
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Immediate)
    }

    /// Upper bound on waiting, `None` when indefinite.
    pub fn limit(&self) -> Option<Duration> {
        match self {
            Self::Indefinite => None,
            Self::Immediate => Some(Duration::ZERO),
            Self::Bounded(d) => Some(*d),
        }
    }

    /// Returns true once no further attempt should be made.
    ///
    /// Checked after a failed attempt, so `Immediate` is exhausted right away.
    pub fn is_exhausted(&self, elapsed: Duration) -> bool {
        match self.limit() {
            None => false,
            Some(limit) => elapsed >= limit,
        }
    }
}

impl From<Option<Duration>> for AcquireTimeout {
    fn from(timeout: Option<Duration>) -> Self {
        match timeout {
            None => Self::Indefinite,
            Some(d) => d.into(),
        }
    }
}

impl From<Duration> for AcquireTimeout {
    fn from(timeout: Duration) -> Self {
        if timeout.is_zero() {
            Self::Immediate
        } else {
            Self::Bounded(timeout)
        }
    }
}
