use tokio::time::Instant;

use crate::sources::RetryPolicy;

/// Monotonic retry-not-before gate of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryGate {
    #[default]
    Open,
    Until(Instant),
    /// The source is gone for the rest of the run.
    Closed,
}

impl RetryGate {
    pub fn from_policy(policy: RetryPolicy, now: Instant) -> Self {
        match policy {
            RetryPolicy::Clear => RetryGate::Open,
            RetryPolicy::Cooldown(wait) => now
                .checked_add(wait)
                .map(RetryGate::Until)
                .unwrap_or(RetryGate::Closed),
            RetryPolicy::Never => RetryGate::Closed,
        }
    }

    pub fn allows(&self, now: Instant) -> bool {
        match self {
            RetryGate::Open => true,
            RetryGate::Until(not_before) => now >= *not_before,
            RetryGate::Closed => false,
        }
    }
}
