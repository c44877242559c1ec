//! Readiness polling for the AX100.
//!
//! The device has no interrupt path in this stack; software waits for the
//! ready bit with a bounded busy-poll. The budget is a hardware contract
//! (100 attempts, 1 ms apart) so no caller can block forever, but both
//! knobs and the sleep itself are injectable for tests.

use crate::context::DeviceContext;
use std::time::Duration;

/// Poll attempts before giving up.
pub const WAIT_ATTEMPTS: u32 = 100;

/// Delay between poll attempts.
pub const WAIT_INTERVAL: Duration = Duration::from_millis(1);

/// Retry budget for a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Number of poll attempts
    pub attempts: u32,
    /// Delay between attempts
    pub interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            attempts: WAIT_ATTEMPTS,
            interval: WAIT_INTERVAL,
        }
    }
}

impl WaitPolicy {
    /// The standard budget with no inter-attempt delay. Keeps tests fast
    /// while exercising the same retry count as production.
    pub const fn immediate() -> Self {
        Self {
            attempts: WAIT_ATTEMPTS,
            interval: Duration::ZERO,
        }
    }

    /// Upper bound on the wall-clock wait.
    pub fn budget(&self) -> Duration {
        self.interval * self.attempts
    }
}

/// Poll the context's ready bit under `policy`, calling `sleep` between
/// attempts. Returns `true` as soon as ready is observed, `false` once
/// the budget is exhausted. Never blocks past `policy.budget()`.
pub fn wait_for_ready(
    ctx: &DeviceContext,
    policy: &WaitPolicy,
    mut sleep: impl FnMut(Duration),
) -> bool {
    for attempt in 0..policy.attempts {
        if ctx.is_ready() {
            return true;
        }
        tracing::trace!(attempt, "device not ready");
        sleep(policy.interval);
    }
    tracing::debug!(attempts = policy.attempts, "readiness poll budget exhausted");
    false
}

/// [`wait_for_ready`] with a real thread sleep.
pub fn wait_for_ready_blocking(ctx: &DeviceContext, policy: &WaitPolicy) -> bool {
    wait_for_ready(ctx, policy, std::thread::sleep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_chip::regs::status;

    #[test]
    fn ready_context_returns_without_sleeping() {
        let ctx = DeviceContext::simulated().unwrap();
        let mut sleeps = 0;
        assert!(wait_for_ready(&ctx, &WaitPolicy::default(), |_| sleeps += 1));
        assert_eq!(sleeps, 0);
    }

    #[test]
    fn exhausts_exactly_the_attempt_budget() {
        let mut ctx = DeviceContext::simulated().unwrap();
        ctx.set_status(status::BUSY);

        let mut sleeps = 0u32;
        assert!(!wait_for_ready(&ctx, &WaitPolicy::default(), |_| sleeps += 1));
        assert_eq!(sleeps, WAIT_ATTEMPTS);
    }

    #[test]
    fn budget_is_bounded() {
        assert_eq!(WaitPolicy::default().budget(), Duration::from_millis(100));
        assert_eq!(WaitPolicy::immediate().budget(), Duration::ZERO);
    }
}
