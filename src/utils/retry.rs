use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use crate::error::FailureReason;

/// Per-file retry budget applied by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Extra attempts after a `rate_limited` failure
    pub max_rate_limit_retries: u32,
    /// Extra attempts after a `network_error` or `timeout`
    pub max_network_retries: u32,
    /// First back-off delay in milliseconds, doubled on every attempt
    pub base_delay_ms: u64,
    /// Upper bound for a single back-off delay in milliseconds
    pub max_delay_ms: u64,
    /// Adds up to 10% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 2,
            max_network_retries: 1,
            base_delay_ms: 2_000,
            max_delay_ms: 60_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_rate_limit_retries: 0,
            max_network_retries: 0,
            ..Self::default()
        }
    }

    /// Number of extra attempts allowed for a failure class
    pub fn budget_for(&self, reason: FailureReason) -> u32 {
        match reason {
            FailureReason::RateLimited => self.max_rate_limit_retries,
            r if r.is_network() => self.max_network_retries,
            _ => 0,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    ///
    /// Exponential in `attempt`, never above `max_delay_ms`; a server hint
    /// wins when it is longer than the computed delay.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let computed = self.base_delay_ms.saturating_mul(1u64 << exp);
        let mut delay = Duration::from_millis(computed.min(self.max_delay_ms));

        if let Some(hint) = hint {
            delay = delay.max(hint);
        }
        delay = delay.min(Duration::from_millis(self.max_delay_ms));

        if self.jitter && !delay.is_zero() {
            let spread = delay.as_millis() as u64 / 10;
            if spread > 0 {
                delay += Duration::from_millis(rand::thread_rng().gen_range(0..=spread));
            }
        }
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_delay_doubles() {
        let policy = no_jitter();
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2, None), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3, None), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = no_jitter();
        assert_eq!(policy.delay_for(12, None), Duration::from_secs(60));
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(600))),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_hint_wins_when_longer() {
        let policy = no_jitter();
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
        assert_eq!(
            policy.delay_for(3, Some(Duration::from_secs(1))),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let policy = RetryPolicy::default();
        for _ in 0..20 {
            let d = policy.delay_for(1, None);
            assert!(d >= Duration::from_secs(2) && d <= Duration::from_millis(2_200));
        }
    }

    #[test]
    fn test_budget_per_reason() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.budget_for(FailureReason::RateLimited), 2);
        assert_eq!(policy.budget_for(FailureReason::Timeout), 1);
        assert_eq!(policy.budget_for(FailureReason::NetworkError), 1);
        assert_eq!(policy.budget_for(FailureReason::AuthenticationError), 0);
        assert_eq!(RetryPolicy::none().budget_for(FailureReason::RateLimited), 0);
    }
}
