use std::time::Duration;

/// Exponential backoff with a configurable base, capped, per §4.1: "Retry
/// policy: exponential with a configurable base, capped."
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            cap: Duration::from_secs(5 * 60),
        }
    }
}

impl BackoffPolicy {
    /// `attempts` is the 1-based attempt count that just failed.
    pub fn delay_for(&self, attempts: i32) -> Duration {
        let attempts = attempts.max(1) as u32;
        let factor = 2u64.saturating_pow(attempts.saturating_sub(1));
        let millis = self.base.as_millis() as u64;
        let delay_millis = millis.saturating_mul(factor);
        let delay = Duration::from_millis(delay_millis);
        delay.min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_exponentially_until_cap() {
        let policy = BackoffPolicy {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(10),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        // Would be 16s uncapped; must clamp to the 10s cap.
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
        assert_eq!(policy.delay_for(20), Duration::from_secs(10));
    }
}
