use serde::{Deserialize, Serialize};

/// What happens to the rest of the route once a waypoint exhausts its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    #[default]
    Skip,
    AbortRoute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Re-submits allowed after the first attempt.
    pub max_retries: u32,
    pub on_exhausted: ExhaustionPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-submit the same waypoint as attempt number `next_attempt`.
    Retry { next_attempt: u32 },
    SkipWaypoint,
    AbortRoute,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, on_exhausted: ExhaustionPolicy) -> Self {
        Self {
            max_retries,
            on_exhausted,
        }
    }

    /// `attempts_made` counts the attempt that just failed.
    pub fn decide(&self, attempts_made: u32) -> RetryDecision {
        let retries_used = attempts_made.saturating_sub(1);
        if retries_used < self.max_retries {
            return RetryDecision::Retry {
                next_attempt: attempts_made + 1,
            };
        }
        match self.on_exhausted {
            ExhaustionPolicy::Skip => RetryDecision::SkipWaypoint,
            ExhaustionPolicy::AbortRoute => RetryDecision::AbortRoute,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1, ExhaustionPolicy::Skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_retry_then_skip() {
        let policy = RetryPolicy::new(1, ExhaustionPolicy::Skip);
        assert_eq!(policy.decide(1), RetryDecision::Retry { next_attempt: 2 });
        assert_eq!(policy.decide(2), RetryDecision::SkipWaypoint);
    }

    #[test]
    fn zero_retries_fails_on_first_abort() {
        let policy = RetryPolicy::new(0, ExhaustionPolicy::Skip);
        assert_eq!(policy.decide(1), RetryDecision::SkipWaypoint);
    }

    #[test]
    fn abort_route_policy_is_reported_on_exhaustion() {
        let policy = RetryPolicy::new(2, ExhaustionPolicy::AbortRoute);
        assert_eq!(policy.decide(1), RetryDecision::Retry { next_attempt: 2 });
        assert_eq!(policy.decide(2), RetryDecision::Retry { next_attempt: 3 });
        assert_eq!(policy.decide(3), RetryDecision::AbortRoute);
    }

    #[test]
    fn retries_never_exceed_maximum() {
        for max in 0..5 {
            let policy = RetryPolicy::new(max, ExhaustionPolicy::Skip);
            let mut attempts = 1;
            while let RetryDecision::Retry { next_attempt } = policy.decide(attempts) {
                attempts = next_attempt;
            }
            assert_eq!(attempts - 1, max);
        }
    }

    #[test]
    fn policy_names_deserialize_from_snake_case() {
        let p: ExhaustionPolicy = serde_json::from_str("\"abort_route\"").unwrap();
        assert_eq!(p, ExhaustionPolicy::AbortRoute);
    }
}
