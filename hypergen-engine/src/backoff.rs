//! ABOUTME: Retry backoff/jitter strategies for the Step Executor's retry loop
//! ABOUTME: Defaults mirror spec.md §5(b): exponential 200ms * 2^n, full jitter, 3 attempts

use std::time::Duration;

use rand::Rng;

/// How the base delay grows with each retry attempt.
#[derive(Debug, Clone)]
pub enum BackoffStrategy {
    Fixed(Duration),
    Linear { base: Duration, increment: Duration },
    Exponential { base: Duration, multiplier: f64, max: Duration },
    Fibonacci { base: Duration, max: Duration },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(200),
            multiplier: 2.0,
            max: Duration::from_secs(30),
        }
    }
}

/// How randomness is layered on top of the base delay, to avoid a
/// thundering herd of retrying steps.
#[derive(Debug, Clone, Default)]
pub enum JitterStrategy {
    #[default]
    None,
    Full,
    Equal,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    pub jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::default(),
            jitter: JitterStrategy::Full,
        }
    }
}

fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let next = a + b;
        a = b;
        b = next;
    }
    a.max(1)
}

impl RetryPolicy {
    /// Delay before retry attempt number `attempt` (0-indexed: the delay
    /// before the first retry is `attempt == 0`).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_delay = match &self.backoff {
            BackoffStrategy::Fixed(d) => *d,
            BackoffStrategy::Linear { base, increment } => *base + (*increment * attempt),
            BackoffStrategy::Exponential { base, multiplier, max } => {
                let delay_ms = (base.as_millis() as f64 * multiplier.powi(attempt as i32)).min(max.as_millis() as f64);
                Duration::from_millis(delay_ms as u64)
            }
            BackoffStrategy::Fibonacci { base, max } => {
                let delay_ms = (base.as_millis() as u64).saturating_mul(fibonacci(attempt));
                Duration::from_millis(delay_ms.min(max.as_millis() as u64))
            }
        };

        match self.jitter {
            JitterStrategy::None => base_delay,
            JitterStrategy::Full => {
                let max_ms = base_delay.as_millis() as u64;
                let jittered = if max_ms == 0 { 0 } else { rand::thread_rng().gen_range(0..=max_ms) };
                Duration::from_millis(jittered)
            }
            JitterStrategy::Equal => {
                let half = base_delay.as_millis() as u64 / 2;
                let extra = if half == 0 { 0 } else { rand::thread_rng().gen_range(0..=half) };
                Duration::from_millis(half + extra)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_before_jitter_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff: BackoffStrategy::Exponential {
                base: Duration::from_millis(200),
                multiplier: 2.0,
                max: Duration::from_secs(30),
            },
            jitter: JitterStrategy::None,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(200));
        assert_eq!(policy.delay_for(1), Duration::from_millis(400));
        assert_eq!(policy.delay_for(2), Duration::from_millis(800));
    }

    #[test]
    fn exponential_backoff_is_capped_at_max() {
        let policy = RetryPolicy {
            max_attempts: 10,
            backoff: BackoffStrategy::Exponential {
                base: Duration::from_millis(200),
                multiplier: 2.0,
                max: Duration::from_millis(500),
            },
            jitter: JitterStrategy::None,
        };
        assert_eq!(policy.delay_for(8), Duration::from_millis(500));
    }

    #[test]
    fn full_jitter_never_exceeds_base_delay() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: BackoffStrategy::Fixed(Duration::from_millis(1000)),
            jitter: JitterStrategy::Full,
        };
        for _ in 0..50 {
            assert!(policy.delay_for(0) <= Duration::from_millis(1000));
        }
    }
}
