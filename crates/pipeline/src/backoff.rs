//! Exponential-backoff schedule for transient dispatch failures.

use std::time::Duration;

/// Tunable parameters for the retry backoff schedule.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
    /// Factor by which the delay grows per failed attempt.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
        }
    }
}

/// Delay before retry number `attempt` (1-based).
///
/// Attempt 1 waits `initial_delay`; each further attempt multiplies the
/// delay, clamped to [`RetryConfig::max_delay`].
pub fn delay_for_attempt(attempt: u32, config: &RetryConfig) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let ms = config.initial_delay.as_millis() as f64 * config.multiplier.powi(exponent as i32);
    Duration::from_millis(ms as u64).min(config.max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_uses_initial_delay() {
        let config = RetryConfig::default();
        assert_eq!(delay_for_attempt(1, &config), Duration::from_secs(2));
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let config = RetryConfig::default();
        assert_eq!(delay_for_attempt(2, &config), Duration::from_secs(4));
        assert_eq!(delay_for_attempt(3, &config), Duration::from_secs(8));
    }

    #[test]
    fn delay_clamps_at_max() {
        let config = RetryConfig::default();
        // 2 * 2^9 = 1024s, past the 300s cap.
        assert_eq!(delay_for_attempt(10, &config), Duration::from_secs(300));
    }

    #[test]
    fn full_backoff_sequence() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
        };
        let expected = [2, 4, 8, 16, 32, 64, 128, 256, 300, 300];
        for (i, &secs) in expected.iter().enumerate() {
            assert_eq!(delay_for_attempt(i as u32 + 1, &config).as_secs(), secs);
        }
    }

    #[test]
    fn custom_multiplier() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 3.0,
        };
        assert_eq!(delay_for_attempt(3, &config), Duration::from_secs(9));
    }
}
