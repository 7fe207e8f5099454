//! Exponential backoff for reconnection attempts.

use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff as _;

use super::config::ReconnectConfig;

/// Computes how long to wait before a reconnection attempt.
///
/// The policy holds no counter of its own: the caller passes the number of the attempt about to
/// be made (starting at `1`) and gets back
/// `min(initial_backoff * backoff_multiplier^(attempt - 1), max_backoff)`, optionally jittered.
///
/// ```
/// use std::time::Duration;
///
/// use careline_realtime::ws::ReconnectionPolicy;
/// use careline_realtime::ws::config::ReconnectConfig;
///
/// let policy = ReconnectionPolicy::new(ReconnectConfig::default());
///
/// assert_eq!(policy.base_delay(1), Duration::from_secs(1));
/// assert_eq!(policy.base_delay(2), Duration::from_secs(2));
/// assert_eq!(policy.base_delay(3), Duration::from_secs(4));
/// assert_eq!(policy.base_delay(20), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectionPolicy {
    config: ReconnectConfig,
}

impl ReconnectionPolicy {
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self { config }
    }

    /// Upper bound on consecutive attempts, if any.
    #[must_use]
    pub const fn max_attempts(&self) -> Option<u32> {
        self.config.max_attempts
    }

    /// Whether `attempt` lies beyond the configured cap and no retry should be scheduled.
    #[must_use]
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        self.config.max_attempts.is_some_and(|max| attempt > max)
    }

    /// Delay for `attempt` without jitter. Attempt `0` is treated as the first attempt.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if self.config.initial_backoff.is_zero() {
            return Duration::ZERO;
        }

        self.schedule(attempt)
            .current_interval
            .min(self.config.max_backoff)
    }

    /// Delay for `attempt` with the configured jitter applied, never above `max_backoff`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let cap = self.config.max_backoff;
        if self.config.initial_backoff.is_zero() {
            return Duration::ZERO;
        }

        self.schedule(attempt)
            .next_backoff()
            .map_or(cap, |delay| delay.min(cap))
    }

    /// A fresh backoff advanced so that its next interval is the one for `attempt`.
    fn schedule(&self, attempt: u32) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff::from(self.config);

        for _ in 1..attempt {
            let previous = backoff.current_interval;
            if previous >= backoff.max_interval {
                break;
            }
            let _skipped = backoff.next_backoff();
            // A multiplier of 1 never grows the interval
            if backoff.current_interval <= previous {
                break;
            }
        }

        backoff
    }
}

impl From<ReconnectConfig> for ReconnectionPolicy {
    fn from(config: ReconnectConfig) -> Self {
        Self::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial: Duration, max: Duration, multiplier: f64) -> ReconnectionPolicy {
        ReconnectionPolicy::new(ReconnectConfig {
            max_attempts: None,
            initial_backoff: initial,
            max_backoff: max,
            backoff_multiplier: multiplier,
            jitter: 0.0,
        })
    }

    #[test]
    fn doubles_from_one_second() {
        let policy = policy(Duration::from_secs(1), Duration::from_secs(30), 2.0);

        let delays: Vec<_> = (1..=3).map(|attempt| policy.delay(attempt)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[test]
    fn monotonic_until_cap_then_constant() {
        let policy = policy(Duration::from_millis(300), Duration::from_secs(10), 1.7);

        let mut previous = Duration::ZERO;
        for attempt in 1..64 {
            let delay = policy.base_delay(attempt);
            assert!(delay >= previous, "attempt {attempt}: {delay:?} < {previous:?}");
            assert!(delay <= Duration::from_secs(10));
            previous = delay;
        }
        assert_eq!(policy.base_delay(63), Duration::from_secs(10));
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn attempt_zero_behaves_as_first() {
        let policy = policy(Duration::from_secs(1), Duration::from_secs(30), 2.0);
        assert_eq!(policy.base_delay(0), policy.base_delay(1));
    }

    #[test]
    fn jitter_stays_within_twenty_percent_and_cap() {
        let policy = ReconnectionPolicy::new(ReconnectConfig::default());

        for _ in 0..200 {
            let delay = policy.delay(3);
            assert!(
                delay >= Duration::from_millis(3199) && delay <= Duration::from_millis(4801),
                "jittered delay out of range: {delay:?}"
            );
            assert!(policy.delay(30) <= Duration::from_secs(30), "cap exceeded");
        }
    }

    #[test]
    fn nan_jitter_falls_back_to_base_delay() {
        let mut config = ReconnectConfig::default();
        config.jitter = f64::NAN;
        let policy = ReconnectionPolicy::new(config);

        for attempt in 1..=6 {
            assert_eq!(policy.delay(attempt), policy.base_delay(attempt));
        }
    }

    #[test]
    fn zero_initial_backoff_never_waits() {
        let policy = policy(Duration::ZERO, Duration::from_secs(30), 2.0);

        assert_eq!(policy.base_delay(1), Duration::ZERO);
        assert_eq!(policy.base_delay(60), Duration::ZERO);
        assert_eq!(policy.delay(u32::MAX), Duration::ZERO);
    }

    #[test]
    fn flat_multiplier_keeps_initial_delay() {
        let policy = policy(Duration::from_millis(250), Duration::from_secs(30), 1.0);

        assert_eq!(policy.base_delay(u32::MAX), Duration::from_millis(250));
        assert_eq!(policy.delay(1_000), Duration::from_millis(250));
    }

    #[test]
    fn exhaustion_follows_max_attempts() {
        let mut config = ReconnectConfig::default();
        assert!(!ReconnectionPolicy::new(config).is_exhausted(u32::MAX));

        config.max_attempts = Some(3);
        let policy = ReconnectionPolicy::new(config);
        assert!(!policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
    }
}
