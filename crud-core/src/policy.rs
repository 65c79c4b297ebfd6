use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

/// How many times, and how patiently, to retry a conflicting write
///
/// Delays grow exponentially from `initial_delay` by `factor`, capped at `max_delay`.
/// With `jitter` enabled each delay is stretched by a random amount so that competing
/// writers spread out.
///
/// `max_total_delay` bounds the sum of all delays: when the next delay would push the
/// total past it, the update gives up instead of sleeping.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Upper bound on submitted writes, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry
    ///
    /// Values below 1.0, and non-finite ones, are treated as 1.0.
    pub factor: f32,
    /// Whether to randomize delays
    pub jitter: bool,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Cap on the sum of all delays
    pub max_total_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    /// Retry up to five times in quick succession: 10ms apart, with jitter
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            factor: 1.0,
            jitter: true,
            max_delay: Duration::from_secs(60),
            max_total_delay: None,
        }
    }
}

impl RetryPolicy {
    /// A policy that allows `max_attempts` writes with the default delays
    ///
    /// A value of zero is treated as one: the write is always attempted.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// A steeper schedule for contended objects: 4 attempts at 10ms, 50ms, 250ms
    #[must_use]
    pub fn default_backoff() -> Self {
        Self {
            max_attempts: 4,
            factor: 5.0,
            ..Self::default()
        }
    }

    /// Make exactly one attempt
    #[must_use]
    pub fn never() -> Self {
        Self::new(1)
    }

    /// Set the delay before the first retry
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the multiplier applied between retries
    ///
    /// Delays never shrink: a factor below 1.0, or a non-finite one, means constant delays.
    #[must_use]
    pub fn factor(mut self, factor: f32) -> Self {
        self.factor = factor;
        self
    }

    /// Enable or disable randomized delays
    #[must_use]
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Cap any single delay
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Cap the sum of all delays
    #[must_use]
    pub fn max_total_delay(mut self, delay: Duration) -> Self {
        self.max_total_delay = Some(delay);
        self
    }

    /// The delays to wait between attempts
    ///
    /// Yields one delay fewer than `max_attempts`, since the first attempt is not delayed.
    /// Every delay, jittered or not, is at most `max_delay`.
    pub(crate) fn delays(&self) -> impl Iterator<Item = Duration> {
        let retries = self.max_attempts.max(1) - 1;
        let factor = if self.factor.is_finite() { self.factor.max(1.0) } else { 1.0 };
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_factor(factor)
            .with_max_times(retries as usize);
        let builder = if self.jitter { builder.with_jitter() } else { builder };
        // backon adds jitter on top of the capped delay
        let max_delay = self.max_delay;
        builder.build().map(move |delay| delay.min(max_delay))
    }
}
