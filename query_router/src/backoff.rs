//! Exponential backoff with jitter.
//!
//! Trimmed down from the teacher's `backoff` crate: this version only needs to hand back a
//! single interval before the engine's one-shot executor-degradation retry (spec.md §4.5 step 8,
//! §7), so there is no unbounded retry loop here, just [`Backoff::next`].
//!
//! See <https://aws.amazon.com/blogs/architecture/exponential-backoff-and-jitter/>.

use rand::Rng;
use std::time::Duration;

/// Configuration for [`Backoff`].
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Initial backoff.
    pub init_backoff: Duration,
    /// Maximum backoff.
    pub max_backoff: Duration,
    /// Multiplier applied for each successive call to [`Backoff::next`].
    pub base: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            init_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            base: 3.,
        }
    }
}

/// Produces successive backoff intervals from a [`BackoffConfig`].
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    next_backoff_secs: f64,
}

impl Backoff {
    /// Create a new backoff generator.
    pub fn new(config: BackoffConfig) -> Self {
        let next_backoff_secs = config.init_backoff.as_secs_f64();
        Self {
            config,
            next_backoff_secs,
        }
    }

    /// Return the next backoff interval, jittered within `[0, interval]`, and advance state.
    pub fn next(&mut self) -> Duration {
        let base_secs = self.next_backoff_secs.min(self.config.max_backoff.as_secs_f64());
        let jittered_secs = rand::thread_rng().gen_range(0.0..=base_secs);
        self.next_backoff_secs = (self.next_backoff_secs * self.config.base)
            .min(self.config.max_backoff.as_secs_f64());
        Duration::from_secs_f64(jittered_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_stays_within_bounds() {
        let mut backoff = Backoff::new(BackoffConfig {
            init_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
            base: 4.0,
        });
        for _ in 0..10 {
            let interval = backoff.next();
            assert!(interval <= Duration::from_millis(100));
        }
    }
}
