//! Simulated per-page processing time.

use std::time::Duration;

use rand::Rng;

/// How long a worker spends on a page before recording it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayPolicy {
    Fixed(Duration),
    /// Uniform draw in `[0, max]`.
    Random { max: Duration },
}

impl DelayPolicy {
    pub const NONE: Self = Self::Fixed(Duration::ZERO);

    pub fn sample(&self) -> Duration {
        match *self {
            Self::Fixed(d) => d,
            Self::Random { max } if max.is_zero() => Duration::ZERO,
            Self::Random { max } => {
                let max_millis = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
                let millis = rand::thread_rng().gen_range(0..=max_millis);
                Duration::from_millis(millis)
            }
        }
    }

    /// Sleep for one sampled delay. A zero delay returns without yielding.
    pub async fn wait(&self) {
        let d = self.sample();
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self::NONE
    }
}
