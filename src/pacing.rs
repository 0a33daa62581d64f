use crate::config::PacingConfig;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

/// Randomized delay between consecutive post visits.
///
/// The random source is injected so tests can pin a seed or disable the
/// delay entirely.
pub struct Pacer {
    min_ms: u64,
    max_ms: u64,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl Pacer {
    pub fn new(min: Duration, max: Duration, rng: Box<dyn RngCore + Send>) -> Self {
        let min_ms = min.as_millis() as u64;
        let max_ms = (max.as_millis() as u64).max(min_ms);
        Self {
            min_ms,
            max_ms,
            rng: Mutex::new(rng),
        }
    }

    pub fn from_config(config: &PacingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(
            Duration::from_millis(config.post_delay_min_ms),
            Duration::from_millis(config.post_delay_max_ms),
            Box::new(rng),
        )
    }

    pub fn seeded(min: Duration, max: Duration, seed: u64) -> Self {
        Self::new(min, max, Box::new(StdRng::seed_from_u64(seed)))
    }

    /// Never waits.
    pub fn disabled() -> Self {
        Self::seeded(Duration::ZERO, Duration::ZERO, 0)
    }

    pub fn next_delay(&self) -> Duration {
        if self.max_ms == 0 {
            return Duration::ZERO;
        }
        let ms = match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(self.min_ms..=self.max_ms),
            Err(poisoned) => poisoned.into_inner().gen_range(self.min_ms..=self.max_ms),
        };
        Duration::from_millis(ms)
    }

    pub async fn pause(&self) -> Duration {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        delay
    }
}
