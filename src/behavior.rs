use crate::config::ScrollConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Which configured wait range a sample draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    Scroll,
    LoadMore,
}

/// Randomized timing and distance policy for the scroll loop.
///
/// All sampling goes through one owned RNG so a run can be made fully
/// deterministic by seeding it.
pub struct Behavior {
    rng: StdRng,
}

/// Probability of an extra human-like pause per iteration.
pub const PAUSE_PROBABILITY: f64 = 0.10;

const PAUSE_MIN_MS: u64 = 500;
const PAUSE_MAX_MS: u64 = 2000;

impl Behavior {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform integer in `[min, max]`.
    pub fn random_in_range(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    /// Sample a scroll distance from the configured range.
    pub fn scroll_amount(&mut self, cfg: &ScrollConfig) -> i64 {
        self.random_in_range(cfg.scroll_amount.min as u64, cfg.scroll_amount.max as u64) as i64
    }

    /// Sample a wait from the range the given kind maps to.
    pub fn wait_time(&mut self, cfg: &ScrollConfig, kind: WaitKind) -> u64 {
        let range = match kind {
            WaitKind::Scroll => cfg.wait_after_scroll,
            WaitKind::LoadMore => cfg.load_more_click_delay,
        };
        self.random_in_range(range.min, range.max)
    }

    /// Bernoulli trial.
    pub fn should_pause(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }

    pub fn pause_duration(&mut self) -> u64 {
        self.random_in_range(PAUSE_MIN_MS, PAUSE_MAX_MS)
    }

    /// `base` scaled by a uniform factor in `[1 - pct, 1 + pct]`, rounded.
    pub fn jitter(&mut self, base: u64, pct: f64) -> u64 {
        let pct = pct.clamp(0.0, 1.0);
        let factor = self.rng.gen_range((1.0 - pct)..=(1.0 + pct));
        (base as f64 * factor).round() as u64
    }
}

impl Default for Behavior {
    fn default() -> Self {
        Self::new()
    }
}
