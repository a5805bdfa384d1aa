use crate::types::Coordinates;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Randomness handed to adapters that sample rows or invent placeholder points.
///
/// Production uses entropy; tests use `seeded` so sampling is reproducible.
/// The lock is only held for the duration of a single draw.
#[derive(Debug)]
pub struct SharedRng {
    inner: Mutex<StdRng>,
}

impl SharedRng {
    pub fn from_entropy() -> Self {
        Self {
            inner: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// `amount` distinct indices out of `0..len`, ascending. Every subset is
    /// equally likely, so a capped feed is never just its first rows.
    pub fn sample_indices(&self, len: usize, amount: usize) -> Vec<usize> {
        if amount >= len {
            return (0..len).collect();
        }
        let mut picked = {
            let mut rng = self.lock();
            rand::seq::index::sample(&mut *rng, len, amount).into_vec()
        };
        picked.sort_unstable();
        picked
    }

    /// A uniformly random point anywhere on the map.
    pub fn point(&self) -> Coordinates {
        let mut rng = self.lock();
        loop {
            let lng = rng.gen_range(-180.0..=180.0);
            let lat = rng.gen_range(-90.0..=90.0);
            if let Some(c) = Coordinates::new(lng, lat) {
                return c;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StdRng> {
        // A poisoned RNG is still a usable RNG
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SharedRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}
