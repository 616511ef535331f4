//! Fisher-Yates shuffle and bounded random sampling.
//!
//! Inputs are never mutated; every call works on a fresh copy.

use rand::Rng;

/// Default size of a "suggest some videos" sample.
pub const DEFAULT_SAMPLE: usize = 10;

/// Uniformly random permutation of `items`, using the thread RNG.
pub fn shuffle<T: Clone>(items: &[T]) -> Vec<T> {
    shuffle_with(items, &mut rand::rng())
}

/// Uniformly random permutation of `items`, using `rng`.
pub fn shuffle_with<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut out = items.to_vec();
    for i in (1..out.len()).rev() {
        let j = rng.random_range(0..=i);
        out.swap(i, j);
    }
    out
}

/// First `count` items of a fresh shuffle. `count` is clamped to the length.
pub fn sample<T: Clone>(items: &[T], count: usize) -> Vec<T> {
    sample_with(items, count, &mut rand::rng())
}

pub fn sample_with<T: Clone, R: Rng + ?Sized>(items: &[T], count: usize, rng: &mut R) -> Vec<T> {
    let mut out = shuffle_with(items, rng);
    out.truncate(count.min(items.len()));
    out
}
