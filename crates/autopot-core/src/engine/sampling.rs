use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Caps a selection by a fixed-seed shuffle and truncation.
///
/// Deterministic for a given seed, so restarted and repeated runs pick the
/// same subset. Inputs at or under the cap are returned unchanged, in their
/// original order.
pub fn capped_sample<T>(mut items: Vec<T>, cap: usize, seed: u64) -> Vec<T> {
    if items.len() <= cap {
        return items;
    }
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);
    items.truncate(cap);
    items
}
