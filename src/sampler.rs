use rand::SeedableRng;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;

use crate::error::DatasetError;

/// Picks `k` items uniformly without replacement.
///
/// `k == 0` returns the population unchanged. Otherwise the population is
/// sorted first, so with a seed the subset depends only on the set of items,
/// the seed and `k`, never on enumeration order. The result is sorted.
pub fn sample<T: Ord + Clone>(
    source_id: &str,
    population: &[T],
    k: usize,
    seed: Option<u64>,
) -> Result<Vec<T>, DatasetError> {
    if k == 0 {
        return Ok(population.to_vec());
    }

    let mut canonical = population.to_vec();
    canonical.sort();
    canonical.dedup();

    if k > canonical.len() {
        return Err(DatasetError::InsufficientData {
            source_id: source_id.to_string(),
            requested: k,
            available: canonical.len(),
        });
    }

    let mut rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let mut picked = index::sample(&mut rng, canonical.len(), k).into_vec();
    picked.sort_unstable();
    Ok(picked.into_iter().map(|i| canonical[i].clone()).collect())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn stems(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn zero_keeps_everything() {
        let population = stems(&["b", "a", "c"]);
        assert_eq!(sample("t", &population, 0, Some(1)).unwrap(), population);
    }

    #[test]
    fn oversized_request_fails() {
        let err = sample("comofod", &stems(&["a", "b"]), 3, Some(42)).unwrap_err();
        assert_matches!(
            err,
            DatasetError::InsufficientData {
                requested: 3,
                available: 2,
                ..
            }
        );
    }

    #[test]
    fn seeded_sampling_ignores_input_order() {
        let forward = stems(&["001", "002", "003", "004", "005", "006"]);
        let mut backward = forward.clone();
        backward.reverse();
        let a = sample("t", &forward, 3, Some(42)).unwrap();
        let b = sample("t", &backward, 3, Some(42)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn exact_size_returns_population() {
        let population = stems(&["x", "y"]);
        assert_eq!(sample("t", &population, 2, None).unwrap(), stems(&["x", "y"]));
    }

    #[test]
    fn every_item_is_reachable() {
        let population = stems(&["a", "b", "c", "d"]);
        let mut seen = std::collections::BTreeSet::new();
        for seed in 0..64 {
            for item in sample("t", &population, 1, Some(seed)).unwrap() {
                seen.insert(item);
            }
        }
        assert_eq!(seen.len(), population.len());
    }
}
