use rand::{distributions::WeightedIndex, prelude::*};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("Input weights list is empty, cannot perform sampling")]
    EmptyWeights,
    #[error("Failed to create weighted distribution: {source}")]
    DistributionError {
        #[from]
        source: rand::distributions::WeightedError,
    },
}

/// Draws an index with probability proportional to its weight.
#[instrument(level = "trace", skip_all, fields(n = weights.len()))]
pub fn weighted_sample(weights: &[f64], rng: &mut impl Rng) -> Result<usize, SamplingError> {
    if weights.is_empty() {
        return Err(SamplingError::EmptyWeights);
    }
    let dist = WeightedIndex::new(weights)?;
    Ok(dist.sample(rng))
}

/// Number of sites a single mutation event touches.
///
/// `weights[i]` is the relative weight of mutating `i + 1` sites. Unusable weights fall back to
/// a single site.
pub fn number_of_sites_to_mutate(weights: &[f64], rng: &mut impl Rng) -> usize {
    match weighted_sample(weights, rng) {
        Ok(index) => index + 1,
        Err(e) => {
            tracing::warn!(
                "Invalid multi-site mutation weights ({}); mutating a single site.",
                e
            );
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn weighted_sample_never_picks_zero_weight() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..200 {
            assert_eq!(weighted_sample(&[0.0, 3.0, 0.0], &mut rng).unwrap(), 1);
        }
    }

    #[test]
    fn weighted_sample_rejects_bad_input() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        assert!(matches!(
            weighted_sample(&[], &mut rng),
            Err(SamplingError::EmptyWeights)
        ));
        assert!(matches!(
            weighted_sample(&[0.0, 0.0], &mut rng),
            Err(SamplingError::DistributionError { .. })
        ));
    }

    #[test]
    fn site_count_is_one_based() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        assert_eq!(number_of_sites_to_mutate(&[1.0], &mut rng), 1);
        assert_eq!(number_of_sites_to_mutate(&[0.0, 0.0, 5.0], &mut rng), 3);
        assert_eq!(number_of_sites_to_mutate(&[], &mut rng), 1);
    }
}
