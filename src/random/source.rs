use rand::Rng;
use rand_distr::{Distribution, Gamma, Pareto};

/// The draws the exposure samplers need from a random number generator.
///
/// Every [`Rng`] implements this, so a context stream can be passed straight
/// through. Tests can implement it directly to make samplers deterministic.
pub trait RandomSource {
    /// Gamma draw with the given shape and scale. Returns NaN if either is not
    /// positive.
    fn gamma(&mut self, shape: f64, scale: f64) -> f64;

    /// Pareto draw with minimum value `min` and tail index `shape`. Returns NaN
    /// if either is not positive. An infinite `shape` always returns `min`.
    fn pareto(&mut self, min: f64, shape: f64) -> f64;

    /// `true` with probability `p`.
    ///
    /// # Panics
    ///
    /// Panics if `p` is outside `[0, 1]`.
    fn bernoulli(&mut self, p: f64) -> bool;

    /// Uniform integer in `0..n`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    fn uniform_int(&mut self, n: usize) -> usize;
}

impl<R: Rng> RandomSource for R {
    fn gamma(&mut self, shape: f64, scale: f64) -> f64 {
        Gamma::new(shape, scale).map_or(f64::NAN, |gamma| gamma.sample(self))
    }

    fn pareto(&mut self, min: f64, shape: f64) -> f64 {
        Pareto::new(min, shape).map_or(f64::NAN, |pareto| pareto.sample(self))
    }

    fn bernoulli(&mut self, p: f64) -> bool {
        self.random_bool(p)
    }

    fn uniform_int(&mut self, n: usize) -> usize {
        self.random_range(0..n)
    }
}

/// Rounds `x` up with probability equal to its fractional part, so that the
/// expected result equals `x`.
pub fn round_random(x: f64, rng: &mut impl RandomSource) -> i64 {
    let floor = x.floor();
    #[allow(clippy::cast_possible_truncation)]
    let whole = floor as i64;
    whole + i64::from(rng.bernoulli(x - floor))
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;
    use crate::numeric::SampleMoments;

    #[test]
    fn invalid_parameters_give_nan() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(rng.gamma(-1.0, 1.0).is_nan());
        assert!(rng.gamma(1.0, f64::NAN).is_nan());
        assert!(rng.pareto(1.0, -1.0).is_nan());
        assert!(rng.pareto(0.0, 2.0).is_nan());
        assert_eq!(rng.pareto(1.5, f64::INFINITY), 1.5);
    }

    #[test]
    fn pareto_respects_minimum() {
        let mut rng = SmallRng::seed_from_u64(2);
        for _ in 0..10_000 {
            assert!(rng.pareto(3.0, 1.5) >= 3.0);
        }
    }

    #[test]
    fn uniform_int_in_range() {
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..1_000 {
            assert!(rng.uniform_int(4) < 4);
        }
        assert_eq!(rng.uniform_int(1), 0);
    }

    #[test]
    fn round_random_whole_numbers_are_exact() {
        let mut rng = SmallRng::seed_from_u64(4);
        assert_eq!(round_random(3.0, &mut rng), 3);
        assert_eq!(round_random(0.0, &mut rng), 0);
        assert_eq!(round_random(-2.0, &mut rng), -2);
    }

    #[test]
    fn round_random_is_unbiased() {
        let mut rng = SmallRng::seed_from_u64(5);
        #[allow(clippy::cast_precision_loss)]
        let moments: SampleMoments = (0..100_000)
            .map(|_| round_random(2.3, &mut rng) as f64)
            .collect();
        assert!(moments.min().unwrap() >= 2.0);
        assert!(moments.max().unwrap() <= 3.0);
        assert!((moments.mean().unwrap() - 2.3).abs() < 0.01);
    }
}
