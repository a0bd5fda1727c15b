use std::any::TypeId;
use std::cell::RefMut;

use log::trace;

use crate::context::Context;
use crate::hashing::hash_str;
use crate::rand::distr::uniform::{SampleRange, SampleUniform};
use crate::rand::distr::Distribution;
use crate::rand::{Rng, SeedableRng};
use crate::random::{RngHolder, RngId, RngPlugin};

/// Borrows the stream for `R`, creating and seeding it on first use.
///
/// # Panics
///
/// Panics if `init_random` has not been called, or if the stream is already
/// borrowed (i.e. a sampler closure tried to draw from the context again).
fn get_rng<R: RngId>(context: &Context) -> RefMut<'_, R::RngType> {
    let data_container = context
        .get_data_container(RngPlugin)
        .expect("You must initialize the random number generator with a base seed");

    let rng_holders = data_container
        .rng_holders
        .try_borrow_mut()
        .expect("random streams are already borrowed");
    RefMut::map(rng_holders, |holders| {
        holders
            .entry(TypeId::of::<R>())
            .or_insert_with(|| {
                let seed = data_container
                    .base_seed
                    .wrapping_add(hash_str(R::get_name()));
                trace!(
                    "creating random stream {} (base seed {})",
                    R::get_name(),
                    data_container.base_seed
                );
                RngHolder {
                    rng: Box::new(R::RngType::seed_from_u64(seed)),
                }
            })
            .rng
            .downcast_mut::<R::RngType>()
            .expect("random stream has the wrong type")
    })
}

/// Random number generation on `Context`.
pub trait ContextRandomExt {
    /// Sets the base seed and discards every existing stream, so that streams
    /// are re-seeded lazily on their next use.
    fn init_random(&mut self, base_seed: u64);

    /// Applies `sampler` to the stream for `R`. All draws the exposure
    /// samplers make go through here, which keeps them on a single stream.
    fn sample<R: RngId, T>(&self, rng_id: R, sampler: impl FnOnce(&mut R::RngType) -> T) -> T;

    /// Draws one value from `distribution` using the stream for `R`.
    fn sample_distr<R: RngId, T>(&self, rng_id: R, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng;

    /// Draws uniformly from `range` using the stream for `R`.
    fn sample_range<R: RngId, S, T>(&self, rng_id: R, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform;

    /// Returns `true` with probability `p`.
    fn sample_bool<R: RngId>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng;
}

impl ContextRandomExt for Context {
    fn init_random(&mut self, base_seed: u64) {
        trace!("initializing random streams with base seed {base_seed}");
        let data_container = self.get_data_container_mut(RngPlugin);
        data_container.base_seed = base_seed;
        data_container.rng_holders.get_mut().clear();
    }

    fn sample<R: RngId, T>(&self, _rng_id: R, sampler: impl FnOnce(&mut R::RngType) -> T) -> T {
        let mut rng = get_rng::<R>(self);
        sampler(&mut rng)
    }

    fn sample_distr<R: RngId, T>(&self, _rng_id: R, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng,
    {
        let mut rng = get_rng::<R>(self);
        distribution.sample(&mut *rng)
    }

    fn sample_range<R: RngId, S, T>(&self, rng_id: R, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample(rng_id, |rng| rng.random_range(range))
    }

    fn sample_bool<R: RngId>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng,
    {
        self.sample(rng_id, |rng| rng.random_bool(p))
    }
}

#[cfg(test)]
mod tests {
    use rand_distr::Exp;

    use crate::context::Context;
    use crate::define_rng;
    use crate::rand::RngCore;
    use crate::random::ContextRandomExt;

    define_rng!(StreamARng);
    define_rng!(StreamBRng);

    #[test]
    #[should_panic(expected = "You must initialize the random number generator")]
    fn sampling_requires_seed() {
        let context = Context::new();
        context.sample(StreamARng, RngCore::next_u64);
    }

    #[test]
    fn draws_advance_the_stream() {
        let mut context = Context::new();
        context.init_random(42);
        assert_ne!(
            context.sample(StreamARng, RngCore::next_u64),
            context.sample(StreamARng, RngCore::next_u64)
        );
    }

    #[test]
    fn streams_are_independent() {
        let mut context = Context::new();
        context.init_random(42);
        let a_first = context.sample(StreamARng, RngCore::next_u64);

        let mut other = Context::new();
        other.init_random(42);
        // Drawing from B first must not shift A.
        other.sample(StreamBRng, RngCore::next_u64);
        assert_eq!(other.sample(StreamARng, RngCore::next_u64), a_first);
        assert_ne!(other.sample(StreamBRng, RngCore::next_u64), a_first);
    }

    #[test]
    fn reset_seed() {
        let mut context = Context::new();
        context.init_random(42);
        let run_0 = context.sample(StreamARng, RngCore::next_u64);
        let run_1 = context.sample(StreamARng, RngCore::next_u64);

        context.init_random(42);
        assert_eq!(run_0, context.sample(StreamARng, RngCore::next_u64));
        assert_eq!(run_1, context.sample(StreamARng, RngCore::next_u64));

        context.init_random(88);
        assert_ne!(run_0, context.sample(StreamARng, RngCore::next_u64));
    }

    #[test]
    fn sample_helpers() {
        let mut context = Context::new();
        context.init_random(7);
        let value = context.sample_range(StreamARng, 0..10);
        assert!((0..10).contains(&value));
        assert!(context.sample_bool(StreamARng, 1.0));
        assert!(!context.sample_bool(StreamARng, 0.0));
        let waiting_time: f64 = context.sample_distr(StreamBRng, Exp::new(2.0).unwrap());
        assert!(waiting_time >= 0.0);
    }
}
