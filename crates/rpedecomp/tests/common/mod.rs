// the reason this is named mod.rs has to do with some complexities of how
// testing is handled
//
// we are following the advice of the rust book
// https://doc.rust-lang.org/book/ch11-03-test-organization.html#submodules-in-integration-tests

#![allow(dead_code)] // not every test file uses every helper

use rand::distr::{Distribution, Uniform};
use rand_xoshiro::Xoshiro256PlusPlus;
use rand_xoshiro::rand_core::SeedableRng;
use rpedecomp::UnsignedWord;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Generate `length` values made up of runs with lengths drawn from
/// `1..=max_run_length`, where consecutive runs always hold different values.
pub fn random_runs<V: UnsignedWord>(seed: u64, length: usize, max_run_length: usize) -> Vec<V> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let run_length_dist = Uniform::try_from(1..=max_run_length).unwrap();
    let value_dist = Uniform::try_from(0..1000_usize).unwrap();

    let mut values = Vec::with_capacity(length);
    let mut previous = None;
    while values.len() < length {
        let mut value = V::from_usize(value_dist.sample(&mut rng));
        if previous == Some(value) {
            value = value + V::one();
        }
        let run_length = run_length_dist.sample(&mut rng).min(length - values.len());
        values.extend(std::iter::repeat_n(value, run_length));
        previous = Some(value);
    }
    values
}
