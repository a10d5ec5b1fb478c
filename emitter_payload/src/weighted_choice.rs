//! Discrete weighted choice over a fixed set of values.
//!
//! Severity, packet size and swarm scenario draws all share this sampler
//! rather than each deriving cumulative weights at the call site.

use rand::{
    Rng,
    distr::{Distribution, weighted::WeightedIndex},
};

use crate::Error;

#[derive(Debug, Clone)]
/// A set of values, each drawn with probability proportional to its weight.
pub struct Weighted<T> {
    values: Vec<T>,
    index: WeightedIndex<f64>,
}

impl<T> Weighted<T> {
    /// Create a new [`Weighted`] from `(value, weight)` pairs.
    ///
    /// Weights need not sum to one, they are normalized.
    ///
    /// # Errors
    ///
    /// Fails if no pairs are given, if any weight is negative or not finite, or
    /// if every weight is zero.
    pub fn new<I>(pairs: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (T, f64)>,
    {
        let (values, weights): (Vec<T>, Vec<f64>) = pairs.into_iter().unzip();
        let index = WeightedIndex::new(&weights)?;
        Ok(Self { values, index })
    }

    /// Draw a reference to one value.
    pub fn choose<R>(&self, rng: &mut R) -> &T
    where
        R: Rng + ?Sized,
    {
        &self.values[self.index.sample(rng)]
    }

    /// The values in the order they were given.
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }
}

impl<T> Distribution<T> for Weighted<T>
where
    T: Copy,
{
    fn sample<R>(&self, rng: &mut R) -> T
    where
        R: Rng + ?Sized,
    {
        *self.choose(rng)
    }
}
