//! Shaped random primitives used by the default decision policy.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::grammar::{BiasedTerms, Repetition, Term};

/// Source of the random numbers a generation run consumes.
///
/// Implementors provide uniform draws; the shaped repetition counts are
/// derived from those.
pub trait Randomisation {
    /// A uniformly distributed value in `[0, 1)`.
    fn random(&mut self) -> f64;

    /// A uniformly distributed index in `[0, bound)`.
    fn index(&mut self, bound: usize) -> usize;

    /// A uniformly distributed count in `[min, max]`.
    fn repetition(&mut self, min: u32, max: u32) -> u32;

    /// A valid character chosen uniformly over all of unicode.
    fn any_char(&mut self) -> char;

    /// A count of at least `min`, most likely `min` itself.
    fn repetition_from(&mut self, min: u32) -> u32 {
        min + self.poisson(0.5)
    }

    /// The number of times to repeat the term of `repetition`.
    ///
    /// Unlimited repetitions follow a poisson distribution and limited ones a
    /// binomial distribution, both shaped so that the most likely count lands
    /// near the norm of the repetition.
    fn times(&mut self, repetition: &Repetition) -> u32 {
        let min = repetition.min_times();
        match repetition.max_times() {
            Some(max) => {
                let n = max.saturating_sub(min);
                if n == 0 {
                    return min;
                }
                let mut norm = f64::from(repetition.norm().max(min).min(max) - min);
                if norm == 0.0 {
                    norm = 0.5;
                } else if norm == f64::from(n) {
                    // keep a little mass below the max
                    norm -= 0.5 - 0.02f64.sqrt() / norm;
                }
                min + self.binomial(n, norm / f64::from(n))
            }
            None => {
                let norm = f64::from(repetition.norm().max(min) - min);
                min + self.poisson(norm + 0.5)
            }
        }
    }

    /// Product-of-uniforms sampling of a poisson distribution.
    fn poisson(&mut self, lambda: f64) -> u32 {
        let limit = (-lambda).exp();
        let mut p = 1.0;
        let mut k = 0;
        loop {
            k += 1;
            p *= self.random();
            if p <= limit {
                return k - 1;
            }
        }
    }

    /// Number of successes in `n` bernoulli trials with probability `p`.
    fn binomial(&mut self, n: u32, p: f64) -> u32 {
        (0..n).filter(|_| self.random() < p).count() as u32
    }

    /// Pick one of the alternatives, honoring their bias.
    fn biased<'g>(&mut self, alternatives: &BiasedTerms<'g>) -> Option<&'g Term> {
        if alternatives.is_empty() {
            return None;
        }
        let weight = self.random() * alternatives.bound();
        // rounding at the very top of the range falls back to the last option
        alternatives
            .term_at(weight)
            .or_else(|| alternatives.term(alternatives.len() - 1))
    }

    /// Pick one of `items` uniformly.
    ///
    /// Panics when `items` is empty.
    fn choice<'a, T>(&mut self, items: &'a [T]) -> &'a T
    where
        Self: Sized,
    {
        assert!(!items.is_empty(), "cannot choose from an empty collection");
        &items[self.index(items.len())]
    }

    /// Pick one of `code_points` uniformly.
    ///
    /// Panics when `code_points` is empty.
    fn choice_code_point(&mut self, code_points: &[char]) -> char {
        assert!(
            !code_points.is_empty(),
            "cannot choose from an empty set of code points"
        );
        code_points[self.index(code_points.len())]
    }
}

impl<R: Randomisation + ?Sized> Randomisation for Box<R> {
    fn random(&mut self) -> f64 {
        (**self).random()
    }

    fn index(&mut self, bound: usize) -> usize {
        (**self).index(bound)
    }

    fn repetition(&mut self, min: u32, max: u32) -> u32 {
        (**self).repetition(min, max)
    }

    fn any_char(&mut self) -> char {
        (**self).any_char()
    }
}

/// [`Randomisation`] backed by a [`rand::Rng`].
///
/// `Send` whenever the rng is, as the default [`Pcg64`] is.
#[derive(Clone, Debug)]
pub struct SimpleRandomisation<R: Rng = Pcg64> {
    rng: R,
}

impl<R: Rng> SimpleRandomisation<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl SimpleRandomisation<Pcg64> {
    /// Reproducible randomisation.
    pub fn seeded(seed: u64) -> Self {
        Self::new(Pcg64::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(Pcg64::from_entropy())
    }
}

impl Default for SimpleRandomisation<Pcg64> {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl<R: Rng> Randomisation for SimpleRandomisation<R> {
    fn random(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn index(&mut self, bound: usize) -> usize {
        self.rng.gen_range(0..bound)
    }

    fn repetition(&mut self, min: u32, max: u32) -> u32 {
        self.rng.gen_range(min..=max)
    }

    fn any_char(&mut self) -> char {
        loop {
            // surrogates are redrawn
            if let Some(c) = char::from_u32(self.rng.gen_range(0..=char::MAX as u32)) {
                return c;
            }
        }
    }
}
