//! Differentiable objectives and the vector operations the minimizer needs.

use std::hash::{BuildHasher, Hash};

use crate::errors::Result;
use crate::weighted_map::WeightedMap;
use crate::weighted_table::WeightedTable;

/// A point of a real vector space.
///
/// Missing coordinates of sparse representations are treated as their default.
pub trait Point: Clone {
    /// Inner product with `other`.
    fn dot(&self, other: &Self) -> f64;

    /// Performs `self += factor * other` in place.
    fn add_scaled(&mut self, other: &Self, factor: f64);

    /// Performs `self *= factor` in place.
    fn scale(&mut self, factor: f64);
}

impl<K, S> Point for WeightedMap<K, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher + Clone,
{
    fn dot(&self, other: &Self) -> f64 {
        self.inner_product(other)
    }

    fn add_scaled(&mut self, other: &Self, factor: f64) {
        self.combine_assign(other, |a, b| a + factor * b);
    }

    fn scale(&mut self, factor: f64) {
        self.apply(|v| v * factor);
    }
}

impl<R, C, S> Point for WeightedTable<R, C, S>
where
    R: Eq + Hash + Clone,
    C: Eq + Hash + Clone,
    S: BuildHasher + Clone,
{
    fn dot(&self, other: &Self) -> f64 {
        self.inner_product(other)
    }

    fn add_scaled(&mut self, other: &Self, factor: f64) {
        self.combine_assign(other, |a, b| a + factor * b);
    }

    fn scale(&mut self, factor: f64) {
        self.apply(|v| v * factor);
    }
}

/// A real-valued function that can report its gradient.
///
/// Methods take `&mut self` so that implementations may cache their last evaluation.
pub trait Objective {
    type Point: Point;

    /// Evaluates the function at `point`.
    fn value(&mut self, point: &Self::Point) -> Result<f64>;

    /// Evaluates the function and its gradient at `point`.
    fn value_and_gradient(&mut self, point: &Self::Point) -> Result<(f64, Self::Point)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_scaled_union() {
        let mut a: WeightedMap<&str> = [("x", 1.0), ("y", 2.0)].into_iter().collect();
        let b: WeightedMap<&str> = [("y", 1.0), ("z", 4.0)].into_iter().collect();
        a.add_scaled(&b, -0.5);

        assert_eq!(1.0, a.get("x"));
        assert_eq!(1.5, a.get("y"));
        assert_eq!(-2.0, a.get("z"));
        assert_eq!(0.0, a.default_value());
    }

    #[test]
    fn test_scale_table() {
        let mut t = WeightedTable::new();
        t.increment("A", "x", 3.0);
        t.scale(-1.0);

        assert_eq!(-3.0, t.get("A", "x"));
        assert_eq!(9.0, t.dot(&t));
    }
}
