//! Two-level weighted maps.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::ops::{Add, AddAssign, Mul, MulAssign, Sub, SubAssign};

use hashbrown::hash_map::{self, HashMap};

use crate::errors::{Result, TagwiseError};
use crate::utils::SplitMix64Builder;
use crate::weighted_map::WeightedMap;

/// A table mapping row keys to [`WeightedMap`]s.
///
/// Rows created through [`row_mut`](Self::row_mut) or the write operations start empty with the
/// table default. Reading a cell of an absent row yields the table default.
///
/// HMM transition and emission tables and maximum entropy weights (`label → feature → weight`)
/// are stored in this form.
#[derive(Clone)]
pub struct WeightedTable<R, C, S = SplitMix64Builder> {
    rows: HashMap<R, WeightedMap<C, S>, S>,
    default: f64,
}

impl<R, C> WeightedTable<R, C> {
    /// Creates an empty table whose default is `0.0`.
    pub fn new() -> Self {
        Self::with_default(0.0)
    }

    /// Creates an empty table with the given default.
    pub fn with_default(default: f64) -> Self {
        Self::with_hasher(default, SplitMix64Builder)
    }
}

impl<R, C, S> WeightedTable<R, C, S> {
    /// Creates an empty table with the given default and hashing strategy. New rows use a clone
    /// of `hash_builder`.
    pub fn with_hasher(default: f64, hash_builder: S) -> Self {
        Self {
            rows: HashMap::with_hasher(hash_builder),
            default,
        }
    }

    pub const fn default_value(&self) -> f64 {
        self.default
    }

    /// Gets the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Gets the number of cells over all rows.
    pub fn n_cells(&self) -> usize {
        self.rows.values().map(WeightedMap::len).sum()
    }

    /// Iterates over `(row key, row)` pairs.
    pub fn iter(&self) -> hash_map::Iter<'_, R, WeightedMap<C, S>> {
        self.rows.iter()
    }

    pub fn row_keys(&self) -> hash_map::Keys<'_, R, WeightedMap<C, S>> {
        self.rows.keys()
    }

    /// Applies `f` to every cell, every row default, and the table default.
    pub fn apply<F>(&mut self, f: F)
    where
        F: Fn(f64) -> f64,
    {
        for row in self.rows.values_mut() {
            row.apply(&f);
        }
        self.default = f(self.default);
    }
}

impl<R, C, S> WeightedTable<R, C, S>
where
    R: Eq + Hash,
    C: Eq + Hash,
    S: BuildHasher + Clone,
{
    /// Gets a row if it exists.
    pub fn row<Q>(&self, key: &Q) -> Option<&WeightedMap<C, S>>
    where
        R: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.rows.get(key)
    }

    /// Gets a row, creating an empty one with the table default if it is absent.
    pub fn row_mut(&mut self, key: R) -> &mut WeightedMap<C, S> {
        let default = self.default;
        let hash_builder = self.rows.hasher().clone();
        self.rows
            .entry(key)
            .or_insert_with(|| WeightedMap::with_hasher(default, hash_builder))
    }

    /// Replaces a row.
    pub fn insert_row(&mut self, key: R, row: WeightedMap<C, S>) -> Option<WeightedMap<C, S>> {
        self.rows.insert(key, row)
    }

    /// Gets the value of a cell. An absent row yields the table default and an absent column
    /// yields the row default.
    pub fn get<Q1, Q2>(&self, row: &Q1, column: &Q2) -> f64
    where
        R: Borrow<Q1>,
        C: Borrow<Q2>,
        Q1: Hash + Eq + ?Sized,
        Q2: Hash + Eq + ?Sized,
    {
        self.rows
            .get(row)
            .map_or(self.default, |r| r.get(column))
    }

    pub fn increment(&mut self, row: R, column: C, amount: f64) {
        self.row_mut(row).increment(column, amount);
    }

    pub fn set(&mut self, row: R, column: C, value: f64) -> Result<()> {
        self.row_mut(row).set(column, value)
    }

    /// Normalizes every row independently.
    ///
    /// # Errors
    ///
    /// The first error raised by [`WeightedMap::normalize`] is returned.
    pub fn normalize(&mut self) -> Result<()> {
        for row in self.rows.values_mut() {
            row.normalize()?;
        }
        Ok(())
    }

    /// Log-normalizes every row independently.
    pub fn log_normalize(&mut self) -> Result<()> {
        for row in self.rows.values_mut() {
            row.log_normalize()?;
        }
        Ok(())
    }

    /// Takes the logarithm of every cell, row default, and the table default.
    ///
    /// # Errors
    ///
    /// [`TagwiseError::DegenerateDistribution`] is returned if the table default or any cell is
    /// negative. Rows already processed keep their logarithms.
    pub fn log(&mut self) -> Result<()> {
        if self.default < 0.0 || self.default.is_nan() {
            return Err(TagwiseError::degenerate_distribution(
                "cannot take the logarithm of a negative or NaN table default",
            ));
        }
        for row in self.rows.values_mut() {
            row.log()?;
        }
        self.default = self.default.ln();
        Ok(())
    }

    /// Computes the sum of cell-wise products over the union of cells.
    pub fn inner_product(&self, other: &Self) -> f64 {
        let mut result = 0.0;
        for (key, row) in &self.rows {
            result += match other.rows.get(key) {
                Some(other_row) => row.inner_product(other_row),
                None => row.values().map(|v| v * other.default).sum(),
            };
        }
        for (key, other_row) in &other.rows {
            if !self.rows.contains_key(key) {
                result += other_row.values().map(|v| self.default * v).sum::<f64>();
            }
        }
        result
    }
}

impl<R, C, S> WeightedTable<R, C, S>
where
    R: Eq + Hash + Clone,
    C: Eq + Hash + Clone,
    S: BuildHasher + Clone,
{
    /// Returns the transposed table `column → row → value`.
    ///
    /// Row defaults are not carried over; every row of the result uses the table default.
    pub fn inverted(&self) -> WeightedTable<C, R, S> {
        let mut result = WeightedTable::with_hasher(self.default, self.rows.hasher().clone());
        for (row_key, row) in &self.rows {
            for (column, &value) in row {
                result
                    .row_mut(column.clone())
                    .entries
                    .insert(row_key.clone(), value);
            }
        }
        result
    }

    pub(crate) fn combine_assign<F>(&mut self, other: &Self, op: F)
    where
        F: Fn(f64, f64) -> f64,
    {
        let hash_builder = self.rows.hasher().clone();
        let other_default = WeightedMap::with_hasher(other.default, hash_builder.clone());
        for (key, row) in self.rows.iter_mut() {
            row.combine_assign(other.rows.get(key).unwrap_or(&other_default), &op);
        }
        for (key, other_row) in &other.rows {
            if !self.rows.contains_key(key) {
                let mut row = WeightedMap::with_hasher(self.default, hash_builder.clone());
                row.combine_assign(other_row, &op);
                self.rows.insert(key.clone(), row);
            }
        }
        self.default = op(self.default, other.default);
    }
}

impl<R, C, S> Default for WeightedTable<R, C, S>
where
    S: Default,
{
    fn default() -> Self {
        Self::with_hasher(0.0, S::default())
    }
}

impl<R, C, S> fmt::Debug for WeightedTable<R, C, S>
where
    R: fmt::Debug,
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WeightedTable")
            .field("rows", &self.rows)
            .field("default", &self.default)
            .finish()
    }
}

impl<R, C, S> PartialEq for WeightedTable<R, C, S>
where
    R: Eq + Hash,
    C: Eq + Hash,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.default == other.default
            && self.rows.len() == other.rows.len()
            && self
                .rows
                .iter()
                .all(|(k, row)| other.rows.get(k).map_or(false, |o| row == o))
    }
}

impl<R, C, S> Add<&WeightedTable<R, C, S>> for &WeightedTable<R, C, S>
where
    R: Eq + Hash + Clone,
    C: Eq + Hash + Clone,
    S: BuildHasher + Clone,
{
    type Output = WeightedTable<R, C, S>;

    fn add(self, rhs: &WeightedTable<R, C, S>) -> Self::Output {
        let mut result = self.clone();
        result += rhs;
        result
    }
}

impl<R, C, S> AddAssign<&WeightedTable<R, C, S>> for WeightedTable<R, C, S>
where
    R: Eq + Hash + Clone,
    C: Eq + Hash + Clone,
    S: BuildHasher + Clone,
{
    fn add_assign(&mut self, rhs: &WeightedTable<R, C, S>) {
        self.combine_assign(rhs, |a, b| a + b);
    }
}

impl<R, C, S> Sub<&WeightedTable<R, C, S>> for &WeightedTable<R, C, S>
where
    R: Eq + Hash + Clone,
    C: Eq + Hash + Clone,
    S: BuildHasher + Clone,
{
    type Output = WeightedTable<R, C, S>;

    fn sub(self, rhs: &WeightedTable<R, C, S>) -> Self::Output {
        let mut result = self.clone();
        result -= rhs;
        result
    }
}

impl<R, C, S> SubAssign<&WeightedTable<R, C, S>> for WeightedTable<R, C, S>
where
    R: Eq + Hash + Clone,
    C: Eq + Hash + Clone,
    S: BuildHasher + Clone,
{
    fn sub_assign(&mut self, rhs: &WeightedTable<R, C, S>) {
        self.combine_assign(rhs, |a, b| a - b);
    }
}

impl<R, C, S> Mul<f64> for &WeightedTable<R, C, S>
where
    R: Clone,
    C: Clone,
    S: Clone,
{
    type Output = WeightedTable<R, C, S>;

    fn mul(self, rhs: f64) -> Self::Output {
        let mut result = self.clone();
        result *= rhs;
        result
    }
}

impl<R, C, S> MulAssign<f64> for WeightedTable<R, C, S> {
    fn mul_assign(&mut self, rhs: f64) {
        self.apply(|v| v * rhs);
    }
}
