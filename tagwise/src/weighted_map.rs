//! Sparse numeric maps with a default value for absent keys.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub, SubAssign};

use hashbrown::hash_map::{self, HashMap};
use rand::Rng;

use crate::errors::{Result, TagwiseError};
use crate::utils::{log_sum_exp, SplitMix64Builder};

/// A map from keys to `f64` weights.
///
/// Every map carries a `default` returned for absent keys. Reading an absent key never inserts
/// it; only writes ([`set`](Self::set), [`increment`](Self::increment)) do.
///
/// Arithmetic between two maps acts on the union of their keys. An entry missing on one side is
/// replaced by that side's default, and the default of the result combines both defaults with the
/// same operator:
///
/// | operator | result default        |
/// |----------|-----------------------|
/// | `a + b`  | `a.default + b.default` |
/// | `a - b`  | `a.default - b.default` |
/// | `a * b`  | `a.default * b.default` |
/// | `a / b`  | `a.default / b.default` |
/// | `a op x` (scalar) | `a.default op x` |
///
/// The in-place operators (`+=`, ...) follow the same rules and never modify the right-hand side.
///
/// The hasher `S` selects the container strategy. It is fixed when the map is constructed; the
/// default [`SplitMix64Builder`] makes iteration order reproducible between runs.
///
/// # Examples
///
/// ```
/// use tagwise::WeightedMap;
///
/// let mut a: WeightedMap<&str> = [("spam", 2.0), ("ham", 1.0)].into_iter().collect();
/// let b = WeightedMap::with_default(1.0);
///
/// let c = &a + &b;
/// assert_eq!(3.0, c.get("spam"));
/// assert_eq!(1.0, c.get("eggs"));
///
/// a.normalize().unwrap();
/// assert_eq!(Some(&"spam"), a.arg_max());
/// ```
#[derive(Clone)]
pub struct WeightedMap<K, S = SplitMix64Builder> {
    pub(crate) entries: HashMap<K, f64, S>,
    pub(crate) default: f64,
}

impl<K> WeightedMap<K> {
    /// Creates an empty map whose default is `0.0`.
    pub fn new() -> Self {
        Self::with_default(0.0)
    }

    /// Creates an empty map with the given default.
    pub fn with_default(default: f64) -> Self {
        Self::with_hasher(default, SplitMix64Builder)
    }
}

impl<K, S> WeightedMap<K, S> {
    /// Creates an empty map with the given default and hashing strategy.
    pub fn with_hasher(default: f64, hash_builder: S) -> Self {
        Self {
            entries: HashMap::with_hasher(hash_builder),
            default,
        }
    }

    /// Gets the value returned for absent keys.
    pub const fn default_value(&self) -> f64 {
        self.default
    }

    /// Replaces the value returned for absent keys.
    pub fn set_default(&mut self, default: f64) {
        self.default = default;
    }

    /// Gets the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entry is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over stored entries in the map's iteration order.
    pub fn iter(&self) -> hash_map::Iter<'_, K, f64> {
        self.entries.iter()
    }

    /// Iterates over stored keys.
    pub fn keys(&self) -> hash_map::Keys<'_, K, f64> {
        self.entries.keys()
    }

    /// Iterates over stored values.
    pub fn values(&self) -> hash_map::Values<'_, K, f64> {
        self.entries.values()
    }

    /// Sums the stored values. The default does not contribute.
    pub fn total(&self) -> f64 {
        self.entries.values().sum()
    }

    /// Removes every entry, keeping the default.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Applies `f` to every stored value and to the default.
    pub fn apply<F>(&mut self, f: F)
    where
        F: Fn(f64) -> f64,
    {
        for v in self.entries.values_mut() {
            *v = f(*v);
        }
        self.default = f(self.default);
    }

    /// Gets a key holding the largest value.
    ///
    /// Ties are broken by the first key met in iteration order. NaN values are ignored.
    ///
    /// # Returns
    ///
    /// `None` if the map has no entry.
    pub fn arg_max(&self) -> Option<&K> {
        let mut best: Option<(&K, f64)> = None;
        for (k, &v) in &self.entries {
            if v.is_nan() {
                continue;
            }
            if best.map_or(true, |(_, b)| v > b) {
                best = Some((k, v));
            }
        }
        best.map(|(k, _)| k)
    }

    /// Draws a key with probability proportional to its value.
    ///
    /// The map must already be normalized with non-negative values; normalizing is the caller's
    /// responsibility.
    ///
    /// # Errors
    ///
    /// [`TagwiseError::DegenerateDistribution`] is returned if the map is empty or carries no
    /// positive mass, or if a value is negative.
    pub fn sample<R>(&self, rng: &mut R) -> Result<&K>
    where
        R: Rng + ?Sized,
    {
        let mut remaining: f64 = rng.gen();
        let mut last_positive = None;
        for (k, &p) in &self.entries {
            if p < 0.0 || p.is_nan() {
                return Err(TagwiseError::degenerate_distribution(
                    "cannot sample from a map with negative or NaN values",
                ));
            }
            if p > 0.0 {
                last_positive = Some(k);
            }
            remaining -= p;
            if remaining <= 0.0 && p > 0.0 {
                return Ok(k);
            }
        }
        // Rounding can leave a tiny residue when the values sum to slightly less than one.
        last_positive.ok_or_else(|| {
            TagwiseError::degenerate_distribution("cannot sample from a map without positive mass")
        })
    }
}

impl<K, S> WeightedMap<K, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Gets the value of `key`, or the default if it is absent. The map is not modified.
    pub fn get<Q>(&self, key: &Q) -> f64
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).copied().unwrap_or(self.default)
    }

    /// Returns `true` if `key` is stored.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Stores `value` for `key`.
    ///
    /// # Errors
    ///
    /// [`TagwiseError::InvalidArgument`] is returned if `value` is NaN.
    pub fn set(&mut self, key: K, value: f64) -> Result<()> {
        if value.is_nan() {
            return Err(TagwiseError::invalid_argument("value", "NaN is not a weight"));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// Adds `amount` to the value of `key`, starting from the default if it is absent.
    pub fn increment(&mut self, key: K, amount: f64) {
        let default = self.default;
        *self.entries.entry(key).or_insert(default) += amount;
    }

    /// Removes `key`, returning its stored value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<f64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key)
    }

    /// Keeps only the entries for which `f` returns `true`.
    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&K, &mut f64) -> bool,
    {
        self.entries.retain(f);
    }

    /// Divides every entry by the sum of entries.
    ///
    /// If the entries sum to zero, every entry receives the uniform mass `1/n`. The default is
    /// left unchanged.
    ///
    /// # Errors
    ///
    /// [`TagwiseError::DegenerateDistribution`] is returned if the map is empty or the total is
    /// not finite.
    pub fn normalize(&mut self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(TagwiseError::degenerate_distribution(
                "cannot normalize an empty map",
            ));
        }
        let total = self.total();
        if total == 0.0 {
            let uniform = 1.0 / self.entries.len() as f64;
            for v in self.entries.values_mut() {
                *v = uniform;
            }
            return Ok(());
        }
        if !total.is_finite() {
            return Err(TagwiseError::degenerate_distribution(format!(
                "cannot normalize a map whose total is {total}"
            )));
        }
        for v in self.entries.values_mut() {
            *v /= total;
        }
        Ok(())
    }

    /// Normalizes log-domain values so that their exponentials sum to one.
    ///
    /// The log-sum-exp of the entries is subtracted from every entry. The default is left
    /// unchanged.
    ///
    /// # Errors
    ///
    /// [`TagwiseError::DegenerateDistribution`] is returned if the map is empty or every entry is
    /// `-inf`.
    pub fn log_normalize(&mut self) -> Result<()> {
        let log_total = log_sum_exp(self.entries.values().copied());
        if !log_total.is_finite() {
            return Err(TagwiseError::degenerate_distribution(format!(
                "cannot log-normalize a map of {} entries whose log-total is {log_total}",
                self.entries.len()
            )));
        }
        for v in self.entries.values_mut() {
            *v -= log_total;
        }
        Ok(())
    }

    /// Replaces every entry and the default by its natural logarithm.
    ///
    /// Zero maps to `-inf`, the log-probability of an impossible event.
    ///
    /// # Errors
    ///
    /// [`TagwiseError::DegenerateDistribution`] is returned, and the map is left unchanged, if a
    /// value or the default is negative or NaN.
    pub fn log(&mut self) -> Result<()> {
        let invalid = |v: f64| v < 0.0 || v.is_nan();
        if invalid(self.default) || self.entries.values().any(|&v| invalid(v)) {
            return Err(TagwiseError::degenerate_distribution(
                "cannot take the logarithm of a negative or NaN value",
            ));
        }
        self.apply(f64::ln);
        Ok(())
    }

    /// Computes `Σ self[k] * other[k]` over the union of both key sets.
    pub fn inner_product(&self, other: &Self) -> f64 {
        let mut result = 0.0;
        for (k, &v) in &self.entries {
            result += v * other.get(k);
        }
        for (k, &v) in &other.entries {
            if !self.entries.contains_key(k) {
                result += self.default * v;
            }
        }
        result
    }
}

impl<K, S> WeightedMap<K, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher + Clone,
{
    /// Returns a copy whose entries and default are exponentiated.
    pub fn exp(&self) -> Self {
        let mut result = self.clone();
        result.apply(f64::exp);
        result
    }

    /// Combines two maps entry-wise over the union of their keys.
    pub(crate) fn combine<F>(&self, other: &Self, op: F) -> Self
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut result = self.clone();
        result.combine_assign(other, op);
        result
    }

    /// In-place version of [`combine`](Self::combine). `other` is only read.
    pub(crate) fn combine_assign<F>(&mut self, other: &Self, op: F)
    where
        F: Fn(f64, f64) -> f64,
    {
        for (k, v) in self.entries.iter_mut() {
            *v = op(*v, other.get(k));
        }
        for (k, &v) in &other.entries {
            if !self.entries.contains_key(k) {
                self.entries.insert(k.clone(), op(self.default, v));
            }
        }
        self.default = op(self.default, other.default);
    }
}

impl<K, S> Default for WeightedMap<K, S>
where
    S: Default,
{
    fn default() -> Self {
        Self::with_hasher(0.0, S::default())
    }
}

impl<K, S> fmt::Debug for WeightedMap<K, S>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WeightedMap")
            .field("entries", &self.entries)
            .field("default", &self.default)
            .finish()
    }
}

impl<K, S> PartialEq for WeightedMap<K, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.default == other.default
            && self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.entries.get(k).map_or(false, |w| v == w))
    }
}

impl<K, S> FromIterator<(K, f64)> for WeightedMap<K, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    /// Collects `(key, value)` pairs into a map whose default is `0.0`. Later pairs overwrite
    /// earlier ones.
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
    {
        Self {
            entries: iter.into_iter().collect(),
            default: 0.0,
        }
    }
}

impl<K, S> Extend<(K, f64)> for WeightedMap<K, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = (K, f64)>,
    {
        self.entries.extend(iter);
    }
}

impl<'a, K, S> IntoIterator for &'a WeightedMap<K, S> {
    type Item = (&'a K, &'a f64);
    type IntoIter = hash_map::Iter<'a, K, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

macro_rules! impl_arithmetic {
    ( $trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:tt ) => {
        impl<K, S> $trait<&WeightedMap<K, S>> for &WeightedMap<K, S>
        where
            K: Eq + Hash + Clone,
            S: BuildHasher + Clone,
        {
            type Output = WeightedMap<K, S>;

            fn $method(self, rhs: &WeightedMap<K, S>) -> Self::Output {
                self.combine(rhs, |a, b| a $op b)
            }
        }

        impl<K, S> $assign_trait<&WeightedMap<K, S>> for WeightedMap<K, S>
        where
            K: Eq + Hash + Clone,
            S: BuildHasher + Clone,
        {
            fn $assign_method(&mut self, rhs: &WeightedMap<K, S>) {
                self.combine_assign(rhs, |a, b| a $op b);
            }
        }

        impl<K, S> $trait<f64> for &WeightedMap<K, S>
        where
            K: Clone,
            S: Clone,
        {
            type Output = WeightedMap<K, S>;

            fn $method(self, rhs: f64) -> Self::Output {
                let mut result = self.clone();
                result.apply(|v| v $op rhs);
                result
            }
        }

        impl<K, S> $assign_trait<f64> for WeightedMap<K, S> {
            fn $assign_method(&mut self, rhs: f64) {
                self.apply(|v| v $op rhs);
            }
        }
    };
}

impl_arithmetic!(Add, add, AddAssign, add_assign, +);
impl_arithmetic!(Sub, sub, SubAssign, sub_assign, -);
impl_arithmetic!(Mul, mul, MulAssign, mul_assign, *);
impl_arithmetic!(Div, div, DivAssign, div_assign, /);

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn map(pairs: &[(&'static str, f64)], default: f64) -> WeightedMap<&'static str> {
        let mut m = WeightedMap::with_default(default);
        for &(k, v) in pairs {
            m.set(k, v).unwrap();
        }
        m
    }

    #[test]
    fn test_get_does_not_insert() {
        let m = map(&[("spam", 2.0)], -1.0);

        assert_eq!(2.0, m.get("spam"));
        assert_eq!(-1.0, m.get("ham"));
        assert_eq!(1, m.len());
        assert!(!m.contains_key("ham"));
    }

    #[test]
    fn test_set_nan() {
        let mut m = WeightedMap::new();
        let r = m.set("spam", f64::NAN);

        assert!(r.is_err());
        assert_eq!(
            "InvalidArgumentError: value: NaN is not a weight",
            &r.err().unwrap().to_string()
        );
        assert!(m.is_empty());
    }

    #[test]
    fn test_increment_from_default() {
        let mut m = WeightedMap::with_default(1.0);
        m.increment("spam", 2.0);
        m.increment("spam", 2.0);

        assert_eq!(5.0, m.get("spam"));
    }

    #[test]
    fn test_add_commutative_with_defaults() {
        let a = map(&[("spam", 1.0), ("ham", 2.0)], 0.5);
        let b = map(&[("ham", 3.0), ("eggs", 4.0)], 2.0);

        let ab = &a + &b;
        let ba = &b + &a;

        assert_eq!(ab, ba);
        assert_eq!(3.0, ab.get("spam"));
        assert_eq!(5.0, ab.get("ham"));
        assert_eq!(4.5, ab.get("eggs"));
        assert_eq!(2.5, ab.default_value());
    }

    #[test]
    fn test_mul_commutative_with_defaults() {
        let a = map(&[("spam", 1.0), ("ham", 2.0)], 0.5);
        let b = map(&[("ham", 3.0), ("eggs", 4.0)], 2.0);

        let ab = &a * &b;
        let ba = &b * &a;

        assert_eq!(ab, ba);
        assert_eq!(2.0, ab.get("spam"));
        assert_eq!(6.0, ab.get("ham"));
        assert_eq!(2.0, ab.get("eggs"));
        assert_eq!(1.0, ab.default_value());
    }

    #[test]
    fn test_sub_div_defaults() {
        let a = map(&[("spam", 6.0)], 1.0);
        let b = map(&[("ham", 4.0)], 2.0);

        let d = &a - &b;
        assert_eq!(4.0, d.get("spam"));
        assert_eq!(-3.0, d.get("ham"));
        assert_eq!(-1.0, d.default_value());

        let q = &a / &b;
        assert_eq!(3.0, q.get("spam"));
        assert_eq!(0.25, q.get("ham"));
        assert_eq!(0.5, q.default_value());
    }

    #[test]
    fn test_assign_matches_binary_and_keeps_rhs() {
        let a = map(&[("spam", 1.0), ("ham", 2.0)], 0.5);
        let b = map(&[("ham", 3.0), ("eggs", 4.0)], 2.0);
        let b_before = b.clone();

        let mut sum = a.clone();
        sum += &b;
        assert_eq!(&a + &b, sum);

        let mut product = a.clone();
        product *= &b;
        assert_eq!(&a * &b, product);

        let mut difference = a.clone();
        difference -= &b;
        assert_eq!(&a - &b, difference);

        assert_eq!(b_before, b);
    }

    #[test]
    fn test_scalar_ops() {
        let a = map(&[("spam", 1.0), ("ham", 2.0)], 0.5);

        let scaled = &a * 2.0;
        assert_eq!(2.0, scaled.get("spam"));
        assert_eq!(1.0, scaled.default_value());

        let mut shifted = a.clone();
        shifted += 1.0;
        assert_eq!(&a + 1.0, shifted);
        assert_eq!(1.5, shifted.default_value());
    }

    #[test]
    fn test_normalize() {
        let mut m = map(&[("spam", 1.0), ("ham", 1.0)], 0.0);
        m.normalize().unwrap();

        assert_eq!(0.5, m.get("spam"));
        assert_eq!(0.5, m.get("ham"));
        assert_eq!(0.0, m.get("eggs"));
    }

    #[test]
    fn test_normalize_idempotent() {
        let m = map(&[("spam", 0.5), ("ham", 0.25), ("eggs", 0.25)], 0.0);
        let mut n = m.clone();
        n.normalize().unwrap();

        assert_eq!(m, n);
    }

    #[test]
    fn test_normalize_zero_total() {
        let mut m = map(&[("spam", 0.0), ("ham", 0.0), ("eggs", 0.0), ("bacon", 0.0)], 0.0);
        m.normalize().unwrap();

        assert_eq!(0.25, m.get("spam"));
        assert_eq!(0.25, m.get("bacon"));
    }

    #[test]
    fn test_normalize_empty() {
        let mut m = WeightedMap::<&str>::new();
        let r = m.normalize();

        assert!(matches!(r, Err(TagwiseError::DegenerateDistribution(_))));
    }

    #[test]
    fn test_log_normalize() {
        let mut m = map(&[("dog", 3.0), ("cat", 2.0)], f64::NEG_INFINITY);
        m.log_normalize().unwrap();

        assert!((m.get("dog") - 0.731f64.ln()).abs() < 1e-3);
        assert!((m.get("cat") - 0.269f64.ln()).abs() < 1e-3);
        let total: f64 = m.values().map(|v| v.exp()).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_log_normalize_all_impossible() {
        let mut m = map(
            &[("dog", f64::NEG_INFINITY), ("cat", f64::NEG_INFINITY)],
            0.0,
        );

        assert!(matches!(
            m.log_normalize(),
            Err(TagwiseError::DegenerateDistribution(_))
        ));
    }

    #[test]
    fn test_log_exp_round_trip() {
        let m = map(&[("spam", 0.7), ("ham", 0.2), ("eggs", 0.1)], 0.0);
        let mut l = m.clone();
        l.log().unwrap();

        assert_eq!(f64::NEG_INFINITY, l.default_value());
        let e = l.exp();
        for (k, v) in &m {
            assert!((e.get(k) - v).abs() < 1e-12);
        }
        assert_eq!(0.0, e.default_value());
    }

    #[test]
    fn test_log_negative() {
        let mut m = map(&[("spam", -1.0), ("ham", 1.0)], 0.0);

        assert!(m.log().is_err());
        assert_eq!(1.0, m.get("ham"));
    }

    #[test]
    fn test_inner_product() {
        let a = map(&[("x", 2.0), ("y", 3.0)], 0.0);
        let b = map(&[("y", 4.0), ("z", 5.0)], 0.0);

        assert_eq!(12.0, a.inner_product(&b));
        assert_eq!(12.0, b.inner_product(&a));
        assert_eq!(13.0, a.inner_product(&a));
    }

    #[test]
    fn test_arg_max() {
        let m = map(&[("spam", 2.0), ("ham", 3.0), ("eggs", -1.0)], 0.0);

        assert_eq!(Some(&"ham"), m.arg_max());
        assert_eq!(None, WeightedMap::<&str>::new().arg_max());
    }

    #[test]
    fn test_arg_max_tie_is_deterministic() {
        let m = map(&[("spam", 1.0), ("ham", 1.0), ("eggs", 1.0)], 0.0);
        let first = *m.arg_max().unwrap();

        assert_eq!(Some(&first), m.iter().map(|(k, _)| k).next());
        assert_eq!(Some(&first), m.clone().arg_max());
    }

    #[test]
    fn test_sample_frequencies() {
        let m = map(&[("spam", 0.75), ("ham", 0.25)], 0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let mut n_spam = 0;
        for _ in 0..10000 {
            if *m.sample(&mut rng).unwrap() == "spam" {
                n_spam += 1;
            }
        }
        assert!((7200..7800).contains(&n_spam));
    }

    #[test]
    fn test_sample_point_mass() {
        let m = map(&[("spam", 0.0), ("ham", 1.0)], 0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        for _ in 0..100 {
            assert_eq!(&"ham", m.sample(&mut rng).unwrap());
        }
    }

    #[test]
    fn test_sample_empty() {
        let m = WeightedMap::<&str>::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        assert!(matches!(
            m.sample(&mut rng),
            Err(TagwiseError::DegenerateDistribution(_))
        ));
    }

    #[test]
    fn test_custom_hasher() {
        let mut m: WeightedMap<String, hashbrown::hash_map::DefaultHashBuilder> =
            WeightedMap::with_hasher(0.0, Default::default());
        m.increment("spam".to_string(), 1.0);

        assert_eq!(1.0, m.get("spam"));
    }
}
