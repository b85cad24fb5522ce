//! Maximum entropy (multinomial logistic regression) classification.

use crate::errors::{Result, TagwiseError};
use crate::fallback::EmissionModel;
use crate::feature::NgramExtractor;
use crate::minimizer::{Minimizer, MinimizerConfig};
use crate::objective::{Objective, Point};
use crate::weighted_map::WeightedMap;
use crate::weighted_table::WeightedTable;

/// Weights indexed by `label → feature`.
pub type Weights = WeightedTable<String, String>;

/// Tolerance on the total mass of a computed label distribution.
const DISTRIBUTION_TOLERANCE: f64 = 1e-4;

/// Computes log-probabilities of `labels` given feature counts.
///
/// Each label scores `Σ_f weights[label][f] * features[f]`; the scores are normalized with
/// log-sum-exp. Labels outside `labels` are absent from the result and read as `-inf`.
///
/// # Errors
///
/// [`TagwiseError::InvalidArgument`] is returned if `labels` is empty.
/// [`TagwiseError::DegenerateDistribution`] is returned if a score is NaN or the resulting
/// probabilities do not sum to one.
pub fn log_probabilities(
    features: &WeightedMap<String>,
    weights: &Weights,
    labels: &[String],
) -> Result<WeightedMap<String>> {
    if labels.is_empty() {
        return Err(TagwiseError::invalid_argument("labels", "is empty"));
    }
    let mut log_probs = WeightedMap::with_default(f64::NEG_INFINITY);
    for label in labels {
        let score: f64 = features
            .iter()
            .map(|(feature, &count)| weights.get(label.as_str(), feature.as_str()) * count)
            .sum();
        if score.is_nan() {
            return Err(TagwiseError::degenerate_distribution(format!(
                "the score of label {label} is NaN"
            )));
        }
        log_probs.entries.insert(label.clone(), score);
    }
    log_probs.log_normalize()?;

    let total: f64 = log_probs.values().map(|v| v.exp()).sum();
    if (total - 1.0).abs() > DISTRIBUTION_TOLERANCE {
        return Err(TagwiseError::degenerate_distribution(format!(
            "label probabilities sum to {total}"
        )));
    }
    Ok(log_probs)
}

struct Evaluation {
    weights: Weights,
    value: f64,
    gradient: Weights,
}

/// Negative conditional log-likelihood of labeled feature counts, with an optional Gaussian
/// prior on the weights.
///
/// `sigma == 0` disables the prior.
pub struct MaxEntObjective {
    labeled_features: Vec<(String, WeightedMap<String>)>,
    labels: Vec<String>,
    sigma: f64,
    empirical_counts: Weights,
    last_evaluation: Option<Evaluation>,
}

impl MaxEntObjective {
    /// Creates a new objective.
    ///
    /// # Errors
    ///
    /// [`TagwiseError::InvalidArgument`] is returned if `labeled_features` is empty or `sigma`
    /// is negative or NaN.
    pub fn new(labeled_features: Vec<(String, WeightedMap<String>)>, sigma: f64) -> Result<Self> {
        if labeled_features.is_empty() {
            return Err(TagwiseError::invalid_argument(
                "labeled_features",
                "is empty",
            ));
        }
        if !(sigma >= 0.0) {
            return Err(TagwiseError::invalid_argument(
                "sigma",
                "must be a non-negative number",
            ));
        }
        let mut labels: Vec<String> = labeled_features.iter().map(|(l, _)| l.clone()).collect();
        labels.sort_unstable();
        labels.dedup();

        let mut empirical_counts = Weights::new();
        for (label, features) in &labeled_features {
            let row = empirical_counts.row_mut(label.clone());
            for (feature, &count) in features {
                row.increment(feature.clone(), count);
            }
        }
        Ok(Self {
            labeled_features,
            labels,
            sigma,
            empirical_counts,
            last_evaluation: None,
        })
    }

    /// Gets the sorted set of training labels.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn penalty(&self, weights: &Weights) -> f64 {
        if self.sigma == 0.0 {
            0.0
        } else {
            weights.dot(weights) / (2.0 * self.sigma * self.sigma)
        }
    }

    fn cached(&self, weights: &Weights) -> Option<&Evaluation> {
        self.last_evaluation
            .as_ref()
            .filter(|evaluation| &evaluation.weights == weights)
    }
}

impl Objective for MaxEntObjective {
    type Point = Weights;

    fn value(&mut self, weights: &Weights) -> Result<f64> {
        if let Some(evaluation) = self.cached(weights) {
            return Ok(evaluation.value);
        }
        let mut value = self.penalty(weights);
        for (label, features) in &self.labeled_features {
            value -= log_probabilities(features, weights, &self.labels)?.get(label.as_str());
        }
        Ok(value)
    }

    fn value_and_gradient(&mut self, weights: &Weights) -> Result<(f64, Weights)> {
        if let Some(evaluation) = self.cached(weights) {
            return Ok((evaluation.value, evaluation.gradient.clone()));
        }
        let mut value = 0.0;
        let mut expected_counts = Weights::new();
        for (label, features) in &self.labeled_features {
            let log_probs = log_probabilities(features, weights, &self.labels)?;
            value -= log_probs.get(label.as_str());
            for (candidate, log_prob) in &log_probs {
                let prob = log_prob.exp();
                let row = expected_counts.row_mut(candidate.clone());
                for (feature, &count) in features {
                    row.increment(feature.clone(), prob * count);
                }
            }
        }
        let mut gradient = expected_counts;
        gradient -= &self.empirical_counts;
        if self.sigma != 0.0 {
            value += self.penalty(weights);
            gradient.add_scaled(weights, 1.0 / (self.sigma * self.sigma));
        }

        self.last_evaluation = Some(Evaluation {
            weights: weights.clone(),
            value,
            gradient: gradient.clone(),
        });
        Ok((value, gradient))
    }
}

/// Maximum entropy classifier over character n-gram features.
///
/// # Examples
///
/// ```
/// use tagwise::MaxEntClassifier;
///
/// let mut classifier = MaxEntClassifier::default();
/// classifier
///     .train([("fruit", "apple"), ("fruit", "banana"), ("city", "zurich"), ("city", "zagreb")])
///     .unwrap();
///
/// assert_eq!("fruit", classifier.label("bananas").unwrap());
/// ```
#[derive(Clone, Debug)]
pub struct MaxEntClassifier {
    extractor: NgramExtractor,
    sigma: f64,
    minimizer_config: MinimizerConfig,
    labels: Vec<String>,
    weights: Weights,
}

impl MaxEntClassifier {
    /// Creates an untrained classifier using `extractor` for raw data.
    pub fn new(extractor: NgramExtractor) -> Self {
        Self {
            extractor,
            sigma: 1.0,
            minimizer_config: MinimizerConfig::default(),
            labels: vec![],
            weights: Weights::new(),
        }
    }

    /// Sets the standard deviation of the Gaussian prior. `0.0` disables it.
    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// Sets the configuration of the weight optimizer.
    pub fn minimizer_config(mut self, config: MinimizerConfig) -> Self {
        self.minimizer_config = config;
        self
    }

    /// Trains weights on pre-extracted feature counts.
    pub fn train_with_features(
        &mut self,
        labeled_features: Vec<(String, WeightedMap<String>)>,
    ) -> Result<()> {
        let mut objective = MaxEntObjective::new(labeled_features, self.sigma)?;
        tracing::info!(
            n_labels = objective.labels().len(),
            sigma = self.sigma,
            "training a maximum entropy classifier"
        );
        let minimizer = Minimizer::new(self.minimizer_config.clone());
        self.weights = minimizer.minimize(&mut objective, Weights::new())?;
        self.labels = objective.labels().to_vec();
        Ok(())
    }

    /// Trains weights on `(label, datum)` pairs.
    pub fn train<I, L, D>(&mut self, labeled_data: I) -> Result<()>
    where
        I: IntoIterator<Item = (L, D)>,
        L: Into<String>,
        D: AsRef<str>,
    {
        let labeled_features = labeled_data
            .into_iter()
            .map(|(label, datum)| (label.into(), self.extractor.extract(datum.as_ref())))
            .collect();
        self.train_with_features(labeled_features)
    }

    /// Gets the labels seen in training, sorted.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub const fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Computes label log-probabilities for feature counts.
    ///
    /// # Errors
    ///
    /// [`TagwiseError::InvalidArgument`] is returned if the classifier is not trained.
    pub fn log_probabilities(&self, features: &WeightedMap<String>) -> Result<WeightedMap<String>> {
        log_probabilities(features, &self.weights, &self.labels)
    }

    /// Computes label log-probabilities for a raw datum.
    pub fn label_distribution(&self, datum: &str) -> Result<WeightedMap<String>> {
        self.log_probabilities(&self.extractor.extract(datum))
    }

    /// Gets the most probable label of a raw datum.
    pub fn label(&self, datum: &str) -> Result<String> {
        let log_probs = self.label_distribution(datum)?;
        log_probs
            .arg_max()
            .cloned()
            .ok_or_else(|| TagwiseError::invalid_argument("datum", "no label can be predicted"))
    }
}

impl Default for MaxEntClassifier {
    fn default() -> Self {
        Self::new(NgramExtractor::default())
    }
}

impl EmissionModel for MaxEntClassifier {
    fn train(&mut self, labeled_emissions: &[(String, String)]) -> Result<()> {
        MaxEntClassifier::train(
            self,
            labeled_emissions
                .iter()
                .map(|(state, emission)| (state.as_str(), emission.as_str())),
        )
    }

    fn label_distribution(&self, emission: &str) -> Result<WeightedMap<String>> {
        MaxEntClassifier::label_distribution(self, emission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(names: &[&str]) -> WeightedMap<String> {
        names.iter().map(|&name| (name.to_string(), 1.0)).collect()
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|&name| name.to_string()).collect()
    }

    fn cats_and_bears() -> Vec<(String, WeightedMap<String>)> {
        vec![
            ("cat".to_string(), features(&["fuzzy", "claws", "small"])),
            ("bear".to_string(), features(&["fuzzy", "claws", "big"])),
            ("cat".to_string(), features(&["claws", "medium"])),
        ]
    }

    fn round2(x: f64) -> f64 {
        (x * 100.0).round() / 100.0
    }

    #[test]
    fn test_uneven_weights() {
        let mut weights = Weights::new();
        weights.increment("dog".to_string(), "warm".to_string(), 2.0);
        weights.increment("dog".to_string(), "fuzzy".to_string(), 1.0);
        weights.increment("cat".to_string(), "warm".to_string(), 1.0);
        weights.increment("cat".to_string(), "fuzzy".to_string(), 1.0);

        let log_probs =
            log_probabilities(&features(&["warm", "fuzzy"]), &weights, &labels(&["dog", "cat"]))
                .unwrap();

        assert!((log_probs.get("dog").exp() - 0.731).abs() < 1e-3);
        assert!((log_probs.get("cat").exp() - 0.269).abs() < 1e-3);
    }

    #[test]
    fn test_zero_weights_are_uniform() {
        let log_probs = log_probabilities(
            &features(&["warm", "fuzzy"]),
            &Weights::new(),
            &labels(&["dog", "cat"]),
        )
        .unwrap();

        assert!((log_probs.get("dog").exp() - 0.5).abs() < 1e-12);
        assert!((log_probs.get("cat").exp() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_label() {
        let mut weights = Weights::new();
        weights.increment("dog".to_string(), "warm".to_string(), 5.0);
        let log_probs =
            log_probabilities(&features(&["warm"]), &weights, &labels(&["dog"])).unwrap();

        assert_eq!(0.0, log_probs.get("dog"));
    }

    #[test]
    fn test_extraneous_label() {
        let log_probs =
            log_probabilities(&features(&["warm"]), &Weights::new(), &labels(&["dog", "cat"]))
                .unwrap();

        assert_eq!(f64::NEG_INFINITY, log_probs.get("bear"));
    }

    #[test]
    fn test_no_labels() {
        let r = log_probabilities(&features(&["warm"]), &Weights::new(), &[]);

        assert_eq!(
            "InvalidArgumentError: labels: is empty",
            &r.err().unwrap().to_string()
        );
    }

    #[test]
    fn test_empty_training_data() {
        let r = MaxEntObjective::new(vec![], 1.0);

        assert!(matches!(r, Err(TagwiseError::InvalidArgument(_))));
    }

    #[test]
    fn test_objective_labels_sorted() {
        let objective = MaxEntObjective::new(cats_and_bears(), 1.0).unwrap();

        assert_eq!(&labels(&["bear", "cat"]), objective.labels());
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let mut objective = MaxEntObjective::new(cats_and_bears(), 1.0).unwrap();
        let mut weights = Weights::new();
        weights.increment("cat".to_string(), "claws".to_string(), 0.3);
        weights.increment("bear".to_string(), "big".to_string(), -0.2);

        let (value, gradient) = objective.value_and_gradient(&weights).unwrap();
        let h = 1e-6;
        for (label, feature) in [("cat", "claws"), ("bear", "fuzzy"), ("cat", "small")] {
            let mut shifted = weights.clone();
            shifted.increment(label.to_string(), feature.to_string(), h);
            let numeric = (objective.value(&shifted).unwrap() - value) / h;

            assert!((numeric - gradient.get(label, feature)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_memoized_evaluation() {
        let mut objective = MaxEntObjective::new(cats_and_bears(), 1.0).unwrap();
        let mut weights = Weights::new();
        weights.increment("cat".to_string(), "claws".to_string(), 0.5);

        let (value, gradient) = objective.value_and_gradient(&weights).unwrap();
        let (cached_value, cached_gradient) = objective.value_and_gradient(&weights).unwrap();

        assert_eq!(value, cached_value);
        assert_eq!(gradient, cached_gradient);
        assert_eq!(value, objective.value(&weights).unwrap());
    }

    #[test]
    fn test_cats_and_bears_without_prior() {
        let mut classifier = MaxEntClassifier::default().sigma(0.0);
        classifier.train_with_features(cats_and_bears()).unwrap();

        let log_probs = classifier
            .log_probabilities(&features(&["claws", "small"]))
            .unwrap();
        assert_eq!(1.0, round2(log_probs.get("cat").exp()));
    }

    #[test]
    fn test_cats_and_bears_with_prior() {
        let mut classifier = MaxEntClassifier::default().sigma(1.0);
        classifier.train_with_features(cats_and_bears()).unwrap();

        let log_probs = classifier
            .log_probabilities(&features(&["claws", "small"]))
            .unwrap();
        assert_eq!(0.73, round2(log_probs.get("cat").exp()));
        assert_eq!(&labels(&["bear", "cat"]), classifier.labels());
    }

    #[test]
    fn test_untrained_classifier() {
        let classifier = MaxEntClassifier::default();

        assert!(classifier.label("apple").is_err());
    }

    #[test]
    fn test_train_on_strings() {
        let mut classifier = MaxEntClassifier::default();
        classifier
            .train([
                ("fruit", "apple"),
                ("fruit", "banana"),
                ("city", "zurich"),
                ("city", "zagreb"),
            ])
            .unwrap();

        assert_eq!("fruit", classifier.label("bananas").unwrap());
        assert_eq!("city", classifier.label("zug").unwrap());
    }

    #[test]
    fn test_emission_model() {
        let mut model: Box<dyn EmissionModel> = Box::new(MaxEntClassifier::default());
        model
            .train(&[
                ("NN".to_string(), "dog".to_string()),
                ("NN".to_string(), "cat".to_string()),
                ("VB".to_string(), "running".to_string()),
                ("VB".to_string(), "jumping".to_string()),
            ])
            .unwrap();

        let log_probs = model.label_distribution("swimming").unwrap();
        assert!(log_probs.get("VB") > log_probs.get("NN"));
        let total: f64 = log_probs.values().map(|v| v.exp()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
