//! Multinomial naive Bayes classification.

use crate::errors::{Result, TagwiseError};
use crate::fallback::EmissionModel;
use crate::feature::NgramExtractor;
use crate::weighted_map::WeightedMap;
use crate::weighted_table::WeightedTable;

/// Naive Bayes classifier over character n-gram counts with additive smoothing.
///
/// Each label `l` estimates `P(f | l) = (count(l, f) + alpha) / (Σ_g count(l, g) + alpha * V)`
/// where `V` is the number of distinct features seen in training.
#[derive(Clone, Debug)]
pub struct NaiveBayesClassifier {
    extractor: NgramExtractor,
    alpha: f64,
    log_priors: WeightedMap<String>,
    feature_log_probs: WeightedTable<String, String>,
}

impl NaiveBayesClassifier {
    pub fn new(extractor: NgramExtractor) -> Self {
        Self {
            extractor,
            alpha: 0.01,
            log_priors: WeightedMap::with_default(f64::NEG_INFINITY),
            feature_log_probs: WeightedTable::new(),
        }
    }

    /// Sets the pseudo-count added to every feature.
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Trains the classifier on `(label, datum)` pairs.
    ///
    /// # Errors
    ///
    /// [`TagwiseError::InvalidArgument`] is returned if no pair is given or `alpha` is not
    /// positive.
    pub fn train<I, L, D>(&mut self, labeled_data: I) -> Result<()>
    where
        I: IntoIterator<Item = (L, D)>,
        L: Into<String>,
        D: AsRef<str>,
    {
        if !(self.alpha > 0.0) {
            return Err(TagwiseError::invalid_argument("alpha", "must be positive"));
        }
        let mut label_counts = WeightedMap::new();
        let mut feature_counts = WeightedTable::new();
        let mut vocabulary = WeightedMap::new();
        for (label, datum) in labeled_data {
            let label = label.into();
            let row = feature_counts.row_mut(label.clone());
            for ngram in self.extractor.ngrams(datum.as_ref()) {
                vocabulary.increment(ngram.clone(), 1.0);
                row.increment(ngram, 1.0);
            }
            label_counts.increment(label, 1.0);
        }
        if label_counts.is_empty() {
            return Err(TagwiseError::invalid_argument(
                "labeled_data",
                "is empty",
            ));
        }

        let n_features = vocabulary.len() as f64;
        let mut feature_log_probs = WeightedTable::new();
        for (label, counts) in feature_counts.iter() {
            let denominator = counts.total() + self.alpha * n_features;
            let mut row = WeightedMap::with_default((self.alpha / denominator).ln());
            for (feature, &count) in counts {
                row.set(feature.clone(), ((count + self.alpha) / denominator).ln())?;
            }
            feature_log_probs.insert_row(label.clone(), row);
        }
        label_counts.normalize()?;
        label_counts.log()?;
        label_counts.set_default(f64::NEG_INFINITY);

        tracing::info!(
            n_labels = label_counts.len(),
            n_features = vocabulary.len(),
            "trained a naive Bayes classifier"
        );
        self.log_priors = label_counts;
        self.feature_log_probs = feature_log_probs;
        Ok(())
    }

    /// Gets label log-probabilities of a raw datum.
    ///
    /// # Errors
    ///
    /// [`TagwiseError::InvalidArgument`] is returned if the classifier is not trained.
    pub fn label_distribution(&self, datum: &str) -> Result<WeightedMap<String>> {
        if self.log_priors.is_empty() {
            return Err(TagwiseError::invalid_argument(
                "self",
                "the classifier is not trained",
            ));
        }
        let ngrams = self.extractor.ngrams(datum);
        let mut log_probs = self.log_priors.clone();
        for (label, log_prob) in log_probs.entries.iter_mut() {
            if let Some(row) = self.feature_log_probs.row(label.as_str()) {
                *log_prob += ngrams.iter().map(|ngram| row.get(ngram.as_str())).sum::<f64>();
            }
        }
        log_probs.log_normalize()?;
        Ok(log_probs)
    }

    /// Gets the most probable label of a raw datum.
    pub fn label(&self, datum: &str) -> Result<String> {
        self.label_distribution(datum)?
            .arg_max()
            .cloned()
            .ok_or_else(|| TagwiseError::invalid_argument("datum", "no label can be predicted"))
    }
}

impl Default for NaiveBayesClassifier {
    fn default() -> Self {
        Self::new(NgramExtractor::default())
    }
}

impl EmissionModel for NaiveBayesClassifier {
    fn train(&mut self, labeled_emissions: &[(String, String)]) -> Result<()> {
        NaiveBayesClassifier::train(
            self,
            labeled_emissions
                .iter()
                .map(|(state, emission)| (state.as_str(), emission.as_str())),
        )
    }

    fn label_distribution(&self, emission: &str) -> Result<WeightedMap<String>> {
        NaiveBayesClassifier::label_distribution(self, emission)
    }
}
