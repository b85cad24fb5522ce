//! Emission models consulted by the HMM decoder for emissions unseen in training.

use crate::errors::Result;
use crate::weighted_map::WeightedMap;

/// A model giving a distribution over HMM states for an emission.
///
/// [`HiddenMarkovModel`](crate::HiddenMarkovModel) trains it on the `(state, emission)` pairs
/// of its training stream, sentinels excluded.
pub trait EmissionModel: Send + Sync {
    /// Trains the model on `(state, emission)` pairs.
    fn train(&mut self, labeled_emissions: &[(String, String)]) -> Result<()>;

    /// Gets log-probabilities of the states given `emission`. States absent from the map are
    /// impossible.
    fn label_distribution(&self, emission: &str) -> Result<WeightedMap<String>>;
}
