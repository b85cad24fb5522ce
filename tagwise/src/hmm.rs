//! Higher-order hidden Markov models.

mod decoder;
pub mod history;

use std::borrow::Cow;

use rand::Rng;

use crate::errors::{Result, TagwiseError};
use crate::fallback::EmissionModel;
use crate::weighted_map::WeightedMap;
use crate::weighted_table::WeightedTable;

pub use decoder::Decoding;
use history::{is_sentinel, last_label, push_label, start_state, suffix};

/// Label and emission opening every sentence.
pub const START_LABEL: &str = "<START>";

/// Label and emission closing every sentence.
pub const STOP_LABEL: &str = "<STOP>";

/// Label produced when nothing better is known.
pub const UNK_LABEL: &str = "<UNK>";

/// Largest supported history order.
pub const MAX_HISTORY_ORDER: usize = 10;

/// Mixing weight of every reduced history when smoothing.
const REDUCED_HISTORY_WEIGHT: f64 = 0.1;

/// Training parameters of [`HiddenMarkovModel`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HmmConfig {
    /// Number of previous labels a state remembers, from 1 to [`MAX_HISTORY_ORDER`].
    pub history_order: usize,

    /// Mixes in the statistics of shorter histories.
    pub smoothing: bool,
}

impl Default for HmmConfig {
    fn default() -> Self {
        Self {
            history_order: 2,
            smoothing: true,
        }
    }
}

/// Hidden Markov model whose states are label histories.
///
/// All tables hold natural logarithms of probabilities; impossible events read as `-inf`.
///
/// # Examples
///
/// ```
/// use tagwise::{HiddenMarkovModel, HmmConfig};
///
/// let mut stream = vec![];
/// for _ in 0..6 {
///     stream.push(("A", "a"));
///     stream.push(("B", "b"));
/// }
/// let hmm = HiddenMarkovModel::train(stream, &HmmConfig::default(), None).unwrap();
///
/// assert_eq!(vec!["A", "B", "A", "B"], hmm.label(&["a", "b", "a", "b"]).unwrap());
/// ```
pub struct HiddenMarkovModel {
    history_order: usize,
    emitting_states: Vec<String>,
    transition: WeightedTable<String, String>,
    reverse_transition: WeightedTable<String, String>,
    emission: WeightedTable<String, String>,
    label_emissions: WeightedTable<String, String>,
    fallback: Option<Box<dyn EmissionModel>>,
}

impl HiddenMarkovModel {
    /// Trains a model on a stream of `(label, emission)` pairs.
    ///
    /// The stream is split into sentences at `<START>` and `<STOP>` labels; a stream without
    /// sentinels is one sentence. If `fallback` is given, it is trained on the `(state,
    /// emission)` pairs of the stream and scores emissions unseen in training.
    ///
    /// # Errors
    ///
    /// [`TagwiseError::InvalidArgument`] is returned if the history order is out of range, a
    /// label is empty or contains [`history::SEPARATOR`], or the stream has no labeled token.
    /// Errors of the fallback model are propagated.
    pub fn train<I, L, E>(
        labeled_sequence: I,
        config: &HmmConfig,
        mut fallback: Option<Box<dyn EmissionModel>>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (L, E)>,
        L: Into<String>,
        E: Into<String>,
    {
        let order = config.history_order;
        if order == 0 || order > MAX_HISTORY_ORDER {
            return Err(TagwiseError::invalid_argument(
                "history_order",
                format!("must be between 1 and {MAX_HISTORY_ORDER}"),
            ));
        }
        let sentences = history::split_sentences(labeled_sequence)?;
        if sentences.is_empty() {
            return Err(TagwiseError::invalid_argument(
                "labeled_sequence",
                "contains no labeled emission",
            ));
        }

        let start = start_state(order);
        // history_counts[k - 1] counts the next label given the k newest labels.
        let mut history_counts: Vec<WeightedTable<String, String>> =
            (0..order).map(|_| WeightedTable::new()).collect();
        let mut emission = WeightedTable::new();
        let mut label_emissions = WeightedTable::new();
        let mut fallback_pairs = vec![];
        for sentence in &sentences {
            emission.increment(start.clone(), START_LABEL.to_string(), 1.0);
            label_emissions.increment(START_LABEL.to_string(), start.clone(), 1.0);
            let stops = std::iter::repeat((STOP_LABEL, STOP_LABEL)).take(order);
            let steps = sentence
                .iter()
                .map(|(l, e)| (l.as_str(), e.as_str()))
                .chain(stops);
            let mut state = start.clone();
            for (label, symbol) in steps {
                for (k, counts) in history_counts.iter_mut().enumerate() {
                    counts.increment(suffix(&state, k + 1).to_string(), label.to_string(), 1.0);
                }
                let next = push_label(&state, label);
                emission.increment(next.clone(), symbol.to_string(), 1.0);
                label_emissions.increment(symbol.to_string(), next.clone(), 1.0);
                if !is_sentinel(label) {
                    fallback_pairs.push((next.clone(), symbol.to_string()));
                }
                state = next;
            }
        }
        for counts in &mut history_counts {
            counts.normalize()?;
        }
        emission.normalize()?;
        label_emissions.normalize()?;

        let mut transition = if config.smoothing {
            Self::smoothed_transitions(&history_counts, &emission)?
        } else {
            let mut transition = WeightedTable::new();
            for (state, next_labels) in history_counts[order - 1].iter() {
                let row = transition.row_mut(state.clone());
                for (label, &prob) in next_labels {
                    row.increment(push_label(state, label), prob);
                }
            }
            transition
        };
        transition.log()?;
        emission.log()?;
        label_emissions.log()?;
        let reverse_transition = transition.inverted();

        let mut emitting_states: Vec<String> = emission
            .row_keys()
            .filter(|state| !is_sentinel(last_label(state)))
            .cloned()
            .collect();
        emitting_states.sort_unstable();

        if let Some(model) = fallback.as_mut() {
            model.train(&fallback_pairs)?;
        }

        tracing::info!(
            history_order = order,
            n_sentences = sentences.len(),
            n_states = emission.len(),
            n_transitions = transition.n_cells(),
            "trained a hidden Markov model"
        );
        Ok(Self {
            history_order: order,
            emitting_states,
            transition,
            reverse_transition,
            emission,
            label_emissions,
            fallback,
        })
    }

    /// Interpolates the next-label distributions of every history length.
    ///
    /// Only transitions into states observed in training are kept; rows are renormalized.
    fn smoothed_transitions(
        history_counts: &[WeightedTable<String, String>],
        emission: &WeightedTable<String, String>,
    ) -> Result<WeightedTable<String, String>> {
        let order = history_counts.len();
        let mut transition = WeightedTable::new();
        for state in history_counts[order - 1].row_keys() {
            let row = transition.row_mut(state.clone());
            for (k, counts) in history_counts.iter().enumerate() {
                let weight = if k + 1 == order {
                    1.0 - REDUCED_HISTORY_WEIGHT * (order - 1) as f64
                } else {
                    REDUCED_HISTORY_WEIGHT
                };
                let next_labels = match counts.row(suffix(state, k + 1)) {
                    Some(next_labels) => next_labels,
                    None => continue,
                };
                for (label, &prob) in next_labels {
                    let next = push_label(state, label);
                    if emission.row(next.as_str()).is_some() {
                        row.increment(next, weight * prob);
                    }
                }
            }
        }
        transition.normalize()?;
        Ok(transition)
    }

    pub const fn history_order(&self) -> usize {
        self.history_order
    }

    /// Gets the states that emit real tokens, sorted.
    pub fn emitting_states(&self) -> &[String] {
        &self.emitting_states
    }

    /// Gets `log P(next state | state)` indexed by `state → next state`.
    pub const fn transition(&self) -> &WeightedTable<String, String> {
        &self.transition
    }

    /// Gets the transition table indexed by `next state → state`.
    pub const fn reverse_transition(&self) -> &WeightedTable<String, String> {
        &self.reverse_transition
    }

    /// Gets `log P(emission | state)` indexed by `state → emission`.
    pub const fn emission(&self) -> &WeightedTable<String, String> {
        &self.emission
    }

    /// Gets `log P(state | emission)` indexed by `emission → state`.
    pub const fn label_emissions(&self) -> &WeightedTable<String, String> {
        &self.label_emissions
    }

    /// Gets log-scores of states for an emission unseen in training.
    fn unseen_emission_scores(&self, emission: &str) -> Result<WeightedMap<String>> {
        let mut scores = match &self.fallback {
            Some(model) => model.label_distribution(emission)?,
            None => {
                let uniform = -(self.emitting_states.len() as f64).ln();
                self.emitting_states
                    .iter()
                    .map(|state| (state.clone(), uniform))
                    .collect()
            }
        };
        scores.set_default(f64::NEG_INFINITY);
        Ok(scores)
    }

    /// Gets log-scores of every state for `emission`.
    ///
    /// Seen emissions use `log P(state | emission)`; unseen ones use the fallback model, or a
    /// uniform distribution over the emitting states without one.
    pub fn emission_scores(&self, emission: &str) -> Result<Cow<'_, WeightedMap<String>>> {
        match self.label_emissions.row(emission) {
            Some(scores) => Ok(Cow::Borrowed(scores)),
            None => Ok(Cow::Owned(self.unseen_emission_scores(emission)?)),
        }
    }

    /// Scores a labeled sentence.
    ///
    /// The score is the START emission score plus, for each pair followed by the closing STOP
    /// pairs, the transition log-probability into the next state and the emission score of
    /// that state. Sentinel pairs must not be included.
    pub fn score<I, L, E>(&self, labeled_sequence: I) -> Result<f64>
    where
        I: IntoIterator<Item = (L, E)>,
        L: AsRef<str>,
        E: AsRef<str>,
    {
        let mut state = start_state(self.history_order);
        let mut score = self.emission_scores(START_LABEL)?.get(state.as_str());
        for (label, emission) in labeled_sequence {
            score += self.step_score(&mut state, label.as_ref(), emission.as_ref())?;
        }
        for _ in 0..self.history_order {
            score += self.step_score(&mut state, STOP_LABEL, STOP_LABEL)?;
        }
        Ok(score)
    }

    fn step_score(&self, state: &mut String, label: &str, emission: &str) -> Result<f64> {
        let next = push_label(state, label);
        let score = self.transition.get(state.as_str(), next.as_str())
            + self.emission_scores(emission)?.get(next.as_str());
        *state = next;
        Ok(score)
    }

    /// Returns an endless stream of `(label, emission)` pairs drawn from the model.
    ///
    /// Each sentence is framed by a `<START>` pair and `<STOP>` pairs.
    pub fn sample<R>(&self, rng: R) -> Sampler<'_, R>
    where
        R: Rng,
    {
        Sampler {
            model: self,
            rng,
            state: None,
        }
    }

    fn sample_emission<R>(&self, state: &str, rng: &mut R) -> String
    where
        R: Rng,
    {
        let label = last_label(state);
        if is_sentinel(label) {
            return label.to_string();
        }
        self.emission
            .row(state)
            .and_then(|row| row.exp().sample(rng).ok().cloned())
            .unwrap_or_else(|| UNK_LABEL.to_string())
    }
}

/// Iterator returned by [`HiddenMarkovModel::sample`].
pub struct Sampler<'a, R> {
    model: &'a HiddenMarkovModel,
    rng: R,
    state: Option<String>,
}

impl<'a, R> Iterator for Sampler<'a, R>
where
    R: Rng,
{
    type Item = (String, String);

    fn next(&mut self) -> Option<Self::Item> {
        let model = self.model;
        let next_state = self
            .state
            .as_deref()
            .and_then(|state| model.transition.row(state))
            .and_then(|row| row.exp().sample(&mut self.rng).ok().cloned());
        match next_state {
            Some(state) => {
                let label = last_label(&state).to_string();
                let emission = model.sample_emission(&state, &mut self.rng);
                self.state = Some(state);
                Some((label, emission))
            }
            None => {
                // Nothing follows the current state: open a new sentence.
                self.state = Some(start_state(model.history_order));
                Some((START_LABEL.to_string(), START_LABEL.to_string()))
            }
        }
    }
}
