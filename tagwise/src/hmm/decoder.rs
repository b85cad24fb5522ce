use hashbrown::HashMap;

use crate::errors::Result;
use crate::hmm::history::{last_label, start_state, stop_state};
use crate::hmm::{HiddenMarkovModel, START_LABEL, STOP_LABEL, UNK_LABEL};
use crate::weighted_map::WeightedMap;

/// Result of Viterbi decoding.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoding {
    /// One label per emission.
    pub labels: Vec<String>,

    /// Log-score of the best path including the closing STOP states. `-inf` if no complete
    /// path exists.
    pub score: f64,

    /// Emission indices whose state could not be recovered through a backpointer and was
    /// chosen from the scores at that position instead.
    pub fallback_positions: Vec<usize>,
}

impl HiddenMarkovModel {
    /// Finds the most probable label sequence for `emissions`.
    ///
    /// The sequence is decoded between the START state and `history_order` STOP states.
    /// States with `-inf` scores are pruned. When a position of the best path has no
    /// backpointer, the best-scoring state of the previous position is taken; if that position
    /// is fully pruned, the best state by emission score; failing that, `<UNK>`.
    ///
    /// # Errors
    ///
    /// Errors of the fallback emission model are propagated.
    pub fn decode<E>(&self, emissions: &[E]) -> Result<Decoding>
    where
        E: AsRef<str>,
    {
        let order = self.history_order;
        let padded: Vec<&str> = std::iter::once(START_LABEL)
            .chain(emissions.iter().map(|e| e.as_ref()))
            .chain(std::iter::repeat(STOP_LABEL).take(order))
            .collect();

        let mut unseen = HashMap::new();
        for &emission in &padded {
            if self.label_emissions.row(emission).is_none() && !unseen.contains_key(emission) {
                unseen.insert(emission, self.unseen_emission_scores(emission)?);
            }
        }
        let emission_scores: Vec<&WeightedMap<String>> = padded
            .iter()
            .map(|&emission| {
                self.label_emissions
                    .row(emission)
                    .unwrap_or_else(|| &unseen[emission])
            })
            .collect();

        let start = start_state(order);
        let mut scores = Vec::with_capacity(padded.len());
        let mut backpointers: Vec<HashMap<&str, &str>> = Vec::with_capacity(padded.len());
        let mut initial = WeightedMap::with_default(f64::NEG_INFINITY);
        let initial_score = emission_scores[0].get(start.as_str());
        if initial_score > f64::NEG_INFINITY {
            initial.set(start.as_str(), initial_score)?;
        }
        scores.push(initial);
        backpointers.push(HashMap::new());

        for position in 1..padded.len() {
            let previous = &scores[position - 1];
            let mut current = WeightedMap::with_default(f64::NEG_INFINITY);
            let mut pointers = HashMap::new();
            for (state, incoming) in self.reverse_transition.iter() {
                let mut best: Option<(&str, f64)> = None;
                for (history, &log_prob) in incoming {
                    let previous_score = previous.get(history.as_str());
                    if previous_score == f64::NEG_INFINITY {
                        continue;
                    }
                    let score = previous_score + log_prob;
                    if best.map_or(true, |(_, b)| score > b) {
                        best = Some((history.as_str(), score));
                    }
                }
                if let Some((history, score)) = best {
                    if score == f64::NEG_INFINITY {
                        continue;
                    }
                    pointers.insert(state.as_str(), history);
                    let score = score + emission_scores[position].get(state.as_str());
                    if score > f64::NEG_INFINITY {
                        current.set(state.as_str(), score)?;
                    }
                }
            }
            scores.push(current);
            backpointers.push(pointers);
        }

        let last = padded.len() - 1;
        let stop = stop_state(order);
        let score = scores[last].get(stop.as_str());
        let mut fallback_positions = vec![];
        // Path states from position `last - 1` down to 0.
        let mut path: Vec<String> = Vec::with_capacity(padded.len());
        let mut current = stop;
        for position in (1..=last).rev() {
            let previous = match backpointers[position].get(current.as_str()) {
                Some(&history) => history.to_string(),
                None => {
                    if (1..=emissions.len()).contains(&(position - 1)) {
                        fallback_positions.push(position - 2);
                    }
                    tracing::debug!(
                        position = position - 1,
                        state = current.as_str(),
                        "no backpointer; choosing the best-scoring state"
                    );
                    Self::best_state(&scores[position - 1], emission_scores[position - 1])
                }
            };
            path.push(previous.clone());
            current = previous;
        }
        path.reverse();
        fallback_positions.reverse();

        let labels = path
            .iter()
            .skip(1)
            .take(emissions.len())
            .map(|state| last_label(state).to_string())
            .collect();
        Ok(Decoding {
            labels,
            score,
            fallback_positions,
        })
    }

    /// Finds the most probable label sequence for `emissions`.
    ///
    /// See [`decode`](Self::decode) for details.
    pub fn label<E>(&self, emissions: &[E]) -> Result<Vec<String>>
    where
        E: AsRef<str>,
    {
        Ok(self.decode(emissions)?.labels)
    }

    fn best_state(scores: &WeightedMap<&str>, emission_scores: &WeightedMap<String>) -> String {
        if let Some(state) = scores.arg_max() {
            return state.to_string();
        }
        emission_scores
            .arg_max()
            .filter(|state| emission_scores.get(state.as_str()) > f64::NEG_INFINITY)
            .map_or_else(|| UNK_LABEL.to_string(), |state| state.clone())
    }
}
