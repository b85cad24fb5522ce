#![cfg_attr(docsrs, feature(doc_cfg))]

//! # tagwise
//!
//! tagwise provides building blocks of statistical sequence labeling: sparse weighted maps, a
//! limited-memory quasi-Newton minimizer, maximum entropy and naive Bayes classifiers, and
//! higher-order hidden Markov models with Viterbi decoding.
//!
//! ## Examples
//!
//! ```
//! use tagwise::{merge_sentences, HiddenMarkovModel, HmmConfig, NaiveBayesClassifier, TaggedSentence};
//!
//! let corpus = [
//!     "the/DT dog/NN barks/VBZ",
//!     "a/DT cat/NN sleeps/VBZ",
//!     "the/DT bird/NN sings/VBZ",
//! ];
//! let sentences: Vec<_> = corpus
//!     .iter()
//!     .map(|line| TaggedSentence::from_tagged(line).unwrap())
//!     .collect();
//!
//! let hmm = HiddenMarkovModel::train(
//!     merge_sentences(&sentences),
//!     &HmmConfig::default(),
//!     Some(Box::new(NaiveBayesClassifier::default())),
//! )
//! .unwrap();
//!
//! let labels = hmm.label(&["the", "cow", "sleeps"]).unwrap();
//! assert_eq!(vec!["DT", "NN", "VBZ"], labels);
//! ```

mod fallback;
mod maxent;
mod minimizer;
mod naive_bayes;
mod objective;
mod utils;
mod weighted_map;
mod weighted_table;

pub mod errors;
pub mod feature;
pub mod hmm;
pub mod sentence;

pub use errors::{Result, TagwiseError};
pub use fallback::EmissionModel;
pub use hmm::{Decoding, HiddenMarkovModel, HmmConfig, Sampler};
pub use maxent::{log_probabilities, MaxEntClassifier, MaxEntObjective, Weights};
pub use minimizer::{Minimizer, MinimizerConfig};
pub use naive_bayes::NaiveBayesClassifier;
pub use objective::{Objective, Point};
pub use sentence::{merge_sentences, TaggedSentence};
pub use utils::{log_sum_exp, SplitMix64Builder};
pub use weighted_map::WeightedMap;
pub use weighted_table::WeightedTable;
