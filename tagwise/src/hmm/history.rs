//! Encoding of label histories as HMM states.
//!
//! A state of an order-`H` model is its last `H` labels joined with [`SEPARATOR`], oldest
//! first. The first state of a sentence repeats `<START>` and the last one repeats `<STOP>`.

use crate::errors::{Result, TagwiseError};
use crate::hmm::{START_LABEL, STOP_LABEL};

/// Separator of labels inside a state.
pub const SEPARATOR: &str = "::";

fn repeated(label: &str, order: usize) -> String {
    vec![label; order].join(SEPARATOR)
}

/// Gets the state opening every sentence.
pub fn start_state(order: usize) -> String {
    repeated(START_LABEL, order)
}

/// Gets the state closing every sentence.
pub fn stop_state(order: usize) -> String {
    repeated(STOP_LABEL, order)
}

/// Drops the oldest label of `state` and appends `label`.
pub fn push_label(state: &str, label: &str) -> String {
    match state.split_once(SEPARATOR) {
        Some((_, rest)) => format!("{rest}{SEPARATOR}{label}"),
        None => label.to_string(),
    }
}

/// Gets the newest label of `state`.
pub fn last_label(state: &str) -> &str {
    state
        .rsplit_once(SEPARATOR)
        .map_or(state, |(_, label)| label)
}

/// Gets the `k` newest labels of `state`, or the whole state if it is shorter.
pub fn suffix(state: &str, k: usize) -> &str {
    match state.rmatch_indices(SEPARATOR).nth(k.saturating_sub(1)) {
        Some((i, _)) if k != 0 => &state[i + SEPARATOR.len()..],
        _ => state,
    }
}

/// Returns `true` if `label` is `<START>` or `<STOP>`.
pub fn is_sentinel(label: &str) -> bool {
    label == START_LABEL || label == STOP_LABEL
}

/// Splits a labeled stream into sentences.
///
/// `<START>` begins a new sentence and `<STOP>` ends the current one; the sentinel pairs are not
/// part of any sentence. Empty sentences are dropped.
///
/// # Errors
///
/// [`TagwiseError::InvalidArgument`] is returned if a label contains [`SEPARATOR`] or is empty.
pub fn split_sentences<I, L, E>(labeled_sequence: I) -> Result<Vec<Vec<(String, String)>>>
where
    I: IntoIterator<Item = (L, E)>,
    L: Into<String>,
    E: Into<String>,
{
    let mut sentences = vec![];
    let mut current: Vec<(String, String)> = vec![];
    for (label, emission) in labeled_sequence {
        let label: String = label.into();
        if is_sentinel(&label) {
            if !current.is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
            continue;
        }
        if label.is_empty() {
            return Err(TagwiseError::invalid_argument(
                "labeled_sequence",
                "contains an empty label",
            ));
        }
        if label.contains(SEPARATOR) {
            return Err(TagwiseError::invalid_argument(
                "labeled_sequence",
                format!("label `{label}` contains the separator `{SEPARATOR}`"),
            ));
        }
        current.push((label, emission.into()));
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    Ok(sentences)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stop_states() {
        assert_eq!("<START>", start_state(1));
        assert_eq!("<START>::<START>::<START>", start_state(3));
        assert_eq!("<STOP>::<STOP>", stop_state(2));
    }

    #[test]
    fn test_push_label() {
        assert_eq!("A", push_label("<START>", "A"));
        assert_eq!("<START>::A", push_label("<START>::<START>", "A"));
        assert_eq!("B::C", push_label("A::B", "C"));
    }

    #[test]
    fn test_last_label() {
        assert_eq!("A", last_label("A"));
        assert_eq!("C", last_label("A::B::C"));
    }

    #[test]
    fn test_suffix() {
        assert_eq!("C", suffix("A::B::C", 1));
        assert_eq!("B::C", suffix("A::B::C", 2));
        assert_eq!("A::B::C", suffix("A::B::C", 3));
        assert_eq!("A::B::C", suffix("A::B::C", 4));
        assert_eq!("A", suffix("A", 1));
    }

    #[test]
    fn test_split_sentences() {
        let stream = vec![
            ("<START>", "<START>"),
            ("A", "a"),
            ("B", "b"),
            ("<STOP>", "<STOP>"),
            ("<START>", "<START>"),
            ("<STOP>", "<STOP>"),
            ("C", "c"),
        ];
        let sentences = split_sentences(stream).unwrap();

        assert_eq!(2, sentences.len());
        assert_eq!(
            vec![
                ("A".to_string(), "a".to_string()),
                ("B".to_string(), "b".to_string())
            ],
            sentences[0]
        );
        assert_eq!(vec![("C".to_string(), "c".to_string())], sentences[1]);
    }

    #[test]
    fn test_split_sentences_separator_in_label() {
        let r = split_sentences(vec![("A::B", "a")]);

        assert_eq!(
            "InvalidArgumentError: labeled_sequence: label `A::B` contains the separator `::`",
            &r.err().unwrap().to_string()
        );
    }
}
