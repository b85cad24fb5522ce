//! Tagged sentences and labeled token streams.

use crate::errors::{Result, TagwiseError};
use crate::hmm::{START_LABEL, STOP_LABEL};

/// Sentence whose tokens carry a label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaggedSentence {
    tokens: Vec<(String, String)>,
}

impl TaggedSentence {
    /// Creates a sentence from `(label, word)` pairs.
    ///
    /// # Errors
    ///
    /// [`TagwiseError::InvalidArgument`] is returned if `tokens` is empty or contains an empty
    /// label or word.
    pub fn new(tokens: Vec<(String, String)>) -> Result<Self> {
        if tokens.is_empty() {
            return Err(TagwiseError::invalid_argument("tokens", "is empty"));
        }
        if tokens.iter().any(|(l, w)| l.is_empty() || w.is_empty()) {
            return Err(TagwiseError::invalid_argument(
                "tokens",
                "contains an empty label or word",
            ));
        }
        Ok(Self { tokens })
    }

    /// Parses a sentence of whitespace-separated `word/LABEL` tokens.
    ///
    /// The label follows the last slash, so words may contain slashes.
    ///
    /// # Errors
    ///
    /// This function will return an error variant when:
    ///
    /// * `tagged_text` is empty.
    /// * `tagged_text` starts/ends with a whitespace.
    /// * `tagged_text` contains consecutive whitespaces.
    /// * a token has no slash, or its word or label is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagwise::TaggedSentence;
    ///
    /// let s = TaggedSentence::from_tagged("Time/NN flies/VBZ").unwrap();
    /// assert_eq!(vec!["NN", "VBZ"], s.labels().collect::<Vec<_>>());
    ///
    /// let s = TaggedSentence::from_tagged("Time flies/VBZ");
    /// assert!(s.is_err());
    /// ```
    pub fn from_tagged<S>(tagged_text: S) -> Result<Self>
    where
        S: AsRef<str>,
    {
        let tagged_text = tagged_text.as_ref();
        if tagged_text.is_empty() {
            return Err(TagwiseError::invalid_argument("tagged_text", "is empty"));
        }
        if tagged_text.starts_with(char::is_whitespace) {
            return Err(TagwiseError::invalid_argument(
                "tagged_text",
                "starts with a whitespace",
            ));
        }
        if tagged_text.ends_with(char::is_whitespace) {
            return Err(TagwiseError::invalid_argument(
                "tagged_text",
                "ends with a whitespace",
            ));
        }

        let mut tokens = vec![];
        for token in tagged_text.split(' ') {
            if token.is_empty() {
                return Err(TagwiseError::invalid_argument(
                    "tagged_text",
                    "contains consecutive whitespaces",
                ));
            }
            let (word, label) = token.rsplit_once('/').ok_or_else(|| {
                TagwiseError::invalid_argument("tagged_text", format!("`{token}` has no label"))
            })?;
            if word.is_empty() || label.is_empty() {
                return Err(TagwiseError::invalid_argument(
                    "tagged_text",
                    format!("`{token}` has an empty word or label"),
                ));
            }
            tokens.push((label.to_string(), word.to_string()));
        }
        Ok(Self { tokens })
    }

    /// Formats the sentence as whitespace-separated `word/LABEL` tokens.
    pub fn to_tagged_string(&self) -> String {
        let mut result = String::new();
        for (i, (label, word)) in self.tokens.iter().enumerate() {
            if i != 0 {
                result.push(' ');
            }
            result.push_str(word);
            result.push('/');
            result.push_str(label);
        }
        result
    }

    /// Gets the `(label, word)` pairs.
    pub fn tokens(&self) -> &[(String, String)] {
        &self.tokens
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|(l, _)| l.as_str())
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|(_, w)| w.as_str())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Concatenates sentences into one labeled stream, each framed by a `<START>` pair and a
/// `<STOP>` pair.
pub fn merge_sentences<'a, I>(sentences: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = &'a TaggedSentence>,
{
    let mut stream = vec![];
    for sentence in sentences {
        stream.push((START_LABEL.to_string(), START_LABEL.to_string()));
        stream.extend(sentence.tokens.iter().cloned());
        stream.push((STOP_LABEL.to_string(), STOP_LABEL.to_string()));
    }
    stream
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tagged() {
        let s = TaggedSentence::from_tagged("The/DT cat/NN sat/VBD").unwrap();

        assert_eq!(3, s.len());
        assert_eq!(vec!["DT", "NN", "VBD"], s.labels().collect::<Vec<_>>());
        assert_eq!(vec!["The", "cat", "sat"], s.words().collect::<Vec<_>>());
    }

    #[test]
    fn test_from_tagged_slash_in_word() {
        let s = TaggedSentence::from_tagged("1/2/CD").unwrap();

        assert_eq!(&[("CD".to_string(), "1/2".to_string())], s.tokens());
    }

    #[test]
    fn test_from_tagged_empty() {
        let s = TaggedSentence::from_tagged("");

        assert_eq!(
            "InvalidArgumentError: tagged_text: is empty",
            &s.err().unwrap().to_string()
        );
    }

    #[test]
    fn test_from_tagged_two_spaces() {
        let s = TaggedSentence::from_tagged("The/DT  cat/NN");

        assert_eq!(
            "InvalidArgumentError: tagged_text: contains consecutive whitespaces",
            &s.err().unwrap().to_string()
        );
    }

    #[test]
    fn test_from_tagged_missing_label() {
        let s = TaggedSentence::from_tagged("The/DT cat");

        assert_eq!(
            "InvalidArgumentError: tagged_text: `cat` has no label",
            &s.err().unwrap().to_string()
        );
        assert!(TaggedSentence::from_tagged("The/DT cat/").is_err());
        assert!(TaggedSentence::from_tagged(" The/DT").is_err());
    }

    #[test]
    fn test_to_tagged_string() {
        let s = TaggedSentence::from_tagged("The/DT cat/NN sat/VBD").unwrap();

        assert_eq!("The/DT cat/NN sat/VBD", s.to_tagged_string());
    }

    #[test]
    fn test_new_empty() {
        assert!(TaggedSentence::new(vec![]).is_err());
    }

    #[test]
    fn test_merge_sentences() {
        let a = TaggedSentence::from_tagged("Hi/UH").unwrap();
        let b = TaggedSentence::from_tagged("Go/VB home/NN").unwrap();
        let stream = merge_sentences(&[a, b]);

        let expected: Vec<(String, String)> = [
            ("<START>", "<START>"),
            ("UH", "Hi"),
            ("<STOP>", "<STOP>"),
            ("<START>", "<START>"),
            ("VB", "Go"),
            ("NN", "home"),
            ("<STOP>", "<STOP>"),
        ]
        .iter()
        .map(|&(l, e)| (l.to_string(), e.to_string()))
        .collect();
        assert_eq!(expected, stream);
    }
}
