//! Character n-gram features.

use crate::errors::{Result, TagwiseError};
use crate::weighted_map::WeightedMap;

/// Symbol padding the beginning of a datum.
pub const BEGIN_PADDING: char = '^';

/// Symbol padding the end of a datum.
pub const END_PADDING: char = '$';

/// Extracts character n-grams of every length from 1 to `ngram_size`.
///
/// With padding enabled, `ngram_size - 1` boundary symbols are added on each side, and n-grams
/// consisting only of boundary symbols are skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NgramExtractor {
    ngram_size: usize,
    padding: bool,
}

impl NgramExtractor {
    /// Creates a new extractor.
    ///
    /// # Errors
    ///
    /// [`TagwiseError::InvalidArgument`] is returned if `ngram_size` is zero.
    pub fn new(ngram_size: usize, padding: bool) -> Result<Self> {
        if ngram_size == 0 {
            return Err(TagwiseError::invalid_argument(
                "ngram_size",
                "must be at least 1",
            ));
        }
        Ok(Self {
            ngram_size,
            padding,
        })
    }

    pub const fn ngram_size(&self) -> usize {
        self.ngram_size
    }

    /// Lists n-grams by end position, shortest first.
    pub fn ngrams(&self, datum: &str) -> Vec<String> {
        if datum.is_empty() {
            return vec![];
        }
        let n_pad = if self.padding { self.ngram_size - 1 } else { 0 };
        let chars: Vec<char> = std::iter::repeat(BEGIN_PADDING)
            .take(n_pad)
            .chain(datum.chars())
            .chain(std::iter::repeat(END_PADDING).take(n_pad))
            .collect();
        let n_real = chars.len() - 2 * n_pad;
        let mut ngrams = vec![];
        for end in 1..=chars.len() {
            for n in 1..=self.ngram_size.min(end) {
                let start = end - n;
                // Skip windows lying entirely in the padding.
                if end <= n_pad || start >= n_pad + n_real {
                    continue;
                }
                ngrams.push(chars[start..end].iter().collect());
            }
        }
        ngrams
    }

    /// Counts the n-grams of `datum`.
    pub fn extract(&self, datum: &str) -> WeightedMap<String> {
        let mut counts = WeightedMap::new();
        for ngram in self.ngrams(datum) {
            counts.increment(ngram, 1.0);
        }
        counts
    }
}

impl Default for NgramExtractor {
    /// Padded character trigrams.
    fn default() -> Self {
        Self {
            ngram_size: 3,
            padding: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ngrams() {
        let extractor = NgramExtractor::new(2, false).unwrap();

        assert_eq!(vec!["a", "b", "ab", "c", "bc"], extractor.ngrams("abc"));
    }

    #[test]
    fn test_ngrams_padding() {
        let extractor = NgramExtractor::new(2, true).unwrap();

        assert_eq!(vec!["a", "^a", "b", "ab", "b$"], extractor.ngrams("ab"));
    }

    #[test]
    fn test_ngrams_multibyte() {
        let extractor = NgramExtractor::new(2, false).unwrap();

        assert_eq!(vec!["猫", "と", "猫と"], extractor.ngrams("猫と"));
    }

    #[test]
    fn test_ngrams_empty() {
        let extractor = NgramExtractor::new(3, true).unwrap();

        assert!(extractor.ngrams("").is_empty());
    }

    #[test]
    fn test_extract_counts() {
        let extractor = NgramExtractor::new(1, false).unwrap();
        let counts = extractor.extract("abca");

        assert_eq!(2.0, counts.get("a"));
        assert_eq!(1.0, counts.get("c"));
        assert_eq!(3, counts.len());
    }

    #[test]
    fn test_zero_size() {
        let r = NgramExtractor::new(0, false);

        assert_eq!(
            "InvalidArgumentError: ngram_size: must be at least 1",
            &r.err().unwrap().to_string()
        );
    }
}
