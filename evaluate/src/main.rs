use std::collections::BTreeSet;
use std::fs::File;
use std::io::{prelude::*, stderr, stdin, BufReader};
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tagwise::hmm::{START_LABEL, STOP_LABEL};
use tagwise::{
    merge_sentences, EmissionModel, HiddenMarkovModel, HmmConfig, MaxEntClassifier,
    MinimizerConfig, NaiveBayesClassifier, TaggedSentence,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Clone, Copy, Debug)]
enum Fallback {
    None,
    NaiveBayes,
    MaxEnt,
}

impl FromStr for Fallback {
    type Err = &'static str;
    fn from_str(fallback: &str) -> Result<Self, Self::Err> {
        match fallback {
            "none" => Ok(Self::None),
            "naive-bayes" => Ok(Self::NaiveBayes),
            "maxent" => Ok(Self::MaxEnt),
            _ => Err("Could not parse a fallback value"),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "evaluate",
    about = "A program to evaluate the tagging accuracy of a hidden Markov model. Test sentences \
             of word/TAG tokens are read from stdin."
)]
struct Args {
    /// Tagged training corpora, one sentence of word/TAG tokens per line
    #[arg(long, required = true)]
    train: Vec<PathBuf>,

    /// The number of previous tags each state remembers
    #[arg(long, default_value = "2")]
    history_order: usize,

    /// Do not interpolate shorter histories.
    #[arg(long)]
    no_smoothing: bool,

    /// The model scoring words unseen in training: {none, naive-bayes, maxent}.
    /// none: uniform over the tags.
    #[arg(long, default_value = "naive-bayes")]
    fallback: Fallback,

    /// The standard deviation of the weight prior of the maxent fallback (0 disables the prior)
    #[arg(long, default_value = "1.0")]
    sigma: f64,

    /// The maximum number of optimizer iterations of the maxent fallback
    #[arg(long, default_value = "25")]
    max_iterations: usize,

    /// The number of sentences to sample from the trained model after evaluation
    #[arg(long, default_value = "0")]
    sample: usize,

    /// The seed of the sampler
    #[arg(long, default_value = "0")]
    seed: u64,
}

fn load_sentences(path: &PathBuf) -> Result<Vec<TaggedSentence>, Box<dyn std::error::Error>> {
    eprintln!("Loading {path:?} ...");
    let f = BufReader::new(File::open(path)?);
    let mut sentences = vec![];
    for (i, line) in f.lines().enumerate() {
        if i % 10000 == 0 {
            eprint!("# of sentences: {i}\r");
            stderr().flush()?;
        }
        let line = line?;
        if line.is_empty() {
            continue;
        }
        sentences.push(TaggedSentence::from_tagged(&line)?);
    }
    eprintln!("# of sentences: {}", sentences.len());
    Ok(sentences)
}

/// Formats `n_correct / n_total`, or `0/0` when nothing was counted.
fn accuracy(n_correct: usize, n_total: usize) -> String {
    if n_total == 0 {
        return "0/0".to_string();
    }
    (n_correct as f64 / n_total as f64).to_string()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    eprintln!("Loading dataset...");
    let mut train_sents = vec![];
    for path in &args.train {
        train_sents.extend(load_sentences(path)?);
    }
    let vocabulary: BTreeSet<&str> = train_sents.iter().flat_map(|s| s.words()).collect();

    let fallback: Option<Box<dyn EmissionModel>> = match args.fallback {
        Fallback::None => None,
        Fallback::NaiveBayes => Some(Box::new(NaiveBayesClassifier::default())),
        Fallback::MaxEnt => {
            let config = MinimizerConfig {
                max_iterations: args.max_iterations,
                ..MinimizerConfig::default()
            };
            Some(Box::new(
                MaxEntClassifier::default()
                    .sigma(args.sigma)
                    .minimizer_config(config),
            ))
        }
    };
    let config = HmmConfig {
        history_order: args.history_order,
        smoothing: !args.no_smoothing,
    };

    eprintln!("Start training");
    let hmm = HiddenMarkovModel::train(merge_sentences(&train_sents), &config, fallback)?;
    eprintln!("Finish training");

    eprintln!("Start tagging");
    let mut n_tokens = 0;
    let mut n_correct = 0;
    let mut n_unknown = 0;
    let mut n_unknown_correct = 0;
    let mut n_suboptimal = 0;
    for line in stdin().lock().lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let gold = TaggedSentence::from_tagged(&line)?;
        let words: Vec<&str> = gold.words().collect();
        let decoding = hmm.decode(&words)?;

        for ((word, gold_label), guessed_label) in
            words.iter().zip(gold.labels()).zip(&decoding.labels)
        {
            let correct = gold_label == guessed_label;
            n_tokens += 1;
            n_correct += usize::from(correct);
            if !vocabulary.contains(word) {
                n_unknown += 1;
                n_unknown_correct += usize::from(correct);
            }
        }

        let gold_score = hmm.score(gold.tokens().iter().map(|(l, w)| (l, w)))?;
        if decoding.score < gold_score {
            n_suboptimal += 1;
            tracing::warn!(
                guessed = decoding.score,
                gold = gold_score,
                sentence = line.as_str(),
                "the decoder found a path scoring below the gold path"
            );
        }
    }

    println!("Tag accuracy: {}", accuracy(n_correct, n_tokens));
    println!(
        "Unknown word accuracy: {}",
        accuracy(n_unknown_correct, n_unknown)
    );
    println!("Tokens: {n_tokens}, Unknown: {n_unknown}, Suboptimal sentences: {n_suboptimal}");

    if args.sample != 0 {
        eprintln!("Sampling {} sentences", args.sample);
        let mut tokens = vec![];
        let mut n_sampled = 0;
        for (label, word) in hmm.sample(ChaCha8Rng::seed_from_u64(args.seed)) {
            if label == START_LABEL {
                tokens.clear();
            } else if label == STOP_LABEL {
                if !tokens.is_empty() {
                    println!("{}", TaggedSentence::new(tokens.split_off(0))?.to_tagged_string());
                    n_sampled += 1;
                    if n_sampled == args.sample {
                        break;
                    }
                }
            } else {
                tokens.push((label, word));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        assert_eq!("0.75", accuracy(3, 4));
        assert_eq!("1", accuracy(2, 2));
    }

    #[test]
    fn test_accuracy_without_tokens() {
        assert_eq!("0/0", accuracy(0, 0));
    }
}
