use std::fs::File;
use std::io::{prelude::*, stderr, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Parser;
use tagwise::feature::NgramExtractor;
use tagwise::{MaxEntClassifier, MinimizerConfig, NaiveBayesClassifier};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Clone, Copy, Debug)]
enum ModelKind {
    MaxEnt,
    NaiveBayes,
}

impl FromStr for ModelKind {
    type Err = &'static str;
    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        match kind {
            "maxent" => Ok(Self::MaxEnt),
            "naive-bayes" => Ok(Self::NaiveBayes),
            _ => Err("Could not parse a model value"),
        }
    }
}

enum Classifier {
    MaxEnt(MaxEntClassifier),
    NaiveBayes(NaiveBayesClassifier),
}

impl Classifier {
    fn label(&self, datum: &str) -> tagwise::Result<String> {
        match self {
            Self::MaxEnt(classifier) => classifier.label(datum),
            Self::NaiveBayes(classifier) => classifier.label(datum),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "classify",
    about = "A program to train and evaluate character n-gram classifiers. Each line of a \
             dataset holds a label and a datum separated by a tab."
)]
struct Args {
    /// A labeled training dataset
    #[arg(long)]
    train: PathBuf,

    /// A labeled test dataset
    #[arg(long)]
    test: PathBuf,

    /// The classifier. {maxent, naive-bayes}
    #[arg(long, default_value = "maxent")]
    model: ModelKind,

    /// The character n-gram length of features
    #[arg(long, default_value = "3")]
    ngram: usize,

    /// Do not pad data with boundary markers before extracting n-grams.
    #[arg(long)]
    no_padding: bool,

    /// The standard deviation of the maxent weight prior (0 disables the prior)
    #[arg(long, default_value = "1.0")]
    sigma: f64,

    /// The maximum number of optimizer iterations for maxent training
    #[arg(long, default_value = "25")]
    max_iterations: usize,

    /// The additive smoothing of naive Bayes feature counts
    #[arg(long, default_value = "0.01")]
    alpha: f64,
}

fn load_dataset(path: &Path) -> Result<Vec<(String, String)>, Box<dyn std::error::Error>> {
    eprintln!("Loading {path:?} ...");
    let f = BufReader::new(File::open(path)?);
    let mut dataset = vec![];
    for (i, line) in f.lines().enumerate() {
        if i % 10000 == 0 {
            eprint!("# of examples: {i}\r");
            stderr().flush()?;
        }
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (label, datum) = line
            .split_once('\t')
            .ok_or_else(|| format!("line {} of {path:?} has no tab", i + 1))?;
        dataset.push((label.to_string(), datum.to_string()));
    }
    eprintln!("# of examples: {}", dataset.len());
    Ok(dataset)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    eprintln!("Loading dataset...");
    let train_data = load_dataset(&args.train)?;
    let test_data = load_dataset(&args.test)?;

    let extractor = NgramExtractor::new(args.ngram, !args.no_padding)?;

    eprintln!("Start training...");
    let classifier = match args.model {
        ModelKind::MaxEnt => {
            let config = MinimizerConfig {
                max_iterations: args.max_iterations,
                ..MinimizerConfig::default()
            };
            let mut classifier = MaxEntClassifier::new(extractor)
                .sigma(args.sigma)
                .minimizer_config(config);
            classifier.train(train_data)?;
            Classifier::MaxEnt(classifier)
        }
        ModelKind::NaiveBayes => {
            let mut classifier = NaiveBayesClassifier::new(extractor).alpha(args.alpha);
            classifier.train(train_data)?;
            Classifier::NaiveBayes(classifier)
        }
    };
    eprintln!("Finish training.");

    let mut n_correct = 0;
    for (label, datum) in &test_data {
        let guessed = classifier.label(datum)?;
        tracing::debug!(datum = datum.as_str(), gold = label.as_str(), guessed = guessed.as_str());
        if &guessed == label {
            n_correct += 1;
        }
    }
    println!("Correctly labeled {n_correct} of {}", test_data.len());
    println!("Accuracy: {}", n_correct as f64 / test_data.len() as f64);

    Ok(())
}
