use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, error::ErrorKind};
use tracing::{debug, info, warn};

use crate::config::{FanOutConfig, MatchConfig};
use crate::constants::dataset::{
    DEFAULT_SEED, DEFAULT_TRAIN_FRACTION, TEST_CSV, TRAINING_CSV,
};
use crate::constants::generator::{DEFAULT_BATCH_SIZE, DEFAULT_STALE_DAYS, DEFAULT_WORKERS};
use crate::corpus::Corpus;
use crate::data::FeatureProperty;
use crate::dataset::{LearningDataset, read_pairs_json};
use crate::export::CsvExporter;
use crate::generator::CancellationToken;
use crate::metrics::label_balance;

#[derive(Debug, Parser)]
#[command(
    name = "neuralmatch",
    disable_help_subcommand = true,
    about = "Build lost/found training vectors",
    long_about = "Read a lost/found corpus, generate labeled loss/finding pairs, split them into training and test sets, and export both as CSV feature vectors.",
    after_help = "Pass --training and --test together to reuse pairs written by an earlier --export-json run."
)]
/// CLI for the `neuralmatch` binary.
///
/// Common usage:
/// - Generate and export: `neuralmatch corpus.json --output-dir out`
/// - Also persist the split: `neuralmatch corpus.json --export-json`
/// - Reuse a split: `neuralmatch corpus.json --training training.json --test test.json`
/// - Drop fixed columns: `--skip LossMoney --skip FindingMoney`
struct NeuralMatchCli {
    #[arg(value_name = "CORPUS", help = "Corpus JSON document")]
    corpus: PathBuf,
    #[arg(
        long,
        value_name = "FILE",
        requires = "test",
        help = "Load training pairs from JSON instead of generating them"
    )]
    training: Option<PathBuf>,
    #[arg(
        long,
        value_name = "FILE",
        requires = "training",
        help = "Load test pairs from JSON instead of generating them"
    )]
    test: Option<PathBuf>,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        default_value = ".",
        help = "Directory receiving CSV (and optional JSON) output"
    )]
    output_dir: PathBuf,
    #[arg(
        long = "stale-days",
        default_value_t = DEFAULT_STALE_DAYS,
        help = "Unmatched losses older than this many days become negative examples"
    )]
    stale_days: i64,
    #[arg(
        long,
        default_value_t = DEFAULT_WORKERS,
        value_parser = parse_fan_out_count,
        help = "Maximum number of pair generation workers"
    )]
    workers: usize,
    #[arg(
        long = "batch-size",
        default_value_t = DEFAULT_BATCH_SIZE,
        value_parser = parse_fan_out_count,
        help = "Pairs a worker maps before merging into the shared result"
    )]
    batch_size: usize,
    #[arg(
        long,
        default_value_t = DEFAULT_SEED,
        help = "Deterministic seed for negative sampling"
    )]
    seed: u64,
    #[arg(
        long = "train-fraction",
        default_value_t = DEFAULT_TRAIN_FRACTION,
        help = "Share of matches (and as many non-matches) used for training"
    )]
    train_fraction: f32,
    #[arg(long = "use-legacy-data", help = "Keep items migrated from the previous system")]
    use_legacy_data: bool,
    #[arg(
        long = "export-json",
        help = "Also write training.json / test.json to the output directory"
    )]
    export_json: bool,
    #[arg(
        long = "skip",
        value_name = "PROPERTY",
        help = "Fixed feature to omit from vectors, repeat as needed (e.g. LossMoney, FindingColors)"
    )]
    skip: Vec<FeatureProperty>,
}

/// Run the full corpus-to-CSV pipeline with the given arguments (program name excluded).
pub fn run_neuralmatch<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = NeuralMatchCli::from_args(args_iter)? else {
        return Ok(());
    };

    let config = MatchConfig {
        seed: cli.seed,
        stale_days: cli.stale_days,
        train_fraction: cli.train_fraction,
        use_legacy_data: cli.use_legacy_data,
        fan_out: FanOutConfig {
            workers: cli.workers,
            batch_size: cli.batch_size,
        },
    }
    .validated()?;

    let started = Instant::now();
    let corpus = Corpus::read_json(&cli.corpus, config.use_legacy_data)?;
    debug!(elapsed = ?started.elapsed(), "corpus deserialization finished");

    let started = Instant::now();
    let dataset = match (&cli.training, &cli.test) {
        (Some(training), Some(test)) => LearningDataset::from_parts(
            read_pairs_json(training)?,
            read_pairs_json(test)?,
            &corpus.metadata,
        ),
        _ => LearningDataset::generate(&corpus, &config, &CancellationToken::new())?,
    };
    debug!(elapsed = ?started.elapsed(), "dataset preparation finished");

    for (name, records) in [("training", &dataset.training), ("test", &dataset.test)] {
        match label_balance(records.iter()) {
            Some(balance) => info!(
                set = name,
                total = balance.total,
                positives = balance.positives,
                negatives = balance.negatives,
                positive_share = balance.positive_share,
                "label balance"
            ),
            None => warn!(set = name, "set is empty"),
        }
    }

    fs::create_dir_all(&cli.output_dir)?;
    if cli.export_json {
        dataset.write_json(&cli.output_dir)?;
    }

    let started = Instant::now();
    let exporter = CsvExporter::new(dataset.vector_assembler().with_skip(cli.skip));
    info!(
        columns = exporter.assembler().vector_len(),
        attributes = dataset.active_metadata.len(),
        "vector layout"
    );
    exporter.write_csv(&cli.output_dir.join(TRAINING_CSV), &dataset.training)?;
    exporter.write_csv(&cli.output_dir.join(TEST_CSV), &dataset.test)?;
    debug!(elapsed = ?started.elapsed(), "CSV export finished");

    Ok(())
}

impl NeuralMatchCli {
    /// Parse arguments without the program name. `None` means help or version was printed.
    fn from_args<I>(args: I) -> Result<Option<Self>, Box<dyn Error>>
    where
        I: IntoIterator<Item = String>,
    {
        let argv = std::iter::once("neuralmatch".to_string()).chain(args);
        let err = match Self::try_parse_from(argv) {
            Ok(cli) => return Ok(Some(cli)),
            Err(err) => err,
        };
        if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
            err.print()?;
            return Ok(None);
        }
        Err(err.into())
    }
}

/// Worker and batch counts share one rule: a whole number, at least 1.
fn parse_fan_out_count(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err("fan-out counts start at 1".to_string()),
        Ok(count) => Ok(count),
        Err(_) => Err(format!("'{raw}' is not a whole number of workers or items")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<NeuralMatchCli>, Box<dyn Error>> {
        NeuralMatchCli::from_args(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn defaults_follow_constants() {
        let cli = parse(&["corpus.json"]).unwrap().unwrap();
        assert_eq!(cli.stale_days, 15);
        assert_eq!(cli.workers, 6);
        assert_eq!(cli.seed, 42);
        assert_eq!(cli.output_dir, PathBuf::from("."));
        assert!(cli.skip.is_empty());
        assert!(!cli.export_json);
    }

    #[test]
    fn skip_accepts_repeated_case_insensitive_properties() {
        let cli = parse(&["corpus.json", "--skip", "lossmoney", "--skip", "FindingColors"])
            .unwrap()
            .unwrap();
        assert_eq!(
            cli.skip,
            vec![FeatureProperty::LossMoney, FeatureProperty::FindingColors]
        );
        assert!(parse(&["corpus.json", "--skip", "nonsense"]).is_err());
    }

    #[test]
    fn persisted_pairs_require_both_files() {
        assert!(parse(&["corpus.json", "--training", "training.json"]).is_err());
        let cli = parse(&[
            "corpus.json",
            "--training",
            "training.json",
            "--test",
            "test.json",
        ])
        .unwrap()
        .unwrap();
        assert_eq!(cli.test, Some(PathBuf::from("test.json")));
    }

    #[test]
    fn fan_out_counts_must_be_positive_whole_numbers() {
        assert!(parse(&["corpus.json", "--workers", "0"]).is_err());
        assert!(parse(&["corpus.json", "--batch-size", "0"]).is_err());
        assert!(parse(&["corpus.json", "--workers", "two"]).is_err());
        let cli = parse(&["corpus.json", "--workers", "2", "--batch-size", "50"])
            .unwrap()
            .unwrap();
        assert_eq!((cli.workers, cli.batch_size), (2, 50));
    }

    #[test]
    fn fan_out_count_messages_name_the_rule() {
        assert_eq!(parse_fan_out_count(" 8 "), Ok(8));
        assert_eq!(
            parse_fan_out_count("0"),
            Err("fan-out counts start at 1".to_string())
        );
        assert!(parse_fan_out_count("-3").unwrap_err().contains("'-3'"));
    }

    #[test]
    fn help_is_not_an_error() {
        assert!(parse(&["--help"]).unwrap().is_none());
    }
}
