use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use ncdx::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Parameter-free text classification by compression distance
#[derive(Parser, Debug)]
#[command(name = "ncdx")]
#[command(about = "Text classification with compression distance and k-NN", long_about = None)]
struct Args {
    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a test set against a train set
    Classify {
        /// Train dataset (label<TAB>text per line)
        #[arg(long)]
        train: PathBuf,

        /// Test dataset; when absent the train file is split
        #[arg(long)]
        test: Option<PathBuf>,

        /// Share of records held out when splitting
        #[arg(long, default_value_t = 0.2)]
        test_ratio: f64,

        /// Save the distance matrix under this name
        #[arg(long)]
        save_matrix: Option<String>,

        /// Directory for saved matrices
        #[arg(long, default_value = "./data/matrices")]
        matrix_dir: PathBuf,

        /// Compute each row on demand instead of holding a matrix
        #[arg(long)]
        on_demand: bool,

        #[command(flatten)]
        options: RunOptions,
    },
    /// Classify using a previously saved distance matrix
    Evaluate {
        /// Name of the saved matrix
        #[arg(long)]
        matrix: String,

        /// Directory for saved matrices
        #[arg(long, default_value = "./data/matrices")]
        matrix_dir: PathBuf,

        /// Dataset whose labels align with the matrix rows
        #[arg(long)]
        test: PathBuf,

        /// Dataset whose labels align with the matrix columns; self-comparison when absent
        #[arg(long)]
        train: Option<PathBuf>,

        #[command(flatten)]
        options: RunOptions,
    },
    /// Shuffle a dataset and write train/test files
    Split {
        #[arg(long)]
        input: PathBuf,

        /// Read a JSON object of records pairing a real text with a generated one
        #[arg(long)]
        json: bool,

        /// Record field holding the real text (with --json)
        #[arg(long, default_value = ncdx::DEFAULT_REAL_FIELD)]
        real_field: String,

        /// Record field holding the generated text (with --json)
        #[arg(long, default_value = ncdx::DEFAULT_FAKE_FIELD)]
        fake_field: String,

        #[arg(long, default_value = "train.txt")]
        train_out: PathBuf,

        #[arg(long, default_value = "test.txt")]
        test_out: PathBuf,

        #[arg(long, default_value_t = 0.2)]
        test_ratio: f64,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[derive(clap::Args, Debug)]
struct RunOptions {
    /// JSON experiment config; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of neighbors
    #[arg(short, long)]
    k: Option<usize>,

    /// lenient | random
    #[arg(long)]
    tie_break: Option<String>,

    /// standard | fast
    #[arg(long)]
    mode: Option<String>,

    /// ncd | cdm | clm
    #[arg(long)]
    distance: Option<String>,

    /// gzip | zlib | deflate
    #[arg(long)]
    format: Option<String>,

    /// Compression level 0-9
    #[arg(long)]
    level: Option<u32>,

    /// concat | space_concat
    #[arg(long)]
    aggregation: Option<String>,

    /// Build distance rows in parallel
    #[arg(long)]
    parallel: bool,

    /// Seed for splitting and random tie-breaks
    #[arg(long)]
    seed: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    k: usize,
    tie_break: TieBreak,
    rows: usize,
    correct: usize,
    accuracy: f64,
}

/// Parse a lowercase choice through the type's serde names
fn parse_choice<T: DeserializeOwned>(flag: &str, value: &str) -> anyhow::Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| anyhow!("invalid value {:?} for --{}", value, flag))
}

impl RunOptions {
    fn resolve(&self) -> anyhow::Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_json_file(path)
                .with_context(|| format!("loading config {:?}", path))?,
            None => ExperimentConfig::default(),
        };

        if let Some(k) = self.k {
            config.k = k;
        }
        if let Some(value) = &self.tie_break {
            config.tie_break = parse_choice("tie-break", value)?;
        }
        if let Some(value) = &self.mode {
            config.length_mode = parse_choice("mode", value)?;
        }
        if let Some(value) = &self.distance {
            config.distance = parse_choice("distance", value)?;
        }
        if let Some(value) = &self.format {
            config.format = parse_choice("format", value)?;
        }
        if let Some(level) = self.level {
            config.level = level;
        }
        if let Some(value) = &self.aggregation {
            config.aggregation = parse_choice("aggregation", value)?;
        }
        if self.parallel {
            config.parallel = true;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }
}

fn rng_for(config: &ExperimentConfig) -> StdRng {
    match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn report(config: &ExperimentConfig, evaluation: &Evaluation<String>, json: bool) -> anyhow::Result<()> {
    let accuracy = evaluation
        .accuracy()
        .ok_or_else(|| anyhow!("no test records to classify"))?;
    let report = Report {
        k: config.k,
        tie_break: config.tie_break,
        rows: evaluation.len(),
        correct: evaluation.correct_count(),
        accuracy,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Accuracy is {}", report.accuracy);
    }
    Ok(())
}

fn load_sets(train: &Path, test: Option<&Path>, ratio: f64, seed: u64) -> anyhow::Result<(Dataset, Dataset)> {
    let train_set = Dataset::load_tsv(train)?;
    match test {
        Some(test) => Ok((train_set, Dataset::load_tsv(test)?)),
        None => train_set.split(ratio, seed),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Classify {
            train,
            test,
            test_ratio,
            save_matrix,
            matrix_dir,
            on_demand,
            options,
        } => {
            let config = options.resolve()?;
            let (train, test) = load_sets(&train, test.as_deref(), test_ratio, config.seed.unwrap_or(42))?;
            info!("Train records: {}, test records: {}", train.len(), test.len());

            let engine = config.engine()?;
            let knn = config.classifier()?;
            let mut rng = rng_for(&config);

            let evaluation = if on_demand {
                if save_matrix.is_some() {
                    bail!("--save-matrix needs a full matrix; drop --on-demand");
                }
                knn.classify_on_demand_with_rng(
                    &engine,
                    test.texts.as_slice(),
                    test.labels.as_slice(),
                    Some((train.texts.as_slice(), train.labels.as_slice())),
                    config.length_mode,
                    &mut rng,
                )?
            } else {
                let matrix = if config.parallel {
                    engine.distance_matrix_par(test.texts.as_slice(), Some(train.texts.as_slice()), config.length_mode)?
                } else {
                    engine.distance_matrix(test.texts.as_slice(), Some(train.texts.as_slice()), config.length_mode)?
                };
                if let Some(name) = save_matrix {
                    let description = MatrixStore::new(&matrix_dir)?.save(&name, &matrix)?;
                    info!("Saved {}x{} matrix as {:?}", description.rows, description.cols, name);
                }
                knn.classify_with_rng(&matrix, test.labels.as_slice(), Some(train.labels.as_slice()), &mut rng)?
            };

            report(&config, &evaluation, options.json)?;
        }
        Command::Evaluate {
            matrix,
            matrix_dir,
            test,
            train,
            options,
        } => {
            let config = options.resolve()?;
            let matrix = MatrixStore::new(&matrix_dir)?.load(&matrix)?;
            let test = Dataset::load_tsv(&test)?;
            let train = train.map(Dataset::load_tsv).transpose()?;

            let knn = config.classifier()?;
            let mut rng = rng_for(&config);
            let evaluation = knn.classify_with_rng(
                &matrix,
                test.labels.as_slice(),
                train.as_ref().map(|t| t.labels.as_slice()),
                &mut rng,
            )?;

            report(&config, &evaluation, options.json)?;
        }
        Command::Split {
            input,
            json,
            real_field,
            fake_field,
            train_out,
            test_out,
            test_ratio,
            seed,
        } => {
            let dataset = if json {
                Dataset::from_paired_json(&input, &real_field, &fake_field)?
            } else {
                Dataset::load_tsv(&input)?
            };
            let (train, test) = dataset.split(test_ratio, seed)?;
            train.write_tsv(&train_out)?;
            test.write_tsv(&test_out)?;
            println!("Training set size: {}", train.len());
            println!("Testing set size: {}", test.len());
        }
    }

    Ok(())
}
