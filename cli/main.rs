#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

use dossier::answers::{self, AnswerSet};
use dossier::batch::{score_respondents, write_table, write_table_to_path};
use dossier::config::ProfileConfig;
use dossier::dataset::Dataset;
use dossier::report::{Profiler, QuestionListing, render_json};

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Where the survey tables and verdict settings come from.
#[derive(Args)]
pub struct DatasetArgs {
    /// Path to the survey dataset (JSON). Overrides `dataset` in the settings file.
    #[arg(long, value_name = "PATH")]
    pub dataset: Option<PathBuf>,

    /// Optional TOML settings file (dataset path and verdict table)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Parser)]
#[command(
    name = "dossier",
    about = "Estimate what the drug-use survey says about someone like you",
    long_about = "Inverts published demographic drug-use tables: given a handful of answers \
                 about yourself, estimates your likelihood of using each drug, the chance of \
                 using any drug at all, and how the government would size you up."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate drug-use rates for one set of answers
    #[command(about = "Estimate drug-use rates for one respondent")]
    Predict {
        #[command(flatten)]
        source: DatasetArgs,

        /// JSON file mapping question ids to option labels
        #[arg(long, value_name = "PATH")]
        answers: Option<PathBuf>,

        /// A single answer as QUESTION_ID=OPTION_LABEL. May be repeated and takes
        /// precedence over the same question in --answers.
        #[arg(long = "answer", value_name = "ID=LABEL")]
        answer: Vec<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List every question and its options, in dataset order
    #[command(about = "List the questions a respondent can answer")]
    Questions {
        #[command(flatten)]
        source: DatasetArgs,
    },

    /// Score a JSON-Lines file of respondents
    #[command(about = "Score many respondents (outputs: TSV)")]
    Batch {
        #[command(flatten)]
        source: DatasetArgs,

        /// JSON-Lines file, one respondent per line
        #[arg(value_name = "RESPONDENTS")]
        respondents: PathBuf,

        /// Output TSV path. Must not exist yet. Defaults to standard output.
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },

    /// Load and validate a dataset, then print a summary
    #[command(about = "Validate a survey dataset")]
    Check {
        #[command(flatten)]
        source: DatasetArgs,
    },

    /// Display version and build information
    #[command(about = "Display version and build information")]
    Version,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Predict {
            source,
            answers,
            answer,
            format,
        }) => run_predict(&source, answers.as_deref(), &answer, format),
        Some(Commands::Questions { source }) => run_questions(&source),
        Some(Commands::Batch {
            source,
            respondents,
            out,
        }) => run_batch(&source, &respondents, out.as_deref()),
        Some(Commands::Check { source }) => run_check(&source),
        Some(Commands::Version) => {
            print_version_info();
            Ok(())
        }
        None => Cli::command().print_help().map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn print_version_info() {
    println!("dossier {}", env!("CARGO_PKG_VERSION"));
    match option_env!("DOSSIER_RELEASE_TAG") {
        Some(tag) => println!("Release: {tag}"),
        None => println!("Release: development build"),
    }
}

/// Reads the settings file (if any), then the dataset it or the flag points at.
fn load_inputs(source: &DatasetArgs) -> Result<(Dataset, ProfileConfig), Box<dyn Error>> {
    let config = match &source.config {
        Some(path) => {
            eprintln!("> Reading settings: {}", path.display());
            ProfileConfig::load(path)?
        }
        None => ProfileConfig::default(),
    };
    let dataset_path = config.dataset_path(source.dataset.as_deref())?;
    eprintln!("> Loading survey dataset: {}", dataset_path.display());
    let dataset = Dataset::load(&dataset_path)?;
    Ok((dataset, config))
}

fn run_predict(
    source: &DatasetArgs,
    answers_path: Option<&Path>,
    pairs: &[String],
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let (dataset, config) = load_inputs(source)?;
    let profiler = Profiler::new(&dataset, config.verdict_scale()?);

    let mut answers = match answers_path {
        Some(path) => AnswerSet::load(path)?,
        None => AnswerSet::new(),
    };
    answers.extend_from(AnswerSet::from_pairs(pairs)?);

    let profile = profiler.profile(&answers);
    if !answers.is_empty() && profile.answered == 0 {
        log::warn!(
            "None of the {} answers matched a question and option in the dataset. \
             Run `dossier questions` to see the valid choices.",
            answers.len()
        );
    }

    match format {
        OutputFormat::Text => print!("{profile}"),
        OutputFormat::Json => println!("{}", render_json(&profile)?),
    }
    Ok(())
}

fn run_questions(source: &DatasetArgs) -> Result<(), Box<dyn Error>> {
    let (dataset, _) = load_inputs(source)?;
    print!("{}", QuestionListing(&dataset));
    Ok(())
}

fn run_batch(
    source: &DatasetArgs,
    respondents_path: &Path,
    out: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    if let Some(path) = out {
        if path.exists() {
            return Err(dossier::batch::BatchError::OutputExists(path.to_path_buf()).into());
        }
    }

    let (dataset, config) = load_inputs(source)?;
    let profiler = Profiler::new(&dataset, config.verdict_scale()?);

    eprintln!("> Reading respondents: {}", respondents_path.display());
    let respondents = answers::read_respondents(respondents_path)?;
    eprintln!("> Scoring {} respondents", respondents.len());
    let rows = score_respondents(&profiler, &respondents);

    match out {
        Some(path) => {
            write_table_to_path(path, &dataset, &rows)?;
            eprintln!("> Wrote {} rows to {}", rows.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            write_table(&mut stdout.lock(), &dataset, &rows)?;
        }
    }
    Ok(())
}

fn run_check(source: &DatasetArgs) -> Result<(), Box<dyn Error>> {
    let (dataset, config) = load_inputs(source)?;
    let profiler = Profiler::new(&dataset, config.verdict_scale()?);
    let population = profiler.engine().predict(&AnswerSet::new());

    println!("Dataset OK");
    println!("  Drugs:     {}", dataset.drugs().len());
    println!("  Questions: {}", dataset.questions().len());
    println!("  Options:   {}", dataset.option_count());
    if let Some(top) = population.first() {
        println!("  Most common drug: {} ({:.2}%)", top.drug, top.rate);
    }
    println!(
        "  Population any-drug estimate: {:.2}%",
        profiler.baseline_any_drug()
    );
    let scale = profiler.scale();
    println!(
        "  Verdict basis: {:?}, thresholds {:?}",
        scale.basis(),
        scale.thresholds()
    );
    Ok(())
}
