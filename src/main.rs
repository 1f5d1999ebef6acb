//! Command line front end.
//!
//! Usage:
//!   genre-classifier [--resources <DIR>] [--verbose] [FILE]
//!
//! Without a FILE argument the path is read from standard input.

use clap::Parser;
use genre_classifier::{ClassificationWorker, GenreClassifier, GenreError, ResourceConfig};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Classify the genre of a WAV file
#[derive(Parser, Debug)]
#[command(name = "genre-classifier")]
#[command(version)]
struct Args {
    /// Directory holding pca.json, models/model.json and songs/rock.wav
    #[arg(short, long, default_value = "backend", env = "GENRE_RESOURCES")]
    resources: PathBuf,

    /// WAV file to classify (prompted for when omitted)
    file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), GenreError> {
    println!("Loading...");
    let classifier = GenreClassifier::new(&ResourceConfig::from_dir(&args.resources))?;
    let worker = ClassificationWorker::spawn(classifier)?;

    let path = match args.file {
        Some(path) => path,
        None => prompt_for_path()?,
    };

    let prediction = worker.classify(path)?;
    println!("extracted features of form : (1, {})", prediction.reduced_width);
    println!("{:?}", prediction.probabilities);
    println!("{prediction}");

    worker.shutdown();
    Ok(())
}

fn prompt_for_path() -> Result<PathBuf, GenreError> {
    print!("input filename of wav: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let line = line.trim();
    if line.is_empty() {
        return Err(GenreError::InvalidInput("no filename given".to_string()));
    }
    Ok(PathBuf::from(line))
}
