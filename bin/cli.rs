use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use loganalysis::config::ParserConfig;
use loganalysis::parsers::ParserType;
use loganalysis::progress::ProgressTracker;
use loganalysis::{merge_items, parse_files_concurrently, ParsedItem, Parsers};

/// Parses Android bugreports, logcat captures and kernel logs into JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file (.txt or .zip). Can be specified multiple times.
    #[arg(short, long, num_args = 1.., required = true)]
    file_path: Vec<String>,

    /// Kind of input
    #[arg(short, long, value_enum, default_value = "bugreport")]
    kind: ParserType,

    /// Year assumed for logcat timestamps
    #[arg(short, long)]
    year: Option<i32>,

    /// JSON parser configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Show a progress spinner on stderr
    #[arg(long)]
    progress: bool,
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let args = Args::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => ParserConfig::from_file(path)?,
        None => ParserConfig::default(),
    };
    if args.year.is_some() {
        config.logcat.year = args.year;
    }
    let parsers = Parsers::from_config(&config)?;

    let tracker = ProgressTracker::new(args.progress);
    let spinner = tracker.create_file_spinner(&format!("{} file(s) as {:?}", args.file_path.len(), args.kind));

    let start_time = Instant::now();
    let results = parse_files_concurrently(&args.file_path, args.kind, &parsers);
    ProgressTracker::finish_and_clear(spinner);
    info!("Parsed {} file(s) in {:.2?}", results.len(), start_time.elapsed());

    let mut parsed = Vec::new();
    for (path, result, duration) in results {
        match result {
            Ok(Some(item)) => {
                info!("{}: {} (took {:.2?})", path, item.kind(), duration);
                parsed.push((path, item));
            }
            Ok(None) => warn!("{}: nothing recognised", path),
            Err(e) => error!("{}: {}", path, e),
        }
    }

    let output = match args.kind {
        ParserType::Bugreport => {
            if parsed.len() == 1 {
                parsed.remove(0).1.to_json()
            } else {
                let by_file: Map<String, Value> = parsed
                    .into_iter()
                    .map(|(path, item)| (path, item.to_json()))
                    .collect();
                Value::Object(by_file)
            }
        }
        ParserType::Logcat | ParserType::KernelLog => {
            let items: Vec<ParsedItem> = parsed.into_iter().map(|(_, item)| item).collect();
            merge_items(items)?.map_or(Value::Null, |item| item.to_json())
        }
    };

    let text = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", text);

    Ok(())
}
