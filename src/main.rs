use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use rusty_dataset::{schema, standardize, Criteria, DatasetSchema};

/// Standardize a labeled audio dataset and derive a cached extraction.
#[derive(Debug, Parser)]
#[command(name = "rusty-dataset", version, about)]
struct Args {
    /// Path to the dataset root folder
    db_path: PathBuf,

    /// Path to an extraction criteria JSON file
    #[arg(short = 'f', long = "filter")]
    filter_config: Option<PathBuf>,

    /// Registered dataset schema
    #[arg(long, env = "RUSTY_DATASET", default_value = "mridangam")]
    dataset: String,

    /// Only build the standardized descriptors
    #[arg(long)]
    standardize_only: bool,
}

/// Criteria used when no file is given: every attribute, with the continuous
/// bundle restricted to the schema's non-degenerate sub-keys.
fn default_criteria(schema: &DatasetSchema) -> Criteria {
    Criteria::default()
        .with_attributes(schema.attribute_names())
        .with_filter(&schema.features.name, schema.features.keys.clone())
}

fn run(args: &Args) -> Result<()> {
    let schema = schema::schema_for(&args.dataset)?;

    let criteria = match &args.filter_config {
        Some(path) => Criteria::from_file(path)
            .with_context(|| format!("reading criteria from {}", path.display()))?,
        None => default_criteria(&schema),
    };

    if args.standardize_only {
        let desc = standardize(&args.db_path, &schema)?;
        log::info!("{} samples standardized", desc.total_size);
        return Ok(());
    }

    let extraction = rusty_dataset::extract(&args.db_path, &schema, &criteria)
        .with_context(|| format!("extracting from {}", args.db_path.display()))?;
    println!(
        "{} v{}: {} samples → {}",
        extraction.descriptor.name,
        extraction.descriptor.version,
        extraction.len(),
        extraction.descriptor.output_file.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
