//! blobfilter - filter a dataset directory
//!
//! Selects records by field parameters and/or identifier lists, then writes the selection
//! as a new dataset directory, extracts it from FASTA files, or prints the retained ids.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use rustc_hash::FxHashSet;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use blobfilter::*;

/// Filter a dataset directory
#[derive(Parser, Debug)]
#[command(name = "blobfilter", version, about, long_about = None)]
struct Args {
    /// Existing dataset directory
    directory: PathBuf,

    /// Filter parameter of the form <field>--<param>=<value>
    #[arg(long = "param", action = clap::ArgAction::Append)]
    params: Vec<String>,

    /// Filter parameters taken from a viewer URL or its query string
    #[arg(long = "query-string")]
    query_string: Option<String>,

    /// JSON document with an `identifiers` array, as exported by the viewer
    #[arg(long)]
    json: Option<PathBuf>,

    /// Space or newline separated list of identifiers
    #[arg(long)]
    list: Option<PathBuf>,

    /// Invert the filter (exclude matching records)
    #[arg(long)]
    invert: bool,

    /// Directory to write the filtered dataset to
    #[arg(long)]
    output: Option<PathBuf>,

    /// FASTA file to extract the retained records from
    #[arg(long, action = clap::ArgAction::Append)]
    fasta: Vec<PathBuf>,

    /// String added to the names of filtered sequence files
    #[arg(long, default_value = "filtered")]
    suffix: String,

    /// Log every filtering step
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Logging was already set up");
    }
}

fn run(args: &Args) -> Result<()> {
    let dataset = Dataset::open(&args.directory)
        .with_context(|| format!("Cannot open dataset {}", args.directory.display()))?;

    let params = parse_params(&args.params, args.query_string.as_deref(), dataset.meta());
    let mut filter = FilterRun::new().params(params).invert(args.invert);
    if let Some(json) = &args.json {
        filter = filter.identifiers(
            read_identifier_json(json)
                .with_context(|| format!("Cannot read identifiers from {}", json.display()))?,
        );
    }
    if let Some(list) = &args.list {
        filter = filter.identifiers(
            read_identifier_list(list)
                .with_context(|| format!("Cannot read identifiers from {}", list.display()))?,
        );
    }

    let selection = filter.run(&dataset).context("Filtering failed")?;

    if let Some(output) = &args.output {
        create_filtered_dataset(&dataset, output, selection.indices())
            .with_context(|| format!("Cannot write filtered dataset to {}", output.display()))?;
    }

    let ids = selection
        .identifiers()
        .iter()
        .map(String::as_str)
        .collect::<FxHashSet<_>>();
    for fasta in &args.fasta {
        let extracted = filter_fasta(fasta, &ids, &args.suffix)
            .with_context(|| format!("Cannot filter {}", fasta.display()))?;
        eprintln!(
            "{} {} of {} sequences to {}",
            "Extracted".green(),
            extracted.records_written,
            extracted.records_read,
            extracted.output.display()
        );
    }

    if args.output.is_none() && args.fasta.is_empty() {
        println!("{}", selection.identifiers().join("\n"));
    }

    if !args.quiet {
        eprintln!(
            "{} {} of {} records",
            "Retained".bold(),
            selection.len().to_string().green(),
            selection.total()
        );
    }

    Ok(())
}

fn main() {
    let args = Args::parse();
    setup_logging(args.verbose, args.quiet);

    if let Err(e) = run(&args) {
        error!("{e:#}");
        std::process::exit(1);
    }
}
