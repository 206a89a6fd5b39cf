//! Process command - extract material records from a single NF-e document.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use nfe_core::models::config::NfeConfig;
use nfe_core::{DocumentRecord, ExtractionPipeline, SourceLoader};

use super::{build_resolver, load_config};
use crate::output::{format_record_text, records_csv};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF or text dump)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Skip CNPJ registry lookups
    #[arg(long)]
    offline: bool,

    /// Validate extracted data
    #[arg(long)]
    validate: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per item
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(if args.offline {
        "Extracting...".to_string()
    } else {
        "Extracting and looking up CNPJs...".to_string()
    });

    let input = args.input.clone();
    let offline = args.offline;
    let record =
        tokio::task::spawn_blocking(move || extract_document(&input, &config, offline)).await??;

    pb.finish_and_clear();

    if args.validate {
        let issues = record.validate();
        if !issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&record)?,
        OutputFormat::Csv => records_csv(std::slice::from_ref(&record))?,
        OutputFormat::Text => format_record_text(&record),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Load, resolve and extract one document on the current (blocking) thread.
fn extract_document(path: &Path, config: &NfeConfig, offline: bool) -> anyhow::Result<DocumentRecord> {
    let source = SourceLoader::new(config.source.clone()).load(path)?;
    let pipeline = ExtractionPipeline::new(&config.extraction);
    let mut resolver = build_resolver(&config.lookup, offline)?;

    let record = pipeline.try_process(&source, resolver.as_mut())?;

    let stats = resolver.stats();
    debug!(
        "Lookups: {} network calls, {} cache hits",
        stats.network_calls, stats.cache_hits
    );

    Ok(record)
}
