//! Batch processing command for a directory of NF-e documents.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use nfe_core::source::is_supported;
use nfe_core::source::tables::sidecar_path;
use nfe_core::{BatchReport, ExtractionPipeline, MaterialSummary, SourceLoader};

use super::{build_resolver, load_config};
use crate::output::{timestamped_name, write_records_csv, write_records_json, write_summary};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input directory or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory (default: current directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Export format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: ExportFormat,

    /// Also write a per-material summary CSV
    #[arg(long)]
    summary: bool,

    /// Move documents with items into this directory once processed
    #[arg(long, value_name = "DIR")]
    move_processed: Option<PathBuf>,

    /// Skip CNPJ registry lookups
    #[arg(long)]
    offline: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ExportFormat {
    /// One CSV row per item
    Csv,
    /// Full records as a JSON array
    Json,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    let files = collect_inputs(&args.input)?;
    if files.is_empty() {
        anyhow::bail!("No PDF or text documents found in: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let output_dir = args.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&output_dir)?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    // The whole run happens on one blocking thread; this task only waits
    // for it or for Ctrl-C.
    let tables_suffix = config.source.tables_suffix.clone();
    let cancel = Arc::new(AtomicBool::new(false));
    let mut worker = {
        let cancel = Arc::clone(&cancel);
        let pb = pb.clone();
        let offline = args.offline;
        tokio::task::spawn_blocking(move || -> anyhow::Result<BatchReport> {
            let loader = SourceLoader::new(config.source.clone());
            let pipeline = ExtractionPipeline::new(&config.extraction);
            let mut resolver = build_resolver(&config.lookup, offline)?;

            Ok(pipeline.run_batch(&files, &loader, resolver.as_mut(), &cancel, |path| {
                pb.set_message(
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                );
                pb.inc(1);
            }))
        })
    };

    let report = tokio::select! {
        joined = &mut worker => joined??,
        _ = tokio::signal::ctrl_c() => {
            pb.println(format!(
                "{} Interrupted, finishing the current document...",
                style("!").yellow()
            ));
            cancel.store(true, Ordering::SeqCst);
            worker.await??
        }
    };

    pb.finish_and_clear();

    let now = Local::now();
    let export_path = output_dir.join(timestamped_name("materials", now, args.format.extension()));
    match args.format {
        ExportFormat::Csv => {
            let rows = write_records_csv(fs::File::create(&export_path)?, &report.records)?;
            debug!("Wrote {} rows", rows);
        }
        ExportFormat::Json => write_records_json(&export_path, &report.records)?,
    }
    println!(
        "{} Records written to {}",
        style("✓").green(),
        export_path.display()
    );

    if args.summary {
        let summary = MaterialSummary::from_records(&report.records);
        let summary_path = output_dir.join(timestamped_name("materials_summary", now, "csv"));

        write_summary(&summary_path, &summary)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    if let Some(processed_dir) = &args.move_processed {
        let moved = move_processed(&report.with_items, processed_dir, &tables_suffix)?;
        println!(
            "{} Moved {} documents to {}",
            style("✓").green(),
            moved,
            processed_dir.display()
        );
    }

    print_report(&report, start);

    Ok(())
}

/// Supported documents in a directory, or matching a glob pattern.
fn collect_inputs(input: &str) -> anyhow::Result<Vec<PathBuf>> {
    let path = Path::new(input);
    let pattern = if path.is_dir() {
        format!("{}/*", glob::Pattern::escape(&path.to_string_lossy()))
    } else {
        input.to_string()
    };

    let mut files: Vec<PathBuf> = glob(&pattern)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file() && is_supported(p))
        .collect();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Move each document (and its table sidecar, if any) into `dir`.
fn move_processed(paths: &[PathBuf], dir: &Path, tables_suffix: &str) -> anyhow::Result<usize> {
    fs::create_dir_all(dir)?;

    let mut moved = 0;
    for path in paths {
        let mut targets = vec![path.clone()];
        let sidecar = sidecar_path(path, tables_suffix);
        if sidecar.exists() {
            targets.push(sidecar);
        }

        for source in targets {
            let Some(name) = source.file_name() else {
                continue;
            };
            let destination = dir.join(name);

            if let Err(e) = move_file(&source, &destination) {
                warn!("Could not move {}: {}", source.display(), e);
            } else if &source == path {
                moved += 1;
            }
        }
    }

    Ok(moved)
}

/// Rename, falling back to copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

fn print_report(report: &BatchReport, start: Instant) {
    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        report.processed(),
        start.elapsed()
    );
    println!(
        "   {} records, {} items, {} failed",
        style(report.records.len()).green(),
        style(report.item_count()).green(),
        style(report.failed.len()).red()
    );
    println!(
        "   {} CNPJs looked up ({} registry calls, {} cache hits)",
        report.lookups.resolved, report.lookups.network_calls, report.lookups.cache_hits
    );

    if report.cancelled {
        println!(
            "{} Batch cancelled before all files were processed",
            style("!").yellow()
        );
    }

    if !report.without_items.is_empty() {
        println!();
        println!("{}", style("Documents without items:").yellow());
        for name in &report.without_items {
            println!("  - {}", name);
        }
    }

    if !report.failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for failed in &report.failed {
            println!("  - {}: {}", failed.path.display(), failed.reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_inputs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.PDF", "notes.md", "c.tables.json"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.txt")).unwrap();

        let files = collect_inputs(&dir.path().to_string_lossy()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.PDF", "b.txt"]);
    }

    #[test]
    fn test_move_processed_takes_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("nota.pdf");
        fs::write(&doc, "x").unwrap();
        fs::write(dir.path().join("nota.tables.json"), "[]").unwrap();
        let target = dir.path().join("done");

        let moved = move_processed(&[doc.clone()], &target, ".tables.json").unwrap();

        assert_eq!(moved, 1);
        assert!(!doc.exists());
        assert!(target.join("nota.pdf").exists());
        assert!(target.join("nota.tables.json").exists());
    }
}
