//! Per-document orchestration and sequential batch runs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{info, warn};

use crate::error::{ExtractionError, NfeError};
use crate::lookup::{CompanyResolver, LookupStats};
use crate::models::config::ExtractionConfig;
use crate::models::document::DocumentRecord;
use crate::source::{SourceDocument, SourceLoader};

use super::items::LineItemExtractor;
use super::metadata::MetadataExtractor;

/// Metadata extraction followed by the item strategy chain.
pub struct ExtractionPipeline {
    metadata: MetadataExtractor,
    items: LineItemExtractor,
}

impl ExtractionPipeline {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            metadata: MetadataExtractor::new(),
            items: LineItemExtractor::from_config(config),
        }
    }

    pub fn with_item_extractor(mut self, items: LineItemExtractor) -> Self {
        self.items = items;
        self
    }

    /// Extract one document; `None` when it has no text.
    pub fn process(
        &self,
        source: &SourceDocument,
        resolver: &mut dyn CompanyResolver,
    ) -> Option<DocumentRecord> {
        self.try_process(source, resolver).ok()
    }

    /// Like [`process`](Self::process), with the reason for a missing record.
    pub fn try_process(
        &self,
        source: &SourceDocument,
        resolver: &mut dyn CompanyResolver,
    ) -> Result<DocumentRecord, ExtractionError> {
        let start = Instant::now();

        if !source.has_text() {
            return Err(ExtractionError::EmptyText(source.name.clone()));
        }

        info!("Processing {} ({} chars)", source.name, source.text.len());

        let metadata = self.metadata.extract(&source.text, resolver);
        let extraction = self.items.extract(source);

        let mut record = DocumentRecord::new(&source.name);
        record.number = metadata.number;
        record.series = metadata.series;
        record.issue_date = metadata.issue_date;
        record.issuer = metadata.issuer;
        record.counterparty = metadata.counterparty;
        record.declared_total = metadata.declared_total;
        record.items = extraction.items;
        record.metadata.strategy = extraction.strategy.map(str::to_string);
        record.metadata.warnings = metadata.warnings;

        if record.items.is_empty() {
            record.warn("No material items found");
            warn!("{}: no material items found", source.name);
        } else {
            info!(
                "{}: {} items via {} strategy",
                source.name,
                record.items.len(),
                extraction.strategy.unwrap_or("unknown")
            );
        }

        record.metadata.processing_time_ms = Some(start.elapsed().as_millis() as u64);
        Ok(record)
    }

    /// Load and extract every document in filename order.
    ///
    /// Failures are collected per document and never stop the run. The
    /// `cancel` flag is checked between documents; `on_document` is called
    /// after each one.
    pub fn run_batch(
        &self,
        paths: &[PathBuf],
        loader: &SourceLoader,
        resolver: &mut dyn CompanyResolver,
        cancel: &AtomicBool,
        mut on_document: impl FnMut(&Path),
    ) -> BatchReport {
        let mut paths = paths.to_vec();
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut report = BatchReport::default();

        for path in &paths {
            if cancel.load(Ordering::SeqCst) {
                warn!("Batch cancelled, {} documents left", paths.len() - report.processed());
                report.cancelled = true;
                break;
            }

            let outcome = loader
                .load(path)
                .map_err(NfeError::from)
                .and_then(|source| {
                    self.try_process(&source, resolver)
                        .map_err(NfeError::from)
                });

            match outcome {
                Ok(record) => {
                    if record.items.is_empty() {
                        report.without_items.push(record.source.clone());
                    } else {
                        report.with_items.push(path.clone());
                    }
                    report.records.push(record);
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", path.display(), e);
                    report.failed.push(FailedDocument {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }

            on_document(path);
        }

        report.lookups = resolver.stats();
        report
    }
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

/// A document the batch could not turn into a record.
#[derive(Debug, Clone)]
pub struct FailedDocument {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// One record per document with text, in processing order.
    pub records: Vec<DocumentRecord>,
    /// Inputs whose record has at least one item.
    pub with_items: Vec<PathBuf>,
    /// Documents processed without any item (by source name).
    pub without_items: Vec<String>,
    pub failed: Vec<FailedDocument>,
    /// Lookup counters at the end of the run.
    pub lookups: LookupStats,
    /// True when the run stopped before the last document.
    pub cancelled: bool,
}

impl BatchReport {
    /// Documents handled so far, failed ones included.
    pub fn processed(&self) -> usize {
        self.records.len() + self.failed.len()
    }

    pub fn item_count(&self) -> usize {
        self.records.iter().map(|r| r.items.len()).sum()
    }
}
