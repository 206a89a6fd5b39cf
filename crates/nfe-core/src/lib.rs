//! Core library for Brazilian NF-e (DANFE) field extraction.
//!
//! This crate provides:
//! - Document sources (text dumps, PDFs with two text backends, table sidecars)
//! - Rule-based field extraction (CNPJ, dates, totals, parties, materials)
//! - Line-item strategies (tables, text rows, manual reconstruction)
//! - A memoizing, rate-limited CNPJ registry lookup cache
//! - Document records and flat export rows

pub mod error;
pub mod invoice;
pub mod lookup;
pub mod models;
pub mod source;

pub use error::{NfeError, Result};
pub use invoice::{BatchReport, ExtractionPipeline, LineItemExtractor, MetadataExtractor};
pub use lookup::{BrasilApiClient, CompanyResolver, LookupCache, LookupStats, NoLookup};
pub use models::config::NfeConfig;
pub use models::document::{
    CompanyInfo, DocumentRecord, FlatRecord, LineItem, MaterialCategory, MaterialSummary, Party,
};
pub use source::{SourceDocument, SourceLoader};
