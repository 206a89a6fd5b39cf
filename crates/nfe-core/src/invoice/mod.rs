//! NF-e field extraction: rules, item strategies and the pipeline that
//! combines them.

pub mod items;
pub mod metadata;
pub mod pipeline;
pub mod rules;

pub use items::{
    ItemExtraction, ItemStrategy, LineItemExtractor, ManualStrategy, RegexStrategy, TableStrategy,
};
pub use metadata::{extract_document_number, DocumentMetadata, MetadataExtractor};
pub use pipeline::{BatchReport, ExtractionPipeline, FailedDocument};
