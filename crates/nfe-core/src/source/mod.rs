//! Document sources: plain-text dumps and PDFs, plus optional table sidecars.

mod pdf;
pub mod tables;

pub use pdf::{PdfTextExtractor, TextBackend};

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::SourceError;
use crate::models::config::SourceConfig;

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// A table as rows of cell strings.
pub type Table = Vec<Vec<String>>;

/// Extensions the loader accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt"];

/// The text and tables of one document, ready for extraction.
#[derive(Debug, Clone, Default)]
pub struct SourceDocument {
    /// File name, used as the record's source.
    pub name: String,
    /// Full document text.
    pub text: String,
    /// Pre-parsed tables, possibly none.
    pub tables: Vec<Table>,
}

impl SourceDocument {
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            tables: Vec::new(),
        }
    }

    pub fn with_tables(mut self, tables: Vec<Table>) -> Self {
        self.tables = tables;
        self
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Whether the loader handles this file.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Loads documents from disk.
#[derive(Debug, Clone, Default)]
pub struct SourceLoader {
    config: SourceConfig,
}

impl SourceLoader {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    /// Read a `.txt` or `.pdf` document and its table sidecar.
    pub fn load(&self, path: &Path) -> Result<SourceDocument> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let text = match extension.as_str() {
            "txt" => {
                let bytes = fs::read(path)?;
                String::from_utf8_lossy(&bytes).into_owned()
            }
            "pdf" => {
                let data = fs::read(path)?;
                let mut extractor =
                    PdfTextExtractor::new().with_min_text_length(self.config.min_text_length);
                extractor.load(&data)?;
                let (text, backend) = extractor.extract_text()?;
                debug!("{}: {} chars via {:?}", path.display(), text.len(), backend);
                text
            }
            other => return Err(SourceError::Unsupported(other.to_string())),
        };

        // A broken sidecar only costs the table strategy, never the text
        let tables = tables::load_sidecar(path, &self.config.tables_suffix).unwrap_or_else(|e| {
            warn!("{}: ignoring table sidecar: {}", path.display(), e);
            Vec::new()
        });
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(SourceDocument { name, text, tables })
    }
}
