//! Error types for the nfe-core library.

use thiserror::Error;

/// Main error type for the nfe library.
#[derive(Error, Debug)]
pub enum NfeError {
    /// Document source loading error.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Field extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Registry lookup error.
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to loading document text.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// The table sidecar could not be decoded.
    #[error("invalid table sidecar {path}: {reason}")]
    Tables { path: String, reason: String },

    /// The file type is not handled by any loader.
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    /// I/O error while reading the document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to document field extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The document has no text to extract from.
    #[error("document {0} has no text")]
    EmptyText(String),
}

/// Errors returned by a registry client for one identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The registry has no entry for the identifier.
    #[error("identifier not found")]
    NotFound,

    /// The registry rejected the call with 429.
    #[error("rate limited by registry")]
    RateLimited,

    /// Any other non-success HTTP status.
    #[error("registry returned status {0}")]
    Status(u16),

    /// Network, DNS or timeout failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response body was not the expected JSON.
    #[error("failed to decode registry response: {0}")]
    Decode(String),
}

/// Result type for the nfe library.
pub type Result<T> = std::result::Result<T, NfeError>;
