//! PDF text extraction with pdf-extract, falling back to lopdf.

use lopdf::Document;
use tracing::debug;

use super::Result;
use crate::error::SourceError;

/// Which backend produced a document's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextBackend {
    PdfExtract,
    Lopdf,
}

/// PDF text extractor.
///
/// The pdf-extract layout pass runs first. When it fails or yields fewer
/// than `min_text_length` characters, lopdf's per-page text extraction is
/// tried and the longer of the two results is kept.
pub struct PdfTextExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
    min_text_length: usize,
}

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
            min_text_length: 50,
        }
    }

    pub fn with_min_text_length(mut self, min_text_length: usize) -> Self {
        self.min_text_length = min_text_length;
        self
    }

    /// Load a PDF from bytes, decrypting empty-password documents.
    pub fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| SourceError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(SourceError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract reads the decrypted copy
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| SourceError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(SourceError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    pub fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    /// Extract the text of every page.
    pub fn extract_text(&self) -> Result<(String, TextBackend)> {
        if self.document.is_none() {
            return Err(SourceError::Parse("No document loaded".to_string()));
        }

        let primary = pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| SourceError::TextExtraction(e.to_string()));

        match &primary {
            Ok(text) if text_length(text) >= self.min_text_length => {
                return Ok((text.clone(), TextBackend::PdfExtract));
            }
            Ok(text) => debug!(
                "pdf-extract returned {} chars, trying lopdf",
                text_length(text)
            ),
            Err(e) => debug!("pdf-extract failed ({}), trying lopdf", e),
        }

        match (primary, self.extract_text_lopdf()) {
            (Ok(first), Ok(second)) if text_length(&second) > text_length(&first) => {
                Ok((second, TextBackend::Lopdf))
            }
            (Ok(first), _) => Ok((first, TextBackend::PdfExtract)),
            (Err(_), Ok(second)) => Ok((second, TextBackend::Lopdf)),
            (Err(e), Err(_)) => Err(e),
        }
    }

    fn extract_text_lopdf(&self) -> Result<String> {
        let doc = self
            .document
            .as_ref()
            .ok_or(SourceError::Parse("No document loaded".to_string()))?;

        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        doc.extract_text(&pages)
            .map_err(|e| SourceError::TextExtraction(e.to_string()))
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn text_length(text: &str) -> usize {
    text.trim().chars().count()
}
