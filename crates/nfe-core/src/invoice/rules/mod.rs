//! Rule-based field extractors for NF-e documents.

pub mod amounts;
pub mod cnpj;
pub mod dates;
pub mod material;
pub mod parties;
pub mod patterns;

pub use amounts::{extract_declared_total, format_brl_amount, parse_brl_amount, TotalExtractor};
pub use cnpj::{extract_cnpj, format_cnpj, normalize_cnpj, validate_cnpj, CnpjExtractor};
pub use dates::{extract_issue_date, format_date, parse_date, DateExtractor};
pub use material::{classify_material, MaterialClassifier, Taxonomy};
pub use parties::{assign_identifiers, recover_party_name, PartyIdentifiers, PartySide};
pub use patterns::*;

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// Extraction context with confidence scores.
#[derive(Debug, Clone)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Position in source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }

    /// Start offset in the source text; unpositioned matches sort last.
    pub fn start(&self) -> usize {
        self.position.map(|(start, _)| start).unwrap_or(usize::MAX)
    }
}
