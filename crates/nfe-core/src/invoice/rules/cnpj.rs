//! CNPJ (Brazilian legal-entity identifier) extraction and validation.

use super::patterns::{CNPJ_BARE, CNPJ_LABELED, CNPJ_PUNCTUATED};
use super::{ExtractionMatch, FieldExtractor};

const FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// CNPJ field extractor.
///
/// Runs the labeled, punctuated and bare patterns in that order. Every
/// candidate is validated and deduplicated by its formatted value; results
/// come back in order of first appearance in the text.
pub struct CnpjExtractor {
    validate: bool,
}

impl CnpjExtractor {
    /// Create a new CNPJ extractor.
    pub fn new() -> Self {
        Self { validate: true }
    }

    /// Set whether to validate CNPJ check digits.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

impl Default for CnpjExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for CnpjExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<ExtractionMatch<String>> = Vec::new();

        let passes = [
            (&*CNPJ_LABELED, 0.95),
            (&*CNPJ_PUNCTUATED, 0.85),
            (&*CNPJ_BARE, 0.6),
        ];

        for (pattern, confidence) in passes {
            for caps in pattern.captures_iter(text) {
                let Some(matched) = caps.get(1) else {
                    continue;
                };

                let digits = normalize_cnpj(matched.as_str());
                if digits.len() != 14 || (self.validate && !validate_cnpj(&digits)) {
                    continue;
                }

                let formatted = format_cnpj(&digits);
                match results.iter_mut().find(|r| r.value == formatted) {
                    Some(existing) => {
                        // Keep the earliest position for appearance ordering
                        if existing.start() > matched.start() {
                            existing.position = Some((matched.start(), matched.end()));
                        }
                    }
                    None => results.push(
                        ExtractionMatch::new(formatted, confidence, matched.as_str())
                            .with_position(matched.start(), matched.end()),
                    ),
                }
            }
        }

        results.sort_by_key(|r| r.start());
        results
    }
}

/// Extract the first valid CNPJ from text, formatted.
pub fn extract_cnpj(text: &str) -> Option<String> {
    CnpjExtractor::new().extract(text).map(|m| m.value)
}

/// Keep only the digits of a CNPJ candidate.
pub fn normalize_cnpj(cnpj: &str) -> String {
    cnpj.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validate a CNPJ using the two mod-11 check digits.
///
/// Dots, slashes, dashes and whitespace are accepted as punctuation; any
/// other non-digit character makes the value invalid.
pub fn validate_cnpj(cnpj: &str) -> bool {
    let mut digits = Vec::with_capacity(14);
    for c in cnpj.chars() {
        match c {
            '0'..='9' => digits.push(c as u32 - '0' as u32),
            '.' | '/' | '-' => {}
            c if c.is_whitespace() => {}
            _ => return false,
        }
    }

    if digits.len() != 14 {
        return false;
    }

    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    digits[12] == check_digit(&digits[..12], &FIRST_WEIGHTS)
        && digits[13] == check_digit(&digits[..13], &SECOND_WEIGHTS)
}

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let remainder = sum % 11;
    if remainder < 2 { 0 } else { 11 - remainder }
}

/// Format CNPJ as NN.NNN.NNN/NNNN-NN.
pub fn format_cnpj(cnpj: &str) -> String {
    let digits = normalize_cnpj(cnpj);

    if digits.len() != 14 {
        return cnpj.to_string();
    }

    format!(
        "{}.{}.{}/{}-{}",
        &digits[0..2],
        &digits[2..5],
        &digits[5..8],
        &digits[8..12],
        &digits[12..14]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_cnpj_valid() {
        assert!(validate_cnpj("11.222.333/0001-81"));
        assert!(validate_cnpj("11222333000181"));
        assert!(validate_cnpj("11.444.777/0001-61"));
    }

    #[test]
    fn test_validate_cnpj_mutated_check_digits() {
        assert!(!validate_cnpj("11.222.333/0001-82"));
        assert!(!validate_cnpj("11.222.333/0001-71"));
    }

    #[test]
    fn test_validate_cnpj_identical_digits() {
        for d in 0..=9 {
            let cnpj = d.to_string().repeat(14);
            assert!(!validate_cnpj(&cnpj), "{cnpj} should be invalid");
        }
    }

    #[test]
    fn test_validate_cnpj_malformed() {
        assert!(!validate_cnpj("1122233300018")); // Too short
        assert!(!validate_cnpj("112223330001811")); // Too long
        assert!(!validate_cnpj("11a22333000181")); // Not numeric
        assert!(!validate_cnpj(""));
    }

    #[test]
    fn test_extract_cnpj_labeled() {
        let text = "EMITENTE\nRECICLA LTDA\nCNPJ: 11.222.333/0001-81\nSAO PAULO";
        assert_eq!(extract_cnpj(text), Some("11.222.333/0001-81".to_string()));
    }

    #[test]
    fn test_extract_all_dedupes_and_orders_by_appearance() {
        let text = "CNPJ 11444777000161 ... 11.222.333/0001-81 ... CNPJ/CPF 11.444.777/0001-61";
        let results = CnpjExtractor::new().extract_all(text);
        let values: Vec<_> = results.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["11.444.777/0001-61", "11.222.333/0001-81"]);
    }

    #[test]
    fn test_extract_all_skips_invalid() {
        let text = "CNPJ 11.222.333/0001-82 e 00.000.000/0000-00";
        assert!(CnpjExtractor::new().extract_all(text).is_empty());
    }

    #[test]
    fn test_format_cnpj() {
        assert_eq!(format_cnpj("11222333000181"), "11.222.333/0001-81");
        assert_eq!(format_cnpj("11.222.333/0001-81"), "11.222.333/0001-81");
        assert_eq!(format_cnpj("123"), "123");
    }
}
