//! Amount parsing for Brazilian-formatted values.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::TOTAL_PATTERNS;
use super::{ExtractionMatch, FieldExtractor};

/// Declared document total extractor.
///
/// `extract_all` collects every amount matched by any total pattern, in
/// pattern priority order. `extract` returns the largest of them: the printed
/// grand total is usually preceded by smaller component subtotals.
pub struct TotalExtractor;

impl TotalExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TotalExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for TotalExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text)
            .into_iter()
            .reduce(|best, candidate| if candidate.value > best.value { candidate } else { best })
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for pattern in TOTAL_PATTERNS.iter() {
            for caps in pattern.captures_iter(text) {
                let Some(amount_match) = caps.get(1) else {
                    continue;
                };
                if let Some(amount) = parse_brl_amount(amount_match.as_str()) {
                    results.push(
                        ExtractionMatch::new(amount, 0.9, &caps[0])
                            .with_position(amount_match.start(), amount_match.end()),
                    );
                }
            }
        }

        results
    }
}

/// Extract the declared document total (largest labeled total).
pub fn extract_declared_total(text: &str) -> Option<Decimal> {
    TotalExtractor::new().extract(text).map(|m| m.value)
}

/// Parse a Brazilian-formatted number ("1.234,56", "R$ 0,30", "10,5").
///
/// Everything except digits, `.` and `,` is dropped, `.` is taken as the
/// thousands separator and `,` as the decimal separator. Returns `None` when
/// nothing numeric is left or the result does not parse.
pub fn parse_brl_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = cleaned.replace('.', "").replace(',', ".");
    Decimal::from_str(&normalized).ok()
}

/// Format amount in Brazilian style (1.234,56).
pub fn format_brl_amount(amount: Decimal) -> String {
    let s = format!("{:.2}", amount.round_dp(2));
    let (sign, s) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.as_str()),
    };

    let Some((integer_part, decimal_part)) = s.split_once('.') else {
        return s.to_string();
    };

    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push('.');
        }
        formatted.push(*c);
    }

    format!("{}{},{}", sign, formatted, decimal_part)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_brl_amount() {
        assert_eq!(
            parse_brl_amount("1.234,56"),
            Some(Decimal::from_str("1234.56").unwrap())
        );
        assert_eq!(
            parse_brl_amount("0,30"),
            Some(Decimal::from_str("0.30").unwrap())
        );
        assert_eq!(
            parse_brl_amount("R$ 12.345.678,90"),
            Some(Decimal::from_str("12345678.90").unwrap())
        );
        assert_eq!(parse_brl_amount("10,5"), Some(Decimal::new(105, 1)));
        assert_eq!(parse_brl_amount("250"), Some(Decimal::from(250)));
    }

    #[test]
    fn test_parse_brl_amount_absent() {
        assert_eq!(parse_brl_amount(""), None);
        assert_eq!(parse_brl_amount("abc"), None);
        assert_eq!(parse_brl_amount("R$ ,"), None);
        assert_eq!(parse_brl_amount("1,2,3"), None);
    }

    #[test]
    fn test_format_brl_amount() {
        let amount = Decimal::from_str("1234.56").unwrap();
        assert_eq!(format_brl_amount(amount), "1.234,56");

        let amount = Decimal::from_str("12345678.9").unwrap();
        assert_eq!(format_brl_amount(amount), "12.345.678,90");
    }

    #[test]
    fn test_declared_total_picks_maximum() {
        let text = r#"
            VALOR TOTAL DOS PRODUTOS
            1.000,00
            VALOR TOTAL DA NOTA
            1.250,75
        "#;

        assert_eq!(
            extract_declared_total(text),
            Some(Decimal::from_str("1250.75").unwrap())
        );
    }

    #[test]
    fn test_declared_total_collects_every_candidate() {
        let text = "V. TOTAL DA NF-e: 80,00\nTOTAL DA NOTA 95,10";
        let candidates = TotalExtractor::new().extract_all(text);
        assert_eq!(candidates.len(), 2);
        assert_eq!(extract_declared_total("sem totais"), None);
    }
}
