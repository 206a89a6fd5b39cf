//! Date extraction for NF-e documents.

use chrono::NaiveDate;

use super::patterns::{DATE_COMPACT, DATE_DMY, DATE_ISO, ISSUE_DATE};
use super::{ExtractionMatch, FieldExtractor};

/// Earliest accepted issue year.
pub const MIN_YEAR: i32 = 2000;
/// Latest accepted issue year.
pub const MAX_YEAR: i32 = 2030;

/// Bare date extractor.
///
/// Patterns run in priority order (dd/mm/yyyy, yyyy-mm-dd, 8-digit runs) and
/// within one pattern in order of occurrence. Candidates outside the accepted
/// range are dropped, never corrected.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for caps in DATE_DMY.captures_iter(text) {
            let day: u32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let year: i32 = caps[3].parse().unwrap_or(0);
            push_valid(&mut results, build_date(year, month, day), &caps, 0.9);
        }

        for caps in DATE_ISO.captures_iter(text) {
            let year: i32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let day: u32 = caps[3].parse().unwrap_or(0);
            push_valid(&mut results, build_date(year, month, day), &caps, 0.9);
        }

        for caps in DATE_COMPACT.captures_iter(text) {
            push_valid(&mut results, parse_compact(&caps[1]), &caps, 0.6);
        }

        results
    }
}

fn push_valid(
    results: &mut Vec<ExtractionMatch<NaiveDate>>,
    date: Option<NaiveDate>,
    caps: &regex::Captures<'_>,
    confidence: f32,
) {
    let Some(date) = date else {
        return;
    };
    // Skip if already found by a higher-priority pattern
    if results.iter().any(|r| r.value == date) {
        return;
    }
    if let Some(full_match) = caps.get(0) {
        results.push(
            ExtractionMatch::new(date, confidence, full_match.as_str())
                .with_position(full_match.start(), full_match.end()),
        );
    }
}

/// Extract the issue date: the labeled "EMISSÃO" pattern first, then the
/// first valid bare date in the text.
pub fn extract_issue_date(text: &str) -> Option<ExtractionMatch<NaiveDate>> {
    for caps in ISSUE_DATE.captures_iter(text) {
        let date_text = &caps[1];
        if let Some(date) = parse_date(date_text) {
            return Some(ExtractionMatch::new(date, 0.95, &caps[0]));
        }
    }

    DateExtractor::new().extract(text)
}

/// Parse a single date token in any accepted encoding.
///
/// Accepts `dd/mm/yyyy`, `yyyy-mm-dd` and contiguous 8-digit values, which
/// are read as `ddmmyyyy` first and `yyyymmdd` when that is not a valid date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Some(caps) = DATE_DMY.captures(s) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        return build_date(year, month, day);
    }

    if let Some(caps) = DATE_ISO.captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return build_date(year, month, day);
    }

    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        return parse_compact(s);
    }

    None
}

fn parse_compact(digits: &str) -> Option<NaiveDate> {
    let number = |range: std::ops::Range<usize>| digits.get(range)?.parse::<u32>().ok();

    let day_first = build_date(number(4..8)? as i32, number(2..4)?, number(0..2)?);
    day_first.or_else(|| build_date(number(0..4)? as i32, number(4..6)?, number(6..8)?))
}

/// Build a date, enforcing the accepted year range and calendar validity.
pub fn build_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Format a date the way DANFE documents print it (dd/mm/yyyy).
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_leap_years() {
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("29/02/2024"), Some(ymd(2024, 2, 29)));
        assert_eq!(parse_date("29/02/2023"), None);
    }

    #[test]
    fn test_parse_date_encodings() {
        assert_eq!(parse_date("15/03/2024"), Some(ymd(2024, 3, 15)));
        assert_eq!(parse_date("2024-03-15"), Some(ymd(2024, 3, 15)));
        assert_eq!(parse_date("15032024"), Some(ymd(2024, 3, 15)));
        assert_eq!(parse_date("20240315"), Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn test_parse_date_out_of_range() {
        assert_eq!(parse_date("15/03/1999"), None);
        assert_eq!(parse_date("15/03/2031"), None);
        assert_eq!(parse_date("15/13/2024"), None);
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn test_labeled_issue_date_wins() {
        let text = r#"
            PROTOCOLO DE AUTORIZACAO 135240000000001 01/03/2024 10:00
            DATA DA EMISSÃO
            15/03/2024
        "#;

        let date = extract_issue_date(text).unwrap();
        assert_eq!(date.value, ymd(2024, 3, 15));
    }

    #[test]
    fn test_first_valid_bare_date_wins() {
        let text = "VENCIMENTO 31/02/2024 SAIDA 05/04/2024 ENTRADA 06/04/2024";
        let date = extract_issue_date(text).unwrap();
        assert_eq!(date.value, ymd(2024, 4, 5));
    }

    #[test]
    fn test_slash_pattern_has_priority_over_iso() {
        let extractor = DateExtractor::new();
        let results = extractor.extract_all("2024-01-10 e depois 20/01/2024");
        assert_eq!(results[0].value, ymd(2024, 1, 20));
        assert_eq!(results[1].value, ymd(2024, 1, 10));
    }

    #[test]
    fn test_ncm_codes_are_not_dates() {
        let extractor = DateExtractor::new();
        assert!(extractor.extract("NCM 39011000 CFOP 5102").is_none());
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(ymd(2024, 3, 5)), "05/03/2024");
    }
}
