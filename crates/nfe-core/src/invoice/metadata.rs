//! Document-level field extraction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::lookup::CompanyResolver;
use crate::models::document::Party;

use super::rules::patterns::{NFE_NUMBER, NUMBER_SIMPLE, NUMBER_WITH_SERIES};
use super::rules::{
    assign_identifiers, extract_issue_date, recover_party_name, CnpjExtractor, FieldExtractor,
    PartySide, TotalExtractor,
};

/// Fields read once per document.
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub number: Option<String>,
    pub series: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub issuer: Party,
    pub counterparty: Party,
    pub declared_total: Option<Decimal>,
    /// Fields that could not be found.
    pub warnings: Vec<String>,
}

/// Recovers number, series, issue date, parties and declared total.
pub struct MetadataExtractor {
    cnpj: CnpjExtractor,
    totals: TotalExtractor,
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self {
            cnpj: CnpjExtractor::new(),
            totals: TotalExtractor::new(),
        }
    }

    /// Extract every document-level field. Legal names come from the resolver
    /// when it knows the CNPJ, otherwise from the party section text.
    pub fn extract(&self, text: &str, resolver: &mut dyn CompanyResolver) -> DocumentMetadata {
        let mut metadata = DocumentMetadata::default();

        match extract_document_number(text) {
            Some((number, series)) => {
                metadata.number = Some(number);
                metadata.series = series;
            }
            None => metadata.warnings.push("Could not extract document number".to_string()),
        }

        metadata.issue_date = extract_issue_date(text).map(|m| m.value);
        if metadata.issue_date.is_none() {
            metadata.warnings.push("Could not extract issue date".to_string());
        }

        let identifiers = self.cnpj.extract_all(text);
        debug!("Found {} valid CNPJs", identifiers.len());
        let assigned = assign_identifiers(text, &identifiers);

        if assigned.issuer.is_none() {
            metadata.warnings.push("Could not extract issuer CNPJ".to_string());
        }
        if assigned.counterparty.is_none() {
            metadata.warnings.push("Could not extract counterparty CNPJ".to_string());
        }

        metadata.issuer = resolve_party(text, assigned.issuer, PartySide::Issuer, resolver);
        metadata.counterparty =
            resolve_party(text, assigned.counterparty, PartySide::Counterparty, resolver);

        metadata.declared_total = self.totals.extract(text).map(|m| m.value);
        if metadata.declared_total.is_none() {
            metadata.warnings.push("Could not extract declared total".to_string());
        }

        metadata
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_party(
    text: &str,
    cnpj: Option<String>,
    side: PartySide,
    resolver: &mut dyn CompanyResolver,
) -> Party {
    let mut party = Party {
        cnpj,
        ..Party::default()
    };

    if let Some(info) = party.cnpj.as_deref().and_then(|c| resolver.resolve(c)) {
        party.region = info.region;
        party.legal_name = info.legal_name;
    }

    if party.legal_name.is_empty() {
        party.legal_name = recover_party_name(text, side);
        if !party.legal_name.is_empty() {
            debug!("{:?} name recovered from text: {}", side, party.legal_name);
        }
    }

    party
}

/// Document number and series; patterns are tried in priority order
/// (number with series, `NF-e Nº`, bare `Nº`).
pub fn extract_document_number(text: &str) -> Option<(String, Option<String>)> {
    if let Some(caps) = NUMBER_WITH_SERIES.captures(text) {
        return Some((clean_number(&caps[1]), Some(caps[2].to_string())));
    }

    NFE_NUMBER
        .captures(text)
        .or_else(|| NUMBER_SIMPLE.captures(text))
        .map(|caps| (clean_number(&caps[1]), None))
}

/// Drop thousands dots and leading zeros ("000.001.234" -> "1234").
fn clean_number(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() && !digits.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::NoLookup;
    use crate::models::document::CompanyInfo;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct FixedResolver(HashMap<String, CompanyInfo>);

    impl CompanyResolver for FixedResolver {
        fn resolve(&mut self, cnpj: &str) -> Option<CompanyInfo> {
            self.0.get(cnpj).cloned()
        }
    }

    const TEXT: &str = "DANFE\n\
        Nº 000.004.512 SÉRIE 001\n\
        IDENTIFICAÇÃO DO EMITENTE\n\
        RECICLA SUCATAS LTDA\n\
        CNPJ 11.222.333/0001-81\n\
        DESTINATÁRIO / REMETENTE\n\
        NOME / RAZÃO SOCIAL\n\
        SIDERURGICA CENTRAL SA\n\
        CNPJ / CPF 11.444.777/0001-61\n\
        DATA DA EMISSÃO 15/03/2024\n\
        VALOR TOTAL DOS PRODUTOS 1.200,00\n\
        VALOR TOTAL DA NOTA 1.250,00\n";

    #[test]
    fn test_extract_document_number() {
        assert_eq!(
            extract_document_number("Nº 000.004.512 SÉRIE 001"),
            Some(("4512".to_string(), Some("001".to_string())))
        );
        assert_eq!(
            extract_document_number("NF-e Nº 1234"),
            Some(("1234".to_string(), None))
        );
        assert_eq!(
            extract_document_number("NUMERO Nº. 0077"),
            Some(("77".to_string(), None))
        );
        assert_eq!(extract_document_number("sem numero"), None);
    }

    #[test]
    fn test_extract_offline_recovers_names() {
        let metadata = MetadataExtractor::new().extract(TEXT, &mut NoLookup);

        assert_eq!(metadata.number.as_deref(), Some("4512"));
        assert_eq!(metadata.series.as_deref(), Some("001"));
        assert_eq!(metadata.issue_date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(metadata.issuer.cnpj.as_deref(), Some("11.222.333/0001-81"));
        assert_eq!(metadata.issuer.legal_name, "RECICLA SUCATAS LTDA");
        assert_eq!(metadata.counterparty.cnpj.as_deref(), Some("11.444.777/0001-61"));
        assert_eq!(metadata.counterparty.legal_name, "SIDERURGICA CENTRAL SA");
        assert_eq!(metadata.declared_total, Some(Decimal::new(125000, 2)));
        assert!(metadata.warnings.is_empty());
    }

    #[test]
    fn test_registry_name_wins() {
        let mut resolver = FixedResolver(HashMap::from([(
            "11.222.333/0001-81".to_string(),
            CompanyInfo {
                legal_name: "RECICLA SUCATAS E METAIS LTDA".to_string(),
                region: Some("MG".to_string()),
                ..CompanyInfo::default()
            },
        )]));

        let metadata = MetadataExtractor::new().extract(TEXT, &mut resolver);
        assert_eq!(metadata.issuer.legal_name, "RECICLA SUCATAS E METAIS LTDA");
        assert_eq!(metadata.issuer.region.as_deref(), Some("MG"));
        assert_eq!(metadata.counterparty.legal_name, "SIDERURGICA CENTRAL SA");
        assert_eq!(metadata.counterparty.region, None);
    }

    #[test]
    fn test_misses_become_warnings() {
        let metadata = MetadataExtractor::new().extract("texto qualquer", &mut NoLookup);
        assert_eq!(
            metadata.warnings,
            vec![
                "Could not extract document number",
                "Could not extract issue date",
                "Could not extract issuer CNPJ",
                "Could not extract counterparty CNPJ",
                "Could not extract declared total",
            ]
        );
        assert_eq!(metadata.issuer.legal_name, "");
    }
}
