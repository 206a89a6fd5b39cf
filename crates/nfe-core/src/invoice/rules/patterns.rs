//! Common regex patterns for NF-e (DANFE) text extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // CNPJ patterns (Brazilian legal-entity identifier)
    pub static ref CNPJ_LABELED: Regex = Regex::new(
        r"(?i)CNPJ(?:\s*/\s*CPF)?[\s:]*(\d{2}\.?\d{3}\.?\d{3}/?\d{4}-?\d{2})"
    ).unwrap();

    pub static ref CNPJ_PUNCTUATED: Regex = Regex::new(
        r"\b(\d{2}\.\d{3}\.\d{3}/\d{4}-\d{2})\b"
    ).unwrap();

    pub static ref CNPJ_BARE: Regex = Regex::new(
        r"\b(\d{14})\b"
    ).unwrap();

    // Labeled issue date, any of the accepted encodings
    pub static ref ISSUE_DATE: Regex = Regex::new(
        r"(?i)(?:DATA\s+(?:DA|DE)\s+)?EMISS[ÃA]O[\s:]*(\d{1,2}/\d{1,2}/\d{4}|\d{4}-\d{2}-\d{2}|\d{8})"
    ).unwrap();

    // Bare date patterns, in priority order
    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b"
    ).unwrap();

    pub static ref DATE_ISO: Regex = Regex::new(
        r"\b(\d{4})-(\d{2})-(\d{2})\b"
    ).unwrap();

    pub static ref DATE_COMPACT: Regex = Regex::new(
        r"\b(\d{8})\b"
    ).unwrap();

    // Document number patterns, in priority order
    pub static ref NUMBER_WITH_SERIES: Regex = Regex::new(
        r"(?i)N(?:[º°o]\.?|\.)\s*(\d{1,3}(?:\.\d{3}){1,2}|\d{1,9})\s*S[ÉE]RIE[\s:.]*(\d{1,3})"
    ).unwrap();

    pub static ref NFE_NUMBER: Regex = Regex::new(
        r"(?i)NF-?e\s+N[º°o]\.?\s*(\d{1,3}(?:\.\d{3}){1,2}|\d{1,9})"
    ).unwrap();

    pub static ref NUMBER_SIMPLE: Regex = Regex::new(
        r"(?i)N[º°]\.?\s*(\d+)"
    ).unwrap();

    // Declared totals; every match is a candidate, the largest wins
    pub static ref TOTAL_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)VALOR\s+TOTAL\s+DA\s+NOTA(?:\s+FISCAL)?[\s:R$]*(\d[\d.]*,\d{2})").unwrap(),
        Regex::new(r"(?i)V(?:ALOR|\.)\s*TOTAL\s+(?:DA\s+)?NF-?e[\s:R$]*(\d[\d.]*,\d{2})").unwrap(),
        Regex::new(r"(?i)TOTAL\s+DA\s+NOTA[\s:R$]*(\d[\d.]*,\d{2})").unwrap(),
        Regex::new(r"(?i)VALOR\s+TOTAL\s+DOS\s+PRODUTOS[\s:R$]*(\d[\d.]*,\d{2})").unwrap(),
    ];

    // Party and block headers of a DANFE layout
    pub static ref ISSUER_HEADER: Regex = Regex::new(
        r"(?i)\bEMITENTE\b"
    ).unwrap();

    pub static ref COUNTERPARTY_HEADER: Regex = Regex::new(
        r"(?i)\bDESTINAT[ÁA]RIO\b|\bREMETENTE\b"
    ).unwrap();

    pub static ref BLOCK_HEADER: Regex = Regex::new(
        r"(?i)\bTRANSPORTADORA?\b|\bFATURAS?\b|C[ÁA]LCULO\s+DO\s+(?:IMPOSTO|ISSQN)|DADOS\s+DOS?\s+PRODUTOS?|DADOS\s+ADICIONAIS"
    ).unwrap();

    // Labels stripped from party name candidates
    pub static ref NAME_LABEL: Regex = Regex::new(
        r"(?i)NOME\s*/\s*RAZ[ÃA]O\s+SOCIAL|RAZ[ÃA]O\s+SOCIAL|IDENTIFICA[ÇC][ÃA]O\s+DO|\bEMITENTE\b|DESTINAT[ÁA]RIO|REMETENTE|RECEBEMOS\s+DE"
    ).unwrap();

    pub static ref ID_LABEL: Regex = Regex::new(
        r"(?i)\bCNPJ\b(?:\s*/\s*CPF\b)?|\bCPF\b"
    ).unwrap();

    // Lines carrying these labels hold address or contact data, never a name
    pub static ref FIELD_LABEL: Regex = Regex::new(
        r"(?i)INSCRI[ÇC][ÃA]O\s+ESTADUAL|ENDERE[ÇC]O|\bBAIRRO\b|\bDISTRITO\b|\bCEP\b|MUNIC[ÍI]PIO|\bUF\b|\bFONE\b|\bFAX\b|\bTELEFONE\b|DATA\s+D[AE]\s+(?:EMISS[ÃA]O|SA[ÍI]DA|ENTRADA)|HORA\s+D[AE]\s+SA[ÍI]DA"
    ).unwrap();

    // Merchandise line of a text-layer DANFE item table. The item code opens
    // a line; the description may wrap onto following lines.
    pub static ref ITEM_ROW: Regex = Regex::new(
        r"(?sm)^[ \t]*(?P<code>\d{3})[ \t]+(?P<description>.+?)\s+(?P<ncm>\d{8})\s+(?P<cst>\d{3})\s+(?P<cfop>\d{4})\s+(?P<unit>[A-Z]{2,4})\s+(?P<quantity>[0-9.,]+)\s+(?P<unit_price>[0-9.,]+)\s+(?P<total>[0-9.,]+)"
    ).unwrap();

    // Merchandise classification code (NCM)
    pub static ref NCM_CODE: Regex = Regex::new(
        r"^\d{8}$"
    ).unwrap();

    // Regional numeric token, integer or with a decimal comma (1.234,56 / 10,5 / 100)
    pub static ref NUMERIC_TOKEN: Regex = Regex::new(
        r"^\d{1,3}(?:\.\d{3})+(?:,\d+)?$|^\d+(?:,\d+)?$"
    ).unwrap();

    // Opening and closing headers of the DANFE product block
    pub static ref PRODUCT_BLOCK: Regex = Regex::new(
        r"(?i)DADOS\s+DOS?\s+PRODUTOS?"
    ).unwrap();

    pub static ref PRODUCT_BLOCK_END: Regex = Regex::new(
        r"(?i)DADOS\s+ADICIONAIS|C[ÁA]LCULO\s+DO\s+ISSQN|INFORMA[ÇC][ÕO]ES\s+COMPLEMENTARES"
    ).unwrap();
}
