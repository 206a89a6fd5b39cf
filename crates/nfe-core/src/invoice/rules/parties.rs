//! Party attribution: which CNPJ belongs to the issuer and which to the
//! counterparty, and legal-name recovery from the section text.

use serde::{Deserialize, Serialize};

use super::ExtractionMatch;
use super::patterns::{
    BLOCK_HEADER, CNPJ_BARE, CNPJ_LABELED, CNPJ_PUNCTUATED, COUNTERPARTY_HEADER, FIELD_LABEL,
    ISSUER_HEADER, ID_LABEL, NAME_LABEL,
};

/// Lines read after a party header when recovering a name.
const NAME_SEARCH_LINES: usize = 6;

/// Maximum share of digit characters in a plausible legal name.
const MAX_DIGIT_RATIO: f32 = 0.3;

/// One of the two parties on a fiscal document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartySide {
    /// Seller / sender (emitente).
    Issuer,
    /// Buyer / receiver (destinatário).
    Counterparty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKind {
    Party(PartySide),
    Block,
}

#[derive(Debug, Clone, Copy)]
struct Header {
    kind: HeaderKind,
    start: usize,
    end: usize,
}

/// Header layout of a document: party headers open a section, any header of
/// another kind closes it.
#[derive(Debug, Clone, Default)]
pub struct PartySections {
    headers: Vec<Header>,
    len: usize,
}

impl PartySections {
    /// Locate every party and block header in the text.
    pub fn parse(text: &str) -> Self {
        let mut headers = Vec::new();

        let sources = [
            (&*ISSUER_HEADER, HeaderKind::Party(PartySide::Issuer)),
            (&*COUNTERPARTY_HEADER, HeaderKind::Party(PartySide::Counterparty)),
            (&*BLOCK_HEADER, HeaderKind::Block),
        ];

        for (pattern, kind) in sources {
            for m in pattern.find_iter(text) {
                headers.push(Header {
                    kind,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }

        headers.sort_by_key(|h| h.start);

        Self {
            headers,
            len: text.len(),
        }
    }

    /// Side whose section contains `pos`, if any.
    pub fn side_at(&self, pos: usize) -> Option<PartySide> {
        match self.headers.iter().rev().find(|h| h.start <= pos)?.kind {
            HeaderKind::Party(side) => Some(side),
            HeaderKind::Block => None,
        }
    }

    /// Side of the nearest party header before `pos`, skipping block headers.
    pub fn preceding_party(&self, pos: usize) -> Option<PartySide> {
        self.headers
            .iter()
            .rev()
            .filter(|h| h.start <= pos)
            .find_map(|h| match h.kind {
                HeaderKind::Party(side) => Some(side),
                HeaderKind::Block => None,
            })
    }

    /// Byte ranges of every section opened by a header of `side`, in order.
    ///
    /// Each range starts at the header and ends at the next header of a
    /// different kind, or at the end of the text.
    pub fn sections(&self, side: PartySide) -> Vec<std::ops::Range<usize>> {
        let wanted = HeaderKind::Party(side);
        let mut ranges: Vec<std::ops::Range<usize>> = Vec::new();

        for (i, header) in self.headers.iter().enumerate() {
            if header.kind != wanted {
                continue;
            }
            // Merged into the previous section of the same side
            if ranges.last().is_some_and(|r| r.end > header.start) {
                continue;
            }
            let end = self.headers[i + 1..]
                .iter()
                .find(|h| h.kind != wanted)
                .map(|h| h.start)
                .unwrap_or(self.len);
            ranges.push(header.start..end.max(header.end));
        }

        ranges
    }

    /// True when the text has no party header at all.
    pub fn is_empty(&self) -> bool {
        !self
            .headers
            .iter()
            .any(|h| matches!(h.kind, HeaderKind::Party(_)))
    }
}

/// Identifiers attributed to the two parties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartyIdentifiers {
    pub issuer: Option<String>,
    pub counterparty: Option<String>,
}

/// Attribute validated identifiers (ordered by first appearance) to parties.
///
/// Section context decides first: the first identifier inside each party
/// section goes to that side. Sides still empty are filled from the
/// remaining identifiers in order of appearance, issuer first. A lone
/// identifier outside every section goes to the side of the nearest
/// preceding party header, defaulting to the issuer.
pub fn assign_identifiers(text: &str, ids: &[ExtractionMatch<String>]) -> PartyIdentifiers {
    let sections = PartySections::parse(text);
    let mut issuer: Option<usize> = None;
    let mut counterparty: Option<usize> = None;

    for (i, id) in ids.iter().enumerate() {
        match sections.side_at(id.start()) {
            Some(PartySide::Issuer) if issuer.is_none() => issuer = Some(i),
            Some(PartySide::Counterparty) if counterparty.is_none() => counterparty = Some(i),
            _ => {}
        }
    }

    if ids.len() == 1 && issuer.is_none() && counterparty.is_none() {
        match sections.preceding_party(ids[0].start()) {
            Some(PartySide::Counterparty) => counterparty = Some(0),
            _ => issuer = Some(0),
        }
    }

    let (assigned_issuer, assigned_counterparty) = (issuer, counterparty);
    let mut remaining = (0..ids.len())
        .filter(move |i| Some(*i) != assigned_issuer && Some(*i) != assigned_counterparty);
    if issuer.is_none() {
        issuer = remaining.next();
    }
    if counterparty.is_none() {
        counterparty = remaining.next();
    }

    PartyIdentifiers {
        issuer: issuer.map(|i| ids[i].value.clone()),
        counterparty: counterparty.map(|i| ids[i].value.clone()),
    }
}

/// Recover a party's legal name from the text after its section header.
///
/// Returns an empty string when no line qualifies as a plausible name.
pub fn recover_party_name(text: &str, side: PartySide) -> String {
    let sections = PartySections::parse(text);

    for range in sections.sections(side) {
        let Some(section) = text.get(range) else {
            continue;
        };

        for line in section.lines().take(NAME_SEARCH_LINES) {
            if FIELD_LABEL.is_match(line) {
                continue;
            }
            let candidate = clean_name_candidate(line);
            if is_plausible_name(&candidate) {
                return candidate.to_uppercase();
            }
        }
    }

    String::new()
}

/// Strip labels, identifiers and stray punctuation from a name line.
pub fn clean_name_candidate(line: &str) -> String {
    let line = NAME_LABEL.replace_all(line, " ");
    let line = CNPJ_LABELED.replace_all(&line, " ");
    let line = CNPJ_PUNCTUATED.replace_all(&line, " ");
    let line = CNPJ_BARE.replace_all(&line, " ");
    let line = ID_LABEL.replace_all(&line, " ");

    line.split_whitespace()
        .map(|token| {
            token.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '&')
        })
        .filter(|token| !token.is_empty() && *token != "/" && *token != "-")
        .collect::<Vec<_>>()
        .join(" ")
}

/// At least two tokens of three or more characters and under 30% digits.
pub fn is_plausible_name(candidate: &str) -> bool {
    let long_tokens = candidate
        .split_whitespace()
        .filter(|t| t.chars().count() >= 3)
        .count();
    if long_tokens < 2 {
        return false;
    }

    let chars: Vec<char> = candidate.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = chars.iter().filter(|c| c.is_ascii_digit()).count();
    (digits as f32) < (chars.len() as f32) * MAX_DIGIT_RATIO
}
