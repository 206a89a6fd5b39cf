//! Line-item extraction: a cascade of strategies where the first one that
//! recovers any item wins.

use std::collections::HashSet;

use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::models::config::ExtractionConfig;
use crate::models::document::LineItem;
use crate::source::SourceDocument;

use super::rules::patterns::{ITEM_ROW, NCM_CODE, NUMERIC_TOKEN, PRODUCT_BLOCK, PRODUCT_BLOCK_END};
use super::rules::{parse_brl_amount, MaterialClassifier};

/// Minimum cells in a table item row.
const TABLE_ROW_CELLS: usize = 9;

/// Units of measure dropped from manually rebuilt descriptions.
const UNIT_TOKENS: &[&str] = &["KG", "UN", "TON", "T", "LT", "M3", "PC", "CX", "MT"];

/// Fiscal labels dropped from manually rebuilt descriptions.
const LABEL_TOKENS: &[&str] = &["CFOP", "CST", "NCM", "NCM/SH"];

/// One way of recovering merchandise lines from a document.
pub trait ItemStrategy: Send + Sync {
    /// Short name recorded on the document.
    fn name(&self) -> &'static str;

    /// Recover items; rows the classifier rejects are left out.
    fn extract(&self, source: &SourceDocument, classifier: &MaterialClassifier) -> Vec<LineItem>;
}

/// Items from pre-parsed tables.
///
/// After the header row (any cell containing `PROD`), a row is an item when
/// it has at least nine cells and the third is an eight-digit NCM code.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableStrategy;

impl ItemStrategy for TableStrategy {
    fn name(&self) -> &'static str {
        "table"
    }

    fn extract(&self, source: &SourceDocument, classifier: &MaterialClassifier) -> Vec<LineItem> {
        let mut items = Vec::new();

        for table in &source.tables {
            let Some(header) = table
                .iter()
                .position(|row| row.iter().any(|cell| cell.to_uppercase().contains("PROD")))
            else {
                continue;
            };

            for row in &table[header + 1..] {
                if row.len() < TABLE_ROW_CELLS || !NCM_CODE.is_match(row[2].trim()) {
                    continue;
                }

                let description = collapse_whitespace(&row[1]);
                let Some(material) = classifier.classify(&description) else {
                    trace!("Table row filtered out: {}", description);
                    continue;
                };

                items.push(LineItem {
                    item_code: non_empty(&row[0]),
                    description,
                    ncm: non_empty(&row[2]),
                    cst: non_empty(&row[3]),
                    cfop: non_empty(&row[4]),
                    unit: non_empty(&row[5]),
                    quantity: parse_brl_amount(&row[6]),
                    unit_price: parse_brl_amount(&row[7]),
                    total: parse_brl_amount(&row[8]),
                    material,
                });
            }
        }

        items
    }
}

/// Items from the raw text, one item-row pattern match each.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexStrategy;

impl ItemStrategy for RegexStrategy {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn extract(&self, source: &SourceDocument, classifier: &MaterialClassifier) -> Vec<LineItem> {
        ITEM_ROW
            .captures_iter(&source.text)
            .filter_map(|caps| {
                let description = collapse_whitespace(&caps["description"]);
                let Some(material) = classifier.classify(&description) else {
                    trace!("Text row filtered out: {}", description);
                    return None;
                };

                Some(LineItem {
                    item_code: Some(caps["code"].to_string()),
                    description,
                    ncm: Some(caps["ncm"].to_string()),
                    cst: Some(caps["cst"].to_string()),
                    cfop: Some(caps["cfop"].to_string()),
                    unit: Some(caps["unit"].to_string()),
                    quantity: parse_brl_amount(&caps["quantity"]),
                    unit_price: parse_brl_amount(&caps["unit_price"]),
                    total: parse_brl_amount(&caps["total"]),
                    material,
                })
            })
            .collect()
    }
}

/// Last-resort line-by-line reconstruction for documents without tables.
///
/// Only lines inside the product block (after `DADOS DOS PRODUTOS`, before
/// `DADOS ADICIONAIS`) that name a known material and carry at least one
/// number become items. An eight-digit run is the NCM and a four-digit run
/// the CFOP; every other numeric token, integer or decimal, is read
/// positionally as quantity, unit price and total (missing ones are zero).
/// What remains, minus units and fiscal labels, is the description.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualStrategy;

impl ManualStrategy {
    fn rebuild_line(
        &self,
        line: &str,
        classifier: &MaterialClassifier,
    ) -> Option<LineItem> {
        let material = classifier.matched_category(line)?;

        let mut words = Vec::new();
        let mut values = Vec::new();
        let mut ncm = None;
        let mut cfop = None;
        let mut unit = None;

        for token in line.split_whitespace() {
            if token.chars().all(|c| c.is_ascii_digit()) {
                match token.len() {
                    8 if ncm.is_none() => ncm = Some(token.to_string()),
                    4 if cfop.is_none() => cfop = Some(token.to_string()),
                    _ => values.push(parse_brl_amount(token)),
                }
                continue;
            }

            if NUMERIC_TOKEN.is_match(token) {
                values.push(parse_brl_amount(token));
                continue;
            }

            let upper = token.to_uppercase();
            if UNIT_TOKENS.contains(&upper.as_str()) {
                unit.get_or_insert(upper);
                continue;
            }
            if LABEL_TOKENS.contains(&upper.trim_end_matches(':')) {
                continue;
            }
            if !token.chars().any(char::is_alphabetic) {
                continue;
            }

            words.push(token);
        }

        if words.is_empty() || (values.is_empty() && ncm.is_none() && cfop.is_none()) {
            return None;
        }

        let value = |i: usize| Some(values.get(i).copied().flatten().unwrap_or(Decimal::ZERO));

        Some(LineItem {
            ncm,
            cfop,
            unit,
            quantity: value(0),
            unit_price: value(1),
            total: value(2),
            ..LineItem::new(words.join(" "), material)
        })
    }
}

impl ItemStrategy for ManualStrategy {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn extract(&self, source: &SourceDocument, classifier: &MaterialClassifier) -> Vec<LineItem> {
        if !source.tables.is_empty() {
            return Vec::new();
        }

        let Some(block) = product_block(&source.text) else {
            trace!("{}: no product block for manual reconstruction", source.name);
            return Vec::new();
        };

        block
            .lines()
            .filter_map(|line| self.rebuild_line(line, classifier))
            .collect()
    }
}

/// Text between the product block header line and the next block that
/// closes it (or the end of the text).
fn product_block(text: &str) -> Option<&str> {
    let header = PRODUCT_BLOCK.find(text)?;
    let rest = &text[header.end()..];
    let rest = rest.find('\n').map(|i| &rest[i + 1..]).unwrap_or("");

    Some(match PRODUCT_BLOCK_END.find(rest) {
        Some(end) => &rest[..end.start()],
        None => rest,
    })
}

/// Items recovered from one document.
#[derive(Debug, Clone, Default)]
pub struct ItemExtraction {
    pub items: Vec<LineItem>,
    /// Strategy that produced the items; `None` when every strategy came back
    /// empty.
    pub strategy: Option<&'static str>,
}

/// Ordered chain of item strategies.
pub struct LineItemExtractor {
    strategies: Vec<Box<dyn ItemStrategy>>,
    classifier: MaterialClassifier,
    deduplicate: bool,
}

impl LineItemExtractor {
    /// Table then regex, without manual fallback or deduplication.
    pub fn new(classifier: MaterialClassifier) -> Self {
        Self {
            strategies: vec![Box::new(TableStrategy), Box::new(RegexStrategy)],
            classifier,
            deduplicate: false,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        let mut extractor = Self::new(MaterialClassifier::new(config.taxonomy))
            .with_deduplication(config.deduplicates_items());
        if config.manual_fallback {
            extractor = extractor.with_strategy(Box::new(ManualStrategy));
        }
        extractor
    }

    /// Append a strategy to the end of the chain.
    pub fn with_strategy(mut self, strategy: Box<dyn ItemStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn with_deduplication(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }

    pub fn classifier(&self) -> &MaterialClassifier {
        &self.classifier
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the chain; the first strategy returning any item wins.
    pub fn extract(&self, source: &SourceDocument) -> ItemExtraction {
        for strategy in &self.strategies {
            let items = strategy.extract(source, &self.classifier);
            if items.is_empty() {
                debug!("{}: {} strategy found no items", source.name, strategy.name());
                continue;
            }

            let items = if self.deduplicate {
                deduplicate_by_description(items)
            } else {
                items
            };

            debug!(
                "{}: {} items via {} strategy",
                source.name,
                items.len(),
                strategy.name()
            );
            return ItemExtraction {
                items,
                strategy: Some(strategy.name()),
            };
        }

        ItemExtraction::default()
    }
}

/// Keep the first item of every exact description.
pub fn deduplicate_by_description(items: Vec<LineItem>) -> Vec<LineItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.description.clone()))
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(cell: &str) -> Option<String> {
    let cell = cell.trim();
    (!cell.is_empty()).then(|| cell.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::rules::Taxonomy;
    use crate::models::document::MaterialCategory;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn reduced() -> MaterialClassifier {
        MaterialClassifier::new(Taxonomy::Reduced)
    }

    fn table_document() -> SourceDocument {
        SourceDocument::from_text("nota.pdf", "").with_tables(vec![vec![
            row(&["DADOS DO PRODUTO / SERVIÇO"]),
            row(&["CÓD. PROD.", "DESCRIÇÃO", "NCM/SH", "CST", "CFOP", "UN", "QTD", "V. UNIT", "V. TOTAL"]),
            row(&["001", "PLASTICO PET", "39011000", "000", "5102", "KG", "10,5", "2,38", "25,00"]),
            row(&["002", "SERVICO", "1234", "000", "5102", "UN", "1,00", "1,00", "1,00"]),
        ]])
    }

    #[test]
    fn test_table_strategy() {
        let items = TableStrategy.extract(&table_document(), &reduced());

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.description, "PLASTICO PET");
        assert_eq!(item.ncm.as_deref(), Some("39011000"));
        assert_eq!(item.quantity, Some(dec("10.5")));
        assert_eq!(item.total, Some(dec("25.00")));
        assert_eq!(item.material, MaterialCategory::Plastic);
    }

    #[test]
    fn test_table_rows_before_header_are_ignored() {
        let doc = SourceDocument::from_text("nota.pdf", "").with_tables(vec![vec![
            row(&["001", "PLASTICO PET", "39011000", "000", "5102", "KG", "1,0", "1,0", "1,00"]),
            row(&["PRODUTOS"]),
        ]]);
        assert!(TableStrategy.extract(&doc, &reduced()).is_empty());
    }

    #[test]
    fn test_regex_strategy() {
        let text = "DADOS DOS PRODUTOS\n\
                    001 SUCATA DE\n    FERRO MISTA 72044900 000 5102 KG 1.500,000 0,80 1.200,00\n\
                    002 FRETE 99999999 000 5102 UN 1,00 50,00 50,00\n";
        let doc = SourceDocument::from_text("nota.txt", text);
        let items = RegexStrategy.extract(&doc, &reduced());

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "SUCATA DE FERRO MISTA");
        assert_eq!(items[0].item_code.as_deref(), Some("001"));
        assert_eq!(items[0].cfop.as_deref(), Some("5102"));
        assert_eq!(items[0].quantity, Some(dec("1500")));
        assert_eq!(items[0].total, Some(dec("1200.00")));
        assert_eq!(items[0].material, MaterialCategory::Metal);
    }

    #[test]
    fn test_manual_strategy() {
        let text = "DADOS DOS PRODUTOS / SERVIÇOS\nAPARAS DE PAPELAO 47079000 5102 KG 320,5 0,45 144,23\nCARTAO CX 12,00\n";
        let doc = SourceDocument::from_text("nota.txt", text);
        let items = ManualStrategy.extract(&doc, &reduced());

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "APARAS DE PAPELAO");
        assert_eq!(items[0].ncm.as_deref(), Some("47079000"));
        assert_eq!(items[0].cfop.as_deref(), Some("5102"));
        assert_eq!(items[0].unit.as_deref(), Some("KG"));
        assert_eq!(items[0].quantity, Some(dec("320.5")));
        assert_eq!(items[0].unit_price, Some(dec("0.45")));
        assert_eq!(items[0].total, Some(dec("144.23")));

        assert_eq!(items[1].description, "CARTAO");
        assert_eq!(items[1].quantity, Some(dec("12.00")));
        assert_eq!(items[1].unit_price, Some(Decimal::ZERO));
        assert_eq!(items[1].total, Some(Decimal::ZERO));
    }

    #[test]
    fn test_manual_integer_tokens_keep_their_position() {
        let doc = SourceDocument::from_text(
            "nota.txt",
            "DADOS DOS PRODUTOS\nSUCATA DE FERRO 100 2,50 250,00\nSUCATA DE COBRE 1.500 3,00 4.500,00\n",
        );
        let items = ManualStrategy.extract(&doc, &reduced());

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "SUCATA DE FERRO");
        assert_eq!(items[0].quantity, Some(dec("100")));
        assert_eq!(items[0].unit_price, Some(dec("2.50")));
        assert_eq!(items[0].total, Some(dec("250.00")));
        assert_eq!(items[1].quantity, Some(dec("1500")));
        assert_eq!(items[1].total, Some(dec("4500.00")));
    }

    #[test]
    fn test_manual_reads_only_the_product_block() {
        let text = "IDENTIFICAÇÃO DO EMITENTE\n\
                    RECICLA PAPEL LTDA\n\
                    CNPJ 11.222.333/0001-81\n\
                    DADOS DOS PRODUTOS / SERVIÇOS\n\
                    PAPEL RECICLADO\n\
                    001 TECIDO DE ALGODAO 52081100 000 5102 KG 10,000 5,00 50,00\n\
                    DADOS ADICIONAIS\n\
                    SUCATA DE ALUMINIO DEVOLVIDA 10,00\n";
        let doc = SourceDocument::from_text("nota.txt", text);

        assert!(ManualStrategy.extract(&doc, &reduced()).is_empty());

        let result = LineItemExtractor::from_config(&ExtractionConfig::default()).extract(&doc);
        assert_eq!(result.strategy, None);
        assert!(result.items.is_empty());
    }

    #[test]
    fn test_manual_needs_a_product_block() {
        let doc = SourceDocument::from_text("nota.txt", "RECICLA PAPEL LTDA 1.234,00\n");
        assert!(ManualStrategy.extract(&doc, &reduced()).is_empty());
    }

    #[test]
    fn test_manual_skipped_when_tables_exist() {
        let doc = SourceDocument::from_text("nota.pdf", "DADOS DOS PRODUTOS\nSUCATA DE FERRO 100 2,50 250,00")
            .with_tables(vec![vec![row(&["CÓD. PROD.", "DESCRIÇÃO"])]]);
        assert!(ManualStrategy.extract(&doc, &reduced()).is_empty());
    }

    #[test]
    fn test_first_non_empty_strategy_wins() {
        let mut doc = table_document();
        doc.text = "001 SUCATA DE FERRO 72044900 000 5102 KG 1,000 1,00 1,00".to_string();

        let extractor = LineItemExtractor::new(reduced());
        let result = extractor.extract(&doc);
        assert_eq!(result.strategy, Some("table"));
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].material, MaterialCategory::Plastic);

        doc.tables.clear();
        let result = extractor.extract(&doc);
        assert_eq!(result.strategy, Some("regex"));
        assert_eq!(result.items[0].material, MaterialCategory::Metal);
    }

    #[test]
    fn test_manual_fallback_is_configurable() {
        let doc = SourceDocument::from_text(
            "nota.txt",
            "DADOS DO PRODUTO\nGARRAFA DE VIDRO 100,0 0,10 10,00",
        );

        let mut config = ExtractionConfig::default();
        let result = LineItemExtractor::from_config(&config).extract(&doc);
        assert_eq!(result.strategy, Some("manual"));
        assert_eq!(result.items[0].material, MaterialCategory::Glass);

        config.manual_fallback = false;
        let result = LineItemExtractor::from_config(&config).extract(&doc);
        assert_eq!(result.strategy, None);
        assert!(result.items.is_empty());
    }

    #[test]
    fn test_reduced_taxonomy_deduplicates() {
        let text = "001 SUCATA DE FERRO 72044900 000 5102 KG 1,000 1,00 1,00\n\
                    002 SUCATA DE FERRO 72044900 000 5102 KG 2,000 1,00 2,00\n";
        let doc = SourceDocument::from_text("nota.txt", text);

        let config = ExtractionConfig::default();
        let result = LineItemExtractor::from_config(&config).extract(&doc);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].item_code.as_deref(), Some("001"));

        let config = ExtractionConfig {
            taxonomy: Taxonomy::Full,
            ..ExtractionConfig::default()
        };
        let result = LineItemExtractor::from_config(&config).extract(&doc);
        assert_eq!(result.items.len(), 2);
    }

    #[test]
    fn test_strategy_names() {
        let extractor = LineItemExtractor::from_config(&ExtractionConfig::default());
        assert_eq!(extractor.strategy_names(), vec!["table", "regex", "manual"]);
    }
}
