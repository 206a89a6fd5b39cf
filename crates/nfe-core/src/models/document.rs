//! NF-e document records and the flat rows they export to.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::invoice::rules::{format_brl_amount, format_date};

/// Material category of a merchandise line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialCategory {
    Plastic,
    Metal,
    Glass,
    Paper,
    Oil,
    Electronic,
    Textile,
    Wood,
    Rubber,
    Other,
}

impl MaterialCategory {
    /// Every category, in the order summaries report them.
    pub const ALL: [MaterialCategory; 10] = [
        MaterialCategory::Plastic,
        MaterialCategory::Metal,
        MaterialCategory::Glass,
        MaterialCategory::Paper,
        MaterialCategory::Oil,
        MaterialCategory::Electronic,
        MaterialCategory::Textile,
        MaterialCategory::Wood,
        MaterialCategory::Rubber,
        MaterialCategory::Other,
    ];

    /// Upper-case label used in exports.
    pub fn label(&self) -> &'static str {
        match self {
            MaterialCategory::Plastic => "PLASTIC",
            MaterialCategory::Metal => "METAL",
            MaterialCategory::Glass => "GLASS",
            MaterialCategory::Paper => "PAPER",
            MaterialCategory::Oil => "OIL",
            MaterialCategory::Electronic => "ELECTRONIC",
            MaterialCategory::Textile => "TEXTILE",
            MaterialCategory::Wood => "WOOD",
            MaterialCategory::Rubber => "RUBBER",
            MaterialCategory::Other => "OTHER",
        }
    }
}

impl fmt::Display for MaterialCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Registry data for one legal entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInfo {
    /// Registered legal name, upper case.
    pub legal_name: String,

    /// Registration status (e.g. "ATIVA").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// State (UF).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,

    /// Street, number and district, when the registry returns them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub address: Vec<String>,
}

/// A party (issuer or counterparty) on the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// CNPJ in display form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,

    /// Legal name, empty when neither the registry nor the text gave one.
    pub legal_name: String,

    /// State (UF), registry only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Party {
    pub fn is_empty(&self) -> bool {
        self.cnpj.is_none() && self.legal_name.is_empty()
    }
}

/// A single merchandise line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_code: Option<String>,

    /// Product description.
    pub description: String,

    /// Merchandise classification code (8 digits).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ncm: Option<String>,

    /// Tax-situation code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cst: Option<String>,

    /// Fiscal-operation code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfop: Option<String>,

    /// Unit of measure (KG, UN, TON...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    pub quantity: Option<Decimal>,

    pub unit_price: Option<Decimal>,

    /// Line total.
    pub total: Option<Decimal>,

    pub material: MaterialCategory,
}

impl LineItem {
    /// Item with only a description and category; codes and values unset.
    pub fn new(description: impl Into<String>, material: MaterialCategory) -> Self {
        Self {
            item_code: None,
            description: description.into(),
            ncm: None,
            cst: None,
            cfop: None,
            unit: None,
            quantity: None,
            unit_price: None,
            total: None,
            material,
        }
    }
}

/// Everything extracted from one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Source file name.
    pub source: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<NaiveDate>,

    /// Seller / sender.
    pub issuer: Party,

    /// Buyer / receiver.
    pub counterparty: Party,

    /// Declared document total.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_total: Option<Decimal>,

    /// Merchandise lines, in strategy order.
    #[serde(default)]
    pub items: Vec<LineItem>,

    /// Extraction metadata.
    #[serde(default)]
    pub metadata: ExtractionMetadata,
}

/// Metadata about the extraction process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    /// Name of the item strategy that produced the items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    /// Soft misses recorded during extraction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Processing time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

impl DocumentRecord {
    /// Create an empty record for a source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Record a soft extraction miss.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.metadata.warnings.push(message.into());
    }

    /// Check the record and return any issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.number.is_none() {
            issues.push("Missing document number".to_string());
        }

        if self.issue_date.is_none() {
            issues.push("Missing issue date".to_string());
        }

        if self.issuer.cnpj.is_none() {
            issues.push("Missing issuer CNPJ".to_string());
        }

        if self.counterparty.is_empty() {
            issues.push("Missing counterparty information".to_string());
        }

        if self.items.is_empty() {
            issues.push("No line items".to_string());
        }

        if let Some(declared) = self.declared_total {
            let items_total: Decimal = self.items.iter().filter_map(|i| i.total).sum();
            if !self.items.is_empty() && items_total > declared {
                issues.push(format!(
                    "Line totals ({}) exceed declared total ({})",
                    format_brl_amount(items_total),
                    format_brl_amount(declared)
                ));
            }
        }

        issues
    }

    /// One flat row per item, or a single document-level row without items.
    pub fn flat_records(&self) -> Vec<FlatRecord> {
        if self.items.is_empty() {
            return vec![self.flat_base()];
        }

        self.items
            .iter()
            .map(|item| FlatRecord {
                quantity: item.quantity,
                value: item.total,
                material: Some(item.material),
                description: item.description.clone(),
                ncm: item.ncm.clone(),
                unit: item.unit.clone(),
                unit_price: item.unit_price,
                ..self.flat_base()
            })
            .collect()
    }

    fn flat_base(&self) -> FlatRecord {
        FlatRecord {
            issuer_legal_name: self.issuer.legal_name.clone(),
            issuer_cnpj: self.issuer.cnpj.clone().unwrap_or_default(),
            counterparty_legal_name: self.counterparty.legal_name.clone(),
            counterparty_cnpj: self.counterparty.cnpj.clone().unwrap_or_default(),
            document_number: self.number.clone().unwrap_or_default(),
            issue_date: self.issue_date.map(format_date).unwrap_or_default(),
            quantity: None,
            value: None,
            material: None,
            description: String::new(),
            issuer_region: self.issuer.region.clone(),
            counterparty_region: self.counterparty.region.clone(),
            series: self.series.clone(),
            ncm: None,
            unit: None,
            unit_price: None,
            declared_total: self.declared_total,
            source: self.source.clone(),
        }
    }
}

/// Export row: document metadata merged with one item. Field order is the
/// column order of the CSV export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatRecord {
    pub issuer_legal_name: String,
    pub issuer_cnpj: String,
    pub counterparty_legal_name: String,
    pub counterparty_cnpj: String,
    pub document_number: String,
    /// dd/mm/yyyy, empty when unknown.
    pub issue_date: String,
    pub quantity: Option<Decimal>,
    pub value: Option<Decimal>,
    pub material: Option<MaterialCategory>,
    pub description: String,
    pub issuer_region: Option<String>,
    pub counterparty_region: Option<String>,
    pub series: Option<String>,
    pub ncm: Option<String>,
    pub unit: Option<String>,
    pub unit_price: Option<Decimal>,
    pub declared_total: Option<Decimal>,
    pub source: String,
}

/// Totals for one material category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialTotals {
    pub material: MaterialCategory,
    pub items: usize,
    pub quantity: Decimal,
    pub value: Decimal,
}

/// Per-material totals over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaterialSummary {
    pub rows: Vec<MaterialTotals>,
}

impl MaterialSummary {
    /// Sum items per category. Categories without items are left out; rows
    /// follow `MaterialCategory::ALL` order.
    pub fn from_records(records: &[DocumentRecord]) -> Self {
        let rows = MaterialCategory::ALL
            .iter()
            .filter_map(|&material| {
                let items: Vec<&LineItem> = records
                    .iter()
                    .flat_map(|r| r.items.iter())
                    .filter(|i| i.material == material)
                    .collect();

                if items.is_empty() {
                    return None;
                }

                Some(MaterialTotals {
                    material,
                    items: items.len(),
                    quantity: items.iter().filter_map(|i| i.quantity).sum(),
                    value: items.iter().filter_map(|i| i.total).sum(),
                })
            })
            .collect();

        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_value(&self) -> Decimal {
        self.rows.iter().map(|r| r.value).sum()
    }
}
