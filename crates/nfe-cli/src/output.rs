//! Record and summary writers shared by `process` and `batch`.

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local};

use nfe_core::invoice::rules::{format_brl_amount, format_date};
use nfe_core::{DocumentRecord, MaterialSummary};

/// Default export name, e.g. `materials_20240502_153000.csv`.
pub fn timestamped_name(prefix: &str, now: DateTime<Local>, extension: &str) -> String {
    format!("{}_{}.{}", prefix, now.format("%Y%m%d_%H%M%S"), extension)
}

/// Write the flat rows of every record as CSV with a header line.
pub fn write_records_csv<W: Write>(writer: W, records: &[DocumentRecord]) -> anyhow::Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for record in records {
        for row in record.flat_records() {
            wtr.serialize(row)?;
            rows += 1;
        }
    }

    wtr.flush()?;
    Ok(rows)
}

pub fn records_csv(records: &[DocumentRecord]) -> anyhow::Result<String> {
    let mut buf = Vec::new();
    write_records_csv(&mut buf, records)?;
    Ok(String::from_utf8(buf)?)
}

pub fn write_records_json(path: &Path, records: &[DocumentRecord]) -> anyhow::Result<()> {
    fs::write(path, serde_json::to_string_pretty(records)?)?;
    Ok(())
}

pub fn write_summary(path: &Path, summary: &MaterialSummary) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(["material", "items", "quantity", "value"])?;

    for row in &summary.rows {
        wtr.write_record([
            row.material.label(),
            &row.items.to_string(),
            &row.quantity.to_string(),
            &row.value.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn format_record_text(record: &DocumentRecord) -> String {
    let mut output = String::new();

    output.push_str(&format!("Document: {}\n", record.source));
    output.push_str(&format!(
        "Number: {}",
        record.number.as_deref().unwrap_or("-")
    ));
    if let Some(series) = &record.series {
        output.push_str(&format!(" (series {})", series));
    }
    output.push('\n');
    output.push_str(&format!(
        "Date: {}\n",
        record.issue_date.map(format_date).unwrap_or_else(|| "-".to_string())
    ));
    output.push('\n');

    for (label, party) in [("Issuer", &record.issuer), ("Counterparty", &record.counterparty)] {
        output.push_str(&format!("{}:\n", label));
        output.push_str(&format!("  {}\n", party.legal_name));
        if let Some(cnpj) = &party.cnpj {
            output.push_str(&format!("  CNPJ: {}\n", cnpj));
        }
        if let Some(region) = &party.region {
            output.push_str(&format!("  UF: {}\n", region));
        }
        output.push('\n');
    }

    output.push_str(&format!("Items ({}):\n", record.items.len()));
    for item in &record.items {
        output.push_str(&format!(
            "  [{}] {} | {} {} | R$ {}\n",
            item.material,
            item.description,
            item.quantity.map(format_brl_amount).unwrap_or_default(),
            item.unit.as_deref().unwrap_or(""),
            item.total.map(format_brl_amount).unwrap_or_default(),
        ));
    }

    if let Some(total) = record.declared_total {
        output.push_str(&format!("\nDeclared total: R$ {}\n", format_brl_amount(total)));
    }

    if !record.metadata.warnings.is_empty() {
        output.push_str("\nWarnings:\n");
        for warning in &record.metadata.warnings {
            output.push_str(&format!("  - {}\n", warning));
        }
    }

    output
}
