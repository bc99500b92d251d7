use crate::models::RunReport;
use crate::ReportRenderer;
use anyhow::{Context, Result};
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl ReportRenderer for JsonRenderer {
    fn render(&self, report: &RunReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

/// One row per result; run metadata is repeated on each row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvRenderer;

pub const CSV_HEADER: [&str; 8] = ["run_id", "host", "category", "check", "status", "message", "timestamp", "generated_at"];

impl ReportRenderer for CsvRenderer {
    fn render(&self, report: &RunReport) -> Result<String> {
        let run_id = report.run_id.to_string();
        let generated = report.generated_at.format(&Rfc3339)?;
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(CSV_HEADER)?;
        for r in &report.results {
            let timestamp = r.timestamp.format(&Rfc3339)?;
            wtr.write_record([
                run_id.as_str(),
                report.host.as_str(),
                r.category.as_str(),
                r.check.as_str(),
                r.status.as_str(),
                r.message.as_str(),
                timestamp.as_str(),
                generated.as_str(),
            ])?;
        }
        wtr.flush()?;
        let bytes = wtr.into_inner().context("flushing CSV writer")?;
        Ok(String::from_utf8(bytes)?)
    }
}
