//! Readiness reports: the run record plus HTML, JSON and CSV renderings.

mod export;
mod html;
mod models;

pub use export::{CsvRenderer, JsonRenderer, CSV_HEADER};
pub use html::{escape_html, HtmlRenderer};
pub use models::RunReport;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

pub trait ReportRenderer {
    fn render(&self, report: &RunReport) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Html,
    Json,
    Csv,
}

impl ReportFormat {
    pub fn renderer(&self) -> Box<dyn ReportRenderer> {
        match self {
            ReportFormat::Html => Box::new(HtmlRenderer),
            ReportFormat::Json => Box::new(JsonRenderer),
            ReportFormat::Csv => Box::new(CsvRenderer),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        }
    }

    /// Parse a user-supplied name (`html`, `json`, `csv`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" | "htm" => Some(ReportFormat::Html),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }
}

pub fn render(report: &RunReport, format: ReportFormat) -> Result<String> {
    format.renderer().render(report)
}

/// Render and write the report, replacing any existing file.
pub fn write_report(report: &RunReport, format: ReportFormat, path: &Path) -> Result<()> {
    let body = render(report, format)?;
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
        .with_context(|| format!("cannot create report {}", path.display()))?;
    let mut w = BufWriter::new(file);
    w.write_all(body.as_bytes())?;
    w.flush()?;
    Ok(())
}

/// `ess-readiness-<host>-<yyyymmdd-hhmmss>.<ext>`
pub fn default_file_name(report: &RunReport, format: ReportFormat) -> String {
    let t = report.generated_at;
    let host: String = report
        .host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!(
        "ess-readiness-{}-{:04}{:02}{:02}-{:02}{:02}{:02}.{}",
        host,
        t.year(),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second(),
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use readiness_core::{Instance, InstanceType, ResultStore, Status};

    fn report(fail: bool) -> RunReport {
        let mut store = ResultStore::new();
        store.add("System Requirements", "Memory", Status::Pass, "16384 MB (minimum 8192 MB)");
        store.add("Configuration Files", "Default Web Site/ESS - payglobal.config", Status::Info, "found <path> & more");
        if fail {
            store.add("Security", "Administrator Privileges", Status::Fail, "permission denied");
        }
        store.add("System Requirements", "CPU Cores", Status::Warning, "could not be measured");
        let mut inst = Instance::candidate("Default Web Site", "/ESS", "EssPool", "C:\\inetpub\\ESS");
        inst.instance_type = InstanceType::Ess;
        RunReport::new("APP01", "0.1.0", vec![inst], store)
    }

    #[test]
    fn exit_code_follows_failures() {
        assert_eq!(report(false).exit_code(), 0);
        assert_eq!(report(true).exit_code(), 2);
        assert!(!report(true).is_ready());
    }

    #[test]
    fn categories_in_first_seen_order() {
        assert_eq!(report(true).categories(), vec!["System Requirements", "Configuration Files", "Security"]);
    }

    #[test]
    fn html_escapes_and_summarises() {
        let html = render(&report(true), ReportFormat::Html).unwrap();
        assert!(html.contains("found &lt;path&gt; &amp; more"));
        assert!(!html.contains("<path>"));
        assert!(html.contains("NOT READY"));
        assert!(html.contains("1 failed"));
        assert!(html.contains("Action required"));
        assert!(html.contains("EssPool"));
    }

    #[test]
    fn json_carries_run_metadata() {
        let r = report(false);
        let v: serde_json::Value = serde_json::from_str(&render(&r, ReportFormat::Json).unwrap()).unwrap();
        assert_eq!(v["run_id"], r.run_id.to_string());
        assert_eq!(v["host"], "APP01");
        assert_eq!(v["summary"]["pass"], 1);
        assert_eq!(v["results"][0]["status"], "PASS");
        assert_eq!(v["instances"][0]["instance_type"], "ESS");
    }

    #[test]
    fn csv_has_header_and_one_row_per_result() {
        let out = render(&report(true), ReportFormat::Csv).unwrap();
        let mut rdr = csv::Reader::from_reader(out.as_bytes());
        assert_eq!(rdr.headers().unwrap().iter().collect::<Vec<_>>(), CSV_HEADER.to_vec());
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(&rows[2][4], "FAIL");
    }

    #[test]
    fn write_report_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.json");
        std::fs::write(&path, "old contents that are longer than nothing").unwrap();
        write_report(&report(false), ReportFormat::Json, &path).unwrap();
        let back: RunReport = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.host, "APP01");
        assert_eq!(back.results.len(), 3);
    }

    #[test]
    fn format_names_and_file_names() {
        assert_eq!(ReportFormat::parse("HTML"), Some(ReportFormat::Html));
        assert_eq!(ReportFormat::parse("xml"), None);
        let name = default_file_name(&report(false), ReportFormat::Csv);
        assert!(name.starts_with("ess-readiness-APP01-"));
        assert!(name.ends_with(".csv"));
    }
}
