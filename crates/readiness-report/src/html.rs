use crate::models::RunReport;
use crate::ReportRenderer;
use anyhow::Result;
use readiness_core::Status;
use std::fmt::Write;
use time::format_description::well_known::Rfc3339;

const STYLE: &str = "body{font-family:Segoe UI,Arial,sans-serif;margin:24px;color:#222}\
table{border-collapse:collapse;width:100%;margin-bottom:24px}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left;vertical-align:top}\
th{background:#f0f0f0}\
.PASS{color:#1a7f37}.FAIL{color:#cf222e;font-weight:bold}.WARNING{color:#9a6700}.INFO{color:#0969da}\
.verdict{font-size:1.2em;padding:8px;border:1px solid #ccc;display:inline-block}";

/// Minimal escaping for text and attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl ReportRenderer for HtmlRenderer {
    fn render(&self, report: &RunReport) -> Result<String> {
        let mut h = String::new();
        let generated = report.generated_at.format(&Rfc3339)?;
        let s = &report.summary;

        writeln!(h, "<!DOCTYPE html>")?;
        writeln!(h, "<html><head><meta charset=\"utf-8\"><title>ESS/WFE Upgrade Readiness - {}</title>", escape_html(&report.host))?;
        writeln!(h, "<style>{}</style></head><body>", STYLE)?;
        writeln!(h, "<h1>ESS/WFE Upgrade Readiness</h1>")?;
        writeln!(
            h,
            "<p>Host <b>{}</b> &middot; generated {} &middot; run {} &middot; checker {}</p>",
            escape_html(&report.host),
            generated,
            report.run_id,
            escape_html(&report.tool_version)
        )?;
        let (class, verdict) = if report.is_ready() { ("PASS", "READY") } else { ("FAIL", "NOT READY") };
        writeln!(h, "<p class=\"verdict {}\">{}</p>", class, verdict)?;
        writeln!(
            h,
            "<p><span class=\"PASS\">{} passed</span>, <span class=\"FAIL\">{} failed</span>, \
             <span class=\"WARNING\">{} warnings</span>, <span class=\"INFO\">{} informational</span> ({} checks)</p>",
            s.pass,
            s.fail,
            s.warning,
            s.info,
            s.total()
        )?;

        writeln!(h, "<h2>Instances</h2>")?;
        if report.instances.is_empty() {
            writeln!(h, "<p>No instances were validated.</p>")?;
        } else {
            writeln!(h, "<table><tr><th>Type</th><th>Site</th><th>Application</th><th>Pool</th><th>Physical path</th><th>Database</th><th>Site URL</th></tr>")?;
            for i in &report.instances {
                let db = match (&i.database_server, &i.database_name) {
                    (Some(srv), Some(name)) => format!("{} / {}", srv, name),
                    (Some(srv), None) => srv.clone(),
                    _ => String::new(),
                };
                writeln!(
                    h,
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    i.instance_type,
                    escape_html(&i.site_name),
                    escape_html(&i.application_path),
                    escape_html(&i.application_pool),
                    escape_html(&i.physical_path.to_string_lossy()),
                    escape_html(&db),
                    escape_html(i.ess_site_url.as_deref().unwrap_or(""))
                )?;
            }
            writeln!(h, "</table>")?;
        }

        for cat in report.categories() {
            writeln!(h, "<h2>{}</h2>", escape_html(cat))?;
            writeln!(h, "<table><tr><th>Status</th><th>Check</th><th>Message</th><th>Time</th></tr>")?;
            for r in report.results.iter().filter(|r| r.category == cat) {
                writeln!(
                    h,
                    "<tr><td class=\"{st}\">{st}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape_html(&r.check),
                    escape_html(&r.message),
                    r.timestamp.format(&Rfc3339)?,
                    st = r.status
                )?;
            }
            writeln!(h, "</table>")?;
        }

        let failed: Vec<_> = report.results.iter().filter(|r| r.status == Status::Fail).collect();
        if !failed.is_empty() {
            writeln!(h, "<h2>Action required</h2><ul>")?;
            for r in failed {
                writeln!(h, "<li><b>{}</b>: {}</li>", escape_html(&r.check), escape_html(&r.message))?;
            }
            writeln!(h, "</ul>")?;
        }
        writeln!(h, "</body></html>")?;
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
        assert_eq!(escape_html("plain"), "plain");
    }
}
