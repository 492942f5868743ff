use crate::domain::model::{AggregatedReport, LookupStatus, ModuleReport};
use crate::utils::error::{Result, TracerError};
use std::fmt;
use std::str::FromStr;

const CSV_HEADER: [&str; 8] = [
    "phone_number",
    "module",
    "status",
    "source",
    "cached",
    "field",
    "value",
    "error",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Json,
    Csv,
    Html,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Html => "html",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = TracerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "html" | "htm" => Ok(ExportFormat::Html),
            other => Err(TracerError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

/// 把單一報告序列化成指定格式
pub fn export(report: &AggregatedReport, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        ExportFormat::Csv => to_csv(std::slice::from_ref(report)),
        ExportFormat::Html => Ok(to_html(std::slice::from_ref(report))),
    }
}

/// 批次輸出：JSON 陣列、單一 CSV 表格或單一 HTML 頁面
pub fn export_batch(reports: &[AggregatedReport], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(reports)?),
        ExportFormat::Csv => to_csv(reports),
        ExportFormat::Html => Ok(to_html(reports)),
    }
}

fn to_csv(reports: &[AggregatedReport]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for report in reports {
        let number = report.phone_number.format();
        for module in report.modules.values() {
            for row in module_rows(module) {
                writer.write_record([
                    number.as_str(),
                    module.module.as_str(),
                    status_label(module),
                    module.source.as_deref().unwrap_or(""),
                    if module.from_cache { "true" } else { "false" },
                    row.field.as_str(),
                    row.value.as_str(),
                    row.error.as_str(),
                ])?;
            }
        }
    }

    let bytes = writer.into_inner().map_err(|e| TracerError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| TracerError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

struct Row {
    field: String,
    value: String,
    error: String,
}

fn module_rows(module: &ModuleReport) -> Vec<Row> {
    let mut rows: Vec<Row> = module
        .result
        .iter()
        .flat_map(|result| result.fields.iter())
        .map(|(field, value)| Row {
            field: field.clone(),
            value: value_text(value),
            error: String::new(),
        })
        .collect();

    if module.result.is_none() {
        rows.extend(module.errors.iter().map(|failure| Row {
            field: String::new(),
            value: String::new(),
            error: failure.message.clone(),
        }));
    }

    if rows.is_empty() {
        rows.push(Row {
            field: String::new(),
            value: String::new(),
            error: String::new(),
        });
    }
    rows
}

fn status_label(module: &ModuleReport) -> &'static str {
    match module.status {
        LookupStatus::Success => "success",
        LookupStatus::Partial => "partial",
        LookupStatus::Failed => "failed",
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn to_html(reports: &[AggregatedReport]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>PhoneTracer Report</title>\n\
<style>body{font-family:sans-serif;margin:2em}table{border-collapse:collapse;margin-bottom:1.5em}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left}.success{color:#2e7d32}.partial{color:#f9a825}.failed{color:#c62828}</style>\n\
</head>\n<body>\n<h1>PhoneTracer Report</h1>\n",
    );

    for report in reports {
        let overall = if report.success { "success" } else { "failed" };
        html.push_str(&format!(
            "<section>\n<h2>{}</h2>\n<p>Queried at {} &middot; overall: <span class=\"{}\">{}</span></p>\n",
            escape_html(&report.phone_number.format()),
            escape_html(&report.queried_at.to_rfc3339()),
            overall,
            overall
        ));
        html.push_str("<table>\n<tr><th>Module</th><th>Status</th><th>Source</th><th>Field</th><th>Value</th><th>Error</th></tr>\n");

        for module in report.modules.values() {
            let status = status_label(module);
            for row in module_rows(module) {
                html.push_str(&format!(
                    "<tr><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                    module.module,
                    status,
                    status,
                    escape_html(module.source.as_deref().unwrap_or("")),
                    escape_html(&row.field),
                    escape_html(&row.value),
                    escape_html(&row.error)
                ));
            }
        }
        html.push_str("</table>\n</section>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
