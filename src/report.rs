// src/report.rs
//! Downloadable report documents built from the latest calculation
//!
//! Every format renders the same snapshot: title, generation time, the six
//! summary lines, a bar chart where the format allows one, and the detailed
//! breakdown table with its totals row.

use chrono::{DateTime, Utc};

use crate::calculator::Calculation;
use crate::error::{ApiError, ApiResult};
use crate::presentation::{BreakdownTable, ChartData, SummaryView, TableRow, TABLE_HEADERS};

pub const REPORT_TITLE: &str = "Datacenter Power Consumption Report";

fn generated_label(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn report_filename(calculation: &Calculation, extension: &str) -> String {
    format!(
        "power_report_{}.{}",
        calculation.computed_at.format("%Y%m%d_%H%M%S"),
        extension
    )
}

// ==================== CSV ====================

pub fn csv_report(calculation: &Calculation) -> ApiResult<Vec<u8>> {
    let table = BreakdownTable::from_result(&calculation.result);

    let mut csv_data = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut csv_data);

        writer.write_record(TABLE_HEADERS)
            .map_err(|e| ApiError::InternalServerError(e.to_string()))?;
        for row in table.rows.iter().chain(std::iter::once(&table.totals)) {
            writer.write_record(row.cells())
                .map_err(|e| ApiError::InternalServerError(e.to_string()))?;
        }

        writer.flush().map_err(|e| ApiError::InternalServerError(e.to_string()))?;
    }

    Ok(csv_data)
}

// ==================== HTML ====================

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn html_row(row: &TableRow, class: &str) -> String {
    let cells: String = row
        .cells()
        .iter()
        .map(|cell| format!("<td>{}</td>", escape_html(cell)))
        .collect();
    format!("<tr class=\"{}\">{}</tr>\n", class, cells)
}

fn html_chart(chart: &ChartData) -> String {
    let max = chart.max_value();
    let mut html = String::from("<div class=\"chart\">\n");

    for (i, label) in chart.labels.iter().enumerate() {
        html.push_str(&format!("<div class=\"group\"><h3>{}</h3>\n", escape_html(label)));
        for (series_idx, series) in chart.series.iter().enumerate() {
            let value = series.values.get(i).copied().unwrap_or(0.0);
            let width = if max > 0.0 { value / max * 100.0 } else { 0.0 };
            html.push_str(&format!(
                "<div class=\"bar series-{}\" style=\"width: {:.1}%\">{}: {:.2}</div>\n",
                series_idx,
                width,
                escape_html(series.label),
                value
            ));
        }
        html.push_str("</div>\n");
    }

    html.push_str("</div>\n");
    html
}

const HTML_STYLE: &str = "body { font-family: Arial, sans-serif; margin: 24px; color: #222; }
h1 { color: #1f3b73; }
.summary td { padding: 4px 12px; }
table.results { border-collapse: collapse; width: 100%; margin-top: 16px; }
table.results th, table.results td { border: 1px solid #ccc; padding: 6px; text-align: left; }
table.results th { background: #1f3b73; color: #fff; }
tr.category-it { background: #eef4ff; }
tr.category-infra { background: #fff6e8; }
tr.totals { font-weight: bold; background: #e8e8e8; }
.chart .bar { margin: 2px 0; padding: 2px 6px; color: #fff; white-space: nowrap; }
.chart .series-0 { background: #3c78d8; }
.chart .series-1 { background: #e06666; }";

/// Styled standalone HTML document; opens in browsers and word processors.
pub fn html_report(calculation: &Calculation) -> String {
    let result = &calculation.result;
    let summary = SummaryView::from_result(result);
    let table = BreakdownTable::from_result(result);
    let chart = ChartData::from_result(result);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", REPORT_TITLE));
    html.push_str(&format!("<style>\n{}\n</style>\n</head>\n<body>\n", HTML_STYLE));
    html.push_str(&format!("<h1>{}</h1>\n", REPORT_TITLE));
    html.push_str(&format!(
        "<p>Generated: {}</p>\n",
        generated_label(&calculation.computed_at)
    ));

    html.push_str("<h2>Summary</h2>\n<table class=\"summary\">\n");
    for (label, value) in summary.lines() {
        html.push_str(&format!("<tr><td>{}</td><td>{}</td></tr>\n", label, value));
    }
    html.push_str("</table>\n");

    html.push_str("<h2>Power by Category</h2>\n");
    html.push_str(&html_chart(&chart));

    html.push_str("<h2>Detailed Breakdown</h2>\n<table class=\"results\">\n<thead><tr>");
    for header in TABLE_HEADERS {
        html.push_str(&format!("<th>{}</th>", escape_html(header)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for row in &table.rows {
        let class = if row.category == "Infrastructure" { "category-infra" } else { "category-it" };
        html.push_str(&html_row(row, class));
    }
    html.push_str(&html_row(&table.totals, "totals"));
    html.push_str("</tbody>\n</table>\n</body>\n</html>\n");

    html
}

// ==================== PLAIN TEXT ====================

pub fn text_report(calculation: &Calculation) -> String {
    let result = &calculation.result;
    let summary = SummaryView::from_result(result);
    let table = BreakdownTable::from_result(result);

    let mut widths: Vec<usize> = TABLE_HEADERS.iter().map(|h| h.chars().count()).collect();
    for row in table.rows.iter().chain(std::iter::once(&table.totals)) {
        for (width, cell) in widths.iter_mut().zip(row.cells()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |cells: [&str; 9]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(REPORT_TITLE);
    out.push('\n');
    out.push_str(&"=".repeat(REPORT_TITLE.len()));
    out.push_str(&format!("\nGenerated: {}\n\n", generated_label(&calculation.computed_at)));

    out.push_str("Summary\n-------\n");
    for (label, value) in summary.lines() {
        out.push_str(&format!("{:<24}{:>12}\n", label, value));
    }

    out.push_str("\nDetailed Breakdown\n------------------\n");
    let header = render(TABLE_HEADERS);
    let rule = "-".repeat(header.chars().count());
    out.push_str(&header);
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    for row in &table.rows {
        out.push_str(&render(row.cells()));
        out.push('\n');
    }
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&render(table.totals.cells()));
    out.push('\n');

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::aggregate;
    use crate::models::{DeviceCategory, DeviceRecord, Inventory};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn calculation() -> Calculation {
        let it = Inventory {
            category: DeviceCategory::It,
            records: vec![DeviceRecord {
                brand: "Dell".to_string(),
                model: "R750 <2U>".to_string(),
                device_type_label: "Server".to_string(),
                nominal_power_watts: 3800.0,
                maximum_power_watts: 4500.0,
                weight_kg: None,
                quantity: 2,
            }],
        };
        let infra = Inventory {
            category: DeviceCategory::Infrastructure,
            records: vec![DeviceRecord {
                brand: "Schneider, Electric".to_string(),
                model: "Galaxy".to_string(),
                device_type_label: "UPS".to_string(),
                nominal_power_watts: 8500.0,
                maximum_power_watts: 12000.0,
                weight_kg: Some(220.0),
                quantity: 8,
            }],
        };

        Calculation {
            id: Uuid::new_v4(),
            computed_at: Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap(),
            result: aggregate(&it, &infra),
        }
    }

    #[test]
    fn test_report_filename() {
        assert_eq!(report_filename(&calculation(), "csv"), "power_report_20240305_140709.csv");
    }

    #[test]
    fn test_csv_report() {
        let data = String::from_utf8(csv_report(&calculation()).unwrap()).unwrap();
        let lines: Vec<&str> = data.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "Category,Brand,Model,Type,Qty,Unit Nominal (W),Unit Maximum (W),Total Nominal (kW),Total Maximum (kW)"
        );
        assert_eq!(lines[1], "IT Equipment,Dell,R750 <2U>,Server,2,3800,4500,7.60,9.00");
        assert_eq!(
            lines[2],
            "Infrastructure,\"Schneider, Electric\",Galaxy,UPS,8,8500,12000,68.00,96.00"
        );
        assert_eq!(lines[3], "Total,,,,10,,,75.60,105.00");
    }

    #[test]
    fn test_html_report() {
        let html = html_report(&calculation());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h1>Datacenter Power Consumption Report</h1>"));
        assert!(html.contains("Generated: 2024-03-05 14:07:09 UTC"));
        assert!(html.contains("<td>Total Nominal</td><td>75.60 kW</td>"));
        assert!(html.contains("R750 &lt;2U&gt;"));
        assert!(!html.contains("R750 <2U>"));
        assert!(html.contains("<tr class=\"category-infra\">"));
        assert!(html.contains("<tr class=\"totals\"><td>Total</td>"));
        assert!(html.contains("style=\"width: 100.0%\""));
    }

    #[test]
    fn test_text_report() {
        let text = text_report(&calculation());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], REPORT_TITLE);
        assert_eq!(lines[2], "Generated: 2024-03-05 14:07:09 UTC");
        assert!(text.contains("Total Maximum              105.00 kW"));
        let last = lines.last().unwrap();
        assert!(last.starts_with("Total"));
        assert!(last.ends_with("75.60              | 105.00"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a&b<c>\"d'"), "a&amp;b&lt;c&gt;&quot;d&#39;");
    }
}
