use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use calamine::Reader;
use futures_util::stream::StreamExt;
use std::str::FromStr;
use std::sync::Arc;

use crate::AppState;
use crate::calculator::{Calculation, UploadSummary};
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::models::{DeviceCategory, RawRecord};
use crate::report;

// ==================== FILE FORMATS ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Csv,
    Xlsx,
}

const CSV_MIME_TYPES: &[&str] = &["text/csv", "application/csv", "text/comma-separated-values"];
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];

impl TabularFormat {
    /// Picks the parser from the file name, falling back to the declared type.
    pub fn detect(filename: Option<&str>, content_type: Option<&str>, accept_xlsx: bool) -> ApiResult<Self> {
        let extension = filename
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());
        let mime = content_type
            .map(|m| m.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .unwrap_or_default();

        let format = match extension.as_deref() {
            Some("csv") => Some(TabularFormat::Csv),
            Some(ext) if SPREADSHEET_EXTENSIONS.contains(&ext) => Some(TabularFormat::Xlsx),
            _ if CSV_MIME_TYPES.contains(&mime.as_str()) => Some(TabularFormat::Csv),
            _ if mime.contains("spreadsheetml") => Some(TabularFormat::Xlsx),
            _ => None,
        };

        match format {
            Some(TabularFormat::Xlsx) if !accept_xlsx => Err(ApiError::not_csv()),
            Some(format) => Ok(format),
            None => Err(ApiError::not_csv()),
        }
    }
}

// ==================== PARSING ====================

/// Parses comma-separated text with a header row into string-keyed rows.
/// Fully empty lines are skipped; ragged rows are a parse error.
pub fn parse_csv(bytes: &[u8]) -> ApiResult<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        rows.push(
            headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect(),
        );
    }

    Ok(rows)
}

/// Reads the first sheet of a workbook; its first row is the header.
pub fn parse_spreadsheet(bytes: &[u8]) -> ApiResult<Vec<RawRecord>> {
    let reader = std::io::Cursor::new(bytes);
    let mut workbook = calamine::open_workbook_auto_from_rs(reader)?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ApiError::ParseError("Workbook has no sheets".to_string()))?;

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut sheet_rows = range.rows();

    let headers: Vec<String> = match sheet_rows.next() {
        Some(header) => header.iter().map(|cell| cell.to_string().trim().to_string()).collect(),
        None => return Ok(Vec::new()),
    };

    let mut rows = Vec::new();
    for row in sheet_rows {
        let cells: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(
            headers
                .iter()
                .cloned()
                .zip(cells.into_iter().chain(std::iter::repeat(String::new())))
                .collect(),
        );
    }

    Ok(rows)
}

pub fn parse_tabular(format: TabularFormat, bytes: &[u8]) -> ApiResult<Vec<RawRecord>> {
    match format {
        TabularFormat::Csv => parse_csv(bytes),
        TabularFormat::Xlsx => parse_spreadsheet(bytes),
    }
}

/// Converts JSON rows to raw rows; scalar values keep their textual form.
pub fn json_rows_to_raw(rows: Vec<serde_json::Map<String, serde_json::Value>>) -> Vec<RawRecord> {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(key, value)| {
                    let text = match value {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (key, text)
                })
                .collect()
        })
        .collect()
}

pub fn template_csv(category: DeviceCategory) -> String {
    format!("{}\n", category.template_header())
}

pub fn parse_category(raw: &str) -> ApiResult<DeviceCategory> {
    DeviceCategory::from_str(raw).map_err(|_| ApiError::unknown_category(raw))
}

// ==================== UPLOAD ====================

struct UploadedFile {
    filename: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

async fn read_file_field(payload: &mut Multipart, max_bytes: usize) -> ApiResult<UploadedFile> {
    while let Some(item) = payload.next().await {
        let mut field = item?;

        if field.name() != "file" {
            // drain unrelated form fields
            while let Some(chunk) = field.next().await {
                chunk?;
            }
            continue;
        }

        let filename = field
            .content_disposition()
            .get_filename()
            .map(|s| s.to_string());
        let content_type = field.content_type().map(|m| m.to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            if bytes.len() + data.len() > max_bytes {
                return Err(ApiError::BadRequest(format!(
                    "File exceeds the upload limit of {} bytes",
                    max_bytes
                )));
            }
            bytes.extend_from_slice(&data);
        }

        return Ok(UploadedFile { filename, content_type, bytes });
    }

    Err(ApiError::bad_request("No file selected"))
}

fn commit_rows(
    app_state: &AppState,
    ticket: crate::store::UploadTicket,
    rows: &[RawRecord],
) -> ApiResult<UploadSummary> {
    let result = app_state
        .write_calculator()?
        .accept_upload(ticket, rows);

    match result {
        Ok(summary) => {
            app_state.metrics.increment_uploads_accepted();
            if summary.recalculated {
                app_state.metrics.increment_calculations();
            }
            Ok(summary)
        }
        Err(err) => {
            app_state.metrics.increment_uploads_rejected();
            Err(err)
        }
    }
}

fn upload_response(summary: UploadSummary) -> HttpResponse {
    let message = format!("{} devices loaded successfully", summary.loaded);
    HttpResponse::Ok().json(ApiResponse::success_with_message(summary, message))
}

pub async fn upload_inventory(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    mut payload: Multipart,
) -> ApiResult<HttpResponse> {
    let category = parse_category(&path.into_inner())?;
    let ticket = app_state.write_calculator()?.begin_upload(category);

    let file = match read_file_field(&mut payload, app_state.config.security.max_upload_bytes).await {
        Ok(file) => file,
        Err(err) => {
            app_state.metrics.increment_uploads_rejected();
            return Err(err);
        }
    };

    let format = match TabularFormat::detect(
        file.filename.as_deref(),
        file.content_type.as_deref(),
        app_state.config.import.accept_xlsx,
    ) {
        Ok(format) => format,
        Err(err) => {
            app_state.metrics.increment_uploads_rejected();
            return Err(err);
        }
    };

    log::info!(
        "Parsing {} upload {:?} ({} bytes, {:?})",
        category,
        file.filename,
        file.bytes.len(),
        format
    );

    let bytes = file.bytes;
    let parsed = web::block(move || parse_tabular(format, &bytes))
        .await
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;

    let rows = match parsed {
        Ok(rows) => rows,
        Err(err) => {
            app_state.metrics.increment_uploads_rejected();
            return Err(err);
        }
    };

    let summary = commit_rows(&app_state, ticket, &rows)?;
    Ok(upload_response(summary))
}

pub async fn import_inventory_json(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    data: web::Json<Vec<serde_json::Map<String, serde_json::Value>>>,
) -> ApiResult<HttpResponse> {
    let category = parse_category(&path.into_inner())?;
    let rows = json_rows_to_raw(data.into_inner());
    let ticket = app_state.write_calculator()?.begin_upload(category);

    let summary = commit_rows(&app_state, ticket, &rows)?;
    Ok(upload_response(summary))
}

// ==================== TEMPLATES ====================

pub async fn download_template(path: web::Path<String>) -> ApiResult<HttpResponse> {
    let category = parse_category(&path.into_inner())?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", category.template_filename()),
        ))
        .body(template_csv(category)))
}

// ==================== EXPORT ====================

fn latest_calculation(app_state: &AppState) -> ApiResult<Calculation> {
    let calculation = app_state.read_calculator()?.require_latest().cloned();
    if calculation.is_err() {
        log::warn!("Export requested before any calculation");
    }
    calculation
}

fn attachment(content_type: &str, filename: String, body: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(("Content-Disposition", format!("attachment; filename=\"{}\"", filename)))
        .body(body)
}

pub async fn export_csv(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let calculation = latest_calculation(&app_state)?;
    let body = report::csv_report(&calculation)?;
    Ok(attachment(
        "text/csv; charset=utf-8",
        report::report_filename(&calculation, "csv"),
        body,
    ))
}

pub async fn export_html(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let calculation = latest_calculation(&app_state)?;
    let body = report::html_report(&calculation);
    Ok(attachment(
        "text/html; charset=utf-8",
        report::report_filename(&calculation, "html"),
        body.into_bytes(),
    ))
}

pub async fn export_text(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let calculation = latest_calculation(&app_state)?;
    let body = report::text_report(&calculation);
    Ok(attachment(
        "text/plain; charset=utf-8",
        report::report_filename(&calculation, "txt"),
        body.into_bytes(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const IT_CSV: &str = "device_brand,model,type_of_ne,maximum_power_usage_watts,nominal_power_usage_watts,count\n\
                          Dell,R750,Server,4500,3800,2\n\
                          \n\
                          Cisco,C9300,Switch,715,350,4\n";

    #[test]
    fn test_parse_csv_preserves_order_and_skips_blank_lines() {
        let rows = parse_csv(IT_CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["model"], "R750");
        assert_eq!(rows[0]["count"], "2");
        assert_eq!(rows[1]["device_brand"], "Cisco");
        assert_eq!(rows[1]["nominal_power_usage_watts"], "350");
    }

    #[test]
    fn test_parse_csv_strips_bom() {
        let data = "\u{feff}device_brand,model\nAPC,SRT\n";
        let rows = parse_csv(data.as_bytes()).unwrap();
        assert!(rows[0].contains_key("device_brand"));
    }

    #[test]
    fn test_parse_csv_ragged_row_is_parse_error() {
        let data = "device_brand,model,count\nDell,R750\n";
        assert!(matches!(parse_csv(data.as_bytes()), Err(ApiError::ParseError(_))));
    }

    #[test]
    fn test_parse_csv_header_only() {
        let rows = parse_csv(template_csv(DeviceCategory::It).as_bytes()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_parse_csv_quoted_fields() {
        let data = "device_brand,model\n\"Schneider, Electric\",\"Galaxy \"\"VX\"\"\"\n";
        let rows = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(rows[0]["device_brand"], "Schneider, Electric");
        assert_eq!(rows[0]["model"], "Galaxy \"VX\"");
    }

    #[test]
    fn test_parse_spreadsheet_rejects_garbage() {
        assert!(matches!(parse_spreadsheet(b"not a workbook"), Err(ApiError::ParseError(_))));
    }

    #[test]
    fn test_parse_spreadsheet_infrastructure_workbook() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, name) in DeviceCategory::Infrastructure.required_columns().iter().enumerate() {
            sheet.write_string(0, col as u16, *name).unwrap();
        }
        sheet.write_string(1, 0, "APC").unwrap();
        sheet.write_string(1, 1, "Galaxy VX").unwrap();
        sheet.write_string(1, 2, "UPS").unwrap();
        sheet.write_number(1, 3, 12000.0).unwrap();
        sheet.write_number(1, 4, 8500.5).unwrap();
        sheet.write_number(1, 5, 220.0).unwrap();
        sheet.write_number(1, 6, 8.0).unwrap();
        // row 2 left blank
        sheet.write_string(3, 0, "Vertiv").unwrap();
        sheet.write_string(3, 1, "Liebert").unwrap();
        sheet.write_string(3, 2, "CRAC").unwrap();
        sheet.write_number(3, 3, 5000.0).unwrap();
        sheet.write_number(3, 4, 3000.0).unwrap();
        sheet.write_number(3, 5, 410.0).unwrap();
        sheet.write_number(3, 6, 2.0).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let rows = parse_tabular(TabularFormat::Xlsx, &bytes).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["count"], "8");
        assert_eq!(rows[0]["nominal_power_usage_watts"], "8500.5");
        assert!(crate::validator::SchemaValidator::validate(&rows, DeviceCategory::Infrastructure));

        let inventory = crate::models::Inventory::from_raw(DeviceCategory::Infrastructure, &rows);
        let first = &inventory.records[0];
        assert_eq!(first.brand, "APC");
        assert_eq!(first.device_type_label, "UPS");
        assert_eq!(first.quantity, 8);
        assert_eq!(first.nominal_power_watts, 8500.5);
        assert_eq!(first.maximum_power_watts, 12000.0);
        assert_eq!(first.weight_kg, Some(220.0));
        assert_eq!(inventory.records[1].quantity, 2);
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            TabularFormat::detect(Some("it.csv"), Some("application/vnd.ms-excel"), true).unwrap(),
            TabularFormat::Csv
        );
        assert_eq!(
            TabularFormat::detect(Some("upload"), Some("text/csv; charset=utf-8"), true).unwrap(),
            TabularFormat::Csv
        );
        assert_eq!(
            TabularFormat::detect(Some("Infra.XLSX"), None, true).unwrap(),
            TabularFormat::Xlsx
        );
        assert!(matches!(
            TabularFormat::detect(Some("infra.xlsx"), None, false),
            Err(ApiError::FileTypeError(_))
        ));
        assert!(matches!(
            TabularFormat::detect(Some("notes.txt"), Some("text/plain"), true),
            Err(ApiError::FileTypeError(_))
        ));
        assert!(TabularFormat::detect(None, None, true).is_err());
    }

    #[test]
    fn test_json_rows_to_raw() {
        let rows: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(
            r#"[{"device_brand": "Dell", "nominal_power_usage_watts": 3800, "count": 2, "weight_kg": null}]"#,
        )
        .unwrap();
        let raw = json_rows_to_raw(rows);
        assert_eq!(raw[0]["device_brand"], "Dell");
        assert_eq!(raw[0]["nominal_power_usage_watts"], "3800");
        assert_eq!(raw[0]["count"], "2");
        assert_eq!(raw[0]["weight_kg"], "");
    }

    #[test]
    fn test_parse_category() {
        assert_eq!(parse_category("it").unwrap(), DeviceCategory::It);
        assert_eq!(parse_category("infra").unwrap(), DeviceCategory::Infrastructure);
        assert!(matches!(parse_category("power"), Err(ApiError::NotFound(_))));
    }
}
