use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

use crate::models::DeviceCategory;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(String),
    /// Uploaded file is not a tabular format we can read.
    FileTypeError(String),
    /// The parser reported a structural problem in the file.
    ParseError(String),
    /// Parsed fine, but the columns don't match the category schema.
    SchemaValidationError(String),
    /// Quantity edit addressed a record that does not exist.
    IndexError { category: DeviceCategory, index: usize, len: usize },
    /// Export requested before any calculation ran.
    ExportPreconditionError(String),
    /// A newer upload for the same slot was started while this one was in flight.
    StaleUpload(DeviceCategory),
    ValidationError(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::FileTypeError(msg) => write!(f, "{}", msg),
            ApiError::ParseError(msg) => write!(f, "Error parsing CSV: {}", msg),
            ApiError::SchemaValidationError(msg) => {
                write!(f, "Invalid CSV format. Please check the template. {}", msg)
            }
            ApiError::IndexError { category, index, len } => write!(
                f,
                "No {} device at position {} (inventory has {} devices)",
                category.display_name(),
                index,
                len
            ),
            ApiError::ExportPreconditionError(msg) => write!(f, "{}", msg),
            ApiError::StaleUpload(category) => write!(
                f,
                "A newer {} upload superseded this one",
                category.display_name()
            ),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        match self {
            ApiError::BadRequest(_) => HttpResponse::BadRequest().json(error_response),
            ApiError::NotFound(_) => HttpResponse::NotFound().json(error_response),
            ApiError::InternalServerError(_) => HttpResponse::InternalServerError().json(error_response),
            ApiError::FileTypeError(_) => HttpResponse::UnsupportedMediaType().json(error_response),
            ApiError::ParseError(_) => HttpResponse::BadRequest().json(error_response),
            ApiError::SchemaValidationError(_) => HttpResponse::UnprocessableEntity().json(error_response),
            ApiError::IndexError { .. } => HttpResponse::NotFound().json(error_response),
            ApiError::ExportPreconditionError(_) => HttpResponse::Conflict().json(error_response),
            ApiError::StaleUpload(_) => HttpResponse::Conflict().json(error_response),
            ApiError::ValidationError(_) => HttpResponse::UnprocessableEntity().json(error_response),
        }
    }
}

impl From<csv::Error> for ApiError {
    fn from(err: csv::Error) -> Self {
        ApiError::ParseError(err.to_string())
    }
}

impl From<calamine::Error> for ApiError {
    fn from(err: calamine::Error) -> Self {
        ApiError::ParseError(err.to_string())
    }
}

impl From<actix_multipart::MultipartError> for ApiError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        ApiError::BadRequest(format!("Multipart error: {}", err))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::InternalServerError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl ApiError {
    pub fn bad_request(msg: &str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }

    pub fn unknown_category(raw: &str) -> Self {
        ApiError::NotFound(format!("Unknown device category '{}'", raw))
    }

    pub fn not_csv() -> Self {
        ApiError::FileTypeError("Please select a CSV file".to_string())
    }

    pub fn no_results() -> Self {
        ApiError::ExportPreconditionError(
            "Please calculate power consumption first".to_string(),
        )
    }

    pub fn inventories_missing() -> Self {
        ApiError::BadRequest(
            "Both IT and infrastructure inventories must be loaded first".to_string(),
        )
    }
}
