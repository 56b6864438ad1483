// src/validator.rs - Schema validation for uploaded inventories
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{DeviceCategory, RawRecord};

// ==================== VALIDATION RESULT ====================

#[derive(Debug, Default, Serialize)]
pub struct ValidationResult {
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        for (field, errors) in other.errors {
            self.errors.entry(field).or_default().extend(errors);
        }
    }

    pub fn to_api_error(&self) -> ApiError {
        let message = self.errors
            .iter()
            .map(|(field, errors)| format!("{}: {}", field, errors.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");

        ApiError::SchemaValidationError(message)
    }
}

// ==================== SCHEMA VALIDATION ====================

/// How much of an upload the column check looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaMode {
    /// Only the first row's keys are checked.
    #[default]
    FirstRow,
    /// Every row must carry every required key.
    Strict,
}

pub struct SchemaValidator;

impl SchemaValidator {
    /// Accepts `records` iff it is non-empty and its first row carries every
    /// column required for `category`.
    pub fn validate(records: &[RawRecord], category: DeviceCategory) -> bool {
        Self::check(records, category, SchemaMode::FirstRow).is_valid()
    }

    /// Same rule as [`SchemaValidator::validate`], reporting what is missing.
    pub fn check(records: &[RawRecord], category: DeviceCategory, mode: SchemaMode) -> ValidationResult {
        let mut result = ValidationResult::new();

        let Some(first) = records.first() else {
            result.add_error("file", "No devices found in file");
            return result;
        };

        for column in missing_columns(first, category) {
            result.add_error("columns", format!("missing '{}'", column));
        }

        if mode == SchemaMode::Strict {
            for (idx, row) in records.iter().enumerate().skip(1) {
                let missing = missing_columns(row, category);
                if !missing.is_empty() {
                    // header row is line 1, first data row is line 2
                    result.add_error(
                        format!("row {}", idx + 2),
                        format!("missing {}", missing.join(", ")),
                    );
                }
            }
        }

        result
    }

    pub fn check_row_limit(records: &[RawRecord], max_rows: usize) -> ValidationResult {
        let mut result = ValidationResult::new();
        if records.len() > max_rows {
            result.add_error(
                "file",
                format!("{} devices exceed the limit of {}", records.len(), max_rows),
            );
        }
        result
    }
}

fn missing_columns(row: &RawRecord, category: DeviceCategory) -> Vec<&'static str> {
    category
        .required_columns()
        .iter()
        .copied()
        .filter(|column| !row.contains_key(*column))
        .collect()
}
