// src/models.rs
//! Data model for the power calculator
//!
//! - Device categories and their column schemas
//! - Device records and inventories
//! - Aggregation results

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::coercion::{coerce_number, coerce_quantity};

/// One parsed row of an uploaded file, keyed by header name.
pub type RawRecord = HashMap<String, String>;

// ==================== COLUMN NAMES ====================

pub mod columns {
    pub const DEVICE_BRAND: &str = "device_brand";
    pub const MODEL: &str = "model";
    pub const TYPE_OF_NE: &str = "type_of_ne";
    pub const TYPE_OF_DEVICE: &str = "type_of_device";
    pub const MAXIMUM_POWER: &str = "maximum_power_usage_watts";
    pub const NOMINAL_POWER: &str = "nominal_power_usage_watts";
    pub const WEIGHT_KG: &str = "weight_kg";
    pub const COUNT: &str = "count";

    pub const IT: &[&str] = &[DEVICE_BRAND, MODEL, TYPE_OF_NE, MAXIMUM_POWER, NOMINAL_POWER, COUNT];

    pub const INFRASTRUCTURE: &[&str] = &[
        DEVICE_BRAND,
        MODEL,
        TYPE_OF_DEVICE,
        MAXIMUM_POWER,
        NOMINAL_POWER,
        WEIGHT_KG,
        COUNT,
    ];
}

// ==================== DEVICE CATEGORY ====================

/// Equipment category. Decides the schema and the type-label column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum DeviceCategory {
    #[strum(to_string = "it")]
    It,
    #[strum(to_string = "infrastructure", serialize = "infra")]
    #[serde(alias = "infra")]
    Infrastructure,
}

impl DeviceCategory {
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            DeviceCategory::It => columns::IT,
            DeviceCategory::Infrastructure => columns::INFRASTRUCTURE,
        }
    }

    /// Source column that feeds `DeviceRecord::device_type_label`.
    pub fn type_column(&self) -> &'static str {
        match self {
            DeviceCategory::It => columns::TYPE_OF_NE,
            DeviceCategory::Infrastructure => columns::TYPE_OF_DEVICE,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DeviceCategory::It => "IT Equipment",
            DeviceCategory::Infrastructure => "Infrastructure",
        }
    }

    pub fn template_header(&self) -> String {
        self.required_columns().join(",")
    }

    pub fn template_filename(&self) -> &'static str {
        match self {
            DeviceCategory::It => "it_devices_template.csv",
            DeviceCategory::Infrastructure => "infrastructure_devices_template.csv",
        }
    }
}

// ==================== DEVICE RECORD ====================

/// One inventory line item. Position in the inventory is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub brand: String,
    pub model: String,
    pub device_type_label: String,
    pub nominal_power_watts: f64,
    pub maximum_power_watts: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    pub quantity: u32,
}

impl DeviceRecord {
    /// Builds a record from a raw row, coercing every numeric field.
    pub fn from_raw(raw: &RawRecord, category: DeviceCategory) -> Self {
        let text = |key: &str| raw.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
        let number = |key: &str| raw.get(key).map(|v| coerce_number(v)).unwrap_or(0.0);

        let weight_kg = match category {
            DeviceCategory::It => None,
            DeviceCategory::Infrastructure => Some(number(columns::WEIGHT_KG)),
        };

        Self {
            brand: text(columns::DEVICE_BRAND),
            model: text(columns::MODEL),
            device_type_label: text(category.type_column()),
            nominal_power_watts: number(columns::NOMINAL_POWER),
            maximum_power_watts: number(columns::MAXIMUM_POWER),
            weight_kg,
            quantity: raw.get(columns::COUNT).map(|v| coerce_quantity(v)).unwrap_or(0),
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }
}

// ==================== INVENTORY ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inventory {
    pub category: DeviceCategory,
    pub records: Vec<DeviceRecord>,
}

impl Inventory {
    pub fn empty(category: DeviceCategory) -> Self {
        Self { category, records: Vec::new() }
    }

    pub fn from_raw(category: DeviceCategory, rows: &[RawRecord]) -> Self {
        Self {
            category,
            records: rows.iter().map(|row| DeviceRecord::from_raw(row, category)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ==================== AGGREGATION RESULT ====================

/// A record with quantity > 0, annotated with its kW totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributingRecord {
    /// Position in the source inventory.
    pub index: usize,
    #[serde(flatten)]
    pub device: DeviceRecord,
    pub total_nominal_kw: f64,
    pub total_maximum_kw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotals {
    pub category: DeviceCategory,
    pub devices: Vec<ContributingRecord>,
    pub nominal_kw: f64,
    pub maximum_kw: f64,
}

impl CategoryTotals {
    pub fn empty(category: DeviceCategory) -> Self {
        Self {
            category,
            devices: Vec::new(),
            nominal_kw: 0.0,
            maximum_kw: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    pub it: CategoryTotals,
    pub infrastructure: CategoryTotals,
    pub total_nominal_kw: f64,
    pub total_maximum_kw: f64,
}

impl AggregationResult {
    pub fn category(&self, category: DeviceCategory) -> &CategoryTotals {
        match category {
            DeviceCategory::It => &self.it,
            DeviceCategory::Infrastructure => &self.infrastructure,
        }
    }

    pub fn categories(&self) -> [&CategoryTotals; 2] {
        [&self.it, &self.infrastructure]
    }
}
