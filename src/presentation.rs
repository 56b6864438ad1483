// src/presentation.rs - Display-ready views of an aggregation result
//!
//! Rounding to two decimals happens here and in the reports, never in the
//! aggregation result itself.

use serde::Serialize;
use strum::IntoEnumIterator;

use crate::models::{AggregationResult, CategoryTotals, DeviceCategory};

pub const TABLE_HEADERS: [&str; 9] = [
    "Category",
    "Brand",
    "Model",
    "Type",
    "Qty",
    "Unit Nominal (W)",
    "Unit Maximum (W)",
    "Total Nominal (kW)",
    "Total Maximum (kW)",
];

pub fn format_kw(value: f64) -> String {
    format!("{:.2} kW", value)
}

fn format_2dp(value: f64) -> String {
    format!("{:.2}", value)
}

// ==================== SUMMARY ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryView {
    pub it_nominal: String,
    pub it_maximum: String,
    pub infra_nominal: String,
    pub infra_maximum: String,
    pub total_nominal: String,
    pub total_maximum: String,
}

impl SummaryView {
    pub fn from_result(result: &AggregationResult) -> Self {
        Self {
            it_nominal: format_kw(result.it.nominal_kw),
            it_maximum: format_kw(result.it.maximum_kw),
            infra_nominal: format_kw(result.infrastructure.nominal_kw),
            infra_maximum: format_kw(result.infrastructure.maximum_kw),
            total_nominal: format_kw(result.total_nominal_kw),
            total_maximum: format_kw(result.total_maximum_kw),
        }
    }

    /// Label/value pairs in display order.
    pub fn lines(&self) -> [(&'static str, &str); 6] {
        [
            ("IT Equipment Nominal", self.it_nominal.as_str()),
            ("IT Equipment Maximum", self.it_maximum.as_str()),
            ("Infrastructure Nominal", self.infra_nominal.as_str()),
            ("Infrastructure Maximum", self.infra_maximum.as_str()),
            ("Total Nominal", self.total_nominal.as_str()),
            ("Total Maximum", self.total_maximum.as_str()),
        ]
    }
}

// ==================== BREAKDOWN TABLE ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub category: String,
    pub brand: String,
    pub model: String,
    pub type_label: String,
    pub quantity: String,
    pub unit_nominal_w: String,
    pub unit_maximum_w: String,
    pub total_nominal_kw: String,
    pub total_maximum_kw: String,
}

impl TableRow {
    pub fn cells(&self) -> [&str; 9] {
        [
            self.category.as_str(),
            self.brand.as_str(),
            self.model.as_str(),
            self.type_label.as_str(),
            self.quantity.as_str(),
            self.unit_nominal_w.as_str(),
            self.unit_maximum_w.as_str(),
            self.total_nominal_kw.as_str(),
            self.total_maximum_kw.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownTable {
    pub headers: [&'static str; 9],
    pub rows: Vec<TableRow>,
    pub totals: TableRow,
}

fn category_rows(totals: &CategoryTotals) -> impl Iterator<Item = TableRow> + '_ {
    totals.devices.iter().map(move |item| TableRow {
        category: totals.category.display_name().to_string(),
        brand: item.device.brand.clone(),
        model: item.device.model.clone(),
        type_label: item.device.device_type_label.clone(),
        quantity: item.device.quantity.to_string(),
        unit_nominal_w: item.device.nominal_power_watts.to_string(),
        unit_maximum_w: item.device.maximum_power_watts.to_string(),
        total_nominal_kw: format_2dp(item.total_nominal_kw),
        total_maximum_kw: format_2dp(item.total_maximum_kw),
    })
}

impl BreakdownTable {
    pub fn from_result(result: &AggregationResult) -> Self {
        let rows: Vec<TableRow> = result
            .categories()
            .into_iter()
            .flat_map(category_rows)
            .collect();

        let quantity: u64 = result
            .categories()
            .iter()
            .flat_map(|totals| totals.devices.iter())
            .map(|item| u64::from(item.device.quantity))
            .sum();

        let totals = TableRow {
            category: "Total".to_string(),
            brand: String::new(),
            model: String::new(),
            type_label: String::new(),
            quantity: quantity.to_string(),
            unit_nominal_w: String::new(),
            unit_maximum_w: String::new(),
            total_nominal_kw: format_2dp(result.total_nominal_kw),
            total_maximum_kw: format_2dp(result.total_maximum_kw),
        };

        Self {
            headers: TABLE_HEADERS,
            rows,
            totals,
        }
    }
}

// ==================== CHART ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub label: &'static str,
    pub values: Vec<f64>,
}

/// Bar chart: one group per category plus the total, one series each for
/// nominal and maximum kW.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
}

impl ChartData {
    pub fn from_result(result: &AggregationResult) -> Self {
        let mut labels: Vec<String> = DeviceCategory::iter()
            .map(|c| c.display_name().to_string())
            .collect();
        labels.push("Total".to_string());

        let mut nominal: Vec<f64> = DeviceCategory::iter()
            .map(|c| result.category(c).nominal_kw)
            .collect();
        nominal.push(result.total_nominal_kw);

        let mut maximum: Vec<f64> = DeviceCategory::iter()
            .map(|c| result.category(c).maximum_kw)
            .collect();
        maximum.push(result.total_maximum_kw);

        Self {
            labels,
            series: vec![
                ChartSeries { label: "Nominal Power (kW)", values: nominal },
                ChartSeries { label: "Maximum Power (kW)", values: maximum },
            ],
        }
    }

    pub fn max_value(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultsView {
    pub summary: SummaryView,
    pub table: BreakdownTable,
    pub chart: ChartData,
}

impl ResultsView {
    pub fn from_result(result: &AggregationResult) -> Self {
        Self {
            summary: SummaryView::from_result(result),
            table: BreakdownTable::from_result(result),
            chart: ChartData::from_result(result),
        }
    }
}
