// src/calculator.rs - Application state: inventories plus the latest result
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::aggregation::aggregate;
use crate::config::ImportConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{AggregationResult, DeviceCategory, Inventory, RawRecord};
use crate::store::{InventoryStore, UploadTicket};
use crate::validator::{SchemaMode, SchemaValidator};

/// A computed result together with when it was produced.
#[derive(Debug, Clone, Serialize)]
pub struct Calculation {
    pub id: Uuid,
    pub computed_at: DateTime<Utc>,
    pub result: AggregationResult,
}

#[derive(Debug, Serialize)]
pub struct UploadSummary {
    pub category: DeviceCategory,
    pub loaded: usize,
    pub both_loaded: bool,
    pub recalculated: bool,
}

#[derive(Debug, Serialize)]
pub struct CalculatorStatus {
    pub it_devices: usize,
    pub infrastructure_devices: usize,
    pub both_loaded: bool,
    pub has_result: bool,
    pub computed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct Calculator {
    store: InventoryStore,
    latest: Option<Calculation>,
    schema_mode: SchemaMode,
    max_rows: usize,
}

impl Calculator {
    pub fn new(import: &ImportConfig) -> Self {
        Self {
            store: InventoryStore::new(),
            latest: None,
            schema_mode: if import.strict_schema { SchemaMode::Strict } else { SchemaMode::FirstRow },
            max_rows: import.max_rows,
        }
    }

    pub fn store(&self) -> &InventoryStore {
        &self.store
    }

    pub fn inventory(&self, category: DeviceCategory) -> &Inventory {
        self.store.inventory(category)
    }

    pub fn begin_upload(&mut self, category: DeviceCategory) -> UploadTicket {
        self.store.begin_upload(category)
    }

    /// Validates parsed rows and, if they pass, replaces the ticket's inventory.
    /// On any failure the store keeps its previous contents.
    pub fn accept_upload(&mut self, ticket: UploadTicket, rows: &[RawRecord]) -> ApiResult<UploadSummary> {
        let category = ticket.category;

        let mut validation = SchemaValidator::check(rows, category, self.schema_mode);
        validation.merge(SchemaValidator::check_row_limit(rows, self.max_rows));
        if !validation.is_valid() {
            log::warn!("Rejected {} upload: {:?}", category, validation.errors);
            return Err(validation.to_api_error());
        }

        let inventory = Inventory::from_raw(category, rows);
        let loaded = inventory.len();
        self.store.commit_upload(ticket, inventory)?;
        log::info!("Loaded {} {} devices", loaded, category);

        let recalculated = self.refresh();

        Ok(UploadSummary {
            category,
            loaded,
            both_loaded: self.store.both_loaded(),
            recalculated,
        })
    }

    /// Stores a coerced quantity edit and recalculates when possible.
    pub fn set_quantity(&mut self, category: DeviceCategory, index: usize, raw_value: &str) -> ApiResult<u32> {
        let stored = self.store.set_quantity(category, index, raw_value)?;
        if stored.to_string() != raw_value.trim() {
            let device = self
                .store
                .inventory(category)
                .records
                .get(index)
                .map(|record| record.display_name())
                .unwrap_or_default();
            log::debug!("Quantity '{}' for {} {}[{}] coerced to {}", raw_value, device, category, index, stored);
        }
        self.refresh();
        Ok(stored)
    }

    pub fn calculate(&mut self) -> ApiResult<&Calculation> {
        if !self.store.both_loaded() {
            return Err(ApiError::inventories_missing());
        }
        self.refresh();
        self.require_latest()
    }

    pub fn latest(&self) -> Option<&Calculation> {
        self.latest.as_ref()
    }

    /// The latest result, or the error shown when exporting too early.
    pub fn require_latest(&self) -> ApiResult<&Calculation> {
        self.latest.as_ref().ok_or_else(ApiError::no_results)
    }

    pub fn status(&self) -> CalculatorStatus {
        CalculatorStatus {
            it_devices: self.store.inventory(DeviceCategory::It).len(),
            infrastructure_devices: self.store.inventory(DeviceCategory::Infrastructure).len(),
            both_loaded: self.store.both_loaded(),
            has_result: self.latest.is_some(),
            computed_at: self.latest.as_ref().map(|c| c.computed_at),
        }
    }

    fn refresh(&mut self) -> bool {
        if !self.store.both_loaded() {
            return false;
        }

        let result = aggregate(
            self.store.inventory(DeviceCategory::It),
            self.store.inventory(DeviceCategory::Infrastructure),
        );
        tracing::debug!(
            total_nominal_kw = result.total_nominal_kw,
            total_maximum_kw = result.total_maximum_kw,
            "power recalculated"
        );

        self.latest = Some(Calculation {
            id: Uuid::new_v4(),
            computed_at: Utc::now(),
            result,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRecord {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn it_row(nominal: &str, maximum: &str, count: &str) -> RawRecord {
        row(&[
            ("device_brand", "Cisco"),
            ("model", "Nexus 9336C"),
            ("type_of_ne", "Switch"),
            ("maximum_power_usage_watts", maximum),
            ("nominal_power_usage_watts", nominal),
            ("count", count),
        ])
    }

    fn infra_row(nominal: &str, maximum: &str, weight: &str, count: &str) -> RawRecord {
        row(&[
            ("device_brand", "Vertiv"),
            ("model", "Liebert APM"),
            ("type_of_device", "UPS"),
            ("maximum_power_usage_watts", maximum),
            ("nominal_power_usage_watts", nominal),
            ("weight_kg", weight),
            ("count", count),
        ])
    }

    fn calculator() -> Calculator {
        Calculator::new(&ImportConfig::default())
    }

    fn upload(calc: &mut Calculator, category: DeviceCategory, rows: &[RawRecord]) -> ApiResult<UploadSummary> {
        let ticket = calc.begin_upload(category);
        calc.accept_upload(ticket, rows)
    }

    #[test]
    fn test_dual_upload_triggers_calculation() {
        let mut calc = calculator();

        let summary = upload(&mut calc, DeviceCategory::It, &[it_row("3800", "4500", "2")]).unwrap();
        assert_eq!(summary.loaded, 1);
        assert!(!summary.both_loaded);
        assert!(!summary.recalculated);
        assert!(calc.latest().is_none());

        let summary = upload(
            &mut calc,
            DeviceCategory::Infrastructure,
            &[infra_row("8500", "12000", "220", "8")],
        )
        .unwrap();
        assert!(summary.both_loaded);
        assert!(summary.recalculated);

        let latest = calc.latest().unwrap();
        assert_eq!(format!("{:.2}", latest.result.total_nominal_kw), "75.60");
        assert_eq!(format!("{:.2}", latest.result.total_maximum_kw), "105.00");
    }

    #[test]
    fn test_invalid_upload_keeps_previous_inventory() {
        let mut calc = calculator();
        upload(&mut calc, DeviceCategory::It, &[it_row("100", "200", "1"), it_row("1", "2", "3")]).unwrap();

        let mut bad = it_row("100", "200", "1");
        bad.remove("count");
        let err = upload(&mut calc, DeviceCategory::It, &[bad]).unwrap_err();
        assert!(matches!(err, ApiError::SchemaValidationError(_)));

        let err = upload(&mut calc, DeviceCategory::It, &[]).unwrap_err();
        assert!(matches!(err, ApiError::SchemaValidationError(_)));

        assert_eq!(calc.inventory(DeviceCategory::It).len(), 2);
    }

    #[test]
    fn test_row_limit_rejects_upload() {
        let mut calc = Calculator::new(&ImportConfig {
            max_rows: 1,
            ..ImportConfig::default()
        });
        let err = upload(&mut calc, DeviceCategory::It, &[it_row("1", "1", "1"), it_row("1", "1", "1")])
            .unwrap_err();
        assert!(matches!(err, ApiError::SchemaValidationError(_)));
        assert!(calc.inventory(DeviceCategory::It).is_empty());
    }

    #[test]
    fn test_strict_schema_mode() {
        let mut partial = it_row("1", "1", "1");
        partial.remove("type_of_ne");
        let rows = vec![it_row("1", "1", "1"), partial];

        let mut lenient = calculator();
        assert!(upload(&mut lenient, DeviceCategory::It, &rows).is_ok());
        assert_eq!(lenient.inventory(DeviceCategory::It).records[1].device_type_label, "");

        let mut strict = Calculator::new(&ImportConfig {
            strict_schema: true,
            ..ImportConfig::default()
        });
        assert!(upload(&mut strict, DeviceCategory::It, &rows).is_err());
    }

    #[test]
    fn test_quantity_edit_recalculates() {
        let mut calc = calculator();
        upload(&mut calc, DeviceCategory::It, &[it_row("3800", "4500", "2")]).unwrap();
        upload(&mut calc, DeviceCategory::Infrastructure, &[infra_row("8500", "12000", "220", "8")]).unwrap();

        assert_eq!(calc.set_quantity(DeviceCategory::Infrastructure, 0, "0").unwrap(), 0);
        let result = &calc.latest().unwrap().result;
        assert!(result.infrastructure.devices.is_empty());
        assert_eq!(result.infrastructure.nominal_kw, 0.0);
        assert_eq!(format!("{:.2}", result.total_nominal_kw), "7.60");

        assert_eq!(calc.set_quantity(DeviceCategory::It, 0, "abc").unwrap(), 0);
        assert_eq!(calc.latest().unwrap().result.total_nominal_kw, 0.0);
    }

    #[test]
    fn test_quantity_edit_out_of_range() {
        let mut calc = calculator();
        upload(&mut calc, DeviceCategory::It, &[it_row("1", "1", "1")]).unwrap();
        let err = calc.set_quantity(DeviceCategory::It, 5, "2").unwrap_err();
        assert!(matches!(err, ApiError::IndexError { index: 5, len: 1, .. }));
    }

    #[test]
    fn test_export_precondition() {
        let mut calc = calculator();
        assert!(matches!(calc.require_latest(), Err(ApiError::ExportPreconditionError(_))));
        assert!(matches!(calc.calculate(), Err(ApiError::BadRequest(_))));

        upload(&mut calc, DeviceCategory::It, &[it_row("1", "1", "1")]).unwrap();
        upload(&mut calc, DeviceCategory::Infrastructure, &[infra_row("1", "1", "1", "1")]).unwrap();
        assert!(calc.calculate().is_ok());
        assert!(calc.require_latest().is_ok());
    }

    #[test]
    fn test_stale_upload_does_not_overwrite() {
        let mut calc = calculator();
        let older = calc.begin_upload(DeviceCategory::It);
        let newer = calc.begin_upload(DeviceCategory::It);

        calc.accept_upload(newer, &[it_row("1", "1", "1"), it_row("2", "2", "2")]).unwrap();
        let err = calc.accept_upload(older, &[it_row("9", "9", "9")]).unwrap_err();
        assert!(matches!(err, ApiError::StaleUpload(DeviceCategory::It)));
        assert_eq!(calc.inventory(DeviceCategory::It).len(), 2);
    }

    #[test]
    fn test_status() {
        let mut calc = calculator();
        upload(&mut calc, DeviceCategory::It, &[it_row("1", "1", "1")]).unwrap();
        let status = calc.status();
        assert_eq!(status.it_devices, 1);
        assert_eq!(status.infrastructure_devices, 0);
        assert!(!status.both_loaded);
        assert!(!status.has_result);
        assert!(status.computed_at.is_none());
    }
}
