// src/aggregation.rs - Nominal/maximum power totals
use crate::models::{AggregationResult, CategoryTotals, ContributingRecord, Inventory};

const WATTS_PER_KILOWATT: f64 = 1000.0;

/// Sums one inventory. Records with quantity 0 are skipped entirely.
pub fn aggregate_category(inventory: &Inventory) -> CategoryTotals {
    let mut totals = CategoryTotals::empty(inventory.category);

    for (index, device) in inventory.records.iter().enumerate() {
        if device.quantity == 0 {
            continue;
        }

        let quantity = f64::from(device.quantity);
        let total_nominal_kw = device.nominal_power_watts * quantity / WATTS_PER_KILOWATT;
        let total_maximum_kw = device.maximum_power_watts * quantity / WATTS_PER_KILOWATT;

        totals.nominal_kw += total_nominal_kw;
        totals.maximum_kw += total_maximum_kw;
        totals.devices.push(ContributingRecord {
            index,
            device: device.clone(),
            total_nominal_kw,
            total_maximum_kw,
        });
    }

    totals
}

/// Computes per-record, per-category and grand totals. Unrounded.
pub fn aggregate(it: &Inventory, infrastructure: &Inventory) -> AggregationResult {
    let it = aggregate_category(it);
    let infrastructure = aggregate_category(infrastructure);

    AggregationResult {
        total_nominal_kw: it.nominal_kw + infrastructure.nominal_kw,
        total_maximum_kw: it.maximum_kw + infrastructure.maximum_kw,
        it,
        infrastructure,
    }
}
