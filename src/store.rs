// src/store.rs - The two accepted inventories and their upload generations
use serde::Serialize;

use crate::coercion::coerce_quantity;
use crate::error::{ApiError, ApiResult};
use crate::models::{DeviceCategory, Inventory};

/// Issued when an upload starts; committing it later succeeds only if no newer
/// upload for the same category was started in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadTicket {
    pub category: DeviceCategory,
    pub generation: u64,
}

#[derive(Debug)]
struct Slot {
    inventory: Inventory,
    issued: u64,
}

impl Slot {
    fn new(category: DeviceCategory) -> Self {
        Self {
            inventory: Inventory::empty(category),
            issued: 0,
        }
    }
}

#[derive(Debug)]
pub struct InventoryStore {
    it: Slot,
    infrastructure: Slot,
}

impl Default for InventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryStore {
    pub fn new() -> Self {
        Self {
            it: Slot::new(DeviceCategory::It),
            infrastructure: Slot::new(DeviceCategory::Infrastructure),
        }
    }

    fn slot(&self, category: DeviceCategory) -> &Slot {
        match category {
            DeviceCategory::It => &self.it,
            DeviceCategory::Infrastructure => &self.infrastructure,
        }
    }

    fn slot_mut(&mut self, category: DeviceCategory) -> &mut Slot {
        match category {
            DeviceCategory::It => &mut self.it,
            DeviceCategory::Infrastructure => &mut self.infrastructure,
        }
    }

    pub fn inventory(&self, category: DeviceCategory) -> &Inventory {
        &self.slot(category).inventory
    }

    /// Wholesale replacement of the category's inventory.
    pub fn replace(&mut self, category: DeviceCategory, inventory: Inventory) {
        debug_assert_eq!(inventory.category, category);
        self.slot_mut(category).inventory = inventory;
    }

    pub fn begin_upload(&mut self, category: DeviceCategory) -> UploadTicket {
        let slot = self.slot_mut(category);
        slot.issued += 1;
        UploadTicket {
            category,
            generation: slot.issued,
        }
    }

    pub fn is_current(&self, ticket: &UploadTicket) -> bool {
        self.slot(ticket.category).issued == ticket.generation
    }

    /// Replaces the inventory for `ticket.category` unless a newer upload began.
    pub fn commit_upload(&mut self, ticket: UploadTicket, inventory: Inventory) -> ApiResult<()> {
        if !self.is_current(&ticket) {
            return Err(ApiError::StaleUpload(ticket.category));
        }
        self.replace(ticket.category, inventory);
        Ok(())
    }

    /// Stores the coerced quantity and returns it.
    pub fn set_quantity(&mut self, category: DeviceCategory, index: usize, raw_value: &str) -> ApiResult<u32> {
        let inventory = &mut self.slot_mut(category).inventory;
        let len = inventory.records.len();
        let record = inventory
            .records
            .get_mut(index)
            .ok_or(ApiError::IndexError { category, index, len })?;

        record.quantity = coerce_quantity(raw_value);
        Ok(record.quantity)
    }

    pub fn both_loaded(&self) -> bool {
        !self.it.inventory.is_empty() && !self.infrastructure.inventory.is_empty()
    }
}
