// src/models/material.rs
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use validator::Validate;

use super::QuantityInput;
use crate::inventory::InventoryError;

pub type MaterialId = u32;

// ==================== POOL ====================

/// Which sub-count of a material a mutation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Pool {
    /// Freshly purchased stock
    #[default]
    New,
    /// Returned or reclaimed stock
    Old,
}

impl Pool {
    pub fn other(self) -> Pool {
        match self {
            Pool::New => Pool::Old,
            Pool::Old => Pool::New,
        }
    }
}

// ==================== MATERIAL ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    #[serde(default)]
    pub quantity_new: u64,
    #[serde(default)]
    pub quantity_old: u64,
    /// Always `quantity_new + quantity_old`; recomputed after every mutation.
    #[serde(default)]
    pub quantity: u64,
    #[serde(default)]
    pub min_threshold: u64,
}

/// How a deduction was actually satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deduction {
    pub from_new: u64,
    pub from_old: u64,
    /// Units requested but not covered by either pool (privileged overdraw).
    pub shortfall: u64,
}

impl Material {
    pub fn new(id: MaterialId, name: &str, min_threshold: u64) -> Self {
        Self {
            id,
            name: name.to_string(),
            quantity_new: 0,
            quantity_old: 0,
            quantity: 0,
            min_threshold,
        }
    }

    pub fn available_in(&self, pool: Pool) -> u64 {
        match pool {
            Pool::New => self.quantity_new,
            Pool::Old => self.quantity_old,
        }
    }

    /// Saturates for hand-edited documents; [`Material::put`] keeps the sum
    /// in range for everything written through the ledger.
    pub fn total_available(&self) -> u64 {
        self.quantity_new.saturating_add(self.quantity_old)
    }

    pub fn sync_total(&mut self) {
        self.quantity = self.total_available();
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity < self.min_threshold
    }

    fn pool_mut(&mut self, pool: Pool) -> &mut u64 {
        match pool {
            Pool::New => &mut self.quantity_new,
            Pool::Old => &mut self.quantity_old,
        }
    }

    /// Takes `quantity` from `pool`, spilling the remainder into the other
    /// pool. Neither pool goes below zero; anything left over is reported as
    /// shortfall.
    pub fn take(&mut self, quantity: u64, pool: Pool) -> Deduction {
        let primary = self.available_in(pool);
        let from_primary = primary.min(quantity);
        *self.pool_mut(pool) = primary - from_primary;

        let remaining = quantity - from_primary;
        let secondary = self.available_in(pool.other());
        let from_secondary = secondary.min(remaining);
        *self.pool_mut(pool.other()) = secondary - from_secondary;

        self.sync_total();

        let (from_new, from_old) = match pool {
            Pool::New => (from_primary, from_secondary),
            Pool::Old => (from_secondary, from_primary),
        };

        Deduction {
            from_new,
            from_old,
            shortfall: remaining - from_secondary,
        }
    }

    /// Adds `quantity` to `pool`. Fails without touching the material when
    /// the pool or the total would overflow.
    pub fn put(&mut self, quantity: u64, pool: Pool) -> Result<(), InventoryError> {
        let updated = self
            .available_in(pool)
            .checked_add(quantity)
            .filter(|_| self.total_available().checked_add(quantity).is_some())
            .ok_or_else(|| InventoryError::StockOverflow {
                material: self.name.clone(),
                pool,
                adding: quantity,
            })?;

        *self.pool_mut(pool) = updated;
        self.sync_total();
        Ok(())
    }

    /// Brings a record written by an older schema in line with the pool model.
    pub fn migrate_legacy(&mut self) {
        if self.quantity_new == 0 && self.quantity_old == 0 && self.quantity > 0 {
            self.quantity_new = self.quantity;
        }
        self.sync_total();
    }
}

/// Catalog used to seed a fresh data file.
pub fn default_catalog() -> Vec<Material> {
    vec![
        Material::new(1, "Medium Box", 10),
        Material::new(2, "Large Box", 10),
        Material::new(3, "Tapes", 20),
        Material::new(4, "Cling wrap", 15),
        Material::new(5, "Blanket", 5),
        Material::new(6, "Hanger Box", 10),
        Material::new(7, "Packing paper", 10),
        Material::new(8, "Bubble wrap", 10),
    ]
}

// ==================== REQUESTS ====================

/// One entry of a full materials-list replacement.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MaterialInput {
    pub id: MaterialId,
    #[validate(length(min = 1, max = 100, message = "Material name must be between 1 and 100 characters"))]
    pub name: String,
    #[serde(default)]
    pub quantity_new: Option<i64>,
    #[serde(default)]
    pub quantity_old: Option<i64>,
    /// Legacy single count, used only when neither pool is given.
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Minimum threshold must be non-negative"))]
    pub min_threshold: Option<i64>,
}

/// A line of an assignment or return request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialLineRequest {
    pub id: MaterialId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quantity: QuantityInput,
    #[serde(default, alias = "pool")]
    pub material_type: Option<Pool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stocked(new: u64, old: u64) -> Material {
        let mut m = Material::new(1, "Medium Box", 10);
        m.quantity_new = new;
        m.quantity_old = old;
        m.sync_total();
        m
    }

    #[test]
    fn test_take_within_pool() {
        let mut m = stocked(10, 5);
        let d = m.take(4, Pool::New);
        assert_eq!((m.quantity_new, m.quantity_old, m.quantity), (6, 5, 11));
        assert_eq!(d, Deduction { from_new: 4, from_old: 0, shortfall: 0 });
    }

    #[test]
    fn test_take_spills_into_other_pool() {
        let mut m = stocked(10, 5);
        let d = m.take(12, Pool::New);
        assert_eq!((m.quantity_new, m.quantity_old, m.quantity), (0, 3, 3));
        assert_eq!(d, Deduction { from_new: 10, from_old: 2, shortfall: 0 });
    }

    #[test]
    fn test_take_from_old_first() {
        let mut m = stocked(10, 5);
        let d = m.take(7, Pool::Old);
        assert_eq!((m.quantity_new, m.quantity_old), (8, 0));
        assert_eq!(d.from_old, 5);
        assert_eq!(d.from_new, 2);
    }

    #[test]
    fn test_take_never_goes_negative() {
        let mut m = stocked(2, 1);
        let d = m.take(10, Pool::Old);
        assert_eq!((m.quantity_new, m.quantity_old, m.quantity), (0, 0, 0));
        assert_eq!(d.shortfall, 7);
    }

    #[test]
    fn test_put_keeps_total_in_sync() {
        let mut m = stocked(1, 1);
        m.put(4, Pool::Old).unwrap();
        assert_eq!(m.quantity_old, 5);
        assert_eq!(m.quantity, m.quantity_new + m.quantity_old);
    }

    #[test]
    fn test_put_rejects_overflow_and_leaves_material_unchanged() {
        let mut m = stocked(10, u64::MAX - 20);
        let before = m.clone();

        let err = m.put(15, Pool::New).unwrap_err();
        assert!(matches!(err, InventoryError::StockOverflow { pool: Pool::New, adding: 15, .. }));
        assert_eq!(m, before);
        assert!(m.put(u64::MAX, Pool::Old).is_err());

        m.put(10, Pool::New).unwrap();
        assert_eq!(m.quantity, u64::MAX);
    }

    #[test]
    fn test_migrate_legacy_quantity_becomes_new_stock() {
        let mut m: Material = serde_json::from_str(r#"{"id": 3, "name": "Tapes", "quantity": 9}"#).unwrap();
        m.migrate_legacy();
        assert_eq!((m.quantity_new, m.quantity_old, m.quantity), (9, 0, 9));
    }

    #[test]
    fn test_pool_serde_and_strum_names() {
        assert_eq!(serde_json::to_string(&Pool::Old).unwrap(), "\"old\"");
        assert_eq!(Pool::New.as_ref(), "new");
        assert_eq!("old".parse::<Pool>().unwrap(), Pool::Old);
        assert_eq!(Pool::New.other(), Pool::Old);
    }
}
