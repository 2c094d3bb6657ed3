// src/inventory/mod.rs
//! Packing-material stock: the two-pool ledger, its append-only transaction
//! log and the post-job collection workflow.
//!
//! Every operation here mutates an in-memory [`Inventory`]. Callers run them
//! inside [`crate::store::StoreHandle::transact`], which persists the state
//! only when the operation succeeds.

mod collections;
mod error;
mod ledger;
mod transactions;

pub use error::InventoryError;
pub use ledger::{CreditLine, StockLine};

use serde::{Deserialize, Serialize};

use crate::models::{default_catalog, Material, MaterialId, PendingCollection, Transaction};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub pending_collections: Vec<PendingCollection>,
}

/// Ledger state captured before a batch so a failed batch leaves no trace.
struct Checkpoint {
    materials: Vec<Material>,
    transactions_len: usize,
}

impl Inventory {
    pub fn seeded() -> Self {
        Self {
            materials: default_catalog(),
            ..Self::default()
        }
    }

    pub fn migrate_legacy(&mut self) {
        for material in &mut self.materials {
            material.migrate_legacy();
        }
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.iter().find(|m| m.id == id)
    }

    fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.iter_mut().find(|m| m.id == id)
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            materials: self.materials.clone(),
            transactions_len: self.transactions.len(),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.materials = checkpoint.materials;
        self.transactions.truncate(checkpoint.transactions_len);
    }

    pub fn low_stock(&self) -> Vec<&Material> {
        self.materials.iter().filter(|m| m.is_low_stock()).collect()
    }

    fn snapshot_of(&self, ids: &[MaterialId]) -> Vec<Material> {
        let mut seen: Vec<MaterialId> = Vec::new();
        let mut out = Vec::new();
        for id in ids {
            if seen.contains(id) {
                continue;
            }
            seen.push(*id);
            if let Some(m) = self.material(*id) {
                out.push(m.clone());
            }
        }
        out
    }
}
