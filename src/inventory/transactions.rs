// src/inventory/transactions.rs
use chrono::Utc;
use uuid::Uuid;

use super::{Inventory, InventoryError};
use crate::auth::{check_inventory_permission, Actor, InventoryAction};
use crate::models::{Material, Pool, Transaction, TransactionFilter, TransactionType};

/// Builds a log entry for a mutation that has already been applied.
pub(super) fn entry(
    kind: TransactionType,
    material: &Material,
    quantity: i64,
    pool: Pool,
    actor: &Actor,
    project_id: Option<&str>,
    notes: String,
) -> Transaction {
    Transaction {
        id: Uuid::now_v7(),
        kind,
        material_id: material.id,
        material_name: material.name.clone(),
        quantity,
        material_type: pool,
        project_id: project_id.map(str::to_string),
        performed_by: actor.username.clone(),
        performed_by_name: actor.name.clone(),
        timestamp: Utc::now(),
        notes,
        negative_stock_override: false,
        shortfall: None,
    }
}

impl Inventory {
    pub fn append(&mut self, entry: Transaction) {
        self.transactions.push(entry);
    }

    /// Matching entries, newest first.
    pub fn transactions_for(
        &self,
        actor: &Actor,
        filter: &TransactionFilter,
    ) -> Result<Vec<&Transaction>, InventoryError> {
        check_inventory_permission(actor, InventoryAction::ViewTransactions)?;
        Ok(self
            .transactions
            .iter()
            .rev()
            .filter(|tx| filter.matches(tx))
            .collect())
    }
}
