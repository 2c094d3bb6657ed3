// src/inventory/ledger.rs
use serde::Serialize;
use std::collections::HashSet;

use super::transactions::entry;
use super::{Inventory, InventoryError};
use crate::auth::{check_inventory_permission, Actor, InventoryAction};
use crate::models::{
    AssignedMaterial, Deduction, Material, MaterialId, MaterialInput, MaterialLineRequest, Pool, TransactionType,
};

/// A requested deduction, already validated at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StockLine {
    pub material_id: MaterialId,
    pub quantity: u64,
    pub pool: Pool,
}

/// A requested credit; credits always land in the old pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreditLine {
    pub material_id: MaterialId,
    pub quantity: u64,
}

impl StockLine {
    /// Validates request lines; the pool defaults to `new`.
    pub fn from_requests(lines: &[MaterialLineRequest]) -> Result<Vec<StockLine>, InventoryError> {
        lines
            .iter()
            .map(|line| {
                Ok(StockLine {
                    material_id: line.id,
                    quantity: line.quantity.to_count(line.id)?,
                    pool: line.material_type.unwrap_or_default(),
                })
            })
            .collect()
    }
}

impl CreditLine {
    pub fn from_requests(lines: &[MaterialLineRequest]) -> Result<Vec<CreditLine>, InventoryError> {
        lines
            .iter()
            .map(|line| {
                Ok(CreditLine {
                    material_id: line.id,
                    quantity: line.quantity.to_count(line.id)?,
                })
            })
            .collect()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    /// Lines that changed stock, with the pool split actually used.
    pub applied: Vec<AssignedMaterial>,
    /// Post-mutation snapshot of every material touched.
    pub updated: Vec<Material>,
    /// Requested ids with no matching material; skipped.
    pub missing: Vec<MaterialId>,
}

impl Inventory {
    /// Removes `quantity` from `pool`, falling back to the other pool for the
    /// remainder. Callers without the override privilege are held to total
    /// available stock.
    pub fn deduct(
        &mut self,
        material_id: MaterialId,
        quantity: u64,
        pool: Pool,
        actor: &Actor,
        project_id: Option<&str>,
        notes: String,
    ) -> Result<Deduction, InventoryError> {
        let material = self
            .material_mut(material_id)
            .ok_or(InventoryError::MaterialNotFound(material_id))?;

        let available_in_pool = material.available_in(pool);
        let total_available = material.total_available();

        if !actor.role.can_assign_without_stock_check() && available_in_pool < quantity && total_available < quantity {
            return Err(InventoryError::InsufficientStock {
                material: material.name.clone(),
                pool,
                available_in_pool,
                total_available,
                required: quantity,
            });
        }

        let before = material.quantity;
        let deduction = material.take(quantity, pool);
        let snapshot = material.clone();

        log::info!(
            "Material {}: {} -> {} (assigned {} from {} pool by {})",
            snapshot.name, before, snapshot.quantity, quantity, pool, actor.username
        );
        if snapshot.is_low_stock() {
            log::warn!(
                "Material {} below reorder point: {} < {}",
                snapshot.name, snapshot.quantity, snapshot.min_threshold
            );
        }

        let mut tx = entry(
            TransactionType::Assignment,
            &snapshot,
            -(quantity as i64),
            pool,
            actor,
            project_id,
            notes,
        );
        if deduction.shortfall > 0 {
            log::warn!(
                "Stock override on {}: {} requested by {} ({}), {} not covered",
                snapshot.name, quantity, actor.username, actor.role, deduction.shortfall
            );
            tx.negative_stock_override = true;
            tx.shortfall = Some(deduction.shortfall);
        }
        self.append(tx);

        Ok(deduction)
    }

    /// Adds `quantity` to the old pool and records a `return` or
    /// `collection` entry.
    pub fn credit(
        &mut self,
        material_id: MaterialId,
        quantity: u64,
        kind: TransactionType,
        actor: &Actor,
        project_id: Option<&str>,
        notes: String,
    ) -> Result<Material, InventoryError> {
        let material = self
            .material_mut(material_id)
            .ok_or(InventoryError::MaterialNotFound(material_id))?;

        let before = material.quantity;
        material.put(quantity, Pool::Old)?;
        let snapshot = material.clone();

        log::info!(
            "Material {}: {} -> {} ({} {} into old pool by {})",
            snapshot.name, before, snapshot.quantity, kind, quantity, actor.username
        );

        self.append(entry(kind, &snapshot, quantity as i64, Pool::Old, actor, project_id, notes));
        Ok(snapshot)
    }

    /// Puts a previous job assignment back into the pools it was drawn from.
    /// A material that no longer exists is skipped.
    fn restore(&mut self, assigned: &AssignedMaterial, actor: &Actor, project_id: &str) -> Result<(), InventoryError> {
        let Some(material) = self.material_mut(assigned.id) else {
            log::warn!("Cannot restore material {} for project #{}: not in inventory", assigned.id, project_id);
            return Ok(());
        };

        let (to_new, to_old) = if assigned.taken_new + assigned.taken_old == 0 {
            // Recorded before pool splits were tracked.
            match assigned.material_type {
                Pool::New => (assigned.quantity, 0),
                Pool::Old => (0, assigned.quantity),
            }
        } else {
            (assigned.taken_new, assigned.taken_old)
        };

        if to_new == 0 && to_old == 0 {
            return Ok(());
        }

        material.put(to_new, Pool::New)?;
        material.put(to_old, Pool::Old)?;
        let snapshot = material.clone();

        for (qty, pool) in [(to_new, Pool::New), (to_old, Pool::Old)] {
            if qty > 0 {
                self.append(entry(
                    TransactionType::Return,
                    &snapshot,
                    qty as i64,
                    pool,
                    actor,
                    Some(project_id),
                    format!("Returned from project #{} (update)", project_id),
                ));
            }
        }
        Ok(())
    }

    /// Deducts every line for a job. All-or-nothing on stock sufficiency;
    /// unknown material ids are skipped and reported.
    pub fn assign_to_job(
        &mut self,
        project_id: &str,
        lines: &[StockLine],
        actor: &Actor,
    ) -> Result<BatchOutcome, InventoryError> {
        check_inventory_permission(actor, InventoryAction::Assign)?;

        let checkpoint = self.checkpoint();
        match self.apply_assignment(project_id, lines, actor, "") {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.rollback(checkpoint);
                Err(err)
            }
        }
    }

    /// Replaces a job's assignment: credit back `previous` to its original
    /// pools, then deduct `lines`. On failure the ledger is left exactly as
    /// it was before the call.
    pub fn reassign_for_job(
        &mut self,
        project_id: &str,
        previous: &[AssignedMaterial],
        lines: &[StockLine],
        actor: &Actor,
    ) -> Result<BatchOutcome, InventoryError> {
        check_inventory_permission(actor, InventoryAction::Assign)?;

        let checkpoint = self.checkpoint();
        let result = previous
            .iter()
            .try_for_each(|assigned| self.restore(assigned, actor, project_id))
            .and_then(|()| self.apply_assignment(project_id, lines, actor, " (update)"));

        match result {
            Ok(mut outcome) => {
                let mut touched: Vec<MaterialId> = previous.iter().map(|a| a.id).collect();
                touched.extend(outcome.applied.iter().map(|a| a.id));
                outcome.updated = self.snapshot_of(&touched);
                Ok(outcome)
            }
            Err(err) => {
                self.rollback(checkpoint);
                Err(err)
            }
        }
    }

    fn apply_assignment(
        &mut self,
        project_id: &str,
        lines: &[StockLine],
        actor: &Actor,
        note_suffix: &str,
    ) -> Result<BatchOutcome, InventoryError> {
        let mut outcome = BatchOutcome::default();
        let mut resolved = 0usize;

        for line in lines {
            let Some(name) = self.material(line.material_id).map(|m| m.name.clone()) else {
                log::warn!("Material with id {} not found in inventory", line.material_id);
                outcome.missing.push(line.material_id);
                continue;
            };
            resolved += 1;

            if line.quantity == 0 {
                continue;
            }

            let deduction = self.deduct(
                line.material_id,
                line.quantity,
                line.pool,
                actor,
                Some(project_id),
                format!("Assigned to project #{} ({}){}", project_id, line.pool, note_suffix),
            )?;

            outcome.applied.push(AssignedMaterial {
                id: line.material_id,
                name,
                quantity: line.quantity,
                material_type: line.pool,
                taken_new: deduction.from_new,
                taken_old: deduction.from_old,
            });
        }

        if resolved == 0 {
            if let Some(first) = outcome.missing.first() {
                return Err(InventoryError::MaterialNotFound(*first));
            }
        }

        let touched: Vec<MaterialId> = outcome.applied.iter().map(|a| a.id).collect();
        outcome.updated = self.snapshot_of(&touched);
        Ok(outcome)
    }

    /// Credits returned materials into the old pool. Restricted to stock
    /// owners; unknown ids are skipped and reported. A line that cannot be
    /// credited undoes the whole return.
    pub fn return_materials(
        &mut self,
        project_id: Option<&str>,
        lines: &[CreditLine],
        notes: Option<&str>,
        actor: &Actor,
    ) -> Result<BatchOutcome, InventoryError> {
        check_inventory_permission(actor, InventoryAction::Return)?;

        let checkpoint = self.checkpoint();
        match self.apply_return(project_id, lines, notes, actor) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.rollback(checkpoint);
                Err(err)
            }
        }
    }

    fn apply_return(
        &mut self,
        project_id: Option<&str>,
        lines: &[CreditLine],
        notes: Option<&str>,
        actor: &Actor,
    ) -> Result<BatchOutcome, InventoryError> {
        let mut outcome = BatchOutcome::default();
        let mut resolved = 0usize;
        let mut touched = Vec::new();

        for line in lines {
            if self.material(line.material_id).is_none() {
                outcome.missing.push(line.material_id);
                continue;
            }
            resolved += 1;
            if line.quantity == 0 {
                continue;
            }

            let note = match notes {
                Some(n) if !n.trim().is_empty() => n.to_string(),
                _ => format!(
                    "Returned from project #{} (added to old inventory)",
                    project_id.unwrap_or("N/A")
                ),
            };
            self.credit(line.material_id, line.quantity, TransactionType::Return, actor, project_id, note)?;
            touched.push(line.material_id);
        }

        if resolved == 0 {
            if let Some(first) = outcome.missing.first() {
                return Err(InventoryError::MaterialNotFound(*first));
            }
        }

        outcome.updated = self.snapshot_of(&touched);
        Ok(outcome)
    }

    /// Replaces the whole materials list. Pools are validated and the total
    /// is recomputed; no transaction is logged for a catalogue edit.
    pub fn replace_materials(&mut self, inputs: Vec<MaterialInput>, actor: &Actor) -> Result<&[Material], InventoryError> {
        check_inventory_permission(actor, InventoryAction::ReplaceMaterials)?;

        let mut seen = HashSet::new();
        let mut materials = Vec::with_capacity(inputs.len());

        for input in inputs {
            if !seen.insert(input.id) {
                return Err(InventoryError::InvalidMaterial(format!("duplicate material id {}", input.id)));
            }
            let name = input.name.trim();
            if name.is_empty() {
                return Err(InventoryError::InvalidMaterial(format!("material {} has no name", input.id)));
            }

            let count = |value: Option<i64>| -> Result<u64, InventoryError> {
                let v = value.unwrap_or(0);
                u64::try_from(v).map_err(|_| InventoryError::InvalidQuantity {
                    material_id: input.id,
                    value: v.to_string(),
                })
            };

            let mut material = Material::new(input.id, name, count(input.min_threshold)?);
            if input.quantity_new.is_none() && input.quantity_old.is_none() {
                material.quantity_new = count(input.quantity)?;
            } else {
                material.quantity_new = count(input.quantity_new)?;
                material.quantity_old = count(input.quantity_old)?;
            }
            material.sync_total();
            materials.push(material);
        }

        log::info!("Materials list replaced by {} ({} entries)", actor.username, materials.len());
        self.materials = materials;
        Ok(&self.materials)
    }
}
