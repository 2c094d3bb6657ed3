// src/inventory/collections.rs
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::{Inventory, InventoryError};
use crate::auth::{check_inventory_permission, Actor, InventoryAction};
use crate::models::{
    CollectionLine, CollectionStatus, Job, Material, MaterialId, PendingCollection, TransactionType,
};

#[derive(Debug, Serialize)]
pub struct ReceiveOutcome {
    pub collection: PendingCollection,
    pub updated: Vec<Material>,
    pub missing: Vec<MaterialId>,
}

impl Inventory {
    /// Opens a collection for a completed job. An explicit non-empty list is
    /// used as given; otherwise the job's assigned materials are used. Returns
    /// `None` when there is nothing to collect.
    pub fn create_from_job_completion(
        &mut self,
        job: &Job,
        explicit: Option<Vec<CollectionLine>>,
        created_by: &str,
    ) -> Option<PendingCollection> {
        let materials = match explicit {
            Some(lines) if !lines.is_empty() => lines,
            _ => job
                .packing_materials
                .iter()
                .map(|m| CollectionLine {
                    id: m.id,
                    name: m.name.clone(),
                    quantity: m.quantity,
                })
                .collect(),
        };

        if materials.is_empty() {
            return None;
        }

        let collection = PendingCollection {
            id: Uuid::now_v7(),
            project_id: job.id.clone(),
            project_name: job.display_name(),
            materials,
            status: CollectionStatus::Pending,
            created_at: Utc::now(),
            created_by: created_by.to_string(),
            received_by: None,
            received_by_name: None,
            received_at: None,
        };

        log::info!(
            "Pending collection {} opened for project #{} ({} lines)",
            collection.id,
            collection.project_id,
            collection.materials.len()
        );
        self.pending_collections.push(collection.clone());
        Some(collection)
    }

    /// Collections visible to stock owners, newest first.
    pub fn pending_collections_for(
        &self,
        actor: &Actor,
        status: Option<CollectionStatus>,
    ) -> Result<Vec<&PendingCollection>, InventoryError> {
        check_inventory_permission(actor, InventoryAction::ViewPendingCollections)?;
        Ok(self
            .pending_collections
            .iter()
            .rev()
            .filter(|c| status.map_or(true, |s| c.status == s))
            .collect())
    }

    /// Confirms a collection: credits every line into the old pool and marks
    /// it received. Allowed once per collection.
    pub fn receive(&mut self, collection_id: &str, actor: &Actor) -> Result<ReceiveOutcome, InventoryError> {
        check_inventory_permission(actor, InventoryAction::ReceiveCollection)?;

        let index = self
            .pending_collections
            .iter()
            .position(|c| c.id.to_string() == collection_id.trim())
            .ok_or_else(|| InventoryError::NotFound(format!("Collection {}", collection_id)))?;

        if self.pending_collections[index].is_received() {
            return Err(InventoryError::AlreadyReceived(collection_id.to_string()));
        }

        let project_id = self.pending_collections[index].project_id.clone();
        let lines = self.pending_collections[index].materials.clone();
        let checkpoint = self.checkpoint();
        let mut missing = Vec::new();
        let mut touched = Vec::new();

        for line in &lines {
            if line.quantity == 0 {
                continue;
            }
            if self.material(line.id).is_none() {
                log::warn!(
                    "Collection {}: material {} no longer in inventory, skipped",
                    collection_id,
                    line.id
                );
                missing.push(line.id);
                continue;
            }
            let credited = self.credit(
                line.id,
                line.quantity,
                TransactionType::Collection,
                actor,
                Some(&project_id),
                format!("Collected from project #{} (added to old inventory)", project_id),
            );
            if let Err(err) = credited {
                self.rollback(checkpoint);
                return Err(err);
            }
            touched.push(line.id);
        }

        let collection = &mut self.pending_collections[index];
        collection.status = CollectionStatus::Received;
        collection.received_by = Some(actor.username.clone());
        collection.received_by_name = Some(actor.name.clone());
        collection.received_at = Some(Utc::now());
        let collection = collection.clone();

        log::info!("Collection {} received by {}", collection.id, actor.username);

        Ok(ReceiveOutcome {
            collection,
            updated: self.snapshot_of(&touched),
            missing,
        })
    }
}
