// src/models/collection.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use super::MaterialId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    Pending,
    Received,
}

/// Snapshot of a material line taken when the job was completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionLine {
    pub id: MaterialId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCollection {
    pub id: Uuid,
    pub project_id: String,
    pub project_name: String,
    pub materials: Vec<CollectionLine>,
    pub status: CollectionStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

impl PendingCollection {
    pub fn is_received(&self) -> bool {
        self.status == CollectionStatus::Received
    }
}
