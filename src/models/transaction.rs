// src/models/transaction.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use super::{MaterialId, Pool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Assignment,
    Return,
    Collection,
}

/// Immutable audit record of one stock mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub material_id: MaterialId,
    pub material_name: String,
    /// Negative for deductions, positive for credits.
    pub quantity: i64,
    pub material_type: Pool,
    #[serde(default)]
    pub project_id: Option<String>,
    pub performed_by: String,
    pub performed_by_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub negative_stock_override: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortfall: Option<u64>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Transaction {
    /// Net effect of this entry on the material's stock. Overrides only
    /// removed what was actually on the shelf.
    pub fn stock_effect(&self) -> i64 {
        match self.shortfall {
            Some(shortfall) if self.quantity < 0 => self.quantity + shortfall as i64,
            _ => self.quantity,
        }
    }
}

/// Query-side filter for the transaction log.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub material_id: Option<MaterialId>,
    pub kind: Option<TransactionType>,
    pub project_id: Option<String>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.material_id.map_or(true, |id| tx.material_id == id)
            && self.kind.map_or(true, |kind| tx.kind == kind)
            && self
                .project_id
                .as_deref()
                .map_or(true, |pid| tx.project_id.as_deref() == Some(pid))
    }
}
