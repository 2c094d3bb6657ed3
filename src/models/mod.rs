// src/models/mod.rs

pub mod collection;
pub mod job;
pub mod material;
pub mod notification;
pub mod tracking;
pub mod transaction;

pub use collection::*;
pub use job::*;
pub use material::*;
pub use notification::*;
pub use tracking::*;
pub use transaction::*;

use serde::{Deserialize, Deserializer, Serialize};

use crate::inventory::InventoryError;

// ==================== REQUEST HELPERS ====================

/// Quantity as it arrives from clients: a JSON number or a numeric string.
/// Converted once at the boundary by [`QuantityInput::to_count`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuantityInput {
    Int(i64),
    Float(f64),
    Text(String),
}

impl QuantityInput {
    pub fn to_count(&self, material_id: MaterialId) -> Result<u64, InventoryError> {
        let invalid = |value: String| InventoryError::InvalidQuantity { material_id, value };

        let parsed = match self {
            QuantityInput::Int(n) => *n,
            QuantityInput::Float(f) => {
                if !f.is_finite() || f.fract() != 0.0 {
                    return Err(invalid(f.to_string()));
                }
                *f as i64
            }
            QuantityInput::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0
                } else {
                    trimmed.parse::<i64>().map_err(|_| invalid(s.clone()))?
                }
            }
        };

        u64::try_from(parsed).map_err(|_| invalid(parsed.to_string()))
    }
}

impl Default for QuantityInput {
    fn default() -> Self {
        QuantityInput::Int(0)
    }
}

/// An identifier sent either as a JSON string or number.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn into_trimmed(self) -> String {
        match self {
            RawId::Text(s) => s.trim().to_string(),
            RawId::Number(n) => n.to_string(),
        }
    }
}

pub fn deserialize_flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(RawId::deserialize(deserializer)?.into_trimmed())
}

/// Like [`deserialize_flexible_id`]; `null` and blank strings become `None`.
pub fn deserialize_optional_flexible_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?
        .map(RawId::into_trimmed)
        .filter(|id| !id.is_empty()))
}
