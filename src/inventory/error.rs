// src/inventory/error.rs
use std::fmt;

use crate::models::{MaterialId, Pool};

#[derive(Debug, Clone, PartialEq)]
pub enum InventoryError {
    InvalidQuantity { material_id: MaterialId, value: String },
    MaterialNotFound(MaterialId),
    InsufficientStock {
        material: String,
        pool: Pool,
        available_in_pool: u64,
        total_available: u64,
        required: u64,
    },
    AccessDenied(String),
    NotFound(String),
    AlreadyReceived(String),
    InvalidMaterial(String),
    StockOverflow { material: String, pool: Pool, adding: u64 },
}

impl fmt::Display for InventoryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InventoryError::InvalidQuantity { material_id, value } => write!(
                f,
                "Invalid quantity '{}' for material {}: must be a non-negative integer",
                value, material_id
            ),
            InventoryError::MaterialNotFound(id) => write!(f, "Material with id {} not found", id),
            InventoryError::InsufficientStock { material, pool, available_in_pool, total_available, required } => write!(
                f,
                "Insufficient stock for {}. Available {}: {}, Total: {}, Required: {}",
                material, pool, available_in_pool, total_available, required
            ),
            InventoryError::AccessDenied(reason) => write!(f, "Access denied: {}", reason),
            InventoryError::NotFound(what) => write!(f, "{} not found", what),
            InventoryError::AlreadyReceived(id) => write!(f, "Collection {} already received", id),
            InventoryError::InvalidMaterial(reason) => write!(f, "Invalid material list: {}", reason),
            InventoryError::StockOverflow { material, pool, adding } => write!(
                f,
                "Adding {} to the {} pool of {} exceeds the maximum stock count",
                adding, pool, material
            ),
        }
    }
}

impl std::error::Error for InventoryError {}
