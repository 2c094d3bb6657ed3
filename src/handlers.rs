// src/handlers.rs
use serde::{Deserialize, Serialize};

// ==================== COMMON STRUCTURES ====================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T: Clone> PaginatedResponse<T> {
    /// Slices an already filtered and ordered list.
    pub fn from_slice(items: &[T], pagination: &PaginationQuery) -> Self {
        let (page, per_page, offset) = pagination.normalize();
        let total = items.len() as i64;
        let data = items
            .iter()
            .skip(offset as usize)
            .take(per_page as usize)
            .cloned()
            .collect();

        Self {
            data,
            total,
            page,
            per_page,
            total_pages: (total + per_page - 1) / per_page,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PaginationQuery {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

/// `?username=` carried by read endpoints to identify the caller.
#[derive(Debug, Deserialize)]
pub struct CallerQuery {
    #[serde(default)]
    pub username: String,
}
