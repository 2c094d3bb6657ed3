// src/models/notification.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::deserialize_optional_flexible_id;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    /// Lowercase username of the recipient.
    pub recipient: String,
    #[serde(default)]
    pub recipient_name: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_by: Vec<String>,
}

impl Notification {
    pub fn is_read_by(&self, username: &str) -> bool {
        self.read_by.iter().any(|u| u.eq_ignore_ascii_case(username))
    }

    /// Returns `true` if this call changed the read state.
    pub fn mark_read(&mut self, username: &str) -> bool {
        if self.is_read_by(username) {
            return false;
        }
        self.read_by.push(username.to_lowercase());
        true
    }
}

/// Admin-authored message for one user, or for the whole field crew when
/// `recipient` is `"all"`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Recipient is required"))]
    pub recipient: String,
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 2000, message = "Message must be between 1 and 2000 characters"))]
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_flexible_id")]
    pub project_id: Option<String>,
}
