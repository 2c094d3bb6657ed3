// src/models/tracking.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::Role;

/// Last position reported by a field user's device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdateRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: f64,
    /// Device time of the fix; server time when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// One row of the live tracking map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedUser {
    pub username: String,
    pub name: String,
    pub role: Role,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub last_update: Option<DateTime<Utc>>,
    pub current_job: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_are_range_checked() {
        let parse = |json: &str| serde_json::from_str::<LocationUpdateRequest>(json).unwrap();

        let ok = parse(r#"{"username": "tl", "latitude": -33.86, "longitude": 151.2}"#);
        assert!(ok.validate().is_ok());
        assert!(ok.timestamp.is_none());

        let off_map = parse(r#"{"username": "tl", "latitude": 91.0, "longitude": 0.0}"#);
        assert!(off_map.validate().is_err());
        let off_map = parse(r#"{"username": "tl", "latitude": 0.0, "longitude": -180.5}"#);
        assert!(off_map.validate().is_err());
    }
}
