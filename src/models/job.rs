// src/models/job.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use validator::Validate;

use super::{deserialize_flexible_id, CollectionLine, MaterialId, MaterialLineRequest, Pool, QuantityInput};

// ==================== JOB STATUS ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    #[default]
    Assigned,
    Arrived,
    PackingStart,
    FirstLocationCompleted,
    ArrivedSecondLocation,
    UnpackingStart,
    WaitingApproval,
    Completed,
    Delayed,
}

impl JobStatus {
    /// A crew is out on this job.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobStatus::Assigned
                | JobStatus::Arrived
                | JobStatus::PackingStart
                | JobStatus::FirstLocationCompleted
                | JobStatus::ArrivedSecondLocation
                | JobStatus::UnpackingStart
        )
    }

    pub fn is_finished(self) -> bool {
        matches!(self, JobStatus::WaitingApproval | JobStatus::Completed)
    }
}

// ==================== JOB ====================

/// Material drawn from stock for a job, with the exact pool split so a later
/// reassignment can put it back where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedMaterial {
    pub id: MaterialId,
    #[serde(default)]
    pub name: String,
    pub quantity: u64,
    #[serde(default)]
    pub material_type: Pool,
    #[serde(default)]
    pub taken_new: u64,
    #[serde(default)]
    pub taken_old: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHistoryEntry {
    pub status: JobStatus,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionData {
    pub rating: u8,
    pub signature: Option<String>,
    pub notes: String,
    pub tip_amount: f64,
    pub materials_collected: bool,
    pub materials_collected_list: Vec<CollectionLine>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub team_leader: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub packing_materials: Vec<AssignedMaterial>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_data: Option<CompletionData>,
    #[serde(default)]
    pub history: Vec<JobHistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn display_name(&self) -> String {
        self.project_name
            .clone()
            .or_else(|| self.client_name.clone())
            .unwrap_or_else(|| format!("Project #{}", self.id))
    }

    pub fn push_history(&mut self, status: JobStatus, notes: Option<String>) {
        self.status = status;
        self.updated_at = Utc::now();
        self.history.push(JobHistoryEntry { status, at: self.updated_at, notes });
    }
}

// ==================== REQUESTS ====================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(max = 255, message = "Project name cannot exceed 255 characters"))]
    pub project_name: Option<String>,
    #[validate(length(max = 255, message = "Client name cannot exceed 255 characters"))]
    pub client_name: Option<String>,
    pub team_leader: Option<String>,
    #[serde(default)]
    pub packing_materials: Vec<MaterialLineRequest>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(max = 255, message = "Project name cannot exceed 255 characters"))]
    pub project_name: Option<String>,
    #[validate(length(max = 255, message = "Client name cannot exceed 255 characters"))]
    pub client_name: Option<String>,
    pub team_leader: Option<String>,
    pub status: Option<JobStatus>,
    /// `None` leaves the current assignment untouched; `Some` replaces it.
    pub packing_materials: Option<Vec<MaterialLineRequest>>,
}

/// `materialsCollected` arrives as `true` or `"yes"` depending on the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CollectedFlag {
    Bool(bool),
    Text(String),
}

impl CollectedFlag {
    pub fn is_set(&self) -> bool {
        match self {
            CollectedFlag::Bool(b) => *b,
            CollectedFlag::Text(s) => s.eq_ignore_ascii_case("yes") || s.eq_ignore_ascii_case("true"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionLineRequest {
    pub id: MaterialId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quantity: QuantityInput,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteJobRequest {
    pub username: Option<String>,
    #[validate(range(max = 5, message = "Rating must be between 0 and 5"))]
    pub rating: Option<u8>,
    pub signature: Option<String>,
    #[validate(length(max = 2000, message = "Notes cannot exceed 2000 characters"))]
    pub notes: Option<String>,
    #[validate(range(min = 0.0, message = "Tip amount cannot be negative"))]
    pub tip_amount: Option<f64>,
    pub materials_collected: Option<CollectedFlag>,
    pub materials_collected_list: Option<Vec<CollectionLineRequest>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApproveJobRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(max = 2000, message = "Notes cannot exceed 2000 characters"))]
    pub notes: Option<String>,
}

/// Path parameter carrying a job id.
#[derive(Debug, Deserialize)]
pub struct JobPath {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collected_flag_variants() {
        let yes: CollectedFlag = serde_json::from_str("\"yes\"").unwrap();
        let t: CollectedFlag = serde_json::from_str("true").unwrap();
        let no: CollectedFlag = serde_json::from_str("\"no\"").unwrap();
        assert!(yes.is_set());
        assert!(t.is_set());
        assert!(!no.is_set());
    }

    #[test]
    fn test_job_status_kebab_case() {
        assert_eq!(serde_json::to_string(&JobStatus::WaitingApproval).unwrap(), "\"waiting-approval\"");
        assert_eq!("packing-start".parse::<JobStatus>().unwrap(), JobStatus::PackingStart);
    }

    #[test]
    fn test_active_and_finished_statuses() {
        assert!(JobStatus::UnpackingStart.is_active());
        assert!(!JobStatus::Delayed.is_active());
        assert!(!JobStatus::WaitingApproval.is_active());
        assert!(JobStatus::WaitingApproval.is_finished());
        assert!(JobStatus::Completed.is_finished());
        assert!(!JobStatus::Arrived.is_finished());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let now = Utc::now();
        let mut job = Job {
            id: "12".into(),
            project_name: None,
            client_name: None,
            team_leader: None,
            status: JobStatus::Assigned,
            packing_materials: vec![],
            completion_data: None,
            history: vec![],
            completed_date: None,
            created_by: "admin".into(),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(job.display_name(), "Project #12");
        job.client_name = Some("Acme".into());
        assert_eq!(job.display_name(), "Acme");
    }
}
