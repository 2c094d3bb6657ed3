// src/jobs.rs
//! Job lifecycle as far as it touches stock: assignment on create,
//! reassignment on update, collection on completion, then approval.

use chrono::Utc;
use serde::Serialize;

use crate::auth::{Actor, Role};
use crate::error::{ApiError, ApiResult};
use crate::inventory::StockLine;
use crate::models::{
    ApproveJobRequest, CollectionLine, CompleteJobRequest, CompletionData, CreateJobRequest, Job, JobStatus,
    Material, MaterialId, PendingCollection, UpdateJobRequest,
};
use crate::notifications::{NotificationDraft, INVENTORY_COLLECTION};
use crate::store::State;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub job: Job,
    pub updated_materials: Vec<Material>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_materials: Vec<MaterialId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOutcome {
    pub job: Job,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_collection: Option<PendingCollection>,
    pub notified: usize,
}

pub fn create_job(state: &mut State, request: CreateJobRequest, actor: &Actor) -> ApiResult<JobOutcome> {
    let lines = StockLine::from_requests(&request.packing_materials)?;
    let id = state.next_job_id();
    let now = Utc::now();

    let mut job = Job {
        id: id.clone(),
        project_name: request.project_name,
        client_name: request.client_name,
        team_leader: request.team_leader,
        status: JobStatus::Assigned,
        packing_materials: Vec::new(),
        completion_data: None,
        history: Vec::new(),
        completed_date: None,
        created_by: actor.username.clone(),
        created_at: now,
        updated_at: now,
    };

    let (updated_materials, missing_materials) = if lines.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        let outcome = state.inventory.assign_to_job(&id, &lines, actor)?;
        job.packing_materials = outcome.applied;
        (outcome.updated, outcome.missing)
    };

    job.push_history(JobStatus::Assigned, Some(format!("Job created by {}", actor.username)));
    state.jobs.push(job.clone());
    log::info!("Job #{} created by {}", id, actor.username);

    Ok(JobOutcome {
        job,
        updated_materials,
        missing_materials,
    })
}

pub fn update_job(state: &mut State, id: &str, request: UpdateJobRequest, actor: &Actor) -> ApiResult<JobOutcome> {
    let previous = state.job(id)?.packing_materials.clone();

    let (assignment, updated_materials, missing_materials) = match &request.packing_materials {
        Some(requested) => {
            let lines = StockLine::from_requests(requested)?;
            let outcome = state.inventory.reassign_for_job(id, &previous, &lines, actor)?;
            (Some(outcome.applied), outcome.updated, outcome.missing)
        }
        None => (None, Vec::new(), Vec::new()),
    };

    let job = state.job_mut(id)?;
    if let Some(name) = request.project_name {
        job.project_name = Some(name);
    }
    if let Some(client) = request.client_name {
        job.client_name = Some(client);
    }
    if let Some(leader) = request.team_leader {
        job.team_leader = Some(leader);
    }
    if let Some(applied) = assignment {
        job.packing_materials = applied;
    }
    match request.status {
        Some(status) if status != job.status => {
            job.push_history(status, Some(format!("Status changed by {}", actor.username)));
        }
        _ => job.updated_at = Utc::now(),
    }

    Ok(JobOutcome {
        job: job.clone(),
        updated_materials,
        missing_materials,
    })
}

/// Records completion data and, when materials were collected on site,
/// opens a pending collection and tells every inventory controller. A job
/// can be completed once; a second completion would collect the same
/// materials twice.
pub fn complete_job(
    state: &mut State,
    id: &str,
    request: CompleteJobRequest,
    actor: Option<&Actor>,
) -> ApiResult<CompletionOutcome> {
    let status = state.job(id)?.status;
    if status.is_finished() {
        return Err(ApiError::Conflict(format!("Job #{} is already {}", id, status)));
    }

    let collected = request.materials_collected.as_ref().map_or(false, |f| f.is_set());

    let explicit = match &request.materials_collected_list {
        Some(lines) => {
            let mut parsed = Vec::with_capacity(lines.len());
            for line in lines {
                let name = line
                    .name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .or_else(|| state.inventory.material(line.id).map(|m| m.name.clone()))
                    .unwrap_or_else(|| "Unknown Material".to_string());
                parsed.push(CollectionLine {
                    id: line.id,
                    name,
                    quantity: line.quantity.to_count(line.id)?,
                });
            }
            Some(parsed)
        }
        None => None,
    };

    let job = state.job_mut(id)?;
    let created_by = actor
        .map(|a| a.username.clone())
        .or_else(|| job.team_leader.clone())
        .unwrap_or_else(|| "system".to_string());

    job.completion_data = Some(CompletionData {
        rating: request.rating.unwrap_or(0),
        signature: request.signature,
        notes: request.notes.unwrap_or_default(),
        tip_amount: request.tip_amount.unwrap_or(0.0),
        materials_collected: collected,
        materials_collected_list: explicit.clone().unwrap_or_default(),
        completed_at: Utc::now(),
    });
    job.push_history(
        JobStatus::WaitingApproval,
        Some("Job completed and submitted for approval".to_string()),
    );
    let job = job.clone();

    let pending_collection = if collected {
        state.inventory.create_from_job_completion(&job, explicit, &created_by)
    } else {
        None
    };

    let notified = match &pending_collection {
        Some(collection) => state.notify_role(
            Role::InventoryController,
            NotificationDraft {
                title: format!("Materials to Collect: Project #{}", id),
                message: format!(
                    "Project #{} completed. {} material(s) need to be collected.",
                    id,
                    collection.materials.len()
                ),
                kind: INVENTORY_COLLECTION,
                project_id: Some(id.to_string()),
                created_by: "system",
            },
        ),
        None => 0,
    };

    log::info!("Job #{} completed (materials collected: {})", id, collected);

    Ok(CompletionOutcome {
        job,
        pending_collection,
        notified,
    })
}

/// Moves a job out of `waiting-approval` into `completed`.
pub fn approve_job(state: &mut State, id: &str, request: ApproveJobRequest, actor: &Actor) -> ApiResult<Job> {
    if !actor.role.can_approve_jobs() {
        return Err(ApiError::Forbidden(format!("Role '{}' may not approve jobs", actor.role)));
    }

    let job = state.job_mut(id)?;
    if job.status != JobStatus::WaitingApproval {
        return Err(ApiError::Conflict(format!(
            "Job #{} is {}, only jobs waiting for approval can be approved",
            id, job.status
        )));
    }

    let note = match request.notes {
        Some(notes) if !notes.trim().is_empty() => format!("Approved by {}: {}", actor.username, notes.trim()),
        _ => format!("Approved by {}", actor.username),
    };
    job.push_history(JobStatus::Completed, Some(note));
    job.completed_date = Some(job.updated_at);

    log::info!("Job #{} approved by {}", id, actor.username);
    Ok(job.clone())
}
