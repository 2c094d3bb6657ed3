// src/job_handlers.rs
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use validator::Validate;

use crate::auth::resolve_actor;
use crate::error::ApiResult;
use crate::handlers::{ApiResponse, CallerQuery};
use crate::jobs::{approve_job, complete_job, create_job, update_job};
use crate::models::{ApproveJobRequest, CompleteJobRequest, CreateJobRequest, Job, JobPath, UpdateJobRequest};
use crate::AppState;

pub async fn get_jobs(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<CallerQuery>,
) -> ApiResult<HttpResponse> {
    let state = app_state.store.read().await?;
    resolve_actor(&state.users, &query.username)?;

    let jobs: Vec<&Job> = state.jobs.iter().rev().collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(jobs)))
}

pub async fn get_job(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<JobPath>,
    query: web::Query<CallerQuery>,
) -> ApiResult<HttpResponse> {
    let state = app_state.store.read().await?;
    resolve_actor(&state.users, &query.username)?;

    let job = state.job(&path.id)?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(job)))
}

pub async fn create_job_handler(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<CreateJobRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    let request = request.into_inner();

    let outcome = app_state
        .store
        .transact(|state| {
            let actor = resolve_actor(&state.users, &request.username)?;
            create_job(state, request, &actor)
        })
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(outcome)))
}

pub async fn update_job_handler(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<JobPath>,
    request: web::Json<UpdateJobRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    let request = request.into_inner();
    let id = path.into_inner().id;

    let outcome = app_state
        .store
        .transact(|state| {
            let actor = resolve_actor(&state.users, &request.username)?;
            update_job(state, &id, request, &actor)
        })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(outcome)))
}

pub async fn complete_job_handler(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<JobPath>,
    request: web::Json<CompleteJobRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    let request = request.into_inner();
    let id = path.into_inner().id;

    let outcome = app_state
        .store
        .transact(|state| {
            let actor = match request.username.as_deref() {
                Some(username) if !username.trim().is_empty() => Some(resolve_actor(&state.users, username)?),
                _ => None,
            };
            complete_job(state, &id, request, actor.as_ref())
        })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        outcome,
        "Job completed and submitted for approval".to_string(),
    )))
}

pub async fn approve_job_handler(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<JobPath>,
    request: web::Json<ApproveJobRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    let request = request.into_inner();
    let id = path.into_inner().id;

    let job = app_state
        .store
        .transact(|state| {
            let actor = resolve_actor(&state.users, &request.username)?;
            approve_job(state, &id, request, &actor)
        })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(job)))
}
