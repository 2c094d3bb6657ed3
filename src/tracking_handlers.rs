// src/tracking_handlers.rs
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use validator::Validate;

use crate::auth::resolve_actor;
use crate::error::ApiResult;
use crate::handlers::{ApiResponse, CallerQuery};
use crate::models::LocationUpdateRequest;
use crate::AppState;

pub async fn get_tracking(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<CallerQuery>,
) -> ApiResult<HttpResponse> {
    let state = app_state.store.read().await?;
    let actor = resolve_actor(&state.users, &query.username)?;

    let overview = state.tracking_overview(&actor)?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(overview)))
}

pub async fn update_location(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<LocationUpdateRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;

    let location = app_state
        .store
        .transact(|state| {
            let actor = resolve_actor(&state.users, &request.username)?;
            state.record_location(&actor, &request)
        })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        location,
        "Location updated".to_string(),
    )))
}
