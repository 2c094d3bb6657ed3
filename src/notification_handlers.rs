// src/notification_handlers.rs
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::auth::resolve_actor;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ApiResponse, CallerQuery};
use crate::models::CreateNotificationRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    #[serde(default)]
    pub username: String,
}

pub async fn get_notifications(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<CallerQuery>,
) -> ApiResult<HttpResponse> {
    let state = app_state.store.read().await?;
    let actor = resolve_actor(&state.users, &query.username)?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(state.notifications_for(&actor.username))))
}

pub async fn create_notification(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<CreateNotificationRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    let request = request.into_inner();

    let count = app_state
        .store
        .transact(|state| {
            let actor = resolve_actor(&state.users, &request.username)?;
            state.send_notification(request, &actor)
        })
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        serde_json::json!({ "count": count }),
        format!("Notification sent to {} user(s)", count),
    )))
}

pub async fn mark_notification_read(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    request: web::Json<MarkReadRequest>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();

    let notification = app_state
        .store
        .transact(|state| {
            let actor = resolve_actor(&state.users, &request.username)?;
            let notification = state
                .notifications
                .iter_mut()
                .find(|n| n.id.to_string() == id && n.recipient.eq_ignore_ascii_case(&actor.username))
                .ok_or_else(|| ApiError::notification_not_found(&id))?;

            if notification.mark_read(&actor.username) {
                log::debug!("Notification {} read by {}", id, actor.username);
            }
            Ok(notification.clone())
        })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(notification)))
}
