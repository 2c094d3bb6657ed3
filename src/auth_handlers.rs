// src/auth_handlers.rs
use actix_web::{web, HttpResponse};
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

use crate::auth::{
    find_user, hash_password, resolve_actor, user_key, verify_password, Actor, CreateUserRequest, LoginRequest,
    Role, User, UserInfo,
};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ApiResponse, CallerQuery};
use crate::AppState;

fn require_user_manager(actor: &Actor) -> ApiResult<()> {
    if actor.role.can_manage_users() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admin access required".to_string()))
    }
}

pub async fn login(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;

    let state = app_state.store.read().await?;
    let user = find_user(&state.users, &request.username)
        .filter(|u| verify_password(&request.password, &u.password_hash))
        .ok_or_else(|| {
            log::warn!("Failed login attempt for '{}'", request.username);
            ApiError::Unauthorized("Invalid username or password".to_string())
        })?;

    log::info!("User {} logged in", user.username);
    Ok(HttpResponse::Ok().json(ApiResponse::success(UserInfo::from(user))))
}

pub async fn get_users(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<CallerQuery>,
) -> ApiResult<HttpResponse> {
    let state = app_state.store.read().await?;
    let actor = resolve_actor(&state.users, &query.username)?;
    require_user_manager(&actor)?;

    let users: Vec<UserInfo> = state.users.values().map(UserInfo::from).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(users)))
}

pub async fn create_user(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<CreateUserRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    let request = request.into_inner();

    // Hash before taking the store lock.
    let password_hash = hash_password(&request.password, app_state.config.auth.bcrypt_cost)?;

    let user_info = app_state
        .store
        .transact(|state| {
            let actor = resolve_actor(&state.users, &request.requested_by)?;
            require_user_manager(&actor)?;

            let key = user_key(&request.username);
            if state.users.contains_key(&key) {
                return Err(ApiError::Conflict(format!("Username '{}' already exists", request.username)));
            }

            let user = User {
                username: request.username.trim().to_string(),
                password_hash,
                role: request.role,
                name: request.name.trim().to_string(),
                email: request.email.unwrap_or_default(),
                phone: request.phone.unwrap_or_default(),
            };
            let info = UserInfo::from(&user);
            state.users.insert(key, user);

            log::info!("Admin {} created user {} with role {}", actor.username, info.username, info.role);
            Ok(info)
        })
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        user_info,
        "User created successfully".to_string(),
    )))
}

pub async fn get_roles() -> ApiResult<HttpResponse> {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct RoleInfo {
        id: Role,
        name: &'static str,
        description: &'static str,
        can_mutate_stock: bool,
        can_assign_without_stock_check: bool,
        can_manage_users: bool,
        can_approve_jobs: bool,
    }

    let roles: Vec<RoleInfo> = Role::all_roles()
        .into_iter()
        .map(|role| RoleInfo {
            id: role,
            name: role.display_name(),
            description: role.description(),
            can_mutate_stock: role.can_mutate_stock(),
            can_assign_without_stock_check: role.can_assign_without_stock_check(),
            can_manage_users: role.can_manage_users(),
            can_approve_jobs: role.can_approve_jobs(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(roles)))
}
