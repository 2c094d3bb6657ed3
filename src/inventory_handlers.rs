// src/inventory_handlers.rs
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::auth::{check_inventory_permission, resolve_actor, InventoryAction};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ApiResponse, CallerQuery, PaginatedResponse, PaginationQuery};
use crate::inventory::{CreditLine, StockLine};
use crate::models::{
    deserialize_flexible_id, deserialize_optional_flexible_id, CollectionStatus, Material, MaterialId,
    MaterialInput, MaterialLineRequest, PendingCollection, Transaction, TransactionFilter, TransactionType,
};
use crate::AppState;

// ==================== REQUESTS ====================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[serde(deserialize_with = "deserialize_flexible_id")]
    #[validate(length(min = 1, message = "Project id is required"))]
    pub project_id: String,
    pub materials: Vec<MaterialLineRequest>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[serde(default, deserialize_with = "deserialize_optional_flexible_id")]
    pub project_id: Option<String>,
    pub materials: Vec<MaterialLineRequest>,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct PendingCollectionsQuery {
    #[serde(default)]
    pub username: String,
    pub status: Option<CollectionStatus>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default)]
    pub username: String,
    pub material_id: Option<MaterialId>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    pub project_id: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl TransactionsQuery {
    fn filter(&self) -> TransactionFilter {
        TransactionFilter {
            material_id: self.material_id,
            kind: self.kind,
            project_id: self.project_id.clone().filter(|p| !p.trim().is_empty()),
        }
    }

    fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot {
    pub materials: Vec<Material>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<Transaction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_collections: Option<Vec<PendingCollection>>,
}

// ==================== READS ====================

pub async fn get_inventory(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<CallerQuery>,
) -> ApiResult<HttpResponse> {
    let state = app_state.store.read().await?;
    let actor = resolve_actor(&state.users, &query.username)?;
    let inventory = state.inventory;

    let snapshot = if actor.role.can_view_inventory_audit() {
        InventorySnapshot {
            materials: inventory.materials,
            transactions: Some(inventory.transactions),
            pending_collections: Some(inventory.pending_collections),
        }
    } else {
        InventorySnapshot {
            materials: inventory.materials,
            transactions: None,
            pending_collections: None,
        }
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(snapshot)))
}

pub async fn get_materials(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<CallerQuery>,
) -> ApiResult<HttpResponse> {
    let state = app_state.store.read().await?;
    let actor = resolve_actor(&state.users, &query.username)?;
    check_inventory_permission(&actor, InventoryAction::ViewMaterials)?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(state.inventory.materials)))
}

pub async fn get_low_stock(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<CallerQuery>,
) -> ApiResult<HttpResponse> {
    let state = app_state.store.read().await?;
    let actor = resolve_actor(&state.users, &query.username)?;
    check_inventory_permission(&actor, InventoryAction::ViewMaterials)?;

    let low: Vec<&Material> = state.inventory.low_stock();
    Ok(HttpResponse::Ok().json(ApiResponse::success(low)))
}

pub async fn get_pending_collections(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PendingCollectionsQuery>,
) -> ApiResult<HttpResponse> {
    let state = app_state.store.read().await?;
    let actor = resolve_actor(&state.users, &query.username)?;
    let collections = state.inventory.pending_collections_for(&actor, query.status)?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(collections)))
}

pub async fn get_transactions(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<TransactionsQuery>,
) -> ApiResult<HttpResponse> {
    let state = app_state.store.read().await?;
    let actor = resolve_actor(&state.users, &query.username)?;
    let hits = state.inventory.transactions_for(&actor, &query.filter())?;

    let page = PaginatedResponse::from_slice(&hits, &query.pagination());
    Ok(HttpResponse::Ok().json(ApiResponse::success(page)))
}

pub async fn export_transactions(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<TransactionsQuery>,
) -> ApiResult<HttpResponse> {
    let state = app_state.store.read().await?;
    let actor = resolve_actor(&state.users, &query.username)?;
    let hits = state.inventory.transactions_for(&actor, &query.filter())?;

    let mut csv_data = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut csv_data);

        writer
            .write_record([
                "ID", "Timestamp", "Type", "Material ID", "Material", "Quantity", "Pool", "Project",
                "Performed By", "Notes", "Override", "Shortfall",
            ])
            .map_err(|e| ApiError::InternalServerError(e.to_string()))?;

        for tx in hits {
            writer
                .write_record([
                    tx.id.to_string(),
                    tx.timestamp.to_rfc3339(),
                    tx.kind.to_string(),
                    tx.material_id.to_string(),
                    tx.material_name.clone(),
                    tx.quantity.to_string(),
                    tx.material_type.to_string(),
                    tx.project_id.clone().unwrap_or_default(),
                    tx.performed_by.clone(),
                    tx.notes.clone(),
                    tx.negative_stock_override.to_string(),
                    tx.shortfall.map(|s| s.to_string()).unwrap_or_default(),
                ])
                .map_err(|e| ApiError::InternalServerError(e.to_string()))?;
        }

        writer.flush().map_err(|e| ApiError::InternalServerError(e.to_string()))?;
    }

    log::info!("Transaction log exported by {}", actor.username);

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(("Content-Disposition", "attachment; filename=\"inventory-transactions.csv\""))
        .body(csv_data))
}

// ==================== MUTATIONS ====================

pub async fn replace_materials(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<CallerQuery>,
    body: web::Json<Vec<MaterialInput>>,
) -> ApiResult<HttpResponse> {
    let inputs = body.into_inner();
    for input in &inputs {
        input.validate()?;
    }

    let materials = app_state
        .store
        .transact(|state| {
            let actor = resolve_actor(&state.users, &query.username)?;
            Ok(state.inventory.replace_materials(inputs, &actor)?.to_vec())
        })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        materials,
        "Materials updated".to_string(),
    )))
}

pub async fn assign_materials(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<AssignRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    let lines = StockLine::from_requests(&request.materials)?;

    let outcome = app_state
        .store
        .transact(|state| {
            let actor = resolve_actor(&state.users, &request.username)?;
            Ok(state.inventory.assign_to_job(&request.project_id, &lines, &actor)?)
        })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        outcome,
        format!("Materials assigned to project #{}", request.project_id),
    )))
}

pub async fn return_materials(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<ReturnRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    let lines = CreditLine::from_requests(&request.materials)?;

    let outcome = app_state
        .store
        .transact(|state| {
            let actor = resolve_actor(&state.users, &request.username)?;
            Ok(state.inventory.return_materials(
                request.project_id.as_deref(),
                &lines,
                request.notes.as_deref(),
                &actor,
            )?)
        })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        outcome,
        "Materials returned to old inventory".to_string(),
    )))
}

pub async fn receive_collection(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    request: web::Json<ReceiveRequest>,
) -> ApiResult<HttpResponse> {
    let collection_id = path.into_inner();

    let outcome = app_state
        .store
        .transact(|state| {
            let actor = resolve_actor(&state.users, &request.username)?;
            Ok(state.inventory.receive(&collection_id, &actor)?)
        })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        outcome,
        "Collection received and added to old inventory".to_string(),
    )))
}
