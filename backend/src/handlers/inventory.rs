//! HTTP handlers for inventory management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{InventoryMovement, Warehouse};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{ClientOrigin, CurrentUser};
use crate::services::inventory::{
    AdjustmentInput, EntryInput, InventoryEntry, InventoryService, StockLevel, TransferInput,
};
use crate::AppState;

/// Receive stock into a warehouse
pub async fn register_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Json(input): Json<EntryInput>,
) -> AppResult<(StatusCode, Json<InventoryEntry>)> {
    current_user.0.require("inventory", "create")?;
    let service = InventoryService::new(state.ledger.clone());
    let entry = service
        .register_entry(&current_user.0.context(origin), input)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Correct stock by a signed quantity
pub async fn register_adjustment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Json(input): Json<AdjustmentInput>,
) -> AppResult<(StatusCode, Json<InventoryMovement>)> {
    current_user.0.require("inventory", "update")?;
    let service = InventoryService::new(state.ledger.clone());
    let movement = service
        .register_adjustment(&current_user.0.context(origin), input)
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Move stock between warehouses
pub async fn register_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Json(input): Json<TransferInput>,
) -> AppResult<(StatusCode, Json<InventoryMovement>)> {
    current_user.0.require("inventory", "update")?;
    let service = InventoryService::new(state.ledger.clone());
    let movement = service
        .register_transfer(&current_user.0.context(origin), input)
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Stock on hand for a presentation in a warehouse
pub async fn get_stock_level(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path((presentation_id, warehouse_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<StockLevel>> {
    current_user.0.require("inventory", "read")?;
    let service = InventoryService::new(state.ledger.clone());
    let level = service
        .stock_level(&current_user.0.context(origin), presentation_id, warehouse_id)
        .await?;
    Ok(Json(level))
}

/// Movement history for a presentation in a warehouse
pub async fn list_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path((presentation_id, warehouse_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Vec<InventoryMovement>>> {
    current_user.0.require("inventory", "read")?;
    let service = InventoryService::new(state.ledger.clone());
    let movements = service
        .list_movements(&current_user.0.context(origin), presentation_id, warehouse_id)
        .await?;
    Ok(Json(movements))
}

/// Deactivate an empty warehouse
pub async fn deactivate_warehouse(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Warehouse>> {
    current_user.0.require("warehouses", "delete")?;
    let service = InventoryService::new(state.ledger.clone());
    let warehouse = service
        .deactivate_warehouse(&current_user.0.context(origin), warehouse_id)
        .await?;
    Ok(Json(warehouse))
}
