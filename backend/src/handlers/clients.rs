//! HTTP handlers for client receivables

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{Client, CreditMovement};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{ClientOrigin, CurrentUser};
use crate::services::client::{ClientService, CreditMovementInput, StatusRefresh};
use crate::AppState;

pub async fn get_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<Client>> {
    current_user.0.require("clients", "read")?;
    let service = ClientService::new(state.ledger.clone());
    let client = service
        .get_client(&current_user.0.context(origin), client_id)
        .await?;
    Ok(Json(client))
}

pub async fn credit_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<Vec<CreditMovement>>> {
    current_user.0.require("clients", "read")?;
    let service = ClientService::new(state.ledger.clone());
    let history = service
        .credit_history(&current_user.0.context(origin), client_id)
        .await?;
    Ok(Json(history))
}

/// Post a manual charge or payment
pub async fn add_credit_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(client_id): Path<Uuid>,
    Json(input): Json<CreditMovementInput>,
) -> AppResult<(StatusCode, Json<CreditMovement>)> {
    current_user.0.require("clients", "update")?;
    let service = ClientService::new(state.ledger.clone());
    let movement = service
        .add_credit_movement(&current_user.0.context(origin), client_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

pub async fn block_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<Client>> {
    current_user.0.require("clients", "update")?;
    let service = ClientService::new(state.ledger.clone());
    let client = service
        .block_client(&current_user.0.context(origin), client_id)
        .await?;
    Ok(Json(client))
}

pub async fn unblock_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<Client>> {
    current_user.0.require("clients", "update")?;
    let service = ClientService::new(state.ledger.clone());
    let client = service
        .unblock_client(&current_user.0.context(origin), client_id)
        .await?;
    Ok(Json(client))
}

/// Recompute the status of every active client
pub async fn refresh_statuses(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
) -> AppResult<Json<StatusRefresh>> {
    current_user.0.require("clients", "update")?;
    let service = ClientService::new(state.ledger.clone());
    let refresh = service
        .refresh_statuses(&current_user.0.context(origin))
        .await?;
    Ok(Json(refresh))
}

pub async fn deactivate_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    origin: ClientOrigin,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<Client>> {
    current_user.0.require("clients", "delete")?;
    let service = ClientService::new(state.ledger.clone());
    let client = service
        .deactivate_client(&current_user.0.context(origin), client_id)
        .await?;
    Ok(Json(client))
}
